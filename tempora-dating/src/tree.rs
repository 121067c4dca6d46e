//! Rooted binary tree used by every dating component.
//!
//! Uses arena-style storage: nodes live in a flat `Vec<Node>` and are
//! referenced by `NodeId` (a `usize` index). Direction is fixed when the tree
//! is built, so traversals read `parent`/`children` directly instead of
//! resolving it from an undirected neighbour list.

use tempora_core::{Result, TemporaError};

/// Index into the tree's node arena.
pub type NodeId = usize;

/// A single node of a [`TimeTree`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Index of this node in the arena.
    pub id: NodeId,
    /// Parent node (None for root).
    pub parent: Option<NodeId>,
    /// Child nodes: empty for a tip, exactly two for an internal node.
    pub children: Vec<NodeId>,
    /// Branch length from this node to its parent.
    pub branch_length: Option<f64>,
    /// Taxon label (required on tips for calibration lookups).
    pub name: Option<String>,
}

impl Node {
    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted phylogenetic tree stored as an arena of nodes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl TimeTree {
    /// Create a new tree with a single unnamed root node.
    pub fn new() -> Self {
        let root = Node {
            id: 0,
            parent: None,
            children: Vec::new(),
            branch_length: None,
            name: None,
        };
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    /// Create a tree from pre-built nodes and a root index.
    ///
    /// Checks that ids match arena positions and that parent and child links
    /// agree; use [`TimeTree::check_binary`] for the full dating shape.
    pub fn from_nodes(nodes: Vec<Node>, root: NodeId) -> Result<Self> {
        if nodes.is_empty() {
            return Err(TemporaError::InvalidTree("empty node list".into()));
        }
        if root >= nodes.len() {
            return Err(TemporaError::InvalidTree(format!(
                "root index {} out of range ({})",
                root,
                nodes.len()
            )));
        }
        for (i, node) in nodes.iter().enumerate() {
            if node.id != i {
                return Err(TemporaError::InvalidTree(format!(
                    "node at position {} carries id {}",
                    i, node.id
                )));
            }
            for &c in &node.children {
                if nodes.get(c).and_then(|n| n.parent) != Some(i) {
                    return Err(TemporaError::InvalidTree(format!(
                        "child {} of node {} does not point back to it",
                        c, i
                    )));
                }
            }
        }
        if nodes[root].parent.is_some() {
            return Err(TemporaError::InvalidTree(format!(
                "root {} has a parent",
                root
            )));
        }
        Ok(Self { nodes, root })
    }

    /// Add a child to `parent` and return its `NodeId`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        branch_length: Option<f64>,
    ) -> Result<NodeId> {
        if parent >= self.nodes.len() {
            return Err(TemporaError::InvalidTree(format!(
                "parent index {} out of range ({})",
                parent,
                self.nodes.len()
            )));
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Vec::new(),
            branch_length,
            name,
        });
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Verify the shape the dating engine relies on: every internal node has
    /// exactly two children, every node is reachable from the root and
    /// `node_count == 2 * leaf_count - 1`.
    pub fn check_binary(&self) -> Result<()> {
        for node in &self.nodes {
            if !node.is_leaf() && node.children.len() != 2 {
                return Err(TemporaError::InvalidTree(format!(
                    "node {} has {} children, expected 0 or 2",
                    node.id,
                    node.children.len()
                )));
            }
        }
        if self.nodes[self.root].is_leaf() {
            return Err(TemporaError::InvalidTree("root has no children".into()));
        }
        let reachable = self.iter_preorder().count();
        if reachable != self.nodes.len() {
            return Err(TemporaError::InvalidTree(format!(
                "{} of {} nodes are not reachable from the root",
                self.nodes.len() - reachable,
                self.nodes.len()
            )));
        }
        let leaves = self.leaf_count();
        if self.nodes.len() != 2 * leaves - 1 {
            return Err(TemporaError::InvalidTree(format!(
                "{} nodes for {} leaves, expected {}",
                self.nodes.len(),
                leaves,
                2 * leaves - 1
            )));
        }
        Ok(())
    }

    /// Access a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable access to a node by id.
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaf nodes.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// All leaf node ids.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id)
            .collect()
    }

    /// True if `id` is a tip. Out-of-range ids are not tips.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes.get(id).map_or(false, Node::is_leaf)
    }

    /// Parent of `id` (None for the root).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// The two children of an internal node.
    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match self.nodes.get(id)?.children.as_slice() {
            [a, b] => Some((*a, *b)),
            _ => None,
        }
    }

    /// Branch length between `id` and its parent.
    pub fn branch_length(&self, id: NodeId) -> Option<f64> {
        self.nodes.get(id).and_then(|n| n.branch_length)
    }

    /// Set the branch length between `id` and its parent.
    pub fn set_branch_length(&mut self, id: NodeId, length: f64) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.branch_length = Some(length);
        }
    }

    /// Pre-order (parent before children) traversal yielding node ids.
    pub fn iter_preorder(&self) -> PreorderIter<'_> {
        PreorderIter {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Post-order (children before parent) traversal yielding node ids.
    pub fn iter_postorder(&self) -> PostorderIter {
        // Reverse of a root-first walk that pushes children left to right.
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            result.push(id);
            for &child in &self.nodes[id].children {
                stack.push(child);
            }
        }
        result.reverse();
        PostorderIter {
            sequence: result,
            pos: 0,
        }
    }

    /// Most recent common ancestor of two nodes.
    pub fn mrca(&self, a: NodeId, b: NodeId) -> Result<NodeId> {
        if a >= self.nodes.len() || b >= self.nodes.len() {
            return Err(TemporaError::InvalidInput("node id out of range".into()));
        }
        let mut on_path = vec![false; self.nodes.len()];
        let mut cur = Some(a);
        while let Some(id) = cur {
            on_path[id] = true;
            cur = self.nodes[id].parent;
        }
        let mut cur = Some(b);
        while let Some(id) = cur {
            if on_path[id] {
                return Ok(id);
            }
            cur = self.nodes[id].parent;
        }
        Ok(self.root)
    }

    /// Most recent common ancestor of a non-empty set of nodes.
    pub fn mrca_of(&self, ids: &[NodeId]) -> Result<NodeId> {
        let (&first, rest) = ids
            .split_first()
            .ok_or_else(|| TemporaError::InvalidInput("empty node set".into()))?;
        rest.iter().try_fold(first, |acc, &id| self.mrca(acc, id))
    }

    /// Id of the tip labelled `name`.
    pub fn find_leaf(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.is_leaf() && n.name.as_deref() == Some(name))
            .map(|n| n.id)
    }

    /// Sorted list of leaf names (leaves without names are excluded).
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .filter_map(|n| n.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for TimeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order iterator over node ids.
pub struct PreorderIter<'a> {
    tree: &'a TimeTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreorderIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        // Push children in reverse order so leftmost is visited first.
        for &child in self.tree.nodes[id].children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

/// Post-order iterator over node ids.
pub struct PostorderIter {
    sequence: Vec<NodeId>,
    pos: usize,
}

impl Iterator for PostorderIter {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.sequence.get(self.pos)?;
        self.pos += 1;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::four_taxon_tree;

    #[test]
    fn four_taxon_shape() {
        let tree = four_taxon_tree();
        assert_eq!(tree.node_count(), 7);
        assert_eq!(tree.leaf_count(), 4);
        assert!(tree.check_binary().is_ok());
        assert_eq!(tree.children(0), Some((1, 2)));
        assert_eq!(tree.children(3), None);
        assert_eq!(tree.parent(3), Some(1));
        assert_eq!(tree.parent(0), None);
    }

    #[test]
    fn preorder_traversal() {
        let tree = four_taxon_tree();
        let order: Vec<NodeId> = tree.iter_preorder().collect();
        assert_eq!(order, vec![0, 1, 3, 4, 2, 5, 6]);
    }

    #[test]
    fn postorder_traversal() {
        let tree = four_taxon_tree();
        let order: Vec<NodeId> = tree.iter_postorder().collect();
        assert_eq!(order, vec![3, 4, 1, 5, 6, 2, 0]);
    }

    #[test]
    fn unary_node_rejected() {
        let mut tree = TimeTree::new();
        let a = tree.add_child(0, None, Some(1.0)).unwrap();
        tree.add_child(0, Some("B".into()), Some(1.0)).unwrap();
        tree.add_child(a, Some("A".into()), Some(1.0)).unwrap();
        assert!(matches!(
            tree.check_binary(),
            Err(TemporaError::InvalidTree(_))
        ));
    }

    #[test]
    fn single_node_rejected() {
        assert!(TimeTree::new().check_binary().is_err());
    }

    #[test]
    fn from_nodes_checks_links() {
        let tree = four_taxon_tree();
        let mut nodes: Vec<Node> = (0..tree.node_count())
            .map(|i| tree.get_node(i).unwrap().clone())
            .collect();
        assert!(TimeTree::from_nodes(nodes.clone(), 0).is_ok());
        nodes[3].parent = Some(2);
        assert!(TimeTree::from_nodes(nodes, 0).is_err());
    }

    #[test]
    fn mrca_of_sets() {
        let tree = four_taxon_tree();
        assert_eq!(tree.mrca(3, 4).unwrap(), 1);
        assert_eq!(tree.mrca(3, 5).unwrap(), 0);
        assert_eq!(tree.mrca(1, 3).unwrap(), 1);
        assert_eq!(tree.mrca_of(&[5, 6]).unwrap(), 2);
        assert_eq!(tree.mrca_of(&[3, 4, 6]).unwrap(), 0);
        assert_eq!(tree.mrca_of(&[4]).unwrap(), 4);
        assert!(tree.mrca_of(&[]).is_err());
    }

    #[test]
    fn find_leaf_by_name() {
        let tree = four_taxon_tree();
        assert_eq!(tree.find_leaf("C"), Some(5));
        assert_eq!(tree.find_leaf("Z"), None);
        assert_eq!(tree.leaf_names(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn deep_ladder_traverses_without_recursion() {
        let mut tree = TimeTree::new();
        let mut spine = 0;
        for i in 0..20_000 {
            tree.add_child(spine, Some(format!("t{i}")), Some(1.0)).unwrap();
            spine = tree.add_child(spine, None, Some(1.0)).unwrap();
        }
        tree.get_node_mut(spine).unwrap().name = Some("last".into());
        assert!(tree.check_binary().is_ok());
        assert_eq!(tree.iter_postorder().count(), tree.node_count());
    }
}
