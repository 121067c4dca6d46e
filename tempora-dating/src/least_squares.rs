//! Starting node ages from branch lengths.
//!
//! Each internal node's height is fitted against the three branch lengths
//! incident to it, giving the linear system `A·x = b` over heights `x`
//! (time before present). Tips sit at height zero; the root sits midway
//! along the edge joining its two children. Ages are the negated heights.

use tempora_core::numeric::{invert_matrix, mat_vec};
use tempora_core::{Result, TemporaError};
use tracing::debug;

use crate::state::DatingState;
use crate::tree::{NodeId, TimeTree};

fn required_length(tree: &TimeTree, id: NodeId) -> Result<f64> {
    tree.branch_length(id)
        .ok_or_else(|| TemporaError::InvalidInput(format!("node {} has no branch length", id)))
}

/// Least-squares node ages for `tree`.
///
/// # Errors
///
/// - [`TemporaError::InvalidTree`] unless the tree is rooted, strictly binary
///   with `2n - 1` nodes.
/// - [`TemporaError::InvalidInput`] when a non-root node lacks a branch length.
/// - [`TemporaError::SingularMatrix`] when the system cannot be solved.
pub fn least_squares_ages(tree: &TimeTree) -> Result<Vec<f64>> {
    tree.check_binary()?;
    let n = tree.node_count();
    let mut a = vec![0.0; n * n];
    let mut b = vec![0.0; n];

    for id in 0..n {
        let row = id * n;
        a[row + id] = 1.0;
        let Some((c1, c2)) = tree.children(id) else {
            continue;
        };
        let (l1, l2) = (required_length(tree, c1)?, required_length(tree, c2)?);
        match tree.parent(id) {
            Some(parent) => {
                let ld = required_length(tree, id)?;
                for j in [parent, c1, c2] {
                    a[row + j] = -1.0 / 3.0;
                }
                b[id] = (l1 + l2 - ld) / 3.0;
            }
            None => {
                a[row + c1] = -0.5;
                a[row + c2] = -0.5;
                b[id] = (l1 + l2) / 2.0;
            }
        }
    }

    let inv = invert_matrix(&a, n)?;
    let heights = mat_vec(&inv, &b, n);
    debug!(nodes = n, root_height = heights[tree.root()], "least-squares fit");
    Ok(heights.into_iter().map(|x| -x).collect())
}

/// Write least-squares ages into `state` and reset the two root branches
/// to `age[child] - age[root]`.
pub fn apply_least_squares(tree: &mut TimeTree, state: &mut DatingState) -> Result<()> {
    let ages = least_squares_ages(tree)?;
    state.set_ages(&ages)?;
    let root = tree.root();
    if let Some((c1, c2)) = tree.children(root) {
        for c in [c1, c2] {
            tree.set_branch_length(c, ages[c] - ages[root]);
        }
    }
    Ok(())
}

/// Clamp every internal node so it is at least as old as both children.
pub fn enforce_node_ordering(tree: &TimeTree, ages: &mut [f64]) {
    for id in tree.iter_postorder() {
        if let Some((c1, c2)) = tree.children(id) {
            ages[id] = ages[id].min(ages[c1]).min(ages[c2]);
        }
    }
}

/// Multiply every age by `|factor|`.
pub fn scale_ages(ages: &mut [f64], factor: f64) {
    let factor = factor.abs();
    for age in ages.iter_mut() {
        *age *= factor;
    }
}
