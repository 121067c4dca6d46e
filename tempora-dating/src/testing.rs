//! Shared fixture trees for unit tests.

use crate::state::DatingState;
use crate::tree::TimeTree;

/// `((A,B)AB,(C,D)CD)root` with clock-like branch lengths.
///
/// Ids: root 0, AB 1, CD 2, A 3, B 4, C 5, D 6.
/// Ages: root -10, AB -4, CD -6, tips 0.
pub(crate) fn four_taxon_tree() -> TimeTree {
    let mut tree = TimeTree::new();
    tree.get_node_mut(0).unwrap().name = Some("root".into());
    let ab = tree.add_child(0, Some("AB".into()), Some(6.0)).unwrap();
    let cd = tree.add_child(0, Some("CD".into()), Some(4.0)).unwrap();
    tree.add_child(ab, Some("A".into()), Some(4.0)).unwrap();
    tree.add_child(ab, Some("B".into()), Some(4.0)).unwrap();
    tree.add_child(cd, Some("C".into()), Some(6.0)).unwrap();
    tree.add_child(cd, Some("D".into()), Some(6.0)).unwrap();
    tree
}

pub(crate) fn four_taxon_state(tree: &TimeTree) -> DatingState {
    let mut state = DatingState::new(tree).unwrap();
    for (id, age) in [(0, -10.0), (1, -4.0), (2, -6.0)] {
        state.set_age(id, age);
    }
    state
}

/// Serially sampled tips at {0, 0, -5, -5, -12}.
///
/// `((A,B)n1,((C,D)n2,E)n3)root`
/// Ids: root 0, n1 1, n3 2, A 3, B 4, n2 5, E 6, C 7, D 8.
/// Ages: root -20, n1 -3, n3 -15, n2 -8, A/B 0, C/D -5, E -12.
pub(crate) fn serial_tree() -> TimeTree {
    let mut tree = TimeTree::new();
    let n1 = tree.add_child(0, Some("n1".into()), Some(17.0)).unwrap();
    let n3 = tree.add_child(0, Some("n3".into()), Some(5.0)).unwrap();
    tree.add_child(n1, Some("A".into()), Some(3.0)).unwrap();
    tree.add_child(n1, Some("B".into()), Some(3.0)).unwrap();
    let n2 = tree.add_child(n3, Some("n2".into()), Some(7.0)).unwrap();
    tree.add_child(n3, Some("E".into()), Some(3.0)).unwrap();
    tree.add_child(n2, Some("C".into()), Some(3.0)).unwrap();
    tree.add_child(n2, Some("D".into()), Some(3.0)).unwrap();
    tree
}

pub(crate) fn serial_state(tree: &TimeTree) -> DatingState {
    let mut state = DatingState::new(tree).unwrap();
    let ages = [-20.0, -3.0, -15.0, 0.0, 0.0, -8.0, -12.0, -5.0, -5.0];
    for (id, &age) in ages.iter().enumerate() {
        state.set_age(id, age);
    }
    state
}
