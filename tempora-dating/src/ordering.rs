//! Total order of node ages.

use crate::state::DatingState;
use crate::tree::NodeId;

/// Node ids sorted by ascending age (oldest first). Ties go to the smaller
/// node id so the order is reproducible.
pub fn node_ordering(ages: &[f64]) -> Vec<NodeId> {
    let mut order: Vec<NodeId> = (0..ages.len()).collect();
    order.sort_by(|&a, &b| ages[a].total_cmp(&ages[b]).then(a.cmp(&b)));
    order
}

/// Store the ascending order and its inverse (`rank[id]` = position of `id`).
pub fn update_node_ordering(state: &mut DatingState) {
    let order = node_ordering(&state.ages);
    let mut rank = vec![0; order.len()];
    for (pos, &id) in order.iter().enumerate() {
        rank[id] = pos;
    }
    state.order = order;
    state.rank = rank;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{four_taxon_state, four_taxon_tree};
    use proptest::prelude::*;

    #[test]
    fn sorts_oldest_first() {
        assert_eq!(node_ordering(&[-1.0, -7.0, 0.0, -3.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn ties_broken_by_id() {
        assert_eq!(node_ordering(&[0.0, -2.0, 0.0, -2.0, 0.0]), vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn rank_is_inverse_of_order() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        update_node_ordering(&mut state);
        for (pos, &id) in state.order().iter().enumerate() {
            assert_eq!(state.rank(id), pos);
        }
        assert_eq!(state.order(), &[0, 2, 1, 3, 4, 5, 6]);
    }

    proptest! {
        #[test]
        fn ordering_is_sorted_permutation(ages in proptest::collection::vec(-100.0f64..0.0, 1..60)) {
            let order = node_ordering(&ages);
            let mut seen = order.clone();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..ages.len()).collect::<Vec<_>>());
            for w in order.windows(2) {
                prop_assert!(ages[w[0]] <= ages[w[1]]);
            }
        }
    }
}
