//! Time slices of serially sampled trees.
//!
//! Each distinct tip sampling time closes a slice. With `lims` sorted
//! ascending (oldest first), slice `j` holds ages in `(lims[j-1], lims[j]]`.

use tempora_core::numeric::approx_eq;
use tracing::info;

use crate::config::DatingConfig;
use crate::state::DatingState;
use crate::tree::TimeTree;

/// Distinct tip ages, ascending. Ages within `tolerance` of the first member
/// of a group collapse onto the youngest of that group.
pub fn sampling_times(tree: &TimeTree, ages: &[f64], tolerance: f64) -> Vec<f64> {
    let mut tips: Vec<f64> = tree.leaves().into_iter().map(|id| ages[id]).collect();
    tips.sort_by(f64::total_cmp);

    let mut lims: Vec<f64> = Vec::new();
    let mut group_start = f64::NAN;
    for age in tips {
        match lims.last_mut() {
            Some(last) if approx_eq(age, group_start, tolerance) => *last = age,
            _ => {
                lims.push(age);
                group_start = age;
            }
        }
    }
    lims
}

/// Recompute `time_slice_lims` from the tip floors and reassign every node.
pub fn update_time_slices(tree: &TimeTree, state: &mut DatingState, config: &DatingConfig) {
    let lims = sampling_times(tree, &state.floor, config.slice_tolerance);
    if lims.len() > 1 && lims != state.time_slice_lims {
        info!(n_slices = lims.len(), times = ?lims, "tips sampled at distinct times");
    }
    state.time_slice_lims = lims;
    assign_time_slices(state);
}

/// Per-node slice index from the current ages and limits.
///
/// A node younger than every limit lands in the last slice.
pub fn assign_time_slices(state: &mut DatingState) {
    let lims = &state.time_slice_lims;
    let last = lims.len().saturating_sub(1);
    for (slot, &age) in state.time_slice.iter_mut().zip(&state.ages) {
        *slot = lims.iter().position(|&lim| age <= lim).unwrap_or(last);
    }
}

/// Number of slices each internal node spans: `j + 1` where `lims[j]`
/// matches the node's floor. Tips get 0.
pub fn slice_spans(tree: &TimeTree, state: &DatingState, config: &DatingConfig) -> Vec<usize> {
    (0..state.node_count())
        .map(|id| {
            if tree.is_leaf(id) {
                return 0;
            }
            state
                .time_slice_lims
                .iter()
                .position(|&lim| approx_eq(lim, state.floor[id], config.slice_tolerance))
                .map_or(0, |j| j + 1)
        })
        .collect()
}

/// Number of tips below each node (1 for a tip).
pub fn count_tips_below(tree: &TimeTree) -> Vec<usize> {
    let mut counts = vec![0; tree.node_count()];
    for id in tree.iter_postorder() {
        counts[id] = match tree.children(id) {
            Some((a, b)) => counts[a] + counts[b],
            None => 1,
        };
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{four_taxon_state, four_taxon_tree, serial_state, serial_tree};

    #[test]
    fn contemporaneous_tips_make_one_slice() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        state.refresh(&tree, &DatingConfig::default());
        assert_eq!(state.time_slice_lims(), &[0.0]);
        assert!((0..7).all(|id| state.time_slice(id) == 0));
    }

    #[test]
    fn serial_tips_make_three_slices() {
        let tree = serial_tree();
        let mut state = serial_state(&tree);
        state.refresh(&tree, &DatingConfig::default());
        assert_eq!(state.time_slice_lims(), &[-12.0, -5.0, 0.0]);

        let expected = [0, 2, 0, 2, 2, 1, 0, 1, 1];
        for (id, &slice) in expected.iter().enumerate() {
            assert_eq!(state.time_slice(id), slice, "node {id}");
        }
    }

    #[test]
    fn near_equal_tips_collapse() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        state.set_age(3, -2.0);
        state.set_age(4, -2.0 + 1e-8);
        state.refresh(&tree, &DatingConfig::default());
        assert_eq!(state.n_time_slices(), 2);
        assert_eq!(state.time_slice(3), 0);
        assert_eq!(state.time_slice(4), 0);
        assert_eq!(state.time_slice(5), 1);
    }

    #[test]
    fn zero_tolerance_still_merges_identical_ages() {
        let tree = serial_tree();
        let state = serial_state(&tree);
        assert_eq!(
            sampling_times(&tree, state.ages(), 0.0),
            vec![-12.0, -5.0, 0.0]
        );
    }

    #[test]
    fn tolerance_is_inclusive() {
        let tree = four_taxon_tree();
        let ages = [-10.0, -4.0, -6.0, -2.5, -2.0, 0.0, 0.0];
        assert_eq!(sampling_times(&tree, &ages, 0.5), vec![-2.0, 0.0]);
        assert_eq!(sampling_times(&tree, &ages, 0.25), vec![-2.5, -2.0, 0.0]);
    }

    #[test]
    fn spans_follow_floor() {
        let tree = serial_tree();
        let mut state = serial_state(&tree);
        let config = DatingConfig::default();
        state.refresh(&tree, &config);
        let spans = slice_spans(&tree, &state, &config);
        assert_eq!(spans[0], 1);
        assert_eq!(spans[1], 3);
        assert_eq!(spans[2], 1);
        assert_eq!(spans[5], 2);
        assert_eq!(spans[3], 0);
    }

    #[test]
    fn tip_counts() {
        let tree = serial_tree();
        let counts = count_tips_below(&tree);
        assert_eq!(counts, vec![5, 2, 3, 1, 1, 2, 1, 1, 1]);
    }
}
