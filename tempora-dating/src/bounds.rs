//! Calibration bound propagation and per-node floors.
//!
//! Raw calibrations constrain a handful of nodes. [`set_all_node_priors`]
//! turns them into a closed interval `[prior_min, prior_max]` for every
//! node: upper (young) bounds travel from the tips toward the root, lower
//! (old) bounds travel from the root toward the tips.

use tempora_core::{Result, TemporaError};
use tracing::debug;

use crate::config::DatingConfig;
use crate::state::DatingState;
use crate::tree::{NodeId, TimeTree};

/// Propagate calibration bounds to every node, then recompute ordering,
/// floors, time slices and tip counts.
///
/// Starts from the raw calibrations every time, so calling it twice without
/// touching the calibrations yields identical arrays.
///
/// # Errors
///
/// - [`TemporaError::PriorInconsistency`] when a calibrated node's interval
///   becomes empty after tightening.
/// - [`TemporaError::NoFeasibleRootBound`] when no calibration gives the
///   root a finite, strictly negative lower bound.
pub fn set_all_node_priors(
    tree: &TimeTree,
    state: &mut DatingState,
    config: &DatingConfig,
) -> Result<()> {
    reset_bounds(tree, state);

    // Upper bounds, tips to root.
    for id in tree.iter_postorder() {
        let Some((c1, c2)) = tree.children(id) else {
            continue;
        };
        let from_children = state.prior_max[c1].min(state.prior_max[c2]);
        if state.has_prior[id] {
            state.prior_max[id] = state.prior_max[id].min(from_children);
            check_interval(state, id)?;
        } else {
            state.prior_max[id] = from_children;
        }
    }

    let root = tree.root();
    if !state.has_prior[root] {
        let oldest = (0..state.node_count())
            .filter(|&i| state.has_prior[i] && state.cal_min[i].is_finite())
            .map(|i| state.prior_min[i])
            .fold(f64::INFINITY, f64::min);
        state.prior_min[root] = config.root_bound_multiplier * oldest;
    }
    let root_min = state.prior_min[root];
    if !(root_min < 0.0 && root_min.is_finite()) {
        return Err(TemporaError::NoFeasibleRootBound { root_min });
    }
    check_interval(state, root)?;
    debug!(root, root_min, root_max = state.prior_max[root], "root age bounds");

    // Lower bounds, root to tips.
    for id in tree.iter_preorder() {
        let Some(parent) = tree.parent(id) else {
            continue;
        };
        if tree.is_leaf(id) {
            continue;
        }
        if state.has_prior[id] {
            state.prior_min[id] = state.prior_min[id].max(state.prior_min[parent]);
            check_interval(state, id)?;
        } else {
            state.prior_min[id] = state.prior_min[parent];
        }
    }

    state.refresh(tree, config);
    Ok(())
}

/// Working bounds back to the raw calibrations; tips pinned to their ages.
fn reset_bounds(tree: &TimeTree, state: &mut DatingState) {
    for id in 0..tree.node_count() {
        if tree.is_leaf(id) {
            state.prior_min[id] = state.ages[id];
            state.prior_max[id] = state.ages[id];
        } else {
            state.prior_min[id] = state.cal_min[id];
            state.prior_max[id] = state.cal_max[id];
        }
    }
}

fn check_interval(state: &DatingState, id: NodeId) -> Result<()> {
    if state.prior_max[id] < state.prior_min[id] {
        return Err(TemporaError::PriorInconsistency {
            node: id,
            prior_min: state.prior_min[id],
            prior_max: state.prior_max[id],
        });
    }
    Ok(())
}

/// Post-order pass computing `floor` (oldest tip age below each node),
/// `survival` (youngest tip age below) and `rank_max`.
///
/// `rank_max` follows the child with the strictly older floor, or takes the
/// larger of the two on a tie. Reads `rank`, so run
/// [`crate::ordering::update_node_ordering`] first.
pub fn set_floor(tree: &TimeTree, state: &mut DatingState) {
    for id in tree.iter_postorder() {
        match tree.children(id) {
            None => {
                state.floor[id] = state.ages[id];
                state.survival[id] = state.ages[id];
                state.rank_max[id] = state.rank[id];
            }
            Some((v1, v2)) => {
                let (f1, f2) = (state.floor[v1], state.floor[v2]);
                state.floor[id] = f1.min(f2);
                state.survival[id] = state.survival[v1].max(state.survival[v2]);
                state.rank_max[id] = if f1 < f2 {
                    state.rank_max[v1]
                } else if f2 < f1 {
                    state.rank_max[v2]
                } else {
                    state.rank_max[v1].max(state.rank_max[v2])
                };
            }
        }
    }
}
