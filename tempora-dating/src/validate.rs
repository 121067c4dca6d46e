//! Consistency checks on dated trees. Violations are data, not errors.

use tempora_core::Result;

use crate::calibration::Calibration;
use crate::state::DatingState;
use crate::tree::{NodeId, TimeTree};

/// A child older than its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderingViolation {
    pub parent: NodeId,
    pub child: NodeId,
    pub parent_age: f64,
    pub child_age: f64,
}

/// A node age outside its propagated prior interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundViolation {
    pub node: NodeId,
    pub age: f64,
    pub prior_min: f64,
    pub prior_max: f64,
}

/// A calibrated MRCA whose age falls outside the calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationViolation {
    pub node: NodeId,
    pub age: f64,
    pub calibration: Calibration,
}

/// First edge, walking pre-order from the root, whose child is older than
/// its parent.
pub fn find_ordering_violation(tree: &TimeTree, ages: &[f64]) -> Option<OrderingViolation> {
    tree.iter_preorder().find_map(|child| {
        let parent = tree.parent(child)?;
        (ages[child] < ages[parent]).then(|| OrderingViolation {
            parent,
            child,
            parent_age: ages[parent],
            child_age: ages[child],
        })
    })
}

/// True iff every node is at least as young as its parent.
pub fn check_node_height_ordering(tree: &TimeTree, ages: &[f64]) -> bool {
    find_ordering_violation(tree, ages).is_none()
}

/// First node (by id) whose age lies outside `[prior_min, prior_max]`.
pub fn find_bound_violation(tree: &TimeTree, state: &DatingState) -> Option<BoundViolation> {
    (0..tree.node_count()).find_map(|node| {
        let age = state.ages[node];
        let (prior_min, prior_max) = (state.prior_min[node], state.prior_max[node]);
        (age < prior_min || age > prior_max).then_some(BoundViolation {
            node,
            age,
            prior_min,
            prior_max,
        })
    })
}

/// First calibration whose MRCA age is outside its interval.
///
/// # Errors
///
/// Fails if a calibration cannot be resolved on `tree`.
pub fn find_calibration_violation(
    tree: &TimeTree,
    ages: &[f64],
    calibrations: &[Calibration],
) -> Result<Option<CalibrationViolation>> {
    for cal in calibrations {
        let node = cal.resolve(tree)?;
        if !cal.contains(ages[node]) {
            return Ok(Some(CalibrationViolation {
                node,
                age: ages[node],
                calibration: cal.clone(),
            }));
        }
    }
    Ok(None)
}
