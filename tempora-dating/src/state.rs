//! Per-tree dating state: node ages, calibration bounds and everything
//! derived from them.
//!
//! One [`DatingState`] belongs to one [`TimeTree`] and is indexed by its
//! `NodeId`s. The sampler mutates ages through [`DatingState::set_age`];
//! derived arrays (bounds, floors, ranks, slices, tip counts) are stale
//! after any such change until [`DatingState::refresh`] or
//! [`crate::bounds::set_all_node_priors`] runs.

use tempora_core::{Result, TemporaError};

use crate::bounds::set_floor;
use crate::config::DatingConfig;
use crate::ordering::update_node_ordering;
use crate::slices::{count_tips_below, update_time_slices};
use crate::tree::{NodeId, TimeTree};

/// Node ages and derived per-node statistics for one tree.
///
/// Per-node accessors index by `NodeId` and panic on ids from another tree.
#[derive(Debug, Clone)]
pub struct DatingState {
    pub(crate) ages: Vec<f64>,
    // Raw calibration bounds. Propagation never writes these.
    pub(crate) cal_min: Vec<f64>,
    pub(crate) cal_max: Vec<f64>,
    pub(crate) has_prior: Vec<bool>,
    pub(crate) prior_min: Vec<f64>,
    pub(crate) prior_max: Vec<f64>,
    pub(crate) floor: Vec<f64>,
    pub(crate) survival: Vec<f64>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) rank: Vec<usize>,
    pub(crate) rank_max: Vec<usize>,
    pub(crate) time_slice: Vec<usize>,
    pub(crate) time_slice_lims: Vec<f64>,
    pub(crate) n_tips_below: Vec<usize>,
    pub birth_rate: f64,
    pub death_rate: f64,
}

impl DatingState {
    /// Fresh state for `tree`: every age 0, no calibration, unit birth rate
    /// and zero death rate.
    ///
    /// # Errors
    ///
    /// Returns [`TemporaError::InvalidTree`] unless `tree` is rooted and
    /// strictly binary.
    pub fn new(tree: &TimeTree) -> Result<Self> {
        tree.check_binary()?;
        let n = tree.node_count();
        Ok(Self {
            ages: vec![0.0; n],
            cal_min: vec![f64::NEG_INFINITY; n],
            cal_max: vec![f64::INFINITY; n],
            has_prior: vec![false; n],
            prior_min: vec![f64::NEG_INFINITY; n],
            prior_max: vec![f64::INFINITY; n],
            floor: vec![0.0; n],
            survival: vec![0.0; n],
            order: (0..n).collect(),
            rank: (0..n).collect(),
            rank_max: (0..n).collect(),
            time_slice: vec![0; n],
            time_slice_lims: Vec::new(),
            n_tips_below: vec![1; n],
            birth_rate: 1.0,
            death_rate: 0.0,
        })
    }

    /// Set the branching-process rates.
    pub fn with_rates(mut self, birth_rate: f64, death_rate: f64) -> Self {
        self.birth_rate = birth_rate;
        self.death_rate = death_rate;
        self
    }

    /// Number of nodes this state covers.
    pub fn node_count(&self) -> usize {
        self.ages.len()
    }

    /// Age of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn age(&self, id: NodeId) -> f64 {
        self.ages[id]
    }

    /// Set one node age. Derived arrays become stale.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn set_age(&mut self, id: NodeId, age: f64) {
        self.ages[id] = age;
    }

    pub fn ages(&self) -> &[f64] {
        &self.ages
    }

    /// Replace all ages at once.
    pub fn set_ages(&mut self, ages: &[f64]) -> Result<()> {
        if ages.len() != self.ages.len() {
            return Err(TemporaError::InvalidInput(format!(
                "{} ages for {} nodes",
                ages.len(),
                self.ages.len()
            )));
        }
        self.ages.copy_from_slice(ages);
        Ok(())
    }

    /// Record a direct calibration `[lower, upper]` on `id`.
    ///
    /// # Errors
    ///
    /// [`TemporaError::InvalidCalibration`] if `lower > upper` or the node
    /// already carries a calibration.
    pub fn set_calibration(&mut self, id: NodeId, lower: f64, upper: f64) -> Result<()> {
        if id >= self.ages.len() {
            return Err(TemporaError::InvalidInput(format!(
                "node {} out of range ({})",
                id,
                self.ages.len()
            )));
        }
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(TemporaError::InvalidCalibration(format!(
                "interval [{}, {}] on node {} is empty",
                lower, upper, id
            )));
        }
        if self.has_prior[id] {
            return Err(TemporaError::InvalidCalibration(format!(
                "node {} is already calibrated to [{}, {}]",
                id, self.cal_min[id], self.cal_max[id]
            )));
        }
        self.has_prior[id] = true;
        self.cal_min[id] = lower;
        self.cal_max[id] = upper;
        Ok(())
    }

    /// Drop every direct calibration.
    pub fn clear_calibrations(&mut self) {
        self.has_prior.fill(false);
        self.cal_min.fill(f64::NEG_INFINITY);
        self.cal_max.fill(f64::INFINITY);
    }

    /// True if `id` carries a direct calibration.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn has_prior(&self, id: NodeId) -> bool {
        self.has_prior[id]
    }

    /// The direct calibration on `id`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn calibration(&self, id: NodeId) -> Option<(f64, f64)> {
        self.has_prior[id].then(|| (self.cal_min[id], self.cal_max[id]))
    }

    /// Oldest age allowed for `id` after propagation.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn prior_min(&self, id: NodeId) -> f64 {
        self.prior_min[id]
    }

    /// Youngest age allowed for `id` after propagation.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn prior_max(&self, id: NodeId) -> f64 {
        self.prior_max[id]
    }

    /// Oldest tip age below `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn floor(&self, id: NodeId) -> f64 {
        self.floor[id]
    }

    /// Youngest tip age below `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn survival(&self, id: NodeId) -> f64 {
        self.survival[id]
    }

    /// Position of `id` in the ascending age order.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn rank(&self, id: NodeId) -> usize {
        self.rank[id]
    }

    /// Rank of the oldest tip below `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn rank_max(&self, id: NodeId) -> usize {
        self.rank_max[id]
    }

    /// Node ids sorted by ascending age (oldest first).
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Index of the time slice holding `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn time_slice(&self, id: NodeId) -> usize {
        self.time_slice[id]
    }

    /// Distinct tip sampling times, ascending.
    pub fn time_slice_lims(&self) -> &[f64] {
        &self.time_slice_lims
    }

    pub fn n_time_slices(&self) -> usize {
        self.time_slice_lims.len()
    }

    /// Number of tips descending from `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= self.node_count()`.
    pub fn n_tips_below(&self, id: NodeId) -> usize {
        self.n_tips_below[id]
    }

    /// Recompute every age-dependent array: ordering, floors, time slices
    /// and tip counts. Bounds are left alone; see
    /// [`crate::bounds::set_all_node_priors`].
    pub fn refresh(&mut self, tree: &TimeTree, config: &DatingConfig) {
        update_node_ordering(self);
        set_floor(tree, self);
        update_time_slices(tree, self, config);
        self.n_tips_below = count_tips_below(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{four_taxon_state, four_taxon_tree, serial_state, serial_tree};

    #[test]
    #[should_panic]
    fn age_of_foreign_node_panics() {
        let tree = four_taxon_tree();
        let state = DatingState::new(&tree).unwrap();
        state.age(7);
    }

    #[test]
    fn new_state_defaults() {
        let tree = four_taxon_tree();
        let state = DatingState::new(&tree).unwrap();
        assert_eq!(state.node_count(), 7);
        assert!(state.ages().iter().all(|&a| a == 0.0));
        assert!(!state.has_prior(1));
        assert_eq!(state.birth_rate, 1.0);
        assert_eq!(state.death_rate, 0.0);
    }

    #[test]
    fn rejects_non_binary_tree() {
        let mut tree = TimeTree::new();
        tree.add_child(0, Some("A".into()), None).unwrap();
        assert!(DatingState::new(&tree).is_err());
    }

    #[test]
    fn calibration_rules() {
        let tree = four_taxon_tree();
        let mut state = DatingState::new(&tree).unwrap();
        assert!(state.set_calibration(1, -3.0, -5.0).is_err());
        state.set_calibration(1, -5.0, -3.0).unwrap();
        assert_eq!(state.calibration(1), Some((-5.0, -3.0)));
        assert!(matches!(
            state.set_calibration(1, -6.0, -2.0),
            Err(TemporaError::InvalidCalibration(_))
        ));
        state.clear_calibrations();
        assert_eq!(state.calibration(1), None);
    }

    #[test]
    fn set_ages_checks_length() {
        let tree = four_taxon_tree();
        let mut state = DatingState::new(&tree).unwrap();
        assert!(state.set_ages(&[0.0; 3]).is_err());
        state.set_ages(&[-9.0, -3.0, -4.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(state.age(0), -9.0);
    }

    #[test]
    fn refresh_fills_derived_arrays() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        state.refresh(&tree, &DatingConfig::default());
        assert_eq!(state.order()[0], 0);
        assert_eq!(state.rank(0), 0);
        assert_eq!(state.rank(2), 1);
        assert_eq!(state.rank(1), 2);
        assert_eq!(state.n_tips_below(0), 4);
        assert_eq!(state.n_tips_below(1), 2);
        assert_eq!(state.n_time_slices(), 1);
    }

    #[test]
    fn refresh_serial_floors_and_survival() {
        let tree = serial_tree();
        let mut state = serial_state(&tree);
        state.refresh(&tree, &DatingConfig::default());
        assert_eq!(state.floor(2), -12.0);
        assert_eq!(state.survival(2), -5.0);
        assert_eq!(state.floor(0), -12.0);
        assert_eq!(state.survival(0), 0.0);
    }
}
