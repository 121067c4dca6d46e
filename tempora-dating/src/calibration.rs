//! Node-age calibrations and their installation on a tree.

use tempora_core::{Result, TemporaError};
use tracing::debug;

use crate::bounds::set_all_node_priors;
use crate::config::DatingConfig;
use crate::state::DatingState;
use crate::tree::{NodeId, TimeTree};

/// Age interval on the MRCA of a set of taxa.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    pub target_taxa: Vec<String>,
    /// Oldest allowed age (most negative).
    pub lower: f64,
    /// Youngest allowed age.
    pub upper: f64,
    /// Secondary calibrations are checked but do not constrain propagation.
    pub is_primary: bool,
}

impl Calibration {
    /// A primary calibration `[lower, upper]` on the MRCA of `taxa`.
    ///
    /// `lower` may be `-inf` for a calibration with only a minimum age.
    ///
    /// # Errors
    ///
    /// [`TemporaError::InvalidCalibration`] when `taxa` is empty or the
    /// bounds do not satisfy `lower <= upper <= 0`.
    pub fn new<S: Into<String>>(
        taxa: impl IntoIterator<Item = S>,
        lower: f64,
        upper: f64,
    ) -> Result<Self> {
        let target_taxa: Vec<String> = taxa.into_iter().map(Into::into).collect();
        if target_taxa.is_empty() {
            return Err(TemporaError::InvalidCalibration(
                "calibration has no target taxa".into(),
            ));
        }
        if lower.is_nan() || !upper.is_finite() || lower > upper || upper > 0.0 {
            return Err(TemporaError::InvalidCalibration(format!(
                "bounds [{}, {}] violate lower <= upper <= 0",
                lower, upper
            )));
        }
        Ok(Self {
            target_taxa,
            lower,
            upper,
            is_primary: true,
        })
    }

    /// Mark as secondary.
    pub fn secondary(mut self) -> Self {
        self.is_primary = false;
        self
    }

    /// True if `age` lies within `[lower, upper]`.
    pub fn contains(&self, age: f64) -> bool {
        age >= self.lower && age <= self.upper
    }

    /// Tip ids of the target taxa.
    pub fn tip_ids(&self, tree: &TimeTree) -> Result<Vec<NodeId>> {
        self.target_taxa
            .iter()
            .map(|name| {
                tree.find_leaf(name)
                    .ok_or_else(|| TemporaError::UnknownTaxon(name.clone()))
            })
            .collect()
    }

    /// The internal node this calibration constrains: the MRCA of its taxa.
    ///
    /// # Errors
    ///
    /// [`TemporaError::UnknownTaxon`] for a name that is not a tip, and
    /// [`TemporaError::InvalidCalibration`] when the MRCA is a tip.
    pub fn resolve(&self, tree: &TimeTree) -> Result<NodeId> {
        let tips = self.tip_ids(tree)?;
        let node = tree.mrca_of(&tips)?;
        if tree.is_leaf(node) {
            return Err(TemporaError::InvalidCalibration(format!(
                "calibration on {:?} resolves to a single tip",
                self.target_taxa
            )));
        }
        Ok(node)
    }
}

/// Replace the calibrations stored in `state` with `calibrations` and
/// propagate them.
///
/// Every calibration is resolved, so unknown taxa are reported even for
/// secondary ones; only primary calibrations set raw bounds.
pub fn apply_calibrations(
    tree: &TimeTree,
    state: &mut DatingState,
    calibrations: &[Calibration],
    config: &DatingConfig,
) -> Result<()> {
    state.clear_calibrations();
    for cal in calibrations {
        let node = cal.resolve(tree)?;
        if cal.is_primary {
            state.set_calibration(node, cal.lower, cal.upper)?;
            debug!(node, lower = cal.lower, upper = cal.upper, "calibrated node");
        }
    }
    set_all_node_priors(tree, state, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{four_taxon_state, four_taxon_tree};

    #[test]
    fn validates_bounds() {
        assert!(Calibration::new(["A", "B"], -5.0, -3.0).is_ok());
        assert!(Calibration::new(["A", "B"], -3.0, -5.0).is_err());
        assert!(Calibration::new(["A", "B"], -3.0, 1.0).is_err());
        assert!(Calibration::new(["A", "B"], f64::NAN, -1.0).is_err());
        assert!(Calibration::new(Vec::<String>::new(), -3.0, -1.0).is_err());
        let open = Calibration::new(["A", "B"], f64::NEG_INFINITY, -1.0).unwrap();
        assert!(open.contains(-1e9));
    }

    #[test]
    fn resolves_to_mrca() {
        let tree = four_taxon_tree();
        let cal = Calibration::new(["A", "B"], -5.0, -3.0).unwrap();
        assert_eq!(cal.resolve(&tree).unwrap(), 1);
        let cal = Calibration::new(["B", "C"], -12.0, -8.0).unwrap();
        assert_eq!(cal.resolve(&tree).unwrap(), 0);
    }

    #[test]
    fn unknown_taxon() {
        let tree = four_taxon_tree();
        let cal = Calibration::new(["A", "Z"], -5.0, -3.0).unwrap();
        assert!(matches!(cal.resolve(&tree), Err(TemporaError::UnknownTaxon(name)) if name == "Z"));
    }

    #[test]
    fn single_tip_rejected() {
        let tree = four_taxon_tree();
        let cal = Calibration::new(["C"], -5.0, -3.0).unwrap();
        assert!(matches!(
            cal.resolve(&tree),
            Err(TemporaError::InvalidCalibration(_))
        ));
    }

    #[test]
    fn apply_sets_primary_only() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        let cals = vec![
            Calibration::new(["A", "B"], -5.0, -3.0).unwrap(),
            Calibration::new(["C", "D"], -7.0, -5.0).unwrap().secondary(),
        ];
        apply_calibrations(&tree, &mut state, &cals, &DatingConfig::default()).unwrap();
        assert_eq!(state.calibration(1), Some((-5.0, -3.0)));
        assert_eq!(state.calibration(2), None);
        assert_eq!(state.prior_min(0), -10.0);
    }

    #[test]
    fn apply_is_repeatable() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        let cals = vec![Calibration::new(["A", "B"], -5.0, -3.0).unwrap()];
        let config = DatingConfig::default();
        apply_calibrations(&tree, &mut state, &cals, &config).unwrap();
        apply_calibrations(&tree, &mut state, &cals, &config).unwrap();
        assert_eq!(state.prior_max(0), -3.0);
    }

    #[test]
    fn duplicate_node_rejected() {
        let tree = four_taxon_tree();
        let mut state = four_taxon_state(&tree);
        let cals = vec![
            Calibration::new(["A", "B"], -5.0, -3.0).unwrap(),
            Calibration::new(["B", "A"], -6.0, -2.0).unwrap(),
        ];
        assert!(matches!(
            apply_calibrations(&tree, &mut state, &cals, &DatingConfig::default()),
            Err(TemporaError::InvalidCalibration(_))
        ));
    }
}
