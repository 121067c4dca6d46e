//! Tunable constants of the dating engine.

use tempora_core::{Result, TemporaError};

/// Dating engine configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DatingConfig {
    /// When the root carries no calibration, its lower bound is this
    /// multiple of the oldest calibrated lower bound. Also bounds the root
    /// age drawn by the random-tree generator.
    pub root_bound_multiplier: f64,
    /// Hard cap on constrained random-tree attempts.
    pub max_tree_attempts: usize,
    /// Two tip ages closer than this belong to the same time slice.
    pub slice_tolerance: f64,
    /// Birth and death rates closer than this use the `λ = μ` closed form.
    pub rate_tolerance: f64,
    /// Inter-event intervals shorter than this are skipped by the Yule joint density.
    pub min_interval: f64,
}

impl Default for DatingConfig {
    fn default() -> Self {
        Self {
            root_bound_multiplier: 2.0,
            max_tree_attempts: 1000,
            slice_tolerance: 1e-6,
            rate_tolerance: 1e-6,
            min_interval: 1e-10,
        }
    }
}

impl DatingConfig {
    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.root_bound_multiplier >= 1.0) {
            return Err(TemporaError::InvalidInput(format!(
                "root_bound_multiplier must be >= 1, got {}",
                self.root_bound_multiplier
            )));
        }
        if self.max_tree_attempts == 0 {
            return Err(TemporaError::InvalidInput(
                "max_tree_attempts must be > 0".into(),
            ));
        }
        for (name, v) in [
            ("slice_tolerance", self.slice_tolerance),
            ("rate_tolerance", self.rate_tolerance),
            ("min_interval", self.min_interval),
        ] {
            if !(v >= 0.0) || !v.is_finite() {
                return Err(TemporaError::InvalidInput(format!(
                    "{} must be a non-negative number, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}
