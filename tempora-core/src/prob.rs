//! Log-space density values.
//!
//! [`LogDensity`] stores `ln f(x)` for a node-age assignment. Prior models
//! routinely evaluate proposals that violate a calibration bound, so "this
//! assignment is impossible" is an ordinary value ([`LogDensity::unlikely`])
//! rather than an error. NaN never survives construction through
//! [`LogDensity::new`].

/// A log-density value: `ln f(x)`, or negative infinity when the assignment
/// has zero density. The inner value is only reachable through
/// [`LogDensity::new`] and the other constructors, so it is never NaN.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "f64", into = "f64"))]
pub struct LogDensity(f64);

impl LogDensity {
    /// Wrap a raw log-density, mapping `NaN` and `±∞` to [`LogDensity::unlikely`].
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value)
        } else {
            Self::unlikely()
        }
    }

    /// Zero density (`ln 0 = -∞`): the sampler must reject this proposal.
    pub const fn unlikely() -> Self {
        Self(f64::NEG_INFINITY)
    }

    /// Unit density: `ln 1 = 0`.
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// True if this value signals rejection.
    pub fn is_unlikely(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }

    /// The raw `f64` value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Add another log term (a product of densities). Any non-finite result
    /// collapses to unlikely.
    pub fn ln_mul(self, other: f64) -> Self {
        if self.is_unlikely() {
            return self;
        }
        Self::new(self.0 + other)
    }
}

impl Default for LogDensity {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<f64> for LogDensity {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<LogDensity> for f64 {
    fn from(d: LogDensity) -> f64 {
        d.0
    }
}
