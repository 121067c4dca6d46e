//! Shared primitives for the tempora node-dating engine.
//!
//! `tempora-core` provides the foundation the dating crate builds on:
//!
//! - **Error types**: [`TemporaError`] and [`Result`] for structured error handling
//! - **Log densities**: [`LogDensity`], a log-space value with an explicit
//!   "unlikely" state used as a rejection signal
//! - **Numerics**: log-gamma, log-factorial, tolerance comparison and a
//!   general square-matrix inverse

pub mod error;
pub mod numeric;
pub mod prob;

pub use error::{Result, TemporaError};
pub use prob::LogDensity;
