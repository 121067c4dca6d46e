//! Node-age dating for rooted binary phylogenies.
//!
//! Ages are signed times: the present is 0 and the past is negative, so the
//! root carries the most negative age.
//!
//! - **Calibrations**: [`Calibration`] intervals on clade MRCAs, propagated
//!   to every node by [`set_all_node_priors`]
//! - **Time slices**: detection of serially sampled tips
//! - **Age priors**: uniform, Yule and birth-death densities behind
//!   [`log_prior_density`]
//! - **Initial ages**: least-squares fit to branch lengths
//! - **Random trees**: [`generate_constrained_random_tree`]
//! - **Validation**: ordering, bound and calibration checks

pub mod bounds;
pub mod calibration;
pub mod config;
pub mod density;
pub mod least_squares;
pub mod ordering;
pub mod random_tree;
pub mod slices;
pub mod state;
pub mod tree;
pub mod validate;

#[cfg(test)]
mod testing;

pub use bounds::set_all_node_priors;
pub use calibration::{apply_calibrations, Calibration};
pub use config::DatingConfig;
pub use density::{log_prior_density, AgePrior};
pub use least_squares::{apply_least_squares, least_squares_ages};
pub use random_tree::{generate_constrained_random_tree, RandomTree, TipSample};
pub use state::DatingState;
pub use tree::{NodeId, TimeTree};
pub use validate::{check_node_height_ordering, find_ordering_violation, OrderingViolation};
