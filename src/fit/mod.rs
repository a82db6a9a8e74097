//! Relaxation fitting orchestration.
//!
//! Responsibilities:
//!
//! - build one residual per observation from the saturation-recovery model
//! - pick a starting point by a log-grid scan over `T1` (`grid`)
//! - run the bounded least-squares solver per dataset
//! - fan independent datasets out over worker threads (`batch`)

pub mod batch;
pub mod grid;
pub mod relaxation;

pub use batch::*;
pub use grid::estimate_initial_guess;
pub use relaxation::*;
