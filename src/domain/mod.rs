//! Domain types used throughout both pipelines.
//!
//! This module defines:
//!
//! - intensity-scaling values (`ForegroundStatistics`, `LinearRemap`)
//! - relaxation-fit values (`Observation`, `RelaxationParameters`, `RelaxationFit`)
//! - solver settings (`FitBounds`, `SolverOptions`)
//! - run configurations derived from CLI flags

pub mod types;

pub use types::*;
