//! `voxel-relax` library crate.
//!
//! Two independent pipelines over MR-style voxel data:
//!
//! - intensity scaling: segment a volume, accumulate foreground statistics in
//!   one streaming pass, and derive a linear remap onto a target range
//! - relaxation fitting: per-voxel bounded nonlinear least squares of a
//!   saturation-recovery signal model
//!
//! The binary (`vrx`) is a thin wrapper around this library so that core logic
//! is testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod scaling;
pub mod segment;
