//! Data sources other than user files.

pub mod synthetic;

pub use synthetic::*;
