//! Pipeline 1: foreground statistics and the intensity remap derived from them.

pub mod foreground;
pub mod remap;

pub use foreground::*;
pub use remap::*;
