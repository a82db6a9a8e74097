//! Numerical building blocks: streaming statistics and a bounded LM solver.

pub mod lm;
pub mod welford;

pub use lm::*;
pub use welford::*;
