//! Input/output helpers.
//!
//! - NIfTI volume read/write (`volume`)
//! - observation CSV ingest + validation (`observations`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod observations;
pub mod volume;

pub use export::*;
pub use observations::*;
pub use volume::*;
