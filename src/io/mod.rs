//! Input/output helpers.
//!
//! - curve and upstream-table loaders (`ingest`)
//! - persisted sampler states (`state`)

pub mod ingest;
pub mod state;

pub use ingest::*;
pub use state::*;
