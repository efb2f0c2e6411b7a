//! Input data held for the batch.
//!
//! - keyed curve store, composition and material tables (`repository`)
//! - the immutable per-batch input bundle (`batch`)
//! - eligibility filtering and the dispatch plan (`eligibility`)

pub mod batch;
pub mod eligibility;
pub mod repository;

pub use batch::*;
pub use eligibility::*;
pub use repository::*;
