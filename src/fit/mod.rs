//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - posterior sampling behind the `PosteriorSampler` seam (`sampler`)
//! - one sample's build / sample / persist cycle (`job`)
//! - fan-out across the worker pool with per-job isolation (`executor`)

pub mod executor;
pub mod job;
pub mod sampler;

pub use executor::*;
pub use job::*;
pub use sampler::*;
