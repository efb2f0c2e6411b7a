//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - sample keys, instruments, and measured curves (`MeasuredCurve`)
//! - upstream estimates and composition measurements
//! - run configuration and fixed model constants (`RunConfig`, `ModelConstants`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
