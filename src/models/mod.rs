//! The composite scattering model and its parameters.
//!
//! - named parameters with bounds and soft priors (`params`)
//! - scattering kernels (`kernel`)
//! - instrument resolution (`resolution`)
//! - the joint two-instrument model for one sample (`joint`)

pub mod joint;
pub mod kernel;
pub mod params;
pub mod resolution;

pub use joint::*;
pub use kernel::*;
pub use params::*;
pub use resolution::*;
