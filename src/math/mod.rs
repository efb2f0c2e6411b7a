//! Mathematical utilities: scattering basis functions and quadrature.

pub mod basis;
pub mod quadrature;

pub use basis::*;
pub use quadrature::*;
