//! Prior derivation from upstream fit results.
//!
//! Responsibilities:
//!
//! - closed-form Guinier–Porod scale re-parameterization (`reparam`)
//! - population aggregates over samples with an rg estimate (`derive`)
//! - background lookup with explicit source precedence (`background`)

pub mod background;
pub mod derive;
pub mod reparam;

pub use background::*;
pub use derive::*;
pub use reparam::*;
