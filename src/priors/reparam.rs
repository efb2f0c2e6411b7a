//! Guinier–Porod -> power-law scale re-parameterization.
//!
//! The Guinier–Porod form switches from the Guinier regime to the Porod regime at
//!
//! ```text
//! q1 = (1 / rg) * sqrt((m - s) * (3 - s) / 2)
//! ```
//!
//! and continuity at `q1` ties the two scale factors together through
//!
//! ```text
//! factor = exp(-q1^2 rg^2 / (3 - s)) * q1^(m - s)
//! ```
//!
//! where `s` is the dimension variable and `m` the Porod exponent. Both
//! functions are pure: identical inputs give bit-identical outputs.

use crate::domain::Estimate;
use crate::error::PriorError;

/// Crossover momentum transfer between the Guinier and Porod regimes.
pub fn crossover_q(rg: f64, s: f64, porod_exp: f64) -> Result<f64, PriorError> {
    if s == 3.0 {
        return Err(PriorError::UndefinedShape);
    }
    let arg = (porod_exp - s) * (3.0 - s) / 2.0;
    if !(rg.is_finite() && rg > 0.0 && arg.is_finite() && arg >= 0.0) {
        return Err(PriorError::UndefinedCrossover { rg, s, porod_exp });
    }
    Ok(arg.sqrt() / rg)
}

/// Multiplicative factor converting a Guinier–Porod scale into a power-law scale.
pub fn scale_factor(q1: f64, rg: f64, s: f64, porod_exp: f64) -> Result<f64, PriorError> {
    if s == 3.0 {
        return Err(PriorError::UndefinedShape);
    }
    let factor = (-1.0 * q1 * q1 * rg * rg / (3.0 - s)).exp() * q1.powf(porod_exp - s);
    if !(factor.is_finite() && factor > 0.0) {
        return Err(PriorError::NonFiniteFactor { factor });
    }
    Ok(factor)
}

/// Apply the re-parameterization to one sample's scale estimate.
///
/// The factor multiplies the point estimate and each interval bound
/// independently; the resulting bounds are returned in the same positions even
/// if that leaves them inverted.
pub fn adjust_scale(scale: &Estimate, rg: f64, s: f64, porod_exp: f64) -> Result<Estimate, PriorError> {
    let q1 = crossover_q(rg, s, porod_exp)?;
    let factor = scale_factor(q1, rg, s, porod_exp)?;
    Ok(scale.scaled(factor))
}
