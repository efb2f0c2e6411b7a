//! Stable basis functions for the composite scattering model.
//!
//! - `sphere_amplitude(x) = 3 (sin x - x cos x) / x^3`
//! - `guinier_porod(q)`: Guinier regime below the crossover `q1`, Porod power law above
//!
//! Numerical notes:
//! - For small `x`, `sin x - x cos x` suffers from catastrophic cancellation.
//!   We switch to the Taylor series `1 - x^2/10 + x^4/280` below `SMALL_X`.
//! - The Guinier–Porod form is undefined for `s >= 3`; we return NaN there and
//!   let the likelihood reject the point.

use crate::priors::{crossover_q, scale_factor};

/// Threshold below which the sphere amplitude uses its series expansion.
const SMALL_X: f64 = 1e-3;

/// Normalized amplitude of a homogeneous sphere, `F(0) = 1`.
pub fn sphere_amplitude(x: f64) -> f64 {
    let x = x.abs();
    if x < SMALL_X {
        let x2 = x * x;
        return 1.0 - x2 / 10.0 + x2 * x2 / 280.0;
    }
    3.0 * (x.sin() - x * x.cos()) / (x * x * x)
}

/// Volume of an ellipsoid of revolution with polar radius `rp` and equatorial radius `re`.
pub fn ellipsoid_volume(rp: f64, re: f64) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * rp * re * re
}

/// Effective radius seen at orientation cosine `mu` (angle between q and the polar axis).
pub fn ellipsoid_effective_radius(rp: f64, re: f64, mu: f64) -> f64 {
    (re * re * (1.0 - mu * mu) + rp * rp * mu * mu).sqrt()
}

/// Guinier–Porod intensity (unit-free, before background).
pub fn guinier_porod(q: f64, scale: f64, rg: f64, s: f64, porod_exp: f64) -> f64 {
    let Ok(q1) = crossover_q(rg, s, porod_exp) else {
        return f64::NAN;
    };
    if q <= q1 {
        scale / q.powf(s) * (-q * q * rg * rg / (3.0 - s)).exp()
    } else {
        match scale_factor(q1, rg, s, porod_exp) {
            Ok(factor) => scale / q.powf(porod_exp) * factor,
            Err(_) => f64::NAN,
        }
    }
}

/// Discretized log-normal size distribution around `center`.
///
/// Nodes are evenly spaced in `ln r` over `±nsigma * width`, weighted by the
/// Gaussian density in log space and normalized to sum to one. A zero width or
/// a single point collapses to the center.
pub fn lognormal_nodes(center: f64, width: f64, points: usize, nsigma: f64) -> Vec<(f64, f64)> {
    if points <= 1 || width <= 0.0 || nsigma <= 0.0 {
        return vec![(center, 1.0)];
    }
    let span = nsigma * width;
    let step = 2.0 * span / (points as f64 - 1.0);
    let mut nodes: Vec<(f64, f64)> = (0..points)
        .map(|i| {
            let u = -span + step * i as f64;
            let w = (-0.5 * (u / width).powi(2)).exp();
            (center * u.exp(), w)
        })
        .collect();
    let total: f64 = nodes.iter().map(|(_, w)| w).sum();
    for node in &mut nodes {
        node.1 /= total;
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_amplitude_limits() {
        assert!((sphere_amplitude(0.0) - 1.0).abs() < 1e-15);
        // Series and closed form agree just above the switch point.
        let x = 2.0 * SMALL_X;
        let closed = 3.0 * (x.sin() - x * x.cos()) / (x * x * x);
        let series = 1.0 - x * x / 10.0;
        assert!((closed - series).abs() < 1e-6);
        // First zero of the amplitude is at tan x = x, x ≈ 4.4934.
        assert!(sphere_amplitude(4.493_409_457_909_064).abs() < 1e-12);
    }

    #[test]
    fn guinier_porod_is_continuous_at_crossover() {
        let (scale, rg, s, m) = (2.0, 120.0, 1.5, 3.8);
        let q1 = crossover_q(rg, s, m).unwrap();
        let below = guinier_porod(q1 * (1.0 - 1e-9), scale, rg, s, m);
        let above = guinier_porod(q1 * (1.0 + 1e-9), scale, rg, s, m);
        assert!(((below - above) / below).abs() < 1e-6);
    }

    #[test]
    fn guinier_porod_undefined_for_shape_three() {
        assert!(guinier_porod(0.01, 1.0, 100.0, 3.0, 4.0).is_nan());
    }

    #[test]
    fn lognormal_nodes_are_normalized_and_centered() {
        let nodes = lognormal_nodes(1000.0, 0.5, 41, 8.0);
        assert_eq!(nodes.len(), 41);
        let total: f64 = nodes.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((nodes[20].0 - 1000.0).abs() < 1e-9);
        assert!(nodes.windows(2).all(|w| w[1].0 > w[0].0));
    }

    #[test]
    fn monodisperse_collapses_to_center() {
        assert_eq!(lognormal_nodes(500.0, 0.5, 1, 8.0), vec![(500.0, 1.0)]);
        assert_eq!(lognormal_nodes(500.0, 0.0, 200, 8.0), vec![(500.0, 1.0)]);
    }
}
