//! Instrument resolution applied to model predictions.
//!
//! Slit smearing (USANS) averages the unsmeared intensity along the slit:
//!
//! ```text
//! I_s(q) = (1/Δ) ∫_0^Δ I(sqrt(q^2 + u^2)) du
//! ```
//!
//! Substituting `u = Δ t^2` moves quadrature points toward `u = 0`, where the
//! integrand changes fastest:
//!
//! ```text
//! I_s(q) = ∫_0^1 2t I(sqrt(q^2 + Δ^2 t^4)) dt
//! ```
//!
//! The integral is evaluated with a midpoint rule whose weights sum to one,
//! so constant intensities pass through unchanged.

use serde::{Deserialize, Serialize};

/// Number of quadrature nodes along the slit.
const SLIT_NODES: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resolution {
    /// Point resolution: the model is compared at the measured `q` directly.
    None,
    /// Slit smearing with slit length `width` (1/Å).
    Slit { width: f64 },
}

impl Resolution {
    /// Evaluate `intensity` through this resolution at the measured `q` values.
    ///
    /// `intensity` is called once with every `q` it needs.
    pub fn apply(&self, q: &[f64], intensity: impl Fn(&[f64]) -> Vec<f64>) -> Vec<f64> {
        match *self {
            Resolution::None => intensity(q),
            Resolution::Slit { width } => {
                let nodes = slit_nodes();
                let mut q_calc = Vec::with_capacity(q.len() * nodes.len());
                for &qi in q {
                    for &(t, _) in &nodes {
                        let u = width * t * t;
                        q_calc.push((qi * qi + u * u).sqrt());
                    }
                }
                let unsmeared = intensity(&q_calc);
                unsmeared
                    .chunks(nodes.len())
                    .map(|chunk| chunk.iter().zip(&nodes).map(|(i, (_, w))| i * w).sum::<f64>())
                    .collect()
            }
        }
    }
}

fn slit_nodes() -> Vec<(f64, f64)> {
    let n = SLIT_NODES as f64;
    (0..SLIT_NODES)
        .map(|k| {
            let t = (k as f64 + 0.5) / n;
            (t, 2.0 * t / n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_resolution_is_identity() {
        let q = [0.001, 0.01, 0.1];
        let out = Resolution::None.apply(&q, |qs| qs.iter().map(|x| x * 2.0).collect());
        assert_eq!(out, vec![0.002, 0.02, 0.2]);
    }

    #[test]
    fn slit_preserves_constants() {
        let q = [1e-5, 1e-4, 1e-3];
        let out = Resolution::Slit { width: 0.117 }.apply(&q, |qs| vec![3.5; qs.len()]);
        for v in out {
            assert!((v - 3.5).abs() < 1e-12);
        }
    }

    #[test]
    fn slit_smearing_lowers_decaying_intensity() {
        let q = [1e-4, 1e-3];
        let power_law = |qs: &[f64]| qs.iter().map(|x| x.powi(-4)).collect::<Vec<_>>();
        let smeared = Resolution::Slit { width: 0.117 }.apply(&q, power_law);
        let point = Resolution::None.apply(&q, power_law);
        for (s, p) in smeared.iter().zip(&point) {
            assert!(s < p);
            assert!(*s > 0.0);
        }
    }
}
