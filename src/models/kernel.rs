//! Scattering-intensity kernels.
//!
//! The pipeline treats the kernel as an opaque deterministic function of the
//! resolved parameter values and `q`. [`GuinierPorodEllipsoid`] is the default
//! implementation: a Guinier–Porod matrix term plus an orientation-averaged,
//! log-normally polydisperse ellipsoid term,
//!
//! ```text
//! I(q) = scale * (I_gp(q) + I_ell(q)) + background
//! I_ell(q) = φ * 1e-4 * Δρ^2 * Σ w V^2 <F^2> / Σ w V
//! ```
//!
//! with SLDs in `1e-6 / Å^2`, radii in Å, and intensities in `1/cm`.

use serde::{Deserialize, Serialize};

use crate::math::{
    ellipsoid_effective_radius, ellipsoid_volume, gauss_legendre, guinier_porod, lognormal_nodes,
    sphere_amplitude,
};

/// Number of Gauss–Legendre nodes for the orientation average.
const ORIENTATION_NODES: usize = 32;

/// Log-normal size distribution settings for one radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Polydispersity {
    pub width: f64,
    pub points: usize,
    pub nsigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuinierPorodParams {
    pub scale: f64,
    pub rg: f64,
    pub s: f64,
    pub porod_exp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidParams {
    /// Volume fraction.
    pub scale: f64,
    pub sld: f64,
    pub sld_solvent: f64,
    pub radius_polar: f64,
    pub radius_equatorial: f64,
    pub polar_pd: Polydispersity,
    pub equatorial_pd: Polydispersity,
}

/// Parameter values resolved for one kernel evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub scale: f64,
    pub background: f64,
    pub matrix: GuinierPorodParams,
    pub particles: EllipsoidParams,
}

/// Deterministic forward model `I(q; params)`.
pub trait ScatteringKernel: Send + Sync {
    fn name(&self) -> &str;

    /// Intensity at every `q`; the output has the same length as `q`.
    fn intensity(&self, params: &KernelParams, q: &[f64]) -> Vec<f64>;
}

/// Guinier–Porod matrix + polydisperse ellipsoid particles.
#[derive(Debug, Clone)]
pub struct GuinierPorodEllipsoid {
    orientation: Vec<(f64, f64)>,
}

impl GuinierPorodEllipsoid {
    pub fn new() -> Self {
        Self {
            orientation: gauss_legendre(ORIENTATION_NODES, 0.0, 1.0),
        }
    }

    fn ellipsoid_intensity(&self, p: &EllipsoidParams, q: &[f64]) -> Vec<f64> {
        let polar = lognormal_nodes(
            p.radius_polar,
            p.polar_pd.width,
            p.polar_pd.points,
            p.polar_pd.nsigma,
        );
        let equatorial = lognormal_nodes(
            p.radius_equatorial,
            p.equatorial_pd.width,
            p.equatorial_pd.points,
            p.equatorial_pd.nsigma,
        );

        // (rp, re, weight, volume) for every size combination.
        let mut combos = Vec::with_capacity(polar.len() * equatorial.len());
        let mut volume_norm = 0.0;
        for &(rp, wp) in &polar {
            for &(re, we) in &equatorial {
                let w = wp * we;
                let v = ellipsoid_volume(rp, re);
                volume_norm += w * v;
                combos.push((rp, re, w, v));
            }
        }
        if !(volume_norm.is_finite() && volume_norm > 0.0) {
            return vec![0.0; q.len()];
        }

        let contrast = p.sld - p.sld_solvent;
        let prefactor = p.scale * 1e-4 * contrast * contrast / volume_norm;

        q.iter()
            .map(|&qi| {
                let mut total = 0.0;
                for &(rp, re, w, v) in &combos {
                    let mut avg = 0.0;
                    for &(mu, wmu) in &self.orientation {
                        let f = sphere_amplitude(qi * ellipsoid_effective_radius(rp, re, mu));
                        avg += wmu * f * f;
                    }
                    total += w * v * v * avg;
                }
                prefactor * total
            })
            .collect()
    }
}

impl Default for GuinierPorodEllipsoid {
    fn default() -> Self {
        Self::new()
    }
}

impl ScatteringKernel for GuinierPorodEllipsoid {
    fn name(&self) -> &str {
        "guinier_porod+ellipsoid"
    }

    fn intensity(&self, params: &KernelParams, q: &[f64]) -> Vec<f64> {
        let m = &params.matrix;
        let particles = self.ellipsoid_intensity(&params.particles, q);
        q.iter()
            .zip(particles)
            .map(|(&qi, ip)| {
                let im = guinier_porod(qi, m.scale, m.rg, m.s, m.porod_exp);
                params.scale * (im + ip) + params.background
            })
            .collect()
    }
}
