//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - loaded once and shared read-only across worker threads
//! - embedded in persisted sampler states
//! - printed in run reports

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Integer key identifying one physical sample (`CMW401` -> `401`).
pub type SampleId = u32;

/// The two measurement modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    /// Pinhole SANS: fine resolution, high-Q range.
    Sans,
    /// Slit-smeared USANS: coarse resolution, low-Q range.
    Usans,
}

impl Instrument {
    pub const ALL: [Instrument; 2] = [Instrument::Sans, Instrument::Usans];

    pub fn label(self) -> &'static str {
        match self {
            Instrument::Sans => "SANS",
            Instrument::Usans => "USANS",
        }
    }

    /// Classify a curve source by the instrument tag embedded in its name.
    ///
    /// `USANS` is checked first because it contains `SANS`.
    pub fn from_source_name(name: &str) -> Option<Self> {
        if name.contains("USANS") {
            Some(Instrument::Usans)
        } else if name.contains("SANS") {
            Some(Instrument::Sans)
        } else {
            None
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One measured point: momentum transfer, intensity, intensity uncertainty, resolution width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub q: f64,
    pub intensity: f64,
    pub sigma: f64,
    pub dq: f64,
}

/// A measured scattering curve, ordered by `q`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredCurve {
    points: Vec<CurvePoint>,
}

impl MeasuredCurve {
    /// Validate and wrap a list of points.
    ///
    /// Points must be finite, have positive `q` and uncertainty, and be non-decreasing in `q`.
    /// The order is kept as given.
    pub fn new(points: Vec<CurvePoint>) -> Result<Self, FitError> {
        if points.is_empty() {
            return Err(FitError::InvalidCurve("curve has no points".to_string()));
        }
        for (i, p) in points.iter().enumerate() {
            if !(p.q.is_finite() && p.intensity.is_finite() && p.dq.is_finite()) {
                return Err(FitError::InvalidCurve(format!("non-finite value at point {i}")));
            }
            if p.q <= 0.0 {
                return Err(FitError::InvalidCurve(format!(
                    "q must be positive at point {i} (got {})",
                    p.q
                )));
            }
            if !(p.sigma.is_finite() && p.sigma > 0.0) {
                return Err(FitError::InvalidCurve(format!(
                    "uncertainty must be positive at point {i} (got {})",
                    p.sigma
                )));
            }
        }
        if points.windows(2).any(|w| w[1].q < w[0].q) {
            return Err(FitError::InvalidCurve("points are not ordered by q".to_string()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn q(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.q).collect()
    }

    /// Copy of this curve with every resolution width forced to zero.
    pub fn without_resolution(&self) -> Self {
        let points = self
            .points
            .iter()
            .map(|p| CurvePoint { dq: 0.0, ..*p })
            .collect();
        Self { points }
    }
}

/// A point estimate with its two-sided 95% interval, as reported by an upstream fit.
///
/// The interval is stored exactly as produced; `p95[0] <= p95[1]` is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub best: f64,
    pub p95: [f64; 2],
}

impl Estimate {
    pub fn new(best: f64, lower: f64, upper: f64) -> Self {
        Self {
            best,
            p95: [lower, upper],
        }
    }

    pub fn lower(&self) -> f64 {
        self.p95[0]
    }

    pub fn upper(&self) -> f64 {
        self.p95[1]
    }

    pub fn is_inverted(&self) -> bool {
        self.p95[1] < self.p95[0]
    }

    /// Multiply the point estimate and each bound independently by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            best: self.best * factor,
            p95: [self.p95[0] * factor, self.p95[1] * factor],
        }
    }
}

/// Measured dispersed-phase volume fraction (already converted from percent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub fraction: f64,
    pub fraction_sd: f64,
}

impl Composition {
    pub fn from_percent(value: f64, sd: f64) -> Self {
        Self {
            fraction: value / 100.0,
            fraction_sd: sd / 100.0,
        }
    }
}

/// Constituent materials of one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMaterials {
    /// Dispersed-phase (conjugated polymer) material name.
    pub particle: String,
    /// Matrix (commodity polymer) material name.
    pub matrix: String,
}

/// Per-sample material declarations, keyed by sample id.
pub type SampleInfo = BTreeMap<SampleId, SampleMaterials>;

#[cfg(test)]
mod tests {
    use super::*;

    fn point(q: f64) -> CurvePoint {
        CurvePoint {
            q,
            intensity: 1.0,
            sigma: 0.1,
            dq: 0.01,
        }
    }

    #[test]
    fn instrument_tag_prefers_usans() {
        assert_eq!(
            Instrument::from_source_name("CMW401_USANS_smeared.txt"),
            Some(Instrument::Usans)
        );
        assert_eq!(
            Instrument::from_source_name("CMW401_SANS_merged.txt"),
            Some(Instrument::Sans)
        );
        assert_eq!(Instrument::from_source_name("CMW401_notes.txt"), None);
    }

    #[test]
    fn without_resolution_only_touches_dq() {
        let curve = MeasuredCurve::new(vec![point(0.01), point(0.02), point(0.05)]).unwrap();
        let stripped = curve.without_resolution();
        assert_eq!(stripped.points().len(), curve.points().len());
        for (a, b) in curve.points().iter().zip(stripped.points()) {
            assert_eq!(a.q, b.q);
            assert_eq!(a.intensity, b.intensity);
            assert_eq!(a.sigma, b.sigma);
            assert_eq!(b.dq, 0.0);
        }
    }

    #[test]
    fn curve_rejects_unordered_points() {
        let err = MeasuredCurve::new(vec![point(0.02), point(0.01)]).unwrap_err();
        assert!(matches!(err, FitError::InvalidCurve(_)));
    }

    #[test]
    fn curve_rejects_non_positive_q() {
        for q in [0.0, -0.01] {
            let err = MeasuredCurve::new(vec![point(q), point(0.02)]).unwrap_err();
            assert!(matches!(err, FitError::InvalidCurve(ref m) if m.contains("q must be positive")));
        }
    }

    #[test]
    fn curve_rejects_zero_sigma() {
        let mut p = point(0.01);
        p.sigma = 0.0;
        assert!(MeasuredCurve::new(vec![p]).is_err());
    }

    #[test]
    fn composition_converts_percent() {
        let c = Composition::from_percent(0.5, 0.05);
        assert!((c.fraction - 0.005).abs() < 1e-15);
        assert!((c.fraction_sd - 0.0005).abs() < 1e-15);
    }
}
