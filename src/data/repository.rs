//! Keyed, read-only lookup tables built once before dispatch.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Composition, Instrument, MeasuredCurve, SampleId};

/// Keyed access to measured curves.
pub trait CurveSource {
    fn curve(&self, sample: SampleId, instrument: Instrument) -> Option<&MeasuredCurve>;
}

/// In-memory curve store keyed by `(sample, instrument)`.
#[derive(Debug, Clone, Default)]
pub struct CurveRepository {
    curves: BTreeMap<(SampleId, Instrument), MeasuredCurve>,
}

impl CurveRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a curve, returning the one it replaces (if any).
    pub fn insert(
        &mut self,
        sample: SampleId,
        instrument: Instrument,
        curve: MeasuredCurve,
    ) -> Option<MeasuredCurve> {
        self.curves.insert((sample, instrument), curve)
    }

    pub fn has_both(&self, sample: SampleId) -> bool {
        Instrument::ALL
            .iter()
            .all(|&i| self.curves.contains_key(&(sample, i)))
    }

    /// Samples with a curve from every instrument.
    pub fn complete_samples(&self) -> BTreeSet<SampleId> {
        self.curves
            .keys()
            .map(|&(sample, _)| sample)
            .filter(|&sample| self.has_both(sample))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

impl CurveSource for CurveRepository {
    fn curve(&self, sample: SampleId, instrument: Instrument) -> Option<&MeasuredCurve> {
        self.curves.get(&(sample, instrument))
    }
}

/// Measured composition per sample.
pub type CompositionTable = BTreeMap<SampleId, Composition>;

/// Scattering-length densities (`1e-6 / Å^2`) of the known materials.
const BUILTIN_SLD: [(&str, f64); 6] = [
    ("RRe-P3HT", 0.676),
    ("RRa-P3HT", 0.676),
    ("P3DDT", 0.316),
    ("PQT-12", 0.676),
    ("Polystyrene-D8", 6.464),
    ("Polystyrene-H8", 1.426),
];

/// Material name -> scattering-length density.
#[derive(Debug, Clone)]
pub struct MaterialTable {
    sld: BTreeMap<String, f64>,
}

impl MaterialTable {
    pub fn empty() -> Self {
        Self {
            sld: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, sld: f64) -> Self {
        self.sld.insert(name.into(), sld);
        self
    }

    pub fn sld(&self, material: &str) -> Option<f64> {
        self.sld.get(material).copied()
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        BUILTIN_SLD
            .iter()
            .fold(Self::empty(), |table, &(name, sld)| table.with(name, sld))
    }
}
