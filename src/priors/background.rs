//! Background estimates with explicit source precedence.
//!
//! Several upstream analyses report a background level for the same sample.
//! Rather than letting file processing order decide, every table is registered
//! under a [`BackgroundSource`] and the highest-precedence source wins.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::{Estimate, SampleId};

/// Upstream background sources, in increasing order of precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundSource {
    /// Power-law + background fit of the matrix phase.
    PowerLawFit,
    /// Porod-analysis background refinement; overrides the power-law fit.
    PorodRefinement,
}

impl fmt::Display for BackgroundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundSource::PowerLawFit => f.write_str("power-law fit"),
            BackgroundSource::PorodRefinement => f.write_str("porod refinement"),
        }
    }
}

/// Layered background lookup.
#[derive(Debug, Clone, Default)]
pub struct BackgroundResolver {
    layers: BTreeMap<BackgroundSource, BTreeMap<SampleId, Estimate>>,
}

impl BackgroundResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the table for one source.
    pub fn with_layer(mut self, source: BackgroundSource, table: BTreeMap<SampleId, Estimate>) -> Self {
        self.layers.insert(source, table);
        self
    }

    /// Background for `sample` from the most specific source that defines it.
    pub fn resolve(&self, sample: SampleId) -> Option<(BackgroundSource, Estimate)> {
        self.layers
            .iter()
            .rev()
            .find_map(|(&source, table)| table.get(&sample).map(|&e| (source, e)))
    }

    pub fn contains(&self, sample: SampleId) -> bool {
        self.resolve(sample).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refinement_overrides_power_law() {
        let general = BTreeMap::from([(401, Estimate::new(0.002, 0.001, 0.003)), (402, Estimate::new(0.01, 0.0, 0.02))]);
        let refined = BTreeMap::from([(401, Estimate::new(0.0025, 0.002, 0.003))]);

        // Registration order must not matter.
        let a = BackgroundResolver::new()
            .with_layer(BackgroundSource::PorodRefinement, refined.clone())
            .with_layer(BackgroundSource::PowerLawFit, general.clone());
        let b = BackgroundResolver::new()
            .with_layer(BackgroundSource::PowerLawFit, general)
            .with_layer(BackgroundSource::PorodRefinement, refined);

        for resolver in [a, b] {
            let (source, est) = resolver.resolve(401).unwrap();
            assert_eq!(source, BackgroundSource::PorodRefinement);
            assert_eq!(est.best, 0.0025);

            let (source, est) = resolver.resolve(402).unwrap();
            assert_eq!(source, BackgroundSource::PowerLawFit);
            assert_eq!(est.best, 0.01);

            assert!(resolver.resolve(403).is_none());
        }
    }
}
