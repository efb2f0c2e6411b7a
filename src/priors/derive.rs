//! Population-level priors derived from the upstream matrix-phase fits.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Estimate, SampleId};
use crate::error::{FitError, PriorError};
use crate::priors::reparam::adjust_scale;

/// Power-law fit of the matrix phase: one global Porod exponent, per-sample scales.
#[derive(Debug, Clone, PartialEq)]
pub struct PorodScaleTable {
    pub porod_exp: Estimate,
    pub scales: BTreeMap<SampleId, Estimate>,
}

/// Guinier–Porod fit of the matrix phase: one global shape `s`, per-sample rg and scales.
#[derive(Debug, Clone, PartialEq)]
pub struct GuinierPorodTable {
    pub s: Estimate,
    pub rgs: BTreeMap<SampleId, Estimate>,
    pub scales: BTreeMap<SampleId, Estimate>,
}

/// Which scale estimates feed the `avg_scale` aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScaleBasis {
    /// Upstream scales after the Guinier–Porod table overrides the power-law table.
    Merged,
    /// Re-parameterized (power-law form) scales.
    Adjusted,
}

/// Global priors shared by every sample's joint model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedPriors {
    pub avg_rg: f64,
    /// Min of the rg lower bounds.
    pub min_rg: f64,
    /// Max of the rg upper bounds.
    pub max_rg: f64,
    pub avg_scale: f64,
    /// Average of the scale lower bounds.
    pub min_scale: f64,
    /// Average of the scale upper bounds.
    pub max_scale: f64,
    pub s: f64,
    pub porod_exp: f64,
    pub scale_basis: ScaleBasis,
    /// Re-parameterized scale per sample with an rg estimate.
    pub adjusted_scales: BTreeMap<SampleId, Estimate>,
    /// Samples whose re-parameterized interval came out inverted.
    pub degenerate: Vec<SampleId>,
    /// Samples with an rg estimate but no scale estimate.
    pub missing_scale: Vec<SampleId>,
}

/// Merge the two scale tables; Guinier–Porod entries replace power-law entries.
pub fn merge_scales(
    porod: &PorodScaleTable,
    guinier: &GuinierPorodTable,
) -> BTreeMap<SampleId, Estimate> {
    let mut merged = porod.scales.clone();
    for (&sample, &estimate) in &guinier.scales {
        merged.insert(sample, estimate);
    }
    merged
}

/// Compute the global derived priors.
///
/// Only samples present in the rg table contribute to any aggregate. Sums are
/// taken in sample-id order, so the result does not depend on input order.
pub fn derive_priors(
    porod: &PorodScaleTable,
    guinier: &GuinierPorodTable,
    basis: ScaleBasis,
) -> Result<DerivedPriors, PriorError> {
    if guinier.rgs.is_empty() {
        return Err(PriorError::NoRadiusEstimates);
    }

    let s = guinier.s.best;
    let porod_exp = porod.porod_exp.best;
    let merged = merge_scales(porod, guinier);

    let mut adjusted_scales = BTreeMap::new();
    let mut degenerate = Vec::new();
    let mut missing_scale = Vec::new();

    for (&sample, rg) in &guinier.rgs {
        let Some(scale) = merged.get(&sample) else {
            warn!(sample, "rg estimate without a scale estimate; skipping re-parameterization");
            missing_scale.push(sample);
            continue;
        };
        let adjusted = adjust_scale(scale, rg.best, s, porod_exp)?;
        if adjusted.is_inverted() {
            let degeneracy = FitError::NumericalDegeneracy {
                sample,
                field: "adjusted scale",
                lo: adjusted.lower(),
                hi: adjusted.upper(),
            };
            warn!(reason = %degeneracy, "re-parameterized scale interval is inverted");
            degenerate.push(sample);
        }
        adjusted_scales.insert(sample, adjusted);
    }

    let rg_values: Vec<&Estimate> = guinier.rgs.values().collect();
    let avg_rg = mean(rg_values.iter().map(|e| e.best));
    let max_rg = rg_values
        .iter()
        .map(|e| e.upper())
        .fold(f64::NEG_INFINITY, f64::max);
    let min_rg = rg_values
        .iter()
        .map(|e| e.lower())
        .fold(f64::INFINITY, f64::min);

    let scale_source: Vec<Estimate> = match basis {
        ScaleBasis::Merged => guinier
            .rgs
            .keys()
            .filter_map(|sample| merged.get(sample).copied())
            .collect(),
        ScaleBasis::Adjusted => adjusted_scales.values().copied().collect(),
    };
    if scale_source.is_empty() {
        return Err(PriorError::NoScaleEstimates {
            basis: match basis {
                ScaleBasis::Merged => "merged",
                ScaleBasis::Adjusted => "adjusted",
            },
        });
    }
    let avg_scale = mean(scale_source.iter().map(|e| e.best));
    let min_scale = mean(scale_source.iter().map(|e| e.lower()));
    let max_scale = mean(scale_source.iter().map(|e| e.upper()));

    Ok(DerivedPriors {
        avg_rg,
        min_rg,
        max_rg,
        avg_scale,
        min_scale,
        max_scale,
        s,
        porod_exp,
        scale_basis: basis,
        adjusted_scales,
        degenerate,
        missing_scale,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}
