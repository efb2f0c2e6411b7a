//! Shared batch pipeline used by the `run` and `eligible` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load tables -> derive priors -> eligibility -> parallel jobs -> outcomes

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::data::{BatchInputs, MaterialTable, plan_dispatch};
use crate::domain::{InputPaths, RunConfig, SampleId};
use crate::error::AppError;
use crate::fit::{DifferentialEvolution, JobContext, JobOutcome, run_batch};
use crate::io::ingest::{
    load_background_dir, load_composition_csv, load_curve_dir, load_fit_flags,
    load_guinier_porod_table, load_porod_scale_table, load_sample_info,
};
use crate::models::GuinierPorodEllipsoid;
use crate::priors::{BackgroundResolver, BackgroundSource, DerivedPriors, ScaleBasis, derive_priors};

/// Read-only inputs plus the samples flagged for the ellipsoid model.
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub inputs: BatchInputs,
    pub flagged: BTreeSet<SampleId>,
}

/// Load both matrix-phase tables and derive the global priors.
pub fn derive_global_priors(
    porod_scale: &Path,
    guinier_porod: &Path,
    basis: ScaleBasis,
) -> Result<DerivedPriors, AppError> {
    let porod = load_porod_scale_table(porod_scale)?;
    let guinier = load_guinier_porod_table(guinier_porod)?;
    let priors = derive_priors(&porod, &guinier, basis)?;
    info!(
        avg_rg = priors.avg_rg,
        avg_scale = priors.avg_scale,
        s = priors.s,
        porod_exp = priors.porod_exp,
        degenerate = priors.degenerate.len(),
        "derived priors"
    );
    Ok(priors)
}

/// Load every input table once, before anything is dispatched.
pub fn load_batch(paths: &InputPaths, basis: ScaleBasis) -> Result<LoadedBatch, AppError> {
    let priors = derive_global_priors(&paths.porod_scale, &paths.guinier_porod, basis)?;

    let mut backgrounds = BackgroundResolver::new().with_layer(
        BackgroundSource::PowerLawFit,
        load_background_dir(&paths.background_dir, BackgroundSource::PowerLawFit)?,
    );
    if let Some(dir) = &paths.porod_refinement_dir {
        backgrounds = backgrounds.with_layer(
            BackgroundSource::PorodRefinement,
            load_background_dir(dir, BackgroundSource::PorodRefinement)?,
        );
    }

    let inputs = BatchInputs {
        curves: load_curve_dir(&paths.curve_dir)?,
        composition: load_composition_csv(&paths.composition)?,
        backgrounds,
        sample_info: load_sample_info(&paths.sample_info)?,
        materials: MaterialTable::default(),
        priors,
    };
    let flagged = load_fit_flags(&paths.fit_flags)?;
    Ok(LoadedBatch { inputs, flagged })
}

/// Execute the full batch and return one outcome per flagged sample.
pub fn run_batch_pipeline(config: &RunConfig) -> Result<Vec<JobOutcome>, AppError> {
    let batch = load_batch(&config.inputs, config.scale_basis)?;
    let plan = plan_dispatch(&batch.flagged, &batch.inputs);

    let sampler = DifferentialEvolution;
    let ctx = JobContext {
        inputs: &batch.inputs,
        sampler: &sampler,
        kernel: Arc::new(GuinierPorodEllipsoid::new()),
        settings: config.sampler,
        constants: config.model,
        output_dir: &config.output_dir,
        force: config.force,
    };
    Ok(run_batch(&ctx, &plan, config.workers)?)
}
