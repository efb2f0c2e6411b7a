//! One sample's fit: build the joint model, sample, persist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::data::BatchInputs;
use crate::domain::{ModelConstants, SampleId};
use crate::error::FitError;
use crate::fit::sampler::{LogDensity, PosteriorSampler, SamplerSettings};
use crate::io::state::{FitState, artifact_path, write_state};
use crate::models::{ScatteringKernel, build_joint_model};

/// Read-only context shared by every job of a batch.
pub struct JobContext<'a> {
    pub inputs: &'a BatchInputs,
    pub sampler: &'a dyn PosteriorSampler,
    pub kernel: Arc<dyn ScatteringKernel>,
    pub settings: SamplerSettings,
    pub constants: ModelConstants,
    pub output_dir: &'a Path,
    /// Overwrite existing artifacts.
    pub force: bool,
}

/// Run the fit for `sample` and return the path of the written artifact.
pub fn run_job(ctx: &JobContext<'_>, sample: SampleId) -> Result<PathBuf, FitError> {
    // Fail before spending a full sampler run on an artifact we cannot write.
    let path = artifact_path(ctx.output_dir, sample);
    if !ctx.force && path.exists() {
        return Err(FitError::ArtifactExists { sample, path });
    }

    let inputs = ctx.inputs.sample_inputs(sample)?;
    let model = build_joint_model(
        &inputs,
        &ctx.inputs.priors,
        &ctx.constants,
        Arc::clone(&ctx.kernel),
    )?;

    let settings = SamplerSettings {
        seed: sample_seed(ctx.settings.seed, sample),
        ..ctx.settings
    };
    info!(
        free = model.labels().len(),
        parameters = model.parameters().len(),
        samples = settings.samples,
        steps = settings.steps,
        sampler = ctx.sampler.name(),
        "starting sampler"
    );

    let started = Instant::now();
    let draws = ctx
        .sampler
        .sample(&model, &settings, &mut |p| {
            info!(
                generation = p.generation,
                total = p.total,
                best_logp = p.best_logp,
                acceptance = p.acceptance_rate,
                "sampler progress"
            );
        })
        .map_err(|e| FitError::SamplerFailure {
            sample,
            reason: e.to_string(),
        })?;
    info!(
        elapsed_s = started.elapsed().as_secs_f64(),
        draws = draws.draws.len(),
        best_logp = draws.best_logp,
        "sampler finished"
    );
    for (idx, label) in draws.labels.iter().enumerate() {
        debug!(parameter = %label, mean = draws.mean(idx), best = draws.best[idx], "posterior summary");
    }

    let fixed: BTreeMap<String, f64> = model
        .parameters()
        .iter()
        .filter(|p| p.fixed)
        .map(|p| (p.name.clone(), p.value))
        .collect();

    let state = FitState {
        sample,
        sampler: ctx.sampler.name().to_string(),
        kernel: ctx.kernel.name().to_string(),
        created: Utc::now(),
        settings,
        constants: ctx.constants,
        fixed,
        draws,
    };
    let path = write_state(ctx.output_dir, &state, ctx.force)?;
    info!(path = %path.display(), "state written");
    Ok(path)
}

/// Per-sample sampler seed, independent of dispatch order.
///
/// Mixed with splitmix64 so the value is fixed for a given `(base, sample)`
/// on every platform and toolchain.
pub fn sample_seed(base: u64, sample: SampleId) -> u64 {
    splitmix64(splitmix64(base) ^ u64::from(sample))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
