//! Run configuration and the fixed constants of the ellipsoid model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fit::SamplerSettings;
use crate::priors::ScaleBasis;

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 27;

/// Total posterior draws requested from the sampler.
pub const DEFAULT_SAMPLES: usize = 1_000_000;

/// Minimum number of post-burn-in generations.
pub const DEFAULT_STEPS: usize = 1000;

/// Burn-in generations discarded before draws are kept.
pub const DEFAULT_BURN: usize = 100;

/// Slit length (1/Å) of the USANS instrument.
pub const USANS_SLIT_WIDTH: f64 = 0.117;

/// Default directory for persisted sampler states.
pub const DEFAULT_OUTPUT_DIR: &str = "fitting_results/ps_ellipsoid_match";

/// Fixed (non-fitted) settings of the composite model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConstants {
    /// Starting value of both ellipsoid radii (Å).
    pub radius_init: f64,
    /// Upper hard bound of both ellipsoid radii (Å); the lower bound is zero.
    pub radius_max: f64,
    /// Log-normal size-distribution width of each radius.
    pub pd_width: f64,
    /// Number of points sampled from each size distribution.
    pub pd_points: usize,
    /// Number of standard deviations spanned by each size distribution.
    pub pd_nsigma: f64,
    /// Slit length used to smear instrument B predictions.
    pub slit_width: f64,
}

impl Default for ModelConstants {
    fn default() -> Self {
        Self {
            radius_init: 1000.0,
            radius_max: 200_000.0,
            pd_width: 0.5,
            pd_points: 200,
            pd_nsigma: 8.0,
            slit_width: USANS_SLIT_WIDTH,
        }
    }
}

/// Locations of every external input table.
#[derive(Debug, Clone)]
pub struct InputPaths {
    /// Directory of `CMW<id>_*SANS*` / `CMW<id>_*USANS*` curve files.
    pub curve_dir: PathBuf,
    /// Sample info CSV (materials per sample).
    pub sample_info: PathBuf,
    /// Fit-flag CSV selecting samples for the ellipsoid model.
    pub fit_flags: PathBuf,
    /// Corrected composition CSV.
    pub composition: PathBuf,
    /// Directory of power-law background fits (one JSON per sample).
    pub background_dir: PathBuf,
    /// Global porod-exponent / per-sample scale JSON.
    pub porod_scale: PathBuf,
    /// Global shape / per-sample rg and scale JSON.
    pub guinier_porod: PathBuf,
    /// Optional directory of Porod-analysis background refinements.
    pub porod_refinement_dir: Option<PathBuf>,
}

/// A full batch run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub inputs: InputPaths,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub sampler: SamplerSettings,
    pub model: ModelConstants,
    pub scale_basis: ScaleBasis,
    /// Replace existing state artifacts instead of failing the job.
    pub force: bool,
}
