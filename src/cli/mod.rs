//! Command-line parsing for the batch fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Every input location can also come from
//! a `SANSFIT_*` environment variable (or a `.env` file).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_BURN, DEFAULT_OUTPUT_DIR, DEFAULT_SAMPLES, DEFAULT_STEPS, DEFAULT_WORKERS};
use crate::priors::ScaleBasis;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sansfit", version, about = "Batch SANS/USANS ellipsoid fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every eligible sample and persist one sampler state per sample.
    Run(RunArgs),
    /// Print the samples that would be dispatched and why others are excluded.
    Eligible(InputArgs),
    /// Print the derived global priors.
    Priors(PriorArgs),
}

/// Upstream matrix-phase fit tables.
#[derive(Debug, Args, Clone)]
pub struct PriorArgs {
    /// Power-law fit JSON (global porod exponent, per-sample scales).
    #[arg(long, env = "SANSFIT_POROD_SCALE", value_name = "JSON")]
    pub porod_scale: PathBuf,

    /// Guinier-Porod fit JSON (global shape, per-sample rg and scales).
    #[arg(long, env = "SANSFIT_GUINIER_POROD", value_name = "JSON")]
    pub guinier_porod: PathBuf,

    /// Scale estimates averaged into the matrix scale prior.
    #[arg(long, value_enum, env = "SANSFIT_SCALE_BASIS", default_value_t = ScaleBasis::Merged)]
    pub scale_basis: ScaleBasis,
}

/// Every input table of a batch.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Directory of `CMW<id>_*SANS*` / `CMW<id>_*USANS*` curve files.
    #[arg(long, env = "SANSFIT_CURVE_DIR", value_name = "DIR")]
    pub curve_dir: PathBuf,

    /// Sample info CSV (`Sample`, `Conjugated Polymer`, `Commodity Polymer`).
    #[arg(long, env = "SANSFIT_SAMPLE_INFO", value_name = "CSV")]
    pub sample_info: PathBuf,

    /// Fit-flag CSV (id in column 1, ellipsoid flag in column 3).
    #[arg(long, env = "SANSFIT_FIT_FLAGS", value_name = "CSV")]
    pub fit_flags: PathBuf,

    /// Corrected composition CSV (volume percent in columns 5 and 6).
    #[arg(long, env = "SANSFIT_COMPOSITION", value_name = "CSV")]
    pub composition: PathBuf,

    /// Directory of power-law background fits.
    #[arg(long, env = "SANSFIT_BACKGROUND_DIR", value_name = "DIR")]
    pub background_dir: PathBuf,

    /// Directory of Porod-analysis background refinements (override the power-law fits).
    #[arg(long, env = "SANSFIT_POROD_REFINEMENT_DIR", value_name = "DIR")]
    pub porod_refinement_dir: Option<PathBuf>,

    #[command(flatten)]
    pub priors: PriorArgs,
}

/// Options for a batch run.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Directory for persisted sampler states.
    #[arg(long, env = "SANSFIT_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Worker threads (one job each at a time).
    #[arg(short = 'j', long, env = "SANSFIT_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Total posterior draws requested per sample.
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    pub samples: usize,

    /// Minimum post-burn-in generations per sample.
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: usize,

    /// Burn-in generations.
    #[arg(long, default_value_t = DEFAULT_BURN)]
    pub burn: usize,

    /// Chains per free parameter.
    #[arg(long, default_value_t = 10)]
    pub pop_factor: usize,

    /// Keep every n-th generation.
    #[arg(long, default_value_t = 1)]
    pub thin: usize,

    /// Log sampler progress every n generations (0 = only at the end).
    #[arg(long, default_value_t = 100)]
    pub progress_every: usize,

    /// Base random seed (combined with each sample id).
    #[arg(long, env = "SANSFIT_SEED", default_value_t = 0)]
    pub seed: u64,

    /// Overwrite existing state artifacts.
    #[arg(long)]
    pub force: bool,
}
