//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the batch pipeline (or one of its inspection steps)
//! - prints the per-sample report

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Command, InputArgs, PriorArgs, RunArgs};
use crate::domain::{InputPaths, ModelConstants, RunConfig};
use crate::error::AppError;
use crate::fit::SamplerSettings;

pub mod pipeline;

/// Entry point for the `sansfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Eligible(args) => handle_eligible(args),
        Command::Priors(args) => handle_priors(args),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "sans_fit=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let outcomes = pipeline::run_batch_pipeline(&config)?;

    println!("{}", crate::report::format_outcomes(&outcomes));

    let summary = crate::report::summarize(&outcomes);
    if summary.failed > 0 {
        return Err(AppError::new(4, format!("{} of {} jobs failed.", summary.failed, outcomes.len())));
    }
    Ok(())
}

fn handle_eligible(args: InputArgs) -> Result<(), AppError> {
    let batch = pipeline::load_batch(&input_paths_from_args(&args), args.priors.scale_basis)?;
    let plan = crate::data::plan_dispatch(&batch.flagged, &batch.inputs);
    println!("{}", crate::report::format_plan(&plan));
    Ok(())
}

fn handle_priors(args: PriorArgs) -> Result<(), AppError> {
    let priors = pipeline::derive_global_priors(&args.porod_scale, &args.guinier_porod, args.scale_basis)?;
    println!("{}", crate::report::format_priors(&priors));
    Ok(())
}

pub fn input_paths_from_args(args: &InputArgs) -> InputPaths {
    InputPaths {
        curve_dir: args.curve_dir.clone(),
        sample_info: args.sample_info.clone(),
        fit_flags: args.fit_flags.clone(),
        composition: args.composition.clone(),
        background_dir: args.background_dir.clone(),
        porod_scale: args.priors.porod_scale.clone(),
        guinier_porod: args.priors.guinier_porod.clone(),
        porod_refinement_dir: args.porod_refinement_dir.clone(),
    }
}

pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    RunConfig {
        inputs: input_paths_from_args(&args.inputs),
        output_dir: args.output_dir.clone(),
        workers: args.workers,
        sampler: SamplerSettings {
            samples: args.samples,
            steps: args.steps,
            burn: args.burn,
            pop_factor: args.pop_factor,
            thin: args.thin,
            progress_every: args.progress_every,
            seed: args.seed,
        },
        model: ModelConstants::default(),
        scale_basis: args.inputs.priors.scale_basis,
        force: args.force,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::DEFAULT_WORKERS;
    use crate::priors::ScaleBasis;

    const INPUTS: [&str; 14] = [
        "--curve-dir",
        "curves",
        "--sample-info",
        "info.csv",
        "--fit-flags",
        "flags.csv",
        "--composition",
        "comp.csv",
        "--background-dir",
        "bg",
        "--porod-scale",
        "porod.json",
        "--guinier-porod",
        "gp.json",
    ];

    #[test]
    fn run_args_map_to_config() {
        let mut argv = vec!["sansfit", "run"];
        argv.extend(INPUTS);
        argv.extend(["--samples", "5000", "--seed", "9", "--scale-basis", "adjusted", "--force"]);
        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected the run subcommand");
        };
        let config = run_config_from_args(&args);
        assert_eq!(config.sampler.samples, 5000);
        assert_eq!(config.sampler.seed, 9);
        assert_eq!(config.sampler.steps, 1000);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.scale_basis, ScaleBasis::Adjusted);
        assert!(config.force);
        assert_eq!(config.inputs.porod_refinement_dir, None);
        assert_eq!(config.output_dir.to_str(), Some("fitting_results/ps_ellipsoid_match"));
    }

    #[test]
    fn priors_subcommand_needs_only_prior_tables() {
        let cli = Cli::try_parse_from([
            "sansfit",
            "priors",
            "--porod-scale",
            "porod.json",
            "--guinier-porod",
            "gp.json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Priors(ref a) if a.scale_basis == ScaleBasis::Merged));
    }
}
