//! Posterior sampling.
//!
//! The pipeline only depends on the [`PosteriorSampler`] contract: given a
//! [`LogDensity`] over the free parameters and a fixed budget, return a set of
//! posterior draws or fail. [`DifferentialEvolution`] is the default
//! implementation, a population MCMC in the DREAM family:
//!
//! - `pop_factor * d` chains evolve together
//! - each chain proposes `x_i + γ (x_a - x_b) + ε` from two other chains
//!   (`γ = 2.38 / sqrt(2d)`, with `γ = 1` every tenth generation for mode jumps)
//! - proposals are accepted with the Metropolis rule
//!
//! Runs are deterministic for a given seed.

use nalgebra::DVector;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DEFAULT_BURN, DEFAULT_SAMPLES, DEFAULT_STEPS};

/// Every n-th generation uses `γ = 1`.
const JUMP_EVERY: usize = 10;

/// Relative scale of the proposal noise `ε`.
const PROPOSAL_EPS: f64 = 1e-6;

/// Relative spread of the initial population around the starting point.
const INIT_SPREAD: f64 = 0.05;

/// DE proposals need at least three chains.
const MIN_CHAINS: usize = 3;

/// Log posterior density over a problem's free parameters.
pub trait LogDensity {
    fn labels(&self) -> Vec<String>;

    fn initial(&self) -> Vec<f64>;

    /// Inclusive hard bounds per free parameter.
    fn bounds(&self) -> Vec<(f64, f64)>;

    /// Log density at `x`; `-inf` (or NaN) marks an impossible point.
    fn log_density(&self, x: &[f64]) -> f64;
}

/// Fixed iteration budget of one sampler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Total number of draws requested across all chains.
    pub samples: usize,
    /// Minimum number of post-burn-in generations.
    pub steps: usize,
    /// Generations discarded before draws are kept.
    pub burn: usize,
    /// Chains per free parameter.
    pub pop_factor: usize,
    /// Keep every n-th post-burn-in generation.
    pub thin: usize,
    /// Report progress every n generations (0 disables reporting).
    pub progress_every: usize,
    pub seed: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            steps: DEFAULT_STEPS,
            burn: DEFAULT_BURN,
            pop_factor: 10,
            thin: 1,
            progress_every: 100,
            seed: 0,
        }
    }
}

impl SamplerSettings {
    /// Post-burn-in generations for a population of `chains` chains.
    pub fn generations_for(&self, chains: usize) -> usize {
        self.steps.max(self.samples.div_ceil(chains.max(1)))
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.pop_factor == 0 {
            return Err(SamplerError::InvalidSettings("pop_factor must be > 0".to_string()));
        }
        if self.thin == 0 {
            return Err(SamplerError::InvalidSettings("thin must be > 0".to_string()));
        }
        if self.steps == 0 && self.samples == 0 {
            return Err(SamplerError::InvalidSettings(
                "either samples or steps must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Progress snapshot passed to the reporting callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub generation: usize,
    pub total: usize,
    pub best_logp: f64,
    pub acceptance_rate: f64,
}

/// Output of one sampler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorDraws {
    pub labels: Vec<String>,
    pub chains: usize,
    /// Post-burn-in generations run.
    pub generations: usize,
    pub burn: usize,
    pub thin: usize,
    /// One row per kept draw, columns in `labels` order.
    pub draws: Vec<Vec<f64>>,
    /// Log density of each kept draw.
    pub logp: Vec<f64>,
    pub best: Vec<f64>,
    pub best_logp: f64,
    pub acceptance_rate: f64,
}

impl PosteriorDraws {
    /// Posterior mean of column `idx`.
    pub fn mean(&self, idx: usize) -> f64 {
        let n = self.draws.len();
        if n == 0 {
            return f64::NAN;
        }
        self.draws.iter().map(|d| d[idx]).sum::<f64>() / n as f64
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    #[error("problem has no free parameters")]
    NoFreeParameters,

    #[error("no finite log density in the initial population")]
    NoFiniteStart,

    #[error("invalid sampler settings: {0}")]
    InvalidSettings(String),
}

/// Stochastic posterior sampler.
pub trait PosteriorSampler: Send + Sync {
    fn name(&self) -> &str;

    fn sample(
        &self,
        problem: &dyn LogDensity,
        settings: &SamplerSettings,
        progress: &mut dyn FnMut(&Progress),
    ) -> Result<PosteriorDraws, SamplerError>;
}

/// Differential-evolution Markov chain Monte Carlo.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialEvolution;

impl PosteriorSampler for DifferentialEvolution {
    fn name(&self) -> &str {
        "de-mc"
    }

    fn sample(
        &self,
        problem: &dyn LogDensity,
        settings: &SamplerSettings,
        progress: &mut dyn FnMut(&Progress),
    ) -> Result<PosteriorDraws, SamplerError> {
        settings.validate()?;

        let labels = problem.labels();
        let d = labels.len();
        if d == 0 {
            return Err(SamplerError::NoFreeParameters);
        }
        let bounds = problem.bounds();
        let x0 = DVector::from_vec(problem.initial());

        let n_chains = (settings.pop_factor * d).max(MIN_CHAINS);
        let kept = settings.generations_for(n_chains);
        let total = settings.burn + kept;

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SamplerError::InvalidSettings(format!("noise distribution: {e}")))?;

        let mut pop: Vec<DVector<f64>> = Vec::with_capacity(n_chains);
        let mut logp: Vec<f64> = Vec::with_capacity(n_chains);
        for c in 0..n_chains {
            let x = if c == 0 {
                x0.clone()
            } else {
                initial_point(&x0, &bounds, &normal, &mut rng)
            };
            logp.push(finite_or_neg_inf(problem.log_density(x.as_slice())));
            pop.push(x);
        }

        let Some(start) = argmax(&logp) else {
            return Err(SamplerError::NoFiniteStart);
        };
        // Chains that started at an impossible point restart from the best one.
        for c in 0..n_chains {
            if !logp[c].is_finite() {
                pop[c] = pop[start].clone();
                logp[c] = logp[start];
            }
        }
        let mut best = pop[start].clone();
        let mut best_logp = logp[start];

        let gamma = 2.38 / (2.0 * d as f64).sqrt();
        let kept_generations = kept.div_ceil(settings.thin);
        let mut draws = Vec::with_capacity(kept_generations * n_chains);
        let mut draw_logp = Vec::with_capacity(kept_generations * n_chains);
        let mut accepted = 0usize;
        let mut proposed = 0usize;

        for generation in 0..total {
            let g = if (generation + 1) % JUMP_EVERY == 0 { 1.0 } else { gamma };

            for i in 0..n_chains {
                let (a, b) = pick_pair(&mut rng, n_chains, i);
                let diff = &pop[a] - &pop[b];
                let mut proposal = &pop[i] + diff * g;
                for x in proposal.iter_mut() {
                    *x += normal.sample(&mut rng) * PROPOSAL_EPS * (x.abs() + PROPOSAL_EPS);
                }

                let lp = finite_or_neg_inf(problem.log_density(proposal.as_slice()));
                proposed += 1;
                let u: f64 = rng.r#gen();
                if lp.is_finite() && u.ln() < lp - logp[i] {
                    accepted += 1;
                    if lp > best_logp {
                        best_logp = lp;
                        best = proposal.clone();
                    }
                    pop[i] = proposal;
                    logp[i] = lp;
                }
            }

            if generation >= settings.burn && (generation - settings.burn) % settings.thin == 0 {
                for (x, &lp) in pop.iter().zip(&logp) {
                    draws.push(x.as_slice().to_vec());
                    draw_logp.push(lp);
                }
            }

            let done = generation + 1;
            let report = settings.progress_every > 0 && done % settings.progress_every == 0;
            if report || done == total {
                progress(&Progress {
                    generation: done,
                    total,
                    best_logp,
                    acceptance_rate: accepted as f64 / proposed as f64,
                });
            }
        }

        Ok(PosteriorDraws {
            labels,
            chains: n_chains,
            generations: kept,
            burn: settings.burn,
            thin: settings.thin,
            draws,
            logp: draw_logp,
            best: best.as_slice().to_vec(),
            best_logp,
            acceptance_rate: if proposed == 0 {
                0.0
            } else {
                accepted as f64 / proposed as f64
            },
        })
    }
}

fn initial_point(
    x0: &DVector<f64>,
    bounds: &[(f64, f64)],
    normal: &Normal<f64>,
    rng: &mut StdRng,
) -> DVector<f64> {
    DVector::from_iterator(
        x0.len(),
        x0.iter().zip(bounds).map(|(&x, &(lo, hi))| {
            let spread = if x != 0.0 { INIT_SPREAD * x.abs() } else { INIT_SPREAD };
            (x + normal.sample(rng) * spread).clamp(lo, hi)
        }),
    )
}

/// Two distinct chain indices, both different from `skip`.
fn pick_pair(rng: &mut StdRng, n: usize, skip: usize) -> (usize, usize) {
    let mut a = rng.gen_range(0..n - 1);
    if a >= skip {
        a += 1;
    }
    let mut b = rng.gen_range(0..n - 2);
    let (lo, hi) = if a < skip { (a, skip) } else { (skip, a) };
    if b >= lo {
        b += 1;
    }
    if b >= hi {
        b += 1;
    }
    (a, b)
}

fn finite_or_neg_inf(v: f64) -> f64 {
    if v.is_nan() { f64::NEG_INFINITY } else { v }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}
