//! Named fit parameters.
//!
//! Every parameter carries a globally unique name (`"<sample> <suffix>"`), a
//! value, hard bounds, an optional soft prior, and a fixed/free flag. A
//! [`ParameterSet`] owns them and hands out [`ParamId`] handles; models refer to
//! parameters only through those handles, so two observation bindings that hold
//! the same model necessarily read the same parameter values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Soft (Bayesian) prior on a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SoftPrior {
    Normal { mean: f64, sd: f64 },
}

impl SoftPrior {
    pub fn log_density(&self, x: f64) -> f64 {
        match *self {
            SoftPrior::Normal { mean, sd } => {
                let z = (x - mean) / sd;
                -0.5 * z * z - sd.ln() - LN_SQRT_2PI
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    /// Inclusive hard bounds.
    pub bounds: (f64, f64),
    pub prior: Option<SoftPrior>,
    pub fixed: bool,
}

impl Parameter {
    /// Free, unbounded parameter.
    pub fn free(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            bounds: (f64::NEG_INFINITY, f64::INFINITY),
            prior: None,
            fixed: false,
        }
    }

    /// Parameter held at `value` during sampling.
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            fixed: true,
            ..Self::free(name, value)
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.bounds = (lower, upper);
        self
    }

    pub fn with_prior(mut self, prior: SoftPrior) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.bounds.0 && x <= self.bounds.1
    }

    /// Log prior: `-inf` outside the hard bounds, plus the soft prior if any.
    pub fn log_prior(&self, x: f64) -> f64 {
        if !self.contains(x) {
            return f64::NEG_INFINITY;
        }
        self.prior.map_or(0.0, |p| p.log_density(x))
    }
}

/// Handle to a parameter inside its owning [`ParameterSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(usize);

impl ParamId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
    index: HashMap<String, ParamId>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; names must be unique within the set.
    pub fn insert(&mut self, param: Parameter) -> Result<ParamId, FitError> {
        if self.index.contains_key(&param.name) {
            return Err(FitError::DuplicateParameter(param.name));
        }
        let id = ParamId(self.params.len());
        self.index.insert(param.name.clone(), id);
        self.params.push(param);
        Ok(id)
    }

    pub fn get(&self, id: ParamId) -> &Parameter {
        &self.params[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Current value of every parameter, indexed by `ParamId::index`.
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    /// Handles of the parameters the sampler moves, in insertion order.
    pub fn free_ids(&self) -> Vec<ParamId> {
        (0..self.params.len())
            .map(ParamId)
            .filter(|id| !self.get(*id).fixed)
            .collect()
    }

    /// Sum of log priors over the free parameters.
    pub fn log_prior(&self, values: &[f64]) -> f64 {
        self.params
            .iter()
            .zip(values)
            .filter(|(p, _)| !p.fixed)
            .map(|(p, &x)| p.log_prior(x))
            .sum()
    }
}
