use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{Instrument, SampleId};

/// Top-level error returned by the binary; carries the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match &err {
            FitError::Io { .. } | FitError::Parse { .. } | FitError::InvalidCurve(_) => 2,
            _ => 4,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<PriorError> for AppError {
    fn from(err: PriorError) -> Self {
        AppError::new(4, format!("Prior derivation failed: {err}"))
    }
}

/// Per-sample failure taxonomy.
///
/// Eligibility and prior problems are detected before dispatch and turn into
/// exclusions; sampler problems are caught at the job boundary.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("sample {sample}: missing prior '{field}'")]
    MissingPrior { sample: SampleId, field: &'static str },

    #[error("sample {sample}: missing {instrument} curve")]
    MissingCurve { sample: SampleId, instrument: Instrument },

    #[error("sample {sample}: missing composition measurement")]
    MissingComposition { sample: SampleId },

    #[error("sample {sample}: unknown material '{material}'")]
    MissingMaterial { sample: SampleId, material: String },

    #[error("sample {sample}: inverted {field} interval [{lo}, {hi}]")]
    NumericalDegeneracy {
        sample: SampleId,
        field: &'static str,
        lo: f64,
        hi: f64,
    },

    #[error("sample {sample}: sampler failed: {reason}")]
    SamplerFailure { sample: SampleId, reason: String },

    #[error("duplicate parameter name '{0}'")]
    DuplicateParameter(String),

    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    #[error("sample {sample}: artifact already exists at {}", path.display())]
    ArtifactExists { sample: SampleId, path: PathBuf },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data in '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FitError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FitError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FitError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors of the closed-form prior transforms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriorError {
    #[error("shape parameter s = 3 makes the Guinier-Porod transform undefined")]
    UndefinedShape,

    #[error("crossover q is undefined for rg={rg}, s={s}, porod_exp={porod_exp}")]
    UndefinedCrossover { rg: f64, s: f64, porod_exp: f64 },

    #[error("re-parameterization factor is not a positive finite number: {factor}")]
    NonFiniteFactor { factor: f64 },

    #[error("no radius-of-gyration estimates available")]
    NoRadiusEstimates,

    #[error("no scale estimates available for the {basis} scale basis")]
    NoScaleEstimates { basis: &'static str },
}
