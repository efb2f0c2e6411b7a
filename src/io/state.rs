//! Persisted sampler states.
//!
//! One JSON artifact per sample at `<dir>/CMW<id>_ps_ellipsoid_state.json`.
//! Artifacts are written through a temporary file and a rename, so a crashed
//! job never leaves a truncated state behind, and they are write-once unless
//! the caller asks to overwrite.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ModelConstants, SampleId};
use crate::error::FitError;
use crate::fit::{PosteriorDraws, SamplerSettings};

const ARTIFACT_SUFFIX: &str = "_ps_ellipsoid_state.json";

/// Everything needed to analyse one sample's posterior later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitState {
    pub sample: SampleId,
    pub sampler: String,
    pub kernel: String,
    pub created: DateTime<Utc>,
    pub settings: SamplerSettings,
    pub constants: ModelConstants,
    /// Values of the parameters held fixed during sampling.
    pub fixed: BTreeMap<String, f64>,
    pub draws: PosteriorDraws,
}

/// Deterministic artifact location for `sample`.
pub fn artifact_path(dir: &Path, sample: SampleId) -> PathBuf {
    dir.join(format!("CMW{sample}{ARTIFACT_SUFFIX}"))
}

/// Write `state` to its artifact path; fails if it exists and `force` is false.
pub fn write_state(dir: &Path, state: &FitState, force: bool) -> Result<PathBuf, FitError> {
    fs::create_dir_all(dir).map_err(|e| FitError::io(dir, e))?;

    let path = artifact_path(dir, state.sample);
    if !force && path.exists() {
        return Err(FitError::ArtifactExists {
            sample: state.sample,
            path,
        });
    }

    let tmp = temp_path(dir, state.sample);
    let written = write_json(&tmp, state).and_then(|()| {
        fs::rename(&tmp, &path).map_err(|e| FitError::io(&path, e))
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(path)
}

fn temp_path(dir: &Path, sample: SampleId) -> PathBuf {
    dir.join(format!(".CMW{sample}{ARTIFACT_SUFFIX}.tmp"))
}

fn write_json(path: &Path, state: &FitState) -> Result<(), FitError> {
    let file = File::create(path).map_err(|e| FitError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, state)?;
    writer.flush().map_err(|e| FitError::io(path, e))
}

/// Load the state persisted for `sample`.
pub fn load_state(dir: &Path, sample: SampleId) -> Result<FitState, FitError> {
    let path = artifact_path(dir, sample);
    let file = File::open(&path).map_err(|e| FitError::io(&path, e))?;
    serde_json::from_reader(file).map_err(|e| FitError::parse(&path, format!("invalid state: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(sample: SampleId) -> FitState {
        FitState {
            sample,
            sampler: "de-mc".to_string(),
            kernel: "guinier_porod+ellipsoid".to_string(),
            created: Utc::now(),
            settings: SamplerSettings::default(),
            constants: ModelConstants::default(),
            fixed: BTreeMap::from([(format!("{sample} particle sld"), 0.676)]),
            draws: PosteriorDraws {
                labels: vec![format!("{sample} scale")],
                chains: 3,
                generations: 1,
                burn: 0,
                thin: 1,
                draws: vec![vec![1.0], vec![1.1], vec![0.9]],
                logp: vec![-1.0, -1.5, -1.2],
                best: vec![1.0],
                best_logp: -1.0,
                acceptance_rate: 0.3,
            },
        }
    }

    #[test]
    fn artifact_name_is_keyed_by_sample() {
        let path = artifact_path(Path::new("out"), 401);
        assert_eq!(path, Path::new("out").join("CMW401_ps_ellipsoid_state.json"));
    }

    #[test]
    fn written_state_loads_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let original = state(401);
        let path = write_state(dir.path(), &original, false).unwrap();
        assert!(path.exists());
        assert_eq!(load_state(dir.path(), 401).unwrap(), original);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn artifacts_are_write_once_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        write_state(dir.path(), &state(401), false).unwrap();
        let err = write_state(dir.path(), &state(401), false).unwrap_err();
        assert!(matches!(err, FitError::ArtifactExists { sample: 401, .. }));

        let mut replacement = state(401);
        replacement.draws.best_logp = -0.5;
        write_state(dir.path(), &replacement, true).unwrap();
        assert_eq!(load_state(dir.path(), 401).unwrap().draws.best_logp, -0.5);
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the artifact path makes the final rename fail.
        fs::create_dir(artifact_path(dir.path(), 401)).unwrap();
        assert!(matches!(write_state(dir.path(), &state(401), true), Err(FitError::Io { .. })));
        assert!(!temp_path(dir.path(), 401).exists());
    }

    #[test]
    fn missing_state_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_state(dir.path(), 7), Err(FitError::Io { .. })));
    }
}
