//! Loaders for measured curves and the upstream tables.
//!
//! Design goals:
//! - **Strict schema** for required columns/keys (clear errors, exit code 2)
//! - **Deterministic behavior**: directories are read in file-name order
//! - **Separation of concerns**: no prior math or fitting here
//!
//! Upstream estimate tables are JSON objects keyed by `"<id> <field>"`, each
//! value carrying `best` and `p95 = [lo, hi]`. Keys without a numeric id prefix
//! hold global values (the porod exponent, the shape parameter).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::data::{CompositionTable, CurveRepository};
use crate::domain::{
    Composition, CurvePoint, Estimate, Instrument, MeasuredCurve, SampleId, SampleInfo,
    SampleMaterials,
};
use crate::error::FitError;
use crate::priors::{BackgroundSource, GuinierPorodTable, PorodScaleTable};

/// Sample id from a source name like `CMW401_SANS_merged.txt`.
///
/// The first `_`-separated token with its three-letter prefix stripped.
pub fn parse_sample_key(name: &str) -> Option<SampleId> {
    let token = name.split('_').next()?;
    token.get(3..)?.parse().ok()
}

/// Parse a whitespace- or comma-separated `q I dI [dq ...]` text curve.
///
/// Lines that are not entirely numeric (headers, comments) are skipped.
pub fn parse_curve(text: &str, path: &Path) -> Result<MeasuredCurve, FitError> {
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Result<Vec<f64>, _> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::parse::<f64>)
            .collect();
        let Ok(values) = values else {
            continue;
        };
        if values.len() < 3 {
            return Err(FitError::parse(
                path,
                format!("line {}: expected at least 3 columns, got {}", idx + 1, values.len()),
            ));
        }
        points.push(CurvePoint {
            q: values[0],
            intensity: values[1],
            sigma: values[2],
            dq: values.get(3).copied().unwrap_or(0.0),
        });
    }
    MeasuredCurve::new(points).map_err(|e| FitError::parse(path, e.to_string()))
}

pub fn load_curve_file(path: &Path) -> Result<MeasuredCurve, FitError> {
    let text = fs::read_to_string(path).map_err(|e| FitError::io(path, e))?;
    parse_curve(&text, path)
}

/// Load every tagged curve in `dir` into a repository.
///
/// Files whose name carries neither `SANS` nor `USANS`, or has no sample key,
/// are ignored.
pub fn load_curve_dir(dir: &Path) -> Result<CurveRepository, FitError> {
    let mut repo = CurveRepository::new();
    for path in sorted_files(dir)? {
        let Some(name) = file_name(&path) else {
            continue;
        };
        let Some(instrument) = Instrument::from_source_name(name) else {
            debug!(file = name, "no instrument tag; skipping");
            continue;
        };
        let Some(sample) = parse_sample_key(name) else {
            warn!(file = name, "no sample key in file name; skipping");
            continue;
        };
        let curve = load_curve_file(&path)?;
        if repo.insert(sample, instrument, curve).is_some() {
            warn!(sample, %instrument, file = name, "duplicate curve replaces an earlier file");
        }
    }
    if repo.is_empty() {
        warn!(dir = %dir.display(), "no SANS or USANS curve files found");
    } else {
        info!(dir = %dir.display(), curves = repo.len(), "loaded curves");
    }
    Ok(repo)
}

/// Raw `"<key>" -> estimate` JSON table.
pub fn read_estimate_json(path: &Path) -> Result<BTreeMap<String, Estimate>, FitError> {
    let file = File::open(path).map_err(|e| FitError::io(path, e))?;
    serde_json::from_reader(file).map_err(|e| FitError::parse(path, format!("invalid estimate table: {e}")))
}

/// Split `"401 background"` into `(401, "background")`.
fn split_key(key: &str) -> Option<(SampleId, &str)> {
    let (id, field) = key.split_once(' ')?;
    Some((id.parse().ok()?, field))
}

/// Power-law fit table: one global porod exponent, per-sample scales.
pub fn load_porod_scale_table(path: &Path) -> Result<PorodScaleTable, FitError> {
    let mut porod_exp = None;
    let mut scales = BTreeMap::new();
    for (key, estimate) in read_estimate_json(path)? {
        if key.contains("porod_exp") {
            porod_exp = Some(estimate);
        } else if let Some((sample, _)) = split_key(&key) {
            scales.insert(sample, estimate);
        } else {
            return Err(FitError::parse(path, format!("unrecognized key '{key}'")));
        }
    }
    let porod_exp =
        porod_exp.ok_or_else(|| FitError::parse(path, "no porod_exp entry"))?;
    Ok(PorodScaleTable { porod_exp, scales })
}

/// Guinier–Porod fit table: one global shape `s`, per-sample rg and scales.
pub fn load_guinier_porod_table(path: &Path) -> Result<GuinierPorodTable, FitError> {
    let mut s = None;
    let mut rgs = BTreeMap::new();
    let mut scales = BTreeMap::new();
    for (key, estimate) in read_estimate_json(path)? {
        match split_key(&key) {
            Some((sample, field)) if field.contains("rg") => {
                rgs.insert(sample, estimate);
            }
            Some((sample, field)) if field.contains("scale") => {
                scales.insert(sample, estimate);
            }
            Some(_) => debug!(key = %key, "ignoring per-sample field"),
            None if key == "s" || key.ends_with(" s") => s = Some(estimate),
            None => debug!(key = %key, "ignoring global field"),
        }
    }
    let s = s.ok_or_else(|| FitError::parse(path, "no global shape parameter 's' entry"))?;
    Ok(GuinierPorodTable { s, rgs, scales })
}

/// Per-sample background estimates from a directory of `CMW<id>_*.json` files.
///
/// Power-law fits carry exactly one `"<id> background"` key. Porod refinements
/// may carry several background columns; the last one in key order wins.
pub fn load_background_dir(
    dir: &Path,
    source: BackgroundSource,
) -> Result<BTreeMap<SampleId, Estimate>, FitError> {
    let mut out = BTreeMap::new();
    for path in sorted_files(dir)? {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(sample) = file_name(&path).and_then(parse_sample_key) else {
            warn!(file = %path.display(), "no sample key in file name; skipping");
            continue;
        };
        let table = read_estimate_json(&path)?;
        let estimate = match source {
            BackgroundSource::PowerLawFit => table.get(&format!("{sample} background")).copied(),
            BackgroundSource::PorodRefinement => table
                .iter()
                .filter(|(key, _)| key.contains("background"))
                .map(|(_, e)| *e)
                .last(),
        };
        match estimate {
            Some(e) => {
                out.insert(sample, e);
            }
            None => warn!(sample, %source, file = %path.display(), "no background entry"),
        }
    }
    info!(%source, samples = out.len(), "loaded backgrounds");
    Ok(out)
}

/// Composition CSV: `key, target, actual, stdev, actual_vol, stdev_vol` (percent), one header row.
pub fn load_composition_csv(path: &Path) -> Result<CompositionTable, FitError> {
    let mut reader = open_csv(path)?;
    let mut out = BTreeMap::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| FitError::parse(path, format!("line {line}: {e}")))?;
        if record.len() < 6 {
            return Err(FitError::parse(
                path,
                format!("line {line}: expected 6 columns, got {}", record.len()),
            ));
        }
        let sample = parse_id(&record[0])
            .ok_or_else(|| FitError::parse(path, format!("line {line}: bad sample key '{}'", &record[0])))?;
        let number = |col: usize| {
            record[col].parse::<f64>().map_err(|e| {
                FitError::parse(path, format!("line {line}, column {}: {e}", col + 1))
            })
        };
        out.insert(sample, Composition::from_percent(number(4)?, number(5)?));
    }
    Ok(out)
}

/// Sample info CSV with `Sample`, `Conjugated Polymer`, `Commodity Polymer` columns.
pub fn load_sample_info(path: &Path) -> Result<SampleInfo, FitError> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| FitError::parse(path, format!("failed to read headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let column = |name: &str| {
        header_map
            .get(name)
            .copied()
            .ok_or_else(|| FitError::parse(path, format!("missing column '{name}'")))
    };
    let sample_col = column("sample")?;
    let particle_col = column("conjugated polymer")?;
    let matrix_col = column("commodity polymer")?;

    let mut out = BTreeMap::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| FitError::parse(path, format!("line {line}: {e}")))?;
        let field = |col: usize| record.get(col).unwrap_or("").to_string();
        let Some(sample) = parse_id(&field(sample_col)) else {
            warn!(line, "sample info row without a numeric sample id; skipping");
            continue;
        };
        out.insert(
            sample,
            SampleMaterials {
                particle: field(particle_col),
                matrix: field(matrix_col),
            },
        );
    }
    Ok(out)
}

/// Fit-flag CSV: first column is the sample id, third column selects the model.
pub fn load_fit_flags(path: &Path) -> Result<BTreeSet<SampleId>, FitError> {
    let mut reader = open_csv(path)?;
    let mut out = BTreeSet::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| FitError::parse(path, format!("line {line}: {e}")))?;
        let (Some(id), Some(flag)) = (record.get(0), record.get(2)) else {
            return Err(FitError::parse(path, format!("line {line}: expected at least 3 columns")));
        };
        let sample = parse_id(id)
            .ok_or_else(|| FitError::parse(path, format!("line {line}: bad sample id '{id}'")))?;
        let flagged = parse_flag(flag)
            .ok_or_else(|| FitError::parse(path, format!("line {line}: bad flag '{flag}'")))?;
        if flagged {
            out.insert(sample);
        }
    }
    Ok(out)
}

fn open_csv(path: &Path) -> Result<csv::Reader<File>, FitError> {
    let file = File::open(path).map_err(|e| FitError::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Integer id, also accepting integral floats such as `401.0`.
fn parse_id(s: &str) -> Option<SampleId> {
    let s = s.trim();
    if let Ok(id) = s.parse::<SampleId>() {
        return Some(id);
    }
    let x: f64 = s.parse().ok()?;
    (x >= 0.0 && x.fract() == 0.0 && x <= f64::from(SampleId::MAX)).then_some(x as SampleId)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" | "yes" => Some(true),
        "false" | "0" | "0.0" | "no" | "" => Some(false),
        _ => None,
    }
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, FitError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| FitError::io(dir, e))? {
        let path = entry.map_err(|e| FitError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
