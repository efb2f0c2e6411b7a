//! The immutable input bundle shared by every job of a batch.

use crate::data::repository::{CompositionTable, CurveRepository, CurveSource, MaterialTable};
use crate::domain::{Instrument, SampleId, SampleInfo};
use crate::error::FitError;
use crate::models::SampleInputs;
use crate::priors::{BackgroundResolver, DerivedPriors};

/// Everything loaded before dispatch. Never mutated afterwards.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub curves: CurveRepository,
    pub composition: CompositionTable,
    pub backgrounds: BackgroundResolver,
    pub sample_info: SampleInfo,
    pub materials: MaterialTable,
    pub priors: DerivedPriors,
}

impl BatchInputs {
    /// Resolve every per-sample input needed to build the joint model.
    pub fn sample_inputs(&self, sample: SampleId) -> Result<SampleInputs<'_>, FitError> {
        let curve = |instrument| {
            self.curves
                .curve(sample, instrument)
                .ok_or(FitError::MissingCurve { sample, instrument })
        };
        let sans = curve(Instrument::Sans)?;
        let usans = curve(Instrument::Usans)?;

        let composition = *self
            .composition
            .get(&sample)
            .ok_or(FitError::MissingComposition { sample })?;

        let (_, background) = self
            .backgrounds
            .resolve(sample)
            .ok_or(FitError::MissingPrior {
                sample,
                field: "background",
            })?;

        let info = self
            .sample_info
            .get(&sample)
            .ok_or_else(|| FitError::MissingMaterial {
                sample,
                material: "<no sample info entry>".to_string(),
            })?;
        let sld = |material: &str| {
            self.materials
                .sld(material)
                .ok_or_else(|| FitError::MissingMaterial {
                    sample,
                    material: material.to_string(),
                })
        };

        Ok(SampleInputs {
            sample,
            sans,
            usans,
            composition,
            particle_sld: sld(&info.particle)?,
            solvent_sld: sld(&info.matrix)?,
            background,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small, fully consistent batch used by tests across modules.

    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{Composition, CurvePoint, Estimate, MeasuredCurve, SampleMaterials};
    use crate::priors::{BackgroundSource, ScaleBasis};

    pub fn curve(n: usize, q0: f64) -> MeasuredCurve {
        let points = (0..n)
            .map(|i| {
                let q = q0 * (1.0 + i as f64);
                CurvePoint {
                    q,
                    intensity: 1.0 + 1e-6 / (q * q),
                    sigma: 0.1,
                    dq: q * 0.05,
                }
            })
            .collect();
        MeasuredCurve::new(points).unwrap()
    }

    pub fn priors() -> DerivedPriors {
        DerivedPriors {
            avg_rg: 120.0,
            min_rg: 80.0,
            max_rg: 160.0,
            avg_scale: 3.2,
            min_scale: 2.8,
            max_scale: 3.6,
            s: 1.5,
            porod_exp: 3.8,
            scale_basis: ScaleBasis::Merged,
            adjusted_scales: BTreeMap::new(),
            degenerate: Vec::new(),
            missing_scale: Vec::new(),
        }
    }

    /// Complete inputs for every id in `samples`.
    pub fn batch(samples: &[SampleId]) -> BatchInputs {
        let mut curves = CurveRepository::new();
        let mut composition = BTreeMap::new();
        let mut backgrounds = BTreeMap::new();
        let mut sample_info = BTreeMap::new();
        for &sample in samples {
            curves.insert(sample, Instrument::Sans, curve(8, 0.005));
            curves.insert(sample, Instrument::Usans, curve(8, 0.00005));
            composition.insert(sample, Composition::from_percent(0.5, 0.05));
            backgrounds.insert(sample, Estimate::new(0.002, 0.001, 0.003));
            sample_info.insert(
                sample,
                SampleMaterials {
                    particle: "RRe-P3HT".to_string(),
                    matrix: "Polystyrene-D8".to_string(),
                },
            );
        }
        BatchInputs {
            curves,
            composition,
            backgrounds: BackgroundResolver::new()
                .with_layer(BackgroundSource::PowerLawFit, backgrounds),
            sample_info,
            materials: MaterialTable::default(),
            priors: priors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::batch;
    use super::*;

    #[test]
    fn resolves_complete_sample() {
        let inputs = batch(&[401]);
        let s = inputs.sample_inputs(401).unwrap();
        assert_eq!(s.sample, 401);
        assert_eq!(s.particle_sld, 0.676);
        assert_eq!(s.solvent_sld, 6.464);
        assert_eq!(s.background.best, 0.002);
        assert!((s.composition.fraction - 0.005).abs() < 1e-15);
    }

    #[test]
    fn reports_the_missing_piece() {
        let mut inputs = batch(&[401, 402, 403]);
        inputs.composition.remove(&402);
        inputs
            .sample_info
            .get_mut(&403)
            .unwrap()
            .particle = "Unobtainium".to_string();

        assert!(matches!(
            inputs.sample_inputs(402),
            Err(FitError::MissingComposition { sample: 402 })
        ));
        assert!(matches!(
            inputs.sample_inputs(403),
            Err(FitError::MissingMaterial { sample: 403, ref material }) if material == "Unobtainium"
        ));
        assert!(matches!(
            inputs.sample_inputs(999),
            Err(FitError::MissingCurve { sample: 999, instrument: Instrument::Sans })
        ));
    }

    #[test]
    fn missing_background_is_a_missing_prior() {
        let mut inputs = batch(&[401]);
        inputs.backgrounds = BackgroundResolver::new();
        assert!(matches!(
            inputs.sample_inputs(401),
            Err(FitError::MissingPrior { sample: 401, field: "background" })
        ));
    }
}
