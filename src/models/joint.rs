//! Joint two-instrument model for one sample.
//!
//! One [`CompositeModel`] (parameter handles + kernel) is built per sample and
//! shared by `Arc` between two [`ObservationBinding`]s: the SANS curve with its
//! resolution removed and the USANS curve with slit smearing. Both bindings read
//! parameter values from the same [`ParameterSet`], so the matrix and particle
//! parameters are constrained by both data sets at once; only the resolution
//! differs between them.

use std::fmt;
use std::sync::Arc;

use crate::domain::{Composition, Estimate, Instrument, MeasuredCurve, ModelConstants, SampleId};
use crate::error::FitError;
use crate::fit::LogDensity;
use crate::models::kernel::{
    EllipsoidParams, GuinierPorodParams, KernelParams, Polydispersity, ScatteringKernel,
};
use crate::models::params::{ParamId, Parameter, ParameterSet, SoftPrior};
use crate::models::resolution::Resolution;
use crate::priors::DerivedPriors;

/// Handles for one polydisperse radius.
#[derive(Debug, Clone, Copy)]
pub struct PolydisperseRadius {
    pub radius: ParamId,
    pub pd: ParamId,
    pub pd_n: ParamId,
    pub pd_nsigma: ParamId,
}

impl PolydisperseRadius {
    fn resolve(&self, values: &[f64]) -> (f64, Polydispersity) {
        let pd = Polydispersity {
            width: values[self.pd.index()],
            points: values[self.pd_n.index()].round().max(1.0) as usize,
            nsigma: values[self.pd_nsigma.index()],
        };
        (values[self.radius.index()], pd)
    }
}

/// Guinier–Porod + ellipsoid model expressed over parameter handles.
pub struct CompositeModel {
    kernel: Arc<dyn ScatteringKernel>,
    pub scale: ParamId,
    pub background: ParamId,
    pub matrix_scale: ParamId,
    pub matrix_rg: ParamId,
    pub matrix_s: ParamId,
    pub matrix_porod_exp: ParamId,
    pub particle_scale: ParamId,
    pub particle_sld: ParamId,
    pub solvent_sld: ParamId,
    pub polar: PolydisperseRadius,
    pub equatorial: PolydisperseRadius,
}

impl CompositeModel {
    pub fn kernel_params(&self, values: &[f64]) -> KernelParams {
        let (radius_polar, polar_pd) = self.polar.resolve(values);
        let (radius_equatorial, equatorial_pd) = self.equatorial.resolve(values);
        KernelParams {
            scale: values[self.scale.index()],
            background: values[self.background.index()],
            matrix: GuinierPorodParams {
                scale: values[self.matrix_scale.index()],
                rg: values[self.matrix_rg.index()],
                s: values[self.matrix_s.index()],
                porod_exp: values[self.matrix_porod_exp.index()],
            },
            particles: EllipsoidParams {
                scale: values[self.particle_scale.index()],
                sld: values[self.particle_sld.index()],
                sld_solvent: values[self.solvent_sld.index()],
                radius_polar,
                radius_equatorial,
                polar_pd,
                equatorial_pd,
            },
        }
    }

    /// Unsmeared intensity at `q` for the full parameter vector `values`.
    pub fn predict(&self, values: &[f64], q: &[f64]) -> Vec<f64> {
        self.kernel.intensity(&self.kernel_params(values), q)
    }
}

impl fmt::Debug for CompositeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeModel")
            .field("kernel", &self.kernel.name())
            .field("scale", &self.scale)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

/// One curve bound to the shared model through an instrument resolution.
#[derive(Debug, Clone)]
pub struct ObservationBinding {
    pub instrument: Instrument,
    pub curve: MeasuredCurve,
    pub resolution: Resolution,
    model: Arc<CompositeModel>,
    q: Vec<f64>,
}

impl ObservationBinding {
    pub fn new(
        instrument: Instrument,
        curve: MeasuredCurve,
        resolution: Resolution,
        model: Arc<CompositeModel>,
    ) -> Self {
        let q = curve.q();
        Self {
            instrument,
            curve,
            resolution,
            model,
            q,
        }
    }

    pub fn model(&self) -> &Arc<CompositeModel> {
        &self.model
    }

    /// Model intensity at the measured `q`, after resolution.
    pub fn predict(&self, values: &[f64]) -> Vec<f64> {
        self.resolution
            .apply(&self.q, |q| self.model.predict(values, q))
    }

    /// Gaussian log-likelihood `-χ²/2`; `-inf` if any prediction is not finite.
    pub fn log_likelihood(&self, values: &[f64]) -> f64 {
        let predicted = self.predict(values);
        let chisq: f64 = self
            .curve
            .points()
            .iter()
            .zip(&predicted)
            .map(|(p, f)| {
                let r = (p.intensity - f) / p.sigma;
                r * r
            })
            .sum();
        if chisq.is_finite() {
            -0.5 * chisq
        } else {
            f64::NEG_INFINITY
        }
    }
}

/// The joint optimization problem for one sample.
#[derive(Debug, Clone)]
pub struct JointModel {
    parameters: ParameterSet,
    model: Arc<CompositeModel>,
    bindings: Vec<ObservationBinding>,
    free: Vec<ParamId>,
}

impl JointModel {
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn model(&self) -> &Arc<CompositeModel> {
        &self.model
    }

    pub fn bindings(&self) -> &[ObservationBinding] {
        &self.bindings
    }

    pub fn binding(&self, instrument: Instrument) -> Option<&ObservationBinding> {
        self.bindings.iter().find(|b| b.instrument == instrument)
    }

    /// Full parameter vector with the free parameters replaced by `free_values`.
    pub fn expand(&self, free_values: &[f64]) -> Vec<f64> {
        let mut values = self.parameters.values();
        for (id, &x) in self.free.iter().zip(free_values) {
            values[id.index()] = x;
        }
        values
    }

    /// Log posterior density (up to a constant) at the full parameter vector.
    pub fn log_posterior(&self, values: &[f64]) -> f64 {
        let lp = self.parameters.log_prior(values);
        if !lp.is_finite() {
            return f64::NEG_INFINITY;
        }
        let ll: f64 = self.bindings.iter().map(|b| b.log_likelihood(values)).sum();
        if ll.is_nan() { f64::NEG_INFINITY } else { lp + ll }
    }
}

impl LogDensity for JointModel {
    fn labels(&self) -> Vec<String> {
        self.free
            .iter()
            .map(|&id| self.parameters.get(id).name.clone())
            .collect()
    }

    fn initial(&self) -> Vec<f64> {
        self.free
            .iter()
            .map(|&id| self.parameters.get(id).value)
            .collect()
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        self.free
            .iter()
            .map(|&id| self.parameters.get(id).bounds)
            .collect()
    }

    fn log_density(&self, x: &[f64]) -> f64 {
        self.log_posterior(&self.expand(x))
    }
}

/// Everything the builder needs to know about one sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleInputs<'a> {
    pub sample: SampleId,
    pub sans: &'a MeasuredCurve,
    pub usans: &'a MeasuredCurve,
    pub composition: Composition,
    pub particle_sld: f64,
    pub solvent_sld: f64,
    pub background: Estimate,
}

/// Globally unique parameter name: sample id followed by a semantic suffix.
pub fn parameter_name(sample: SampleId, suffix: &str) -> String {
    format!("{sample} {suffix}")
}

/// Build the composite model for one sample and bind it to both curves.
pub fn build_joint_model(
    inputs: &SampleInputs<'_>,
    priors: &DerivedPriors,
    constants: &ModelConstants,
    kernel: Arc<dyn ScatteringKernel>,
) -> Result<JointModel, FitError> {
    let sample = inputs.sample;
    let vol = inputs.composition.fraction;
    let vol_sd = inputs.composition.fraction_sd;
    if !(vol_sd.is_finite() && vol_sd > 0.0) {
        return Err(FitError::MissingPrior {
            sample,
            field: "composition standard deviation",
        });
    }

    let name = |suffix: &str| parameter_name(sample, suffix);
    let mut params = ParameterSet::new();

    let scale = params.insert(Parameter::free(name("scale"), 1.0))?;
    let background = params.insert(Parameter::free(name("background"), inputs.background.best))?;

    let matrix_scale =
        params.insert(Parameter::free(name("matrix scale"), priors.avg_scale * (1.0 - vol)))?;
    let matrix_rg = params.insert(Parameter::free(name("matrix rg"), priors.avg_rg))?;
    let matrix_s = params.insert(Parameter::free(name("matrix s"), priors.s))?;
    let matrix_porod_exp =
        params.insert(Parameter::free(name("matrix porod_exp"), priors.porod_exp))?;

    let particle_scale = params.insert(
        Parameter::free(name("particle scale"), vol)
            .with_prior(SoftPrior::Normal { mean: vol, sd: vol_sd }),
    )?;
    let particle_sld = params.insert(Parameter::fixed(name("particle sld"), inputs.particle_sld))?;
    let solvent_sld = params.insert(Parameter::fixed(name("solvent sld"), inputs.solvent_sld))?;

    let mut radius = |axis: &str| -> Result<PolydisperseRadius, FitError> {
        Ok(PolydisperseRadius {
            radius: params.insert(
                Parameter::free(name(&format!("ellipsoid {axis} radius")), constants.radius_init)
                    .with_bounds(0.0, constants.radius_max),
            )?,
            pd: params.insert(Parameter::fixed(
                name(&format!("ellipsoid {axis} radius pd")),
                constants.pd_width,
            ))?,
            pd_n: params.insert(Parameter::fixed(
                name(&format!("ellipsoid {axis} radius pd n")),
                constants.pd_points as f64,
            ))?,
            pd_nsigma: params.insert(Parameter::fixed(
                name(&format!("ellipsoid {axis} radius pd nsigma")),
                constants.pd_nsigma,
            ))?,
        })
    };
    let polar = radius("polar")?;
    let equatorial = radius("equatorial")?;

    let model = Arc::new(CompositeModel {
        kernel,
        scale,
        background,
        matrix_scale,
        matrix_rg,
        matrix_s,
        matrix_porod_exp,
        particle_scale,
        particle_sld,
        solvent_sld,
        polar,
        equatorial,
    });

    let bindings = vec![
        ObservationBinding::new(
            Instrument::Sans,
            inputs.sans.without_resolution(),
            Resolution::None,
            Arc::clone(&model),
        ),
        ObservationBinding::new(
            Instrument::Usans,
            inputs.usans.clone(),
            Resolution::Slit {
                width: constants.slit_width,
            },
            Arc::clone(&model),
        ),
    ];

    let free = params.free_ids();
    Ok(JointModel {
        parameters: params,
        model,
        bindings,
        free,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use super::*;
    use crate::domain::CurvePoint;
    use crate::priors::ScaleBasis;

    /// Kernel returning `scale * matrix_scale + background` at every q.
    struct FlatKernel;

    impl ScatteringKernel for FlatKernel {
        fn name(&self) -> &str {
            "flat"
        }

        fn intensity(&self, params: &KernelParams, q: &[f64]) -> Vec<f64> {
            vec![params.scale * params.matrix.scale + params.background; q.len()]
        }
    }

    fn curve(n: usize, q0: f64, dq: f64) -> MeasuredCurve {
        let points = (0..n)
            .map(|i| CurvePoint {
                q: q0 * (1.0 + i as f64),
                intensity: 1.0,
                sigma: 0.1,
                dq,
            })
            .collect();
        MeasuredCurve::new(points).unwrap()
    }

    fn priors() -> DerivedPriors {
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

    fn build(sample: SampleId, sans: &MeasuredCurve, usans: &MeasuredCurve) -> JointModel {
        let inputs = SampleInputs {
            sample,
            sans,
            usans,
            composition: Composition::from_percent(0.5, 0.05),
            particle_sld: 0.676,
            solvent_sld: 6.464,
            background: Estimate::new(0.002, 0.001, 0.003),
        };
        build_joint_model(&inputs, &priors(), &ModelConstants::default(), Arc::new(FlatKernel)).unwrap()
    }

    #[test]
    fn sample_401_scenario() {
        let sans = curve(50, 0.001, 0.0005);
        let usans = curve(50, 0.00005, 0.0);
        let joint = build(401, &sans, &usans);
        let params = joint.parameters();

        let matrix_scale = params.by_name("401 matrix scale").unwrap();
        assert!((matrix_scale.value - 3.2 * (1.0 - 0.005)).abs() < 1e-12);
        assert!((matrix_scale.value - 3.184).abs() < 1e-12);

        let particle = params.by_name("401 particle scale").unwrap();
        assert!((particle.value - 0.005).abs() < 1e-15);
        match particle.prior {
            Some(SoftPrior::Normal { mean, sd }) => {
                assert!((mean - 0.005).abs() < 1e-15);
                assert!((sd - 0.0005).abs() < 1e-15);
            }
            None => panic!("particle scale must carry a soft prior"),
        }
        assert!(particle.bounds.0.is_infinite() && particle.bounds.1.is_infinite());

        assert_eq!(params.by_name("401 background").unwrap().value, 0.002);
        assert_eq!(params.by_name("401 matrix rg").unwrap().value, 120.0);
        assert!(params.by_name("401 particle sld").unwrap().fixed);
        assert!(params.by_name("401 ellipsoid polar radius pd n").unwrap().fixed);
        assert_eq!(
            params.by_name("401 ellipsoid equatorial radius").unwrap().bounds,
            (0.0, 200_000.0)
        );

        let bindings = joint.bindings();
        assert_eq!(bindings.len(), 2);
        assert!(Arc::ptr_eq(bindings[0].model(), bindings[1].model()));
        assert!(Arc::ptr_eq(bindings[0].model(), joint.model()));
        assert_eq!(bindings[0].resolution, Resolution::None);
        assert_eq!(bindings[1].resolution, Resolution::Slit { width: 0.117 });
        assert_eq!(bindings[0].curve.points().len(), 50);
        assert_eq!(bindings[1].curve.points().len(), 50);
    }

    #[test]
    fn sans_binding_has_resolution_removed() {
        let sans = curve(10, 0.001, 0.0005);
        let usans = curve(10, 0.00005, 0.0002);
        let joint = build(401, &sans, &usans);
        let sans_binding = joint.binding(Instrument::Sans).unwrap();
        assert!(sans_binding.curve.points().iter().all(|p| p.dq == 0.0));
        // The caller's curve is untouched.
        assert!(sans.points().iter().all(|p| p.dq == 0.0005));
        let usans_binding = joint.binding(Instrument::Usans).unwrap();
        assert_eq!(&usans_binding.curve, &usans);
    }

    #[test]
    fn parameter_names_are_disjoint_across_samples() {
        let sans = curve(5, 0.001, 0.0);
        let usans = curve(5, 0.00005, 0.0);
        let ids = [4u32, 40, 401, 4011, 402];
        let models: Vec<JointModel> = ids.iter().map(|&id| build(id, &sans, &usans)).collect();
        for (i, a) in models.iter().enumerate() {
            let names_a: HashSet<&str> = a.parameters().names().collect();
            assert_eq!(names_a.len(), a.parameters().len());
            for b in models.iter().skip(i + 1) {
                let names_b: HashSet<&str> = b.parameters().names().collect();
                assert!(names_a.is_disjoint(&names_b));
            }
        }
    }

    #[test]
    fn shared_parameters_drive_both_bindings() {
        let sans = curve(4, 0.001, 0.0);
        let usans = curve(4, 0.00005, 0.0);
        let joint = build(401, &sans, &usans);

        let mut x = joint.initial();
        let labels = joint.labels();
        let bg = labels.iter().position(|l| l == "401 background").unwrap();
        x[bg] = 0.5;
        let values = joint.expand(&x);
        let expected = 1.0 * 3.184 + 0.5;
        for binding in joint.bindings() {
            for v in binding.predict(&values) {
                assert!((v - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn log_density_rejects_out_of_bounds_radius() {
        let sans = curve(4, 0.001, 0.0);
        let usans = curve(4, 0.00005, 0.0);
        let joint = build(401, &sans, &usans);
        let labels = joint.labels();
        let r = labels.iter().position(|l| l == "401 ellipsoid polar radius").unwrap();
        let mut x = joint.initial();
        assert!(joint.log_density(&x).is_finite());
        x[r] = -1.0;
        assert_eq!(joint.log_density(&x), f64::NEG_INFINITY);
    }

    #[test]
    fn free_parameters_exclude_fixed_shape_settings() {
        let sans = curve(4, 0.001, 0.0);
        let usans = curve(4, 0.00005, 0.0);
        let joint = build(401, &sans, &usans);
        assert_eq!(joint.labels().len(), 9);
        assert_eq!(joint.parameters().len(), 17);
    }
}
