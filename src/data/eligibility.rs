//! Which samples get a fitting job.
//!
//! Eligibility is the plain set intersection of flagged samples, samples with
//! both curves, and samples with a composition measurement. Eligible samples
//! whose remaining inputs (background, materials) cannot be resolved are
//! excluded with a reason before anything is dispatched.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::data::batch::BatchInputs;
use crate::data::repository::CurveSource;
use crate::domain::{Instrument, SampleId};
use crate::error::FitError;

/// `{flagged} ∩ {both curves} ∩ {composition}`.
pub fn eligible_samples(
    flagged: &BTreeSet<SampleId>,
    with_curves: &BTreeSet<SampleId>,
    with_composition: &BTreeSet<SampleId>,
) -> BTreeSet<SampleId> {
    flagged
        .iter()
        .filter(|s| with_curves.contains(s) && with_composition.contains(s))
        .copied()
        .collect()
}

/// Samples to dispatch plus every flagged sample that was left out, with the reason.
#[derive(Debug, Default)]
pub struct DispatchPlan {
    pub dispatch: Vec<SampleId>,
    pub excluded: Vec<(SampleId, FitError)>,
}

/// Split the flagged samples into dispatched and excluded ones.
pub fn plan_dispatch(flagged: &BTreeSet<SampleId>, inputs: &BatchInputs) -> DispatchPlan {
    let with_curves = inputs.curves.complete_samples();
    let with_composition: BTreeSet<SampleId> = inputs.composition.keys().copied().collect();
    let eligible = eligible_samples(flagged, &with_curves, &with_composition);

    let mut plan = DispatchPlan::default();
    for &sample in flagged {
        let reason = if !with_curves.contains(&sample) {
            let instrument = Instrument::ALL
                .into_iter()
                .find(|&i| inputs.curves.curve(sample, i).is_none())
                .unwrap_or(Instrument::Sans);
            Some(FitError::MissingCurve { sample, instrument })
        } else if !eligible.contains(&sample) {
            Some(FitError::MissingComposition { sample })
        } else {
            inputs.sample_inputs(sample).err()
        };

        match reason {
            Some(err) => {
                warn!(sample, reason = %err, "excluded from dispatch");
                plan.excluded.push((sample, err));
            }
            None => plan.dispatch.push(sample),
        }
    }

    info!(
        flagged = flagged.len(),
        dispatched = plan.dispatch.len(),
        excluded = plan.excluded.len(),
        "dispatch plan ready"
    );
    plan
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::batch::fixtures::{batch, curve};
    use crate::data::repository::CurveRepository;
    use crate::domain::Estimate;
    use crate::priors::{BackgroundResolver, BackgroundSource};

    fn set(ids: &[SampleId]) -> BTreeSet<SampleId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn eligibility_is_the_intersection() {
        let flagged = set(&[1, 2, 3, 4, 5]);
        let curves = set(&[2, 3, 4, 5, 6]);
        let composition = set(&[1, 3, 4, 5, 7]);
        assert_eq!(eligible_samples(&flagged, &curves, &composition), set(&[3, 4, 5]));
    }

    #[test]
    fn removing_a_sample_from_any_input_removes_it() {
        let all = set(&[10, 20, 30]);
        let base = eligible_samples(&all, &all, &all);
        assert_eq!(base, all);
        for &removed in &all {
            let mut less = all.clone();
            less.remove(&removed);
            for result in [
                eligible_samples(&less, &all, &all),
                eligible_samples(&all, &less, &all),
                eligible_samples(&all, &all, &less),
            ] {
                assert!(!result.contains(&removed));
                assert_eq!(result.len(), all.len() - 1);
            }
        }
    }

    #[test]
    fn sample_without_composition_is_excluded() {
        let mut inputs = batch(&[401, 402]);
        inputs.composition.remove(&402);
        let plan = plan_dispatch(&set(&[401, 402]), &inputs);
        assert_eq!(plan.dispatch, vec![401]);
        assert_eq!(plan.excluded.len(), 1);
        assert!(matches!(plan.excluded[0], (402, FitError::MissingComposition { sample: 402 })));
    }

    #[test]
    fn unflagged_samples_are_ignored() {
        let inputs = batch(&[401, 402, 403]);
        let plan = plan_dispatch(&set(&[402]), &inputs);
        assert_eq!(plan.dispatch, vec![402]);
        assert!(plan.excluded.is_empty());
    }

    #[test]
    fn missing_usans_curve_is_reported() {
        let mut inputs = batch(&[401]);
        let mut repo = CurveRepository::new();
        repo.insert(401, Instrument::Sans, curve(4, 0.01));
        inputs.curves = repo;
        let plan = plan_dispatch(&set(&[401]), &inputs);
        assert!(plan.dispatch.is_empty());
        assert!(matches!(
            plan.excluded[0].1,
            FitError::MissingCurve { sample: 401, instrument: Instrument::Usans }
        ));
    }

    #[test]
    fn missing_background_excludes_before_dispatch() {
        let mut inputs = batch(&[401, 402]);
        let only_401 = BTreeMap::from([(401, Estimate::new(0.002, 0.001, 0.003))]);
        inputs.backgrounds =
            BackgroundResolver::new().with_layer(BackgroundSource::PowerLawFit, only_401);
        let plan = plan_dispatch(&set(&[401, 402]), &inputs);
        assert_eq!(plan.dispatch, vec![401]);
        assert!(matches!(
            plan.excluded[0].1,
            FitError::MissingPrior { sample: 402, field: "background" }
        ));
    }
}
