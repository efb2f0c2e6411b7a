//! Formatted terminal output.
//!
//! We keep formatting code in one place so the fitting code stays free of
//! presentation and output changes are localized.

use crate::data::DispatchPlan;
use crate::domain::Estimate;
use crate::fit::{JobOutcome, JobStatus};
use crate::priors::DerivedPriors;
use crate::report::summarize;

/// One line per sample (`written <path>`, `excluded: <reason>`, `failed: <reason>`) plus totals.
pub fn format_outcomes(outcomes: &[JobOutcome]) -> String {
    let mut out = String::new();
    for o in outcomes {
        let line = match &o.status {
            JobStatus::Written(path) => format!("written {}", path.display()),
            JobStatus::Excluded(reason) => format!("excluded: {reason}"),
            JobStatus::Failed(reason) => format!("failed: {reason}"),
        };
        out.push_str(&format!("{:<10} {line}\n", format!("CMW{}", o.sample)));
    }
    let s = summarize(outcomes);
    out.push_str(&format!(
        "\n{} written, {} excluded, {} failed\n",
        s.written, s.excluded, s.failed
    ));
    out
}

/// Derived global priors, with any degenerate or incomplete samples called out.
pub fn format_priors(priors: &DerivedPriors) -> String {
    let mut out = String::new();
    out.push_str(&format!("scale basis : {:?}\n", priors.scale_basis));
    out.push_str(&format!(
        "rg          : avg={:.4} range=[{:.4}, {:.4}]\n",
        priors.avg_rg, priors.min_rg, priors.max_rg
    ));
    out.push_str(&format!(
        "scale       : avg={:.6} p95 avg=[{:.6}, {:.6}]\n",
        priors.avg_scale, priors.min_scale, priors.max_scale
    ));
    out.push_str(&format!("s           : {:.4}\n", priors.s));
    out.push_str(&format!("porod_exp   : {:.4}\n", priors.porod_exp));

    if !priors.adjusted_scales.is_empty() {
        out.push_str("\nadjusted scales:\n");
        for (sample, e) in &priors.adjusted_scales {
            let flag = if priors.degenerate.contains(sample) {
                "  (inverted interval)"
            } else {
                ""
            };
            out.push_str(&format!("  CMW{sample:<6} {}{flag}\n", fmt_estimate(e)));
        }
    }
    if !priors.missing_scale.is_empty() {
        let ids: Vec<String> = priors.missing_scale.iter().map(|s| s.to_string()).collect();
        out.push_str(&format!("\nno scale estimate: {}\n", ids.join(", ")));
    }
    out
}

/// Samples that will be dispatched and the ones left out.
pub fn format_plan(plan: &DispatchPlan) -> String {
    let mut out = String::new();
    let ids: Vec<String> = plan.dispatch.iter().map(|s| s.to_string()).collect();
    out.push_str(&format!("dispatch ({}): {}\n", plan.dispatch.len(), ids.join(" ")));
    for (sample, reason) in &plan.excluded {
        out.push_str(&format!("{:<10} excluded: {reason}\n", format!("CMW{sample}")));
    }
    out
}

fn fmt_estimate(e: &Estimate) -> String {
    format!("{:.6e} [{:.6e}, {:.6e}]", e.best, e.lower(), e.upper())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::error::FitError;
    use crate::priors::ScaleBasis;

    #[test]
    fn outcome_lines_follow_status() {
        let outcomes = vec![
            JobOutcome {
                sample: 401,
                status: JobStatus::Written(PathBuf::from("out/CMW401_ps_ellipsoid_state.json")),
            },
            JobOutcome {
                sample: 402,
                status: JobStatus::Excluded("sample 402: missing composition measurement".to_string()),
            },
            JobOutcome {
                sample: 403,
                status: JobStatus::Failed("boom".to_string()),
            },
        ];
        let text = format_outcomes(&outcomes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CMW401     written out/CMW401_ps_ellipsoid_state.json");
        assert_eq!(lines[1], "CMW402     excluded: sample 402: missing composition measurement");
        assert_eq!(lines[2], "CMW403     failed: boom");
        assert!(text.ends_with("1 written, 1 excluded, 1 failed\n"));
    }

    #[test]
    fn priors_flag_inverted_intervals() {
        let priors = DerivedPriors {
            avg_rg: 120.0,
            min_rg: 80.0,
            max_rg: 160.0,
            avg_scale: 3.2,
            min_scale: 2.8,
            max_scale: 3.6,
            s: 1.5,
            porod_exp: 3.8,
            scale_basis: ScaleBasis::Merged,
            adjusted_scales: BTreeMap::from([
                (401, Estimate::new(1e-3, 9e-4, 1.1e-3)),
                (402, Estimate::new(1e-3, 1.1e-3, 9e-4)),
            ]),
            degenerate: vec![402],
            missing_scale: vec![403],
        };
        let text = format_priors(&priors);
        let inverted: Vec<&str> = text.lines().filter(|l| l.contains("inverted")).collect();
        assert_eq!(inverted.len(), 1);
        assert!(inverted[0].contains("CMW402"));
        assert!(text.contains("no scale estimate: 403"));
    }

    #[test]
    fn plan_lists_exclusions() {
        let plan = DispatchPlan {
            dispatch: vec![401, 403],
            excluded: vec![(402, FitError::MissingComposition { sample: 402 })],
        };
        let text = format_plan(&plan);
        assert!(text.starts_with("dispatch (2): 401 403\n"));
        assert!(text.contains("CMW402     excluded: sample 402: missing composition measurement"));
    }
}
