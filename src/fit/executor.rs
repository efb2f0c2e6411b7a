//! Batch fan-out over a fixed-size worker pool.
//!
//! Every dispatched sample runs as an independent job on a dedicated rayon
//! pool. A job that returns an error or panics becomes a `Failed` outcome for
//! that sample only; siblings keep running. `run_batch` returns after every
//! job has finished.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{error, info, info_span};

use crate::data::DispatchPlan;
use crate::domain::SampleId;
use crate::error::FitError;
use crate::fit::job::{JobContext, run_job};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Written(PathBuf),
    Excluded(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub sample: SampleId,
    pub status: JobStatus,
}

/// Run every dispatched job, then return one outcome per flagged sample, ordered by id.
pub fn run_batch(
    ctx: &JobContext<'_>,
    plan: &DispatchPlan,
    workers: usize,
) -> Result<Vec<JobOutcome>, FitError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("fit-worker-{i}"))
        .build()
        .map_err(|e| FitError::WorkerPool(e.to_string()))?;

    info!(jobs = plan.dispatch.len(), workers = pool.current_num_threads(), "dispatching");

    let mut outcomes: Vec<JobOutcome> = pool.install(|| {
        plan.dispatch
            .par_iter()
            .map(|&sample| JobOutcome {
                sample,
                status: run_isolated(ctx, sample),
            })
            .collect()
    });

    outcomes.extend(plan.excluded.iter().map(|(sample, err)| JobOutcome {
        sample: *sample,
        status: JobStatus::Excluded(err.to_string()),
    }));
    outcomes.sort_by_key(|o| o.sample);

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.status, JobStatus::Failed(_)))
        .count();
    info!(
        written = plan.dispatch.len() - failed,
        failed,
        excluded = plan.excluded.len(),
        "batch complete"
    );
    Ok(outcomes)
}

fn run_isolated(ctx: &JobContext<'_>, sample: SampleId) -> JobStatus {
    let span = info_span!("job", sample_id = sample);
    let _guard = span.enter();

    match panic::catch_unwind(AssertUnwindSafe(|| run_job(ctx, sample))) {
        Ok(Ok(path)) => JobStatus::Written(path),
        Ok(Err(err)) => {
            error!(reason = %err, "job failed");
            JobStatus::Failed(err.to_string())
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(reason = %reason, "job panicked");
            JobStatus::Failed(format!("sample {sample}: job panicked: {reason}"))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
