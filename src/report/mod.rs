//! Reporting utilities: batch summaries and formatted terminal output.

pub mod format;

pub use format::*;

use crate::fit::{JobOutcome, JobStatus};

/// Outcome counts of a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub excluded: usize,
    pub failed: usize,
}

pub fn summarize(outcomes: &[JobOutcome]) -> BatchSummary {
    outcomes
        .iter()
        .fold(BatchSummary::default(), |mut acc, o| {
            match o.status {
                JobStatus::Written(_) => acc.written += 1,
                JobStatus::Excluded(_) => acc.excluded += 1,
                JobStatus::Failed(_) => acc.failed += 1,
            }
            acc
        })
}
