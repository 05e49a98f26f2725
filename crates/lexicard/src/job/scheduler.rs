//! Scheduling seam between the translation job and whatever runs it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Kinds of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TranslateTexts,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::TranslateTexts => write!(f, "translate_texts"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Job queue is closed")]
    Closed,

    #[error("Job queue lock poisoned")]
    LockPoisoned,
}

/// Accepts units of work and reports how many are waiting.
pub trait Scheduler: Send + Sync {
    /// Queues a run of `kind`, due immediately or not before `not_before`.
    fn enqueue(&self, kind: JobKind, not_before: Option<DateTime<Utc>>) -> Result<(), SchedulerError>;

    /// Number of queued runs of `kind` that have not started yet.
    fn count_queued(&self, kind: JobKind) -> Result<usize, SchedulerError>;
}

/// Queues a run unless `max_queued` runs of the same kind are already
/// waiting. Returns whether a run was queued.
///
/// The count and the enqueue are two calls, so concurrent callers may
/// overshoot by one. Row claims keep that harmless.
pub fn enqueue_bounded(
    scheduler: &dyn Scheduler,
    kind: JobKind,
    not_before: Option<DateTime<Utc>>,
    max_queued: usize,
) -> Result<bool, SchedulerError> {
    if scheduler.count_queued(kind)? >= max_queued {
        return Ok(false);
    }
    scheduler.enqueue(kind, not_before)?;
    Ok(true)
}
