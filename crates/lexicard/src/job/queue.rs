//! In-process job queue with not-before times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::scheduler::{JobKind, Scheduler, SchedulerError};

/// One queued run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedRun {
    pub kind: JobKind,
    pub not_before: DateTime<Utc>,
}

/// Holds queued runs until a worker takes them. Enqueueing wakes a
/// waiting worker through a single-slot channel.
pub struct JobQueue {
    runs: Mutex<Vec<QueuedRun>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    closed: AtomicBool,
}

impl JobQueue {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            runs: Mutex::new(Vec::new()),
            wake_tx,
            wake_rx,
            closed: AtomicBool::new(false),
        }
    }

    fn wake(&self) {
        // A pending wake-up is as good as a new one
        let _ = self.wake_tx.try_send(());
    }

    /// Removes and returns the earliest run that is due at `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedRun>, SchedulerError> {
        let mut runs = self.runs.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        let due = runs
            .iter()
            .enumerate()
            .filter(|(_, run)| run.not_before <= now)
            .min_by_key(|(_, run)| run.not_before)
            .map(|(idx, _)| idx);
        Ok(due.map(|idx| runs.remove(idx)))
    }

    /// Earliest not-before time among queued runs.
    pub fn next_due(&self) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let runs = self.runs.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        Ok(runs.iter().map(|run| run.not_before).min())
    }

    /// Blocks until something is enqueued or `timeout` elapses. Returns
    /// true when woken.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Rejects further runs and wakes any waiting worker.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.runs.lock().map(|runs| runs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for JobQueue {
    fn enqueue(&self, kind: JobKind, not_before: Option<DateTime<Utc>>) -> Result<(), SchedulerError> {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        let run = QueuedRun {
            kind,
            not_before: not_before.unwrap_or_else(Utc::now),
        };
        self.runs
            .lock()
            .map_err(|_| SchedulerError::LockPoisoned)?
            .push(run);
        log::debug!("Queued {} run not before {}", kind, run.not_before);
        self.wake();
        Ok(())
    }

    fn count_queued(&self, kind: JobKind) -> Result<usize, SchedulerError> {
        let runs = self.runs.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        Ok(runs.iter().filter(|run| run.kind == kind).count())
    }
}
