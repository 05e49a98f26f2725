//! Single background worker draining the [`JobQueue`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info};

use super::queue::JobQueue;
use super::scheduler::JobKind;
use super::translate::TranslationJob;

/// Longest time the worker sleeps before re-checking the queue.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs queued translation runs one at a time on a dedicated thread.
pub struct TranslationWorker {
    queue: Arc<JobQueue>,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl TranslationWorker {
    /// Spawns the worker thread.
    pub fn start(job: TranslationJob, queue: Arc<JobQueue>) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let worker_queue = Arc::clone(&queue);

        let handle = thread::Builder::new()
            .name("translation-worker".to_string())
            .spawn(move || run_worker(job, worker_queue, shutdown_flag))?;

        info!("Translation worker started");

        Ok(Self {
            queue,
            shutdown,
            handle,
        })
    }

    /// Asks the worker to stop after the run in progress.
    pub fn shutdown(&self) {
        info!("Shutting down translation worker...");
        self.shutdown.store(true, Ordering::Release);
        self.queue.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Waits for the worker thread to exit.
    pub fn wait(self) {
        if let Err(e) = self.handle.join() {
            error!("Translation worker panicked: {:?}", e);
        } else {
            info!("Translation worker has stopped");
        }
    }
}

fn run_worker(job: TranslationJob, queue: Arc<JobQueue>, shutdown: Arc<AtomicBool>) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start worker runtime: {}", e);
            return;
        }
    };

    debug!("Translation worker loop started");

    loop {
        if shutdown.load(Ordering::Acquire) {
            debug!("Translation worker received shutdown signal");
            break;
        }

        let now = Utc::now();
        match queue.take_due(now) {
            Ok(Some(run)) => {
                match run.kind {
                    JobKind::TranslateTexts => {
                        let report = rt.block_on(job.run());
                        debug!("Run finished: {:?}", report);
                    }
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Job queue unavailable: {}", e);
                break;
            }
        }

        let wait = match queue.next_due() {
            Ok(Some(at)) => (at - now).to_std().unwrap_or(Duration::ZERO).min(POLL_INTERVAL),
            _ => POLL_INTERVAL,
        };
        queue.wait_for_work(wait);
    }

    debug!("Translation worker loop stopped");
}
