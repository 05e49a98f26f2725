//! Background translation: the job itself, the scheduling seam it
//! requeues through, and the in-process queue and worker that run it.

pub mod notify;
pub mod queue;
pub mod scheduler;
pub mod translate;
pub mod worker;

pub use notify::{BroadcastNotifier, LogNotifier, Notification, NotificationKind, Notifier};
pub use queue::{JobQueue, QueuedRun};
pub use scheduler::{enqueue_bounded, JobKind, Scheduler, SchedulerError};
pub use translate::{JobRunReport, TranslationJob};
pub use worker::TranslationWorker;
