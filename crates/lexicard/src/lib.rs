pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod job;
pub mod logging;
pub mod model;
pub mod report;
pub mod review;
pub mod selection;

pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, LexicardError, Result};
pub use gateway::{GatewayError, HttpGateway, TranslationGateway, WordResult};
pub use ingest::{ActivityStatus, IngestError, TextIngestor};
pub use job::{
    JobKind, JobQueue, JobRunReport, Notifier, Scheduler, SchedulerError, TranslationJob,
    TranslationWorker,
};
pub use review::{MemorySessionStore, ReviewError, ReviewSession, ReviewStep, SessionStore};
pub use selection::{SelectionError, SelectionStore};
