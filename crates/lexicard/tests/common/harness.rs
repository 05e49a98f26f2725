//! Test harness for translation and review scenarios.
//!
//! Collaborators are fakes that record what the code under test asked of
//! them:
//! - `FakeGateway` answers from a scripted queue
//! - `RecordingScheduler` keeps every enqueue call
//! - `RecordingNotifier` keeps every notification

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lexicard::config::JobConfig;
use lexicard::db::{selection_repo, text_repo, word_repo};
use lexicard::gateway::{GatewayError, TranslationGateway, WordResult};
use lexicard::job::{
    JobKind, JobRunReport, Notification, Notifier, Scheduler, SchedulerError, TranslationJob,
};
use lexicard::model::{Activity, ActivityId, NewActivity, Text, TextId, UserId, Word, WordId};
use lexicard::review::{MemorySessionStore, ReviewSession};
use lexicard::{Database, SelectionStore, TextIngestor};

/// One call received by the fake gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub text: String,
    pub source: String,
    pub target: String,
}

/// Gateway answering from a scripted response queue. Once the script is
/// exhausted every call fails.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<VecDeque<Result<Vec<WordResult>, GatewayError>>>,
    calls: Mutex<Vec<GatewayCall>>,
    delay: Option<Duration>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push_success(&self, words: Vec<WordResult>) {
        self.script.lock().unwrap().push_back(Ok(words));
    }

    pub fn push_failure(&self, error: GatewayError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TranslationGateway for FakeGateway {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<WordResult>, GatewayError> {
        self.calls.lock().unwrap().push(GatewayCall {
            text: text.to_string(),
            source: source_lang.to_string(),
            target: target_lang.to_string(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Request("script exhausted".to_string())))
    }
}

/// Scheduler keeping every enqueue call. Queued runs stay counted until
/// `start_next` takes one, the way a worker would.
#[derive(Default)]
pub struct RecordingScheduler {
    enqueued: Mutex<Vec<Option<DateTime<Utc>>>>,
    queued: Mutex<usize>,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `not_before` passed to `enqueue`, in call order.
    pub fn enqueued(&self) -> Vec<Option<DateTime<Utc>>> {
        self.enqueued.lock().unwrap().clone()
    }

    pub fn delayed_count(&self) -> usize {
        self.enqueued().iter().filter(|nb| nb.is_some()).count()
    }

    pub fn immediate_count(&self) -> usize {
        self.enqueued().iter().filter(|nb| nb.is_none()).count()
    }

    /// Marks one queued run as started. Returns false when none is queued.
    pub fn start_next(&self) -> bool {
        let mut queued = self.queued.lock().unwrap();
        if *queued == 0 {
            return false;
        }
        *queued -= 1;
        true
    }

    pub fn set_queued(&self, count: usize) {
        *self.queued.lock().unwrap() = count;
    }

    pub fn queued(&self) -> usize {
        *self.queued.lock().unwrap()
    }
}

impl Scheduler for RecordingScheduler {
    fn enqueue(&self, _kind: JobKind, not_before: Option<DateTime<Utc>>) -> Result<(), SchedulerError> {
        self.enqueued.lock().unwrap().push(not_before);
        *self.queued.lock().unwrap() += 1;
        Ok(())
    }

    fn count_queued(&self, _kind: JobKind) -> Result<usize, SchedulerError> {
        Ok(self.queued())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Isolated environment: in-memory database plus recording collaborators.
pub struct TestHarness {
    pub db: Database,
    pub gateway: Arc<FakeGateway>,
    pub scheduler: Arc<RecordingScheduler>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: JobConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(JobConfig::default())
    }

    pub fn with_config(config: JobConfig) -> Self {
        Self::with_gateway(FakeGateway::new(), config)
    }

    pub fn with_gateway(gateway: Arc<FakeGateway>, config: JobConfig) -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to open test database"),
            gateway,
            scheduler: RecordingScheduler::new(),
            notifier: RecordingNotifier::new(),
            config,
        }
    }

    pub fn ingestor(&self) -> TextIngestor {
        TextIngestor::new(self.db.clone(), self.scheduler.clone(), self.config.clone())
    }

    pub fn selections(&self) -> SelectionStore {
        SelectionStore::new(self.db.clone(), self.config.max_attempts)
    }

    pub fn review(&self, shuffle: bool) -> ReviewSession {
        ReviewSession::new(
            self.db.clone(),
            Arc::new(MemorySessionStore::new(Duration::from_secs(600))),
            shuffle,
        )
    }

    /// A fresh job instance with its own claim token.
    pub fn job(&self) -> TranslationJob {
        TranslationJob::new(
            self.db.clone(),
            self.gateway.clone(),
            self.scheduler.clone(),
            self.notifier.clone(),
            self.config.clone(),
        )
    }

    /// Takes a queued run, if any, and executes it.
    pub async fn run_job(&self) -> JobRunReport {
        self.scheduler.start_next();
        self.job().run().await
    }

    pub fn create_activity(&self, creator_id: UserId) -> Activity {
        self.ingestor()
            .create_activity(
                &NewActivity {
                    name: "Test activity".to_string(),
                    source_lang: "en".to_string(),
                    target_lang: "fr".to_string(),
                    creator_id,
                },
                &[],
            )
            .expect("Failed to create activity")
    }

    pub fn submit(&self, activity_id: ActivityId, body: &str) -> TextId {
        self.ingestor()
            .submit_text(activity_id, body)
            .expect("Failed to submit text")
    }

    pub fn text(&self, id: TextId) -> Text {
        text_repo::find_by_id(&self.db, id)
            .unwrap()
            .expect("text should exist")
    }

    pub fn words(&self, text_id: TextId) -> Vec<Word> {
        word_repo::list_for_text(&self.db, text_id).unwrap()
    }

    pub fn word_ids(&self, text_id: TextId) -> Vec<WordId> {
        self.words(text_id).iter().map(|w| w.id).collect()
    }

    pub fn counters(&self, user_id: UserId, activity_id: ActivityId, word_id: WordId) -> (u32, u32) {
        let selection = selection_repo::find(&self.db, user_id, activity_id, word_id)
            .unwrap()
            .expect("selection should exist");
        (selection.shown_count, selection.correct_count)
    }
}
