//! The translation job: drains a batch of pending texts through the
//! gateway and arranges for the remaining work to continue.
//!
//! A run never fails as a whole. Gateway failures cost the text one
//! attempt. Database failures are logged and counted, and a text that hit
//! one is released so a later run can retry it. The outcome is summarised
//! in a [`JobRunReport`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::notify::{Notification, Notifier};
use super::scheduler::{enqueue_bounded, JobKind, Scheduler};
use crate::config::JobConfig;
use crate::db::{text_repo, Database, DatabaseError};
use crate::gateway::{GatewayError, TranslationGateway};
use crate::model::{NewWord, PendingText};

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunReport {
    /// Texts returned by the pending query.
    pub selected: usize,
    pub translated: usize,
    /// Failed attempts that left the text pending.
    pub soft_failed: usize,
    /// Failed attempts that reached the cap.
    pub exhausted: usize,
    /// Texts claimed by another run in the meantime.
    pub skipped: usize,
    /// Database errors.
    pub errors: usize,
    pub requeued_now: bool,
    pub requeued_later: bool,
}

impl JobRunReport {
    /// True when the run found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.selected == 0 && self.errors == 0
    }
}

enum TextOutcome {
    Translated,
    SoftFailed,
    Exhausted,
    Skipped,
}

pub struct TranslationJob {
    db: Database,
    gateway: Arc<dyn TranslationGateway>,
    scheduler: Arc<dyn Scheduler>,
    notifier: Arc<dyn Notifier>,
    config: JobConfig,
    token: String,
}

impl TranslationJob {
    pub fn new(
        db: Database,
        gateway: Arc<dyn TranslationGateway>,
        scheduler: Arc<dyn Scheduler>,
        notifier: Arc<dyn Notifier>,
        config: JobConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            scheduler,
            notifier,
            config,
            token: Uuid::new_v4().to_string(),
        }
    }

    /// Claim token written to the rows this job processes.
    pub fn token(&self) -> &str {
        &self.token
    }

    fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.config.claim_ttl_secs as i64)
    }

    /// Executes one run.
    pub async fn run(&self) -> JobRunReport {
        let span = info_span!("translate_texts", worker = %self.token);
        self.run_batch().instrument(span).await
    }

    async fn run_batch(&self) -> JobRunReport {
        info!("Translation run starting");
        let mut report = JobRunReport::default();

        let batch = match text_repo::select_pending_batch(
            &self.db,
            self.config.max_attempts,
            self.stale_before(Utc::now()),
            self.config.batch_size,
        ) {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to select pending texts: {}", e);
                report.errors += 1;
                return report;
            }
        };

        if batch.is_empty() {
            info!("No text to translate");
            return report;
        }
        report.selected = batch.len();

        for text in &batch {
            match self.process(text).await {
                Ok(TextOutcome::Translated) => report.translated += 1,
                Ok(TextOutcome::SoftFailed) => report.soft_failed += 1,
                Ok(TextOutcome::Exhausted) => report.exhausted += 1,
                Ok(TextOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!("Text #{} left unresolved: {}", text.id, e);
                    report.errors += 1;
                }
            }
        }

        self.schedule_follow_ups(&mut report);

        info!(
            selected = report.selected,
            translated = report.translated,
            soft_failed = report.soft_failed,
            exhausted = report.exhausted,
            skipped = report.skipped,
            "Translation run finished"
        );
        report
    }

    async fn process(&self, text: &PendingText) -> Result<TextOutcome, DatabaseError> {
        let now = Utc::now();
        if !text_repo::claim(
            &self.db,
            text.id,
            &self.token,
            self.config.max_attempts,
            now,
            self.stale_before(now),
        )? {
            debug!("Text #{} was claimed elsewhere, skipping", text.id);
            return Ok(TextOutcome::Skipped);
        }

        info!("Text #{} processing", text.id);

        match self.translate_claimed(text).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.release_after_error(text);
                Err(e)
            }
        }
    }

    async fn translate_claimed(&self, text: &PendingText) -> Result<TextOutcome, DatabaseError> {
        let result = self
            .gateway
            .translate(&text.body, &text.source_lang, &text.target_lang)
            .await
            .and_then(|words| {
                if words.is_empty() {
                    Err(GatewayError::Empty)
                } else {
                    Ok(words)
                }
            });

        match result {
            Ok(words) => {
                let words: Vec<NewWord> = words.into_iter().map(NewWord::from).collect();
                if !text_repo::complete_translation(&self.db, text.id, &self.token, &words)? {
                    warn!("Text #{} lost its claim before completion", text.id);
                    return Ok(TextOutcome::Skipped);
                }
                info!("Text #{} translated into {} words", text.id, words.len());
                self.notifier.notify(Notification::translation_confirmation(
                    text.creator_id,
                    text.activity_id,
                    text.id,
                    words.len(),
                ));
                Ok(TextOutcome::Translated)
            }
            Err(e) => {
                let attempts = match text_repo::record_failed_attempt(&self.db, text.id, &self.token)? {
                    Some(attempts) => attempts,
                    None => {
                        warn!("Text #{} lost its claim before the failure was recorded", text.id);
                        return Ok(TextOutcome::Skipped);
                    }
                };

                if attempts >= self.config.max_attempts {
                    error!(
                        "Text #{} could not be processed (tried {} times): {}",
                        text.id, attempts, e
                    );
                    self.notifier.notify(Notification::translation_error(
                        text.creator_id,
                        text.activity_id,
                        text.id,
                        attempts,
                    ));
                    Ok(TextOutcome::Exhausted)
                } else {
                    warn!(
                        "Text #{} could not be processed (attempt {} of {}): {}",
                        text.id, attempts, self.config.max_attempts, e
                    );
                    Ok(TextOutcome::SoftFailed)
                }
            }
        }
    }

    /// Gives the claim back after a database error so the next run can
    /// pick the text up again. The error costs the text one attempt.
    fn release_after_error(&self, text: &PendingText) {
        match text_repo::record_failed_attempt(&self.db, text.id, &self.token) {
            Ok(Some(attempts)) if attempts >= self.config.max_attempts => {
                error!("Text #{} given up after {} attempts", text.id, attempts);
                self.notifier.notify(Notification::translation_error(
                    text.creator_id,
                    text.activity_id,
                    text.id,
                    attempts,
                ));
            }
            Ok(Some(attempts)) => {
                warn!(
                    "Text #{} released after a database error (attempt {} of {})",
                    text.id, attempts, self.config.max_attempts
                );
            }
            Ok(None) => debug!("Text #{} was no longer claimed by this run", text.id),
            Err(e) => error!(
                "Text #{} keeps its claim until it goes stale: {}",
                text.id, e
            ),
        }
    }

    fn schedule_follow_ups(&self, report: &mut JobRunReport) {
        let max_queued = self.config.max_queued_runs as usize;

        if report.selected == self.config.batch_size as usize {
            match enqueue_bounded(self.scheduler.as_ref(), JobKind::TranslateTexts, None, max_queued) {
                Ok(true) => {
                    info!("Batch was full, scheduled an immediate run");
                    report.requeued_now = true;
                }
                Ok(false) => debug!("Batch was full but enough runs are queued"),
                Err(e) => error!("Failed to schedule a new run: {}", e),
            }
        }

        if report.soft_failed > 0 || report.errors > 0 {
            let not_before = Utc::now() + Duration::seconds(self.config.retry_delay_secs as i64);
            match enqueue_bounded(
                self.scheduler.as_ref(),
                JobKind::TranslateTexts,
                Some(not_before),
                max_queued,
            ) {
                Ok(true) => {
                    info!("Scheduled a retry run not before {}", not_before);
                    report.requeued_later = true;
                }
                Ok(false) => debug!("Retry needed but enough runs are queued"),
                Err(e) => error!("Failed to schedule a retry run: {}", e),
            }
        }
    }
}
