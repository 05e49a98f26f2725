//! Text ingestion: activity lifecycle and text submission.
//!
//! Every stored text starts pending and a translation run is queued for
//! it, bounded by the same queued-run limit the job uses for itself.

pub mod clean;

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::config::JobConfig;
use crate::db::text_repo::StateCounts;
use crate::db::{activity_repo, text_repo, Database, DatabaseError};
use crate::job::{enqueue_bounded, JobKind, Scheduler};
use crate::model::{Activity, ActivityId, NewActivity, Text, TextId, TextState};

pub use clean::{clean_text, visible_text};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Text is empty after cleaning")]
    EmptyText,

    #[error("Invalid language code '{0}'")]
    InvalidLanguage(String),

    #[error("Activity {0} not found")]
    ActivityNotFound(ActivityId),

    #[error("Text {0} not found")]
    TextNotFound(TextId),

    #[error("Text {text_id} does not belong to activity {activity_id}")]
    AccessDenied {
        text_id: TextId,
        activity_id: ActivityId,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Whether an activity's words can be studied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivityStatus {
    /// No text was submitted.
    Empty,
    /// Texts are still waiting for translation.
    Pending { pending: u32 },
    /// Nothing was translated and every text gave up.
    Failed { failed: u32 },
    /// No text is pending and at least one is translated.
    Ready,
}

impl ActivityStatus {
    pub fn from_counts(counts: &StateCounts) -> Self {
        if counts.total() == 0 {
            ActivityStatus::Empty
        } else if counts.pending > 0 {
            ActivityStatus::Pending {
                pending: counts.pending,
            }
        } else if counts.translated == 0 {
            ActivityStatus::Failed {
                failed: counts.failed,
            }
        } else {
            ActivityStatus::Ready
        }
    }
}

/// A text together with its translation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverview {
    pub text: Text,
    pub state: TextState,
}

/// A primary language subtag with optional region or script subtags,
/// such as `es`, `pt-BR` or `zh_Hant`.
static RE_LANGUAGE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{1,8})*$").unwrap());

fn is_language_code(code: &str) -> bool {
    RE_LANGUAGE_CODE.is_match(code)
}

/// Stores activities and texts and triggers their translation.
pub struct TextIngestor {
    db: Database,
    scheduler: Arc<dyn Scheduler>,
    config: JobConfig,
}

impl TextIngestor {
    pub fn new(db: Database, scheduler: Arc<dyn Scheduler>, config: JobConfig) -> Self {
        Self {
            db,
            scheduler,
            config,
        }
    }

    /// Creates an activity with its initial texts. Blank texts are
    /// dropped.
    pub fn create_activity(
        &self,
        activity: &NewActivity,
        texts: &[String],
    ) -> Result<Activity, IngestError> {
        for code in [&activity.source_lang, &activity.target_lang] {
            if !is_language_code(code) {
                return Err(IngestError::InvalidLanguage(code.clone()));
            }
        }

        let bodies: Vec<String> = texts.iter().filter_map(|t| clean_text(t)).collect();
        let now = Utc::now();

        let created = self.db.with_transaction(|conn| {
            let created = activity_repo::insert_with_conn(conn, activity, now)?;
            for body in &bodies {
                text_repo::insert_with_conn(conn, created.id, body, now)?;
            }
            Ok(created)
        })?;

        info!(
            "Created activity {} ({} -> {}) with {} texts",
            created.id,
            created.source_lang,
            created.target_lang,
            bodies.len()
        );

        if !bodies.is_empty() {
            self.queue_translation();
        }
        Ok(created)
    }

    /// Renames an activity. `texts` are inserted only if the activity has
    /// no text yet. Returns the number of texts inserted.
    pub fn update_activity(
        &self,
        activity_id: ActivityId,
        name: &str,
        texts: &[String],
    ) -> Result<usize, IngestError> {
        let now = Utc::now();
        if !activity_repo::update_metadata(&self.db, activity_id, name, now)? {
            return Err(IngestError::ActivityNotFound(activity_id));
        }

        if text_repo::exists_for_activity(&self.db, activity_id)? {
            return Ok(0);
        }

        let bodies: Vec<String> = texts.iter().filter_map(|t| clean_text(t)).collect();
        if bodies.is_empty() {
            return Ok(0);
        }

        self.db.with_transaction(|conn| {
            for body in &bodies {
                text_repo::insert_with_conn(conn, activity_id, body, now)?;
            }
            Ok(())
        })?;
        self.queue_translation();
        Ok(bodies.len())
    }

    /// Deletes an activity with its texts, words and selections.
    pub fn delete_activity(&self, activity_id: ActivityId) -> Result<(), IngestError> {
        if !activity_repo::delete(&self.db, activity_id)? {
            return Err(IngestError::ActivityNotFound(activity_id));
        }
        info!("Deleted activity {}", activity_id);
        Ok(())
    }

    /// Cleans and stores one text, then queues a translation run.
    pub fn submit_text(&self, activity_id: ActivityId, raw: &str) -> Result<TextId, IngestError> {
        let body = clean_text(raw).ok_or(IngestError::EmptyText)?;

        if activity_repo::find_by_id(&self.db, activity_id)?.is_none() {
            return Err(IngestError::ActivityNotFound(activity_id));
        }

        let id = text_repo::insert(&self.db, activity_id, &body, Utc::now())?;
        info!("Text #{} submitted to activity {}", id, activity_id);

        self.queue_translation();
        Ok(id)
    }

    /// Deletes a text of `activity_id`; its words and their selections go
    /// with it.
    pub fn delete_text(&self, activity_id: ActivityId, text_id: TextId) -> Result<(), IngestError> {
        match text_repo::find_owner(&self.db, text_id)? {
            None => return Err(IngestError::TextNotFound(text_id)),
            Some(owner) if owner != activity_id => {
                return Err(IngestError::AccessDenied {
                    text_id,
                    activity_id,
                })
            }
            Some(_) => {}
        }

        text_repo::delete(&self.db, text_id)?;
        info!("Text #{} deleted from activity {}", text_id, activity_id);
        Ok(())
    }

    /// Lists an activity's texts with their translation state.
    pub fn list_texts(&self, activity_id: ActivityId) -> Result<Vec<TextOverview>, IngestError> {
        let texts = text_repo::list_for_activity(&self.db, activity_id)?;
        Ok(texts
            .into_iter()
            .map(|text| TextOverview {
                state: text.state(self.config.max_attempts),
                text,
            })
            .collect())
    }

    /// Summarises whether the activity is ready for word selection.
    pub fn translation_status(&self, activity_id: ActivityId) -> Result<ActivityStatus, IngestError> {
        let counts = text_repo::count_by_state(&self.db, activity_id, self.config.max_attempts)?;
        Ok(ActivityStatus::from_counts(&counts))
    }

    fn queue_translation(&self) {
        match enqueue_bounded(
            self.scheduler.as_ref(),
            JobKind::TranslateTexts,
            None,
            self.config.max_queued_runs as usize,
        ) {
            Ok(true) => info!("Queued a translation run"),
            Ok(false) => {}
            // the text stays pending and is picked up by the next run
            Err(e) => warn!("Failed to queue a translation run: {}", e),
        }
    }
}
