//! Flashcard review over a user's selected words.
//!
//! A session is created on first access, moves a cursor through the
//! ordered word list and ends when the cursor leaves either end. Counters
//! only change on an explicit answer, never on display.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use serde::Serialize;

use super::store::{ReviewState, SessionStore};
use super::ReviewError;
use crate::db::{selection_repo, word_repo, Database};
use crate::model::{ActivityId, UserId, WordId};

/// Which way the cursor moved to reach a card. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub word_id: WordId,
    /// Simplified source form.
    pub front: String,
    /// Translation.
    pub back: String,
    pub source_raw: String,
    /// Zero-based position in the session.
    pub index: usize,
    pub total: usize,
    pub direction: Direction,
}

/// Result of a review action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum ReviewStep {
    Card(Flashcard),
    /// The cursor left the word list; the session is gone.
    Finished,
    /// A word or selection vanished mid-review, or the session expired;
    /// the session is gone.
    Interrupted,
}

pub struct ReviewSession {
    db: Database,
    store: Arc<dyn SessionStore>,
    shuffle: bool,
}

impl ReviewSession {
    pub fn new(db: Database, store: Arc<dyn SessionStore>, shuffle: bool) -> Self {
        Self { db, store, shuffle }
    }

    /// Shows the current card, starting a session if none is active.
    pub fn show(&self, user_id: UserId, activity_id: ActivityId) -> Result<ReviewStep, ReviewError> {
        let state = match self.store.get(user_id, activity_id) {
            Some(state) => state,
            None => self.start(user_id, activity_id)?,
        };
        self.card_at(user_id, activity_id, &state, Direction::Forward)
    }

    fn start(&self, user_id: UserId, activity_id: ActivityId) -> Result<ReviewState, ReviewError> {
        let order = selection_repo::review_order(&self.db, user_id, activity_id)?;
        if order.is_empty() {
            return Err(ReviewError::NothingToReview {
                user_id,
                activity_id,
            });
        }
        let never_reviewed = order.iter().take_while(|(_, reviewed)| !reviewed).count();
        let mut word_ids: Vec<WordId> = order.into_iter().map(|(id, _)| id).collect();
        if self.shuffle {
            // shuffled within each band so unseen words still come first
            let mut rng = rand::thread_rng();
            let (fresh, seen) = word_ids.split_at_mut(never_reviewed);
            fresh.shuffle(&mut rng);
            seen.shuffle(&mut rng);
        }

        info!(
            "Review session started for user {} in activity {} ({} words)",
            user_id,
            activity_id,
            word_ids.len()
        );
        let state = ReviewState { word_ids, cursor: 0 };
        self.store.put(user_id, activity_id, state.clone());
        Ok(state)
    }

    /// Moves back one card. Leaving the first card ends the session.
    pub fn previous(&self, user_id: UserId, activity_id: ActivityId) -> Result<ReviewStep, ReviewError> {
        let Some(mut state) = self.store.get(user_id, activity_id) else {
            debug!("No review session for user {} in activity {}", user_id, activity_id);
            return Ok(ReviewStep::Interrupted);
        };

        if state.cursor == 0 {
            self.store.remove(user_id, activity_id);
            return Ok(ReviewStep::Finished);
        }

        state.cursor -= 1;
        self.store.put(user_id, activity_id, state.clone());
        self.card_at(user_id, activity_id, &state, Direction::Backward)
    }

    /// Records the answer for the current card and moves forward. Leaving
    /// the last card ends the session.
    pub fn answer(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
        correct: bool,
    ) -> Result<ReviewStep, ReviewError> {
        let Some(mut state) = self.store.get(user_id, activity_id) else {
            debug!("No review session for user {} in activity {}", user_id, activity_id);
            return Ok(ReviewStep::Interrupted);
        };
        let Some(&word_id) = state.word_ids.get(state.cursor) else {
            return Ok(self.interrupt(user_id, activity_id));
        };

        let Some(selection) = selection_repo::find(&self.db, user_id, activity_id, word_id)? else {
            return Ok(self.interrupt(user_id, activity_id));
        };
        if !selection_repo::record_review(&self.db, &selection.reviewed(correct, Utc::now()))? {
            return Ok(self.interrupt(user_id, activity_id));
        }

        state.cursor += 1;
        if state.cursor >= state.word_ids.len() {
            self.store.remove(user_id, activity_id);
            info!("Review session finished for user {} in activity {}", user_id, activity_id);
            return Ok(ReviewStep::Finished);
        }

        self.store.put(user_id, activity_id, state.clone());
        self.card_at(user_id, activity_id, &state, Direction::Forward)
    }

    pub fn next_correct(&self, user_id: UserId, activity_id: ActivityId) -> Result<ReviewStep, ReviewError> {
        self.answer(user_id, activity_id, true)
    }

    pub fn next_wrong(&self, user_id: UserId, activity_id: ActivityId) -> Result<ReviewStep, ReviewError> {
        self.answer(user_id, activity_id, false)
    }

    /// Drops the session without touching any counter.
    pub fn abandon(&self, user_id: UserId, activity_id: ActivityId) {
        self.store.remove(user_id, activity_id);
    }

    fn interrupt(&self, user_id: UserId, activity_id: ActivityId) -> ReviewStep {
        warn!(
            "Review data changed under user {} in activity {}, ending session",
            user_id, activity_id
        );
        self.store.remove(user_id, activity_id);
        ReviewStep::Interrupted
    }

    fn card_at(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
        state: &ReviewState,
        direction: Direction,
    ) -> Result<ReviewStep, ReviewError> {
        let Some(&word_id) = state.word_ids.get(state.cursor) else {
            return Ok(self.interrupt(user_id, activity_id));
        };
        let Some(word) = word_repo::find_by_id(&self.db, word_id)? else {
            return Ok(self.interrupt(user_id, activity_id));
        };
        if selection_repo::find(&self.db, user_id, activity_id, word_id)?.is_none() {
            return Ok(self.interrupt(user_id, activity_id));
        }

        Ok(ReviewStep::Card(Flashcard {
            word_id,
            front: word.source_simplified,
            back: word.translated,
            source_raw: word.source_raw,
            index: state.cursor,
            total: state.word_ids.len(),
            direction,
        }))
    }
}
