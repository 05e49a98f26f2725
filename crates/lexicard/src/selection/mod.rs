//! Selection store: which words each user chose to learn.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;

use crate::db::{selection_repo, text_repo, word_repo, Database, DatabaseError};
use crate::ingest::ActivityStatus;
use crate::model::{ActivityId, SelectedWord, Text, UserId, Word, WordId};

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Invalid word list: {0}")]
    InvalidWordList(String),

    #[error("Activity is not ready for word selection ({0:?})")]
    NotReady(ActivityStatus),

    #[error("User {user_id} already selected words in activity {activity_id}")]
    AlreadySelected {
        user_id: UserId,
        activity_id: ActivityId,
    },

    #[error("User {user_id} has no selection in activity {activity_id}")]
    NoSelection {
        user_id: UserId,
        activity_id: ActivityId,
    },

    #[error("Words {0:?} do not belong to this activity")]
    ForeignWords(Vec<WordId>),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Parses a comma separated list of word IDs. Duplicates are dropped,
/// order is kept.
pub fn parse_word_ids(input: &str) -> Result<Vec<WordId>, SelectionError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: WordId = part
            .parse()
            .map_err(|_| SelectionError::InvalidWordList(format!("'{}' is not a word ID", part)))?;
        if id <= 0 {
            return Err(SelectionError::InvalidWordList(format!(
                "'{}' is not a word ID",
                part
            )));
        }
        if seen.insert(id) {
            ids.push(id);
        }
    }

    if ids.is_empty() {
        return Err(SelectionError::InvalidWordList("no word selected".to_string()));
    }
    Ok(ids)
}

/// What changed when a selection was edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionDiff {
    pub inserted: Vec<WordId>,
    pub removed: Vec<WordId>,
}

/// A translated text with its words in body order, as offered for word
/// selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionText {
    pub text: Text,
    pub words: Vec<Word>,
    /// Words of this text the user already selected.
    pub selected: Vec<WordId>,
}

pub struct SelectionStore {
    db: Database,
    max_attempts: u32,
}

impl SelectionStore {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        Self { db, max_attempts }
    }

    fn ensure_owned(&self, activity_id: ActivityId, word_ids: &[WordId]) -> Result<(), SelectionError> {
        let found: HashSet<WordId> = word_repo::filter_in_activity(&self.db, activity_id, word_ids)?
            .into_iter()
            .collect();
        let foreign: Vec<WordId> = word_ids
            .iter()
            .copied()
            .filter(|id| !found.contains(id))
            .collect();
        if !foreign.is_empty() {
            return Err(SelectionError::ForeignWords(foreign));
        }
        Ok(())
    }

    /// Stores a user's first selection. Only allowed while the activity
    /// is ready and the user has not selected anything yet.
    pub fn submit_initial(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
        word_ids: &[WordId],
    ) -> Result<usize, SelectionError> {
        let counts = text_repo::count_by_state(&self.db, activity_id, self.max_attempts)?;
        let status = ActivityStatus::from_counts(&counts);
        if status != ActivityStatus::Ready {
            return Err(SelectionError::NotReady(status));
        }
        if selection_repo::exists_for_user(&self.db, user_id, activity_id)? {
            return Err(SelectionError::AlreadySelected {
                user_id,
                activity_id,
            });
        }
        if word_ids.is_empty() {
            return Err(SelectionError::InvalidWordList("no word selected".to_string()));
        }
        self.ensure_owned(activity_id, word_ids)?;

        let inserted = selection_repo::insert_many(&self.db, user_id, activity_id, word_ids)?;
        log::info!(
            "User {} selected {} words in activity {}",
            user_id,
            inserted,
            activity_id
        );
        Ok(inserted)
    }

    /// Replaces the user's selection with `word_ids`, inserting the new
    /// words and deleting the dropped ones. Review counters of kept words
    /// are preserved.
    pub fn edit_selection(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
        word_ids: &[WordId],
    ) -> Result<SelectionDiff, SelectionError> {
        let current = selection_repo::word_ids_for_user(&self.db, user_id, activity_id)?;
        if current.is_empty() {
            return Err(SelectionError::NoSelection {
                user_id,
                activity_id,
            });
        }
        self.ensure_owned(activity_id, word_ids)?;

        let current_set: HashSet<WordId> = current.iter().copied().collect();
        let wanted: HashSet<WordId> = word_ids.iter().copied().collect();

        let mut diff = SelectionDiff {
            inserted: word_ids
                .iter()
                .copied()
                .filter(|id| !current_set.contains(id))
                .collect(),
            removed: current
                .iter()
                .copied()
                .filter(|id| !wanted.contains(id))
                .collect(),
        };
        diff.removed.sort_unstable();

        self.db.with_transaction(|conn| {
            selection_repo::insert_many_with_conn(conn, user_id, activity_id, &diff.inserted)?;
            selection_repo::delete_many_with_conn(conn, user_id, activity_id, &diff.removed)?;
            Ok(())
        })?;
        Ok(diff)
    }

    pub fn has_selection(&self, user_id: UserId, activity_id: ActivityId) -> Result<bool, SelectionError> {
        Ok(selection_repo::exists_for_user(&self.db, user_id, activity_id)?)
    }

    pub fn list_selected_words(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
    ) -> Result<Vec<SelectedWord>, SelectionError> {
        Ok(selection_repo::list_selected_words(&self.db, user_id, activity_id)?)
    }

    /// Picks a random translated text of the activity for a user who has
    /// not selected words yet.
    pub fn pick_text_for_selection(
        &self,
        activity_id: ActivityId,
    ) -> Result<Option<SelectionText>, SelectionError> {
        let ids = text_repo::translated_ids(&self.db, activity_id)?;
        let Some(&text_id) = ids.choose(&mut rand::thread_rng()) else {
            return Ok(None);
        };
        self.load_text(text_id, Vec::new())
    }

    /// The text the user selected words from, with the current selection
    /// marked, for editing.
    pub fn text_for_edit(
        &self,
        user_id: UserId,
        activity_id: ActivityId,
    ) -> Result<Option<SelectionText>, SelectionError> {
        let selected = selection_repo::word_ids_for_user(&self.db, user_id, activity_id)?;
        let Some(&first) = selected.iter().min() else {
            return Ok(None);
        };
        let Some(word) = word_repo::find_by_id(&self.db, first)? else {
            return Ok(None);
        };
        self.load_text(word.text_id, selected)
    }

    fn load_text(
        &self,
        text_id: crate::model::TextId,
        selected: Vec<WordId>,
    ) -> Result<Option<SelectionText>, SelectionError> {
        let Some(text) = text_repo::find_by_id(&self.db, text_id)? else {
            return Ok(None);
        };
        let words = word_repo::list_for_text(&self.db, text_id)?;
        let in_text: HashSet<WordId> = words.iter().map(|w| w.id).collect();
        let mut selected: Vec<WordId> = selected.into_iter().filter(|id| in_text.contains(id)).collect();
        selected.sort_unstable();
        Ok(Some(SelectionText {
            text,
            words,
            selected,
        }))
    }
}
