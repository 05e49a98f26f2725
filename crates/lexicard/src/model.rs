//! Entity value types shared by the repositories, the translation job and
//! the review session.
//!
//! Rows are immutable values; state changes go through the builder
//! methods below, which return a new value for the repository to persist.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type ActivityId = i64;
pub type TextId = i64;
pub type WordId = i64;
pub type UserId = i64;

/// One configured vocabulary activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    /// Language of the submitted texts.
    pub source_lang: String,
    /// Language the words are translated into.
    pub target_lang: String,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Input for creating an activity.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub name: String,
    pub source_lang: String,
    pub target_lang: String,
    pub creator_id: UserId,
}

/// Translation lifecycle of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextState {
    /// Waiting for (another) translation attempt.
    Pending,
    /// Words have been stored.
    Translated,
    /// Attempts reached the cap; the creator has to delete and resubmit.
    Failed,
}

/// A submitted passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    pub id: TextId,
    pub activity_id: ActivityId,
    /// Cleaned HTML body.
    pub body: String,
    pub translated: bool,
    pub translation_attempts: u32,
    pub modified_at: DateTime<Utc>,
}

impl Text {
    pub fn state(&self, max_attempts: u32) -> TextState {
        if self.translated {
            TextState::Translated
        } else if self.translation_attempts >= max_attempts {
            TextState::Failed
        } else {
            TextState::Pending
        }
    }
}

/// A pending text together with what the gateway and notifier need from
/// its activity.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingText {
    pub id: TextId,
    pub activity_id: ActivityId,
    pub body: String,
    pub translation_attempts: u32,
    pub source_lang: String,
    pub target_lang: String,
    pub creator_id: UserId,
}

/// One segmented and translated token of a text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: WordId,
    pub text_id: TextId,
    /// Character offset of `source_raw` inside the text body.
    pub position: u32,
    pub source_raw: String,
    pub source_simplified: String,
    pub translated: String,
    pub category: Option<String>,
}

impl Word {
    /// Returns the slice of `body` this word was segmented from, or `None`
    /// when the offset or length falls outside the body.
    pub fn surface_in<'a>(&self, body: &'a str) -> Option<&'a str> {
        let start = char_to_byte(body, self.position as usize)?;
        let len = self.source_raw.chars().count();
        let end = start + char_to_byte(&body[start..], len)?;
        Some(&body[start..end])
    }
}

fn char_to_byte(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    match s.char_indices().nth(chars) {
        Some((idx, _)) => Some(idx),
        None if s.chars().count() == chars => Some(s.len()),
        None => None,
    }
}

/// A word waiting to be inserted with its text's batch.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWord {
    pub position: u32,
    pub source_raw: String,
    pub source_simplified: String,
    pub translated: String,
    pub category: Option<String>,
}

/// A user's choice to study a word.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub id: i64,
    pub user_id: UserId,
    pub activity_id: ActivityId,
    pub word_id: WordId,
    pub shown_count: u32,
    pub correct_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl Selection {
    /// Returns the selection after one explicit review answer.
    ///
    /// `shown_count` always grows, so `correct_count <= shown_count` holds.
    pub fn reviewed(&self, correct: bool, at: DateTime<Utc>) -> Self {
        Self {
            shown_count: self.shown_count + 1,
            correct_count: self.correct_count + u32::from(correct),
            last_reviewed_at: Some(at),
            ..self.clone()
        }
    }
}

/// A selected word joined with its translation, for the "my words" list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedWord {
    pub word_id: WordId,
    pub translated: String,
    pub source_simplified: String,
    pub shown_count: u32,
    pub correct_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}
