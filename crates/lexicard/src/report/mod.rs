//! Usage report: which words of each translated text users chose.

use serde::Serialize;

use crate::db::selection_repo::{self, WordSelectionCount};
use crate::db::{text_repo, Database, DatabaseError};
use crate::model::{ActivityId, TextId};

/// Usage of one translated text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextUsage {
    pub text_id: TextId,
    pub body: String,
    /// Distinct users who selected at least one word of the text.
    pub users: u64,
    /// Selected words in body order, with how many users chose each.
    pub words: Vec<WordUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordUsage {
    pub position: u32,
    pub source_raw: String,
    pub users: u64,
}

impl From<WordSelectionCount> for WordUsage {
    fn from(count: WordSelectionCount) -> Self {
        Self {
            position: count.position,
            source_raw: count.source_raw,
            users: count.users,
        }
    }
}

/// Builds the report for every translated text of an activity. Returns
/// `None` when nothing has been translated yet.
pub fn usage_report(db: &Database, activity_id: ActivityId) -> Result<Option<Vec<TextUsage>>, DatabaseError> {
    let texts: Vec<_> = text_repo::list_for_activity(db, activity_id)?
        .into_iter()
        .filter(|text| text.translated)
        .collect();
    if texts.is_empty() {
        return Ok(None);
    }

    let mut report = Vec::with_capacity(texts.len());
    for text in texts {
        report.push(TextUsage {
            users: selection_repo::count_users_for_text(db, text.id)?,
            words: selection_repo::word_selection_counts(db, text.id)?
                .into_iter()
                .map(WordUsage::from)
                .collect(),
            text_id: text.id,
            body: text.body,
        });
    }
    Ok(Some(report))
}
