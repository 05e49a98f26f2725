//! Selection repository: which words each user chose to learn, and the
//! review counters attached to those choices.

use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{ActivityId, SelectedWord, Selection, TextId, UserId, WordId};

fn from_row(row: &Row<'_>) -> Result<Selection, DatabaseError> {
    let last_reviewed_at: Option<String> = row.get("last_reviewed_at")?;
    Ok(Selection {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        activity_id: row.get("activity_id")?,
        word_id: row.get("word_id")?,
        shown_count: row.get("shown_count")?,
        correct_count: row.get("correct_count")?,
        last_reviewed_at: last_reviewed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

/// Inserts selections for the given words. Already selected words are
/// ignored. Returns the number of rows inserted.
pub fn insert_many(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
    word_ids: &[WordId],
) -> Result<usize, DatabaseError> {
    db.with_transaction(|conn| insert_many_with_conn(conn, user_id, activity_id, word_ids))
}

pub fn insert_many_with_conn(
    conn: &Connection,
    user_id: UserId,
    activity_id: ActivityId,
    word_ids: &[WordId],
) -> Result<usize, DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO selections (user_id, activity_id, word_id)
         VALUES (?1, ?2, ?3)",
    )?;
    let mut inserted = 0;
    for &word_id in word_ids {
        inserted += stmt.execute(params![user_id, activity_id, word_id])?;
    }
    Ok(inserted)
}

/// Deletes the user's selections of the given words. Returns the number
/// of rows deleted.
pub fn delete_many(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
    word_ids: &[WordId],
) -> Result<usize, DatabaseError> {
    db.with_transaction(|conn| delete_many_with_conn(conn, user_id, activity_id, word_ids))
}

pub fn delete_many_with_conn(
    conn: &Connection,
    user_id: UserId,
    activity_id: ActivityId,
    word_ids: &[WordId],
) -> Result<usize, DatabaseError> {
    let mut stmt = conn.prepare(
        "DELETE FROM selections WHERE user_id = ?1 AND activity_id = ?2 AND word_id = ?3",
    )?;
    let mut deleted = 0;
    for &word_id in word_ids {
        deleted += stmt.execute(params![user_id, activity_id, word_id])?;
    }
    Ok(deleted)
}

/// Whether the user has selected any word in the activity.
pub fn exists_for_user(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM selections WHERE user_id = ?1 AND activity_id = ?2)",
            params![user_id, activity_id],
            |r| r.get(0),
        )?;
        Ok(exists)
    })
}

/// Returns the user's selected word IDs, least recently reviewed first
/// (never reviewed words lead).
pub fn word_ids_for_user(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
) -> Result<Vec<WordId>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT word_id FROM selections
             WHERE user_id = ?1 AND activity_id = ?2
             ORDER BY last_reviewed_at IS NOT NULL, last_reviewed_at, id",
        )?;
        let ids = stmt
            .query_map(params![user_id, activity_id], |row| row.get::<_, WordId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Like [`word_ids_for_user`], paired with whether the word has been
/// reviewed before.
pub fn review_order(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
) -> Result<Vec<(WordId, bool)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT word_id, last_reviewed_at IS NOT NULL FROM selections
             WHERE user_id = ?1 AND activity_id = ?2
             ORDER BY last_reviewed_at IS NOT NULL, last_reviewed_at, id",
        )?;
        let rows: Vec<(WordId, bool)> = stmt
            .query_map(params![user_id, activity_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds one selection.
pub fn find(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
    word_id: WordId,
) -> Result<Option<Selection>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM selections WHERE user_id = ?1 AND activity_id = ?2 AND word_id = ?3",
        )?;
        let mut rows = stmt.query(params![user_id, activity_id, word_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    })
}

/// Persists the review counters of a selection built with
/// [`Selection::reviewed`]. Returns false when the row is gone.
pub fn record_review(db: &Database, selection: &Selection) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE selections SET shown_count = ?2, correct_count = ?3, last_reviewed_at = ?4
             WHERE id = ?1",
            params![
                selection.id,
                selection.shown_count,
                selection.correct_count,
                selection.last_reviewed_at.map(format_timestamp),
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Lists the user's selected words with their translations.
pub fn list_selected_words(
    db: &Database,
    user_id: UserId,
    activity_id: ActivityId,
) -> Result<Vec<SelectedWord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT w.id, w.translated, w.source_simplified,
                    s.shown_count, s.correct_count, s.last_reviewed_at
             FROM selections s
             INNER JOIN words w ON s.word_id = w.id
             WHERE s.user_id = ?1 AND s.activity_id = ?2
             ORDER BY w.text_id, w.position",
        )?;
        let mut rows = stmt.query(params![user_id, activity_id])?;
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            let last_reviewed_at: Option<String> = row.get(5)?;
            words.push(SelectedWord {
                word_id: row.get(0)?,
                translated: row.get(1)?,
                source_simplified: row.get(2)?,
                shown_count: row.get(3)?,
                correct_count: row.get(4)?,
                last_reviewed_at: last_reviewed_at.as_deref().map(parse_timestamp).transpose()?,
            });
        }
        Ok(words)
    })
}

/// Counts the distinct users who selected at least one word of a text.
pub fn count_users_for_text(db: &Database, text_id: TextId) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(DISTINCT s.user_id)
             FROM selections s
             INNER JOIN words w ON s.word_id = w.id
             WHERE w.text_id = ?1",
            params![text_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Per-word selection count for one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSelectionCount {
    pub word_id: WordId,
    pub position: u32,
    pub source_raw: String,
    pub users: u64,
}

/// Lists the selected words of a text with how many users chose each,
/// in body order. Words nobody selected are omitted.
pub fn word_selection_counts(
    db: &Database,
    text_id: TextId,
) -> Result<Vec<WordSelectionCount>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT w.id, w.position, w.source_raw, COUNT(s.user_id)
             FROM words w
             INNER JOIN selections s ON s.word_id = w.id
             WHERE w.text_id = ?1
             GROUP BY w.id
             ORDER BY w.position, w.id",
        )?;
        let rows = stmt
            .query_map(params![text_id], |row| {
                Ok(WordSelectionCount {
                    word_id: row.get(0)?,
                    position: row.get(1)?,
                    source_raw: row.get(2)?,
                    users: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
