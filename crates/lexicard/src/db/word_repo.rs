//! Word repository: words are written once per translated text and never
//! updated.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};
use crate::model::{ActivityId, NewWord, TextId, Word, WordId};

fn from_row(row: &Row<'_>) -> Result<Word, rusqlite::Error> {
    Ok(Word {
        id: row.get("id")?,
        text_id: row.get("text_id")?,
        position: row.get("position")?,
        source_raw: row.get("source_raw")?,
        source_simplified: row.get("source_simplified")?,
        translated: row.get("translated")?,
        category: row.get("category")?,
    })
}

/// Inserts a text's word batch on an existing connection. Callers run
/// this inside the transaction that flips the text to translated.
pub fn insert_batch_with_conn(
    conn: &Connection,
    text_id: TextId,
    words: &[NewWord],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO words (text_id, position, source_raw, source_simplified, translated, category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for word in words {
        stmt.execute(params![
            text_id,
            word.position,
            word.source_raw,
            word.source_simplified,
            word.translated,
            word.category,
        ])?;
    }
    Ok(())
}

/// Finds a word by its ID.
pub fn find_by_id(db: &Database, id: WordId) -> Result<Option<Word>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM words WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(word)) => Ok(Some(word)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists the words of a text ordered by their position in the body.
pub fn list_for_text(db: &Database, text_id: TextId) -> Result<Vec<Word>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM words WHERE text_id = ?1 ORDER BY position, id")?;
        let words = stmt
            .query_map(params![text_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(words)
    })
}

/// Counts the words of a text.
pub fn count_for_text(db: &Database, text_id: TextId) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM words WHERE text_id = ?1",
            params![text_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Returns the subset of `ids` that are words of the given activity.
pub fn filter_in_activity(
    db: &Database,
    activity_id: ActivityId,
    ids: &[WordId],
) -> Result<Vec<WordId>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT w.id FROM words w
             INNER JOIN texts t ON w.text_id = t.id
             WHERE t.activity_id = ?1 AND w.id IN ({})",
            placeholders.join(", ")
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(activity_id));
        for &id in ids {
            param_values.push(Box::new(id));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_ref.as_slice(), |row| row.get::<_, WordId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(found)
    })
}
