//! Text repository: storage and translation bookkeeping for the `texts`
//! table.
//!
//! The translation job never updates a text it has not claimed. A claim
//! is a conditional UPDATE that only succeeds while the text is still
//! pending and unclaimed (or its previous claim went stale), so two
//! workers can never translate the same row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_timestamp, word_repo, Database, DatabaseError};
use crate::model::{ActivityId, NewWord, PendingText, Text, TextId};

fn from_row(row: &Row<'_>) -> Result<Text, DatabaseError> {
    let modified_at: String = row.get("modified_at")?;
    Ok(Text {
        id: row.get("id")?,
        activity_id: row.get("activity_id")?,
        body: row.get("body")?,
        translated: row.get("translated")?,
        translation_attempts: row.get("translation_attempts")?,
        modified_at: parse_timestamp(&modified_at)?,
    })
}

/// Inserts a pending text on an existing connection.
pub fn insert_with_conn(
    conn: &Connection,
    activity_id: ActivityId,
    body: &str,
    now: DateTime<Utc>,
) -> Result<TextId, DatabaseError> {
    conn.execute(
        "INSERT INTO texts (activity_id, body, translated, translation_attempts, modified_at)
         VALUES (?1, ?2, 0, 0, ?3)",
        params![activity_id, body, format_timestamp(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a pending text (`translated = false`, no attempts yet).
pub fn insert(
    db: &Database,
    activity_id: ActivityId,
    body: &str,
    now: DateTime<Utc>,
) -> Result<TextId, DatabaseError> {
    db.with_conn(|conn| insert_with_conn(conn, activity_id, body, now))
}

/// Finds a text by its ID.
pub fn find_by_id(db: &Database, id: TextId) -> Result<Option<Text>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, activity_id, body, translated, translation_attempts, modified_at
             FROM texts WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    })
}

/// Lists the texts of an activity in submission order.
pub fn list_for_activity(db: &Database, activity_id: ActivityId) -> Result<Vec<Text>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, activity_id, body, translated, translation_attempts, modified_at
             FROM texts WHERE activity_id = ?1 ORDER BY id",
        )?;
        let mut rows = stmt.query(params![activity_id])?;
        let mut texts = Vec::new();
        while let Some(row) = rows.next()? {
            texts.push(from_row(row)?);
        }
        Ok(texts)
    })
}

/// Returns the IDs of the translated texts of an activity.
pub fn translated_ids(db: &Database, activity_id: ActivityId) -> Result<Vec<TextId>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT id FROM texts WHERE activity_id = ?1 AND translated = 1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![activity_id], |row| row.get::<_, TextId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Whether the activity has any text at all.
pub fn exists_for_activity(db: &Database, activity_id: ActivityId) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM texts WHERE activity_id = ?1)",
            params![activity_id],
            |r| r.get(0),
        )?;
        Ok(exists)
    })
}

/// Returns the activity owning a text, if the text exists.
pub fn find_owner(db: &Database, id: TextId) -> Result<Option<ActivityId>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT activity_id FROM texts WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, ActivityId>(0))?;
        match rows.next() {
            Some(Ok(owner)) => Ok(Some(owner)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Deletes a text; its words and the selections of those words cascade.
pub fn delete(db: &Database, id: TextId) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM texts WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    })
}

/// Per-state text counts of one activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub translated: u32,
    pub pending: u32,
    pub failed: u32,
}

impl StateCounts {
    pub fn total(&self) -> u32 {
        self.translated + self.pending + self.failed
    }
}

/// Counts an activity's texts by translation state.
pub fn count_by_state(
    db: &Database,
    activity_id: ActivityId,
    max_attempts: u32,
) -> Result<StateCounts, DatabaseError> {
    db.with_conn(|conn| {
        let counts = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN translated = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN translated = 0 AND translation_attempts < ?2 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN translated = 0 AND translation_attempts >= ?2 THEN 1 ELSE 0 END), 0)
             FROM texts WHERE activity_id = ?1",
            params![activity_id, max_attempts],
            |r| {
                Ok(StateCounts {
                    translated: r.get(0)?,
                    pending: r.get(1)?,
                    failed: r.get(2)?,
                })
            },
        )?;
        Ok(counts)
    })
}

/// Selects up to `limit` pending, claimable texts, oldest modification
/// first, joined with their activity's languages and creator.
///
/// Claims older than `stale_before` are considered abandoned.
pub fn select_pending_batch(
    db: &Database,
    max_attempts: u32,
    stale_before: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<PendingText>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT t.id, t.activity_id, t.body, t.translation_attempts,
                    a.source_lang, a.target_lang, a.creator_id
             FROM texts t
             INNER JOIN activities a ON t.activity_id = a.id
             WHERE t.translated = 0
               AND t.translation_attempts < ?1
               AND (t.claim_token IS NULL OR t.claimed_at < ?2)
             ORDER BY t.modified_at, t.id
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(
                params![max_attempts, format_timestamp(stale_before), limit],
                |row| {
                    Ok(PendingText {
                        id: row.get(0)?,
                        activity_id: row.get(1)?,
                        body: row.get(2)?,
                        translation_attempts: row.get(3)?,
                        source_lang: row.get(4)?,
                        target_lang: row.get(5)?,
                        creator_id: row.get(6)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Claims a pending text for one worker. Returns false when the text was
/// translated, exhausted, deleted or claimed by someone else meanwhile.
pub fn claim(
    db: &Database,
    id: TextId,
    token: &str,
    max_attempts: u32,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE texts SET claim_token = ?2, claimed_at = ?3
             WHERE id = ?1
               AND translated = 0
               AND translation_attempts < ?4
               AND (claim_token IS NULL OR claimed_at < ?5)",
            params![
                id,
                token,
                format_timestamp(now),
                max_attempts,
                format_timestamp(stale_before),
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Stores the word batch and marks the text translated in one
/// transaction. Attempts keep their current value.
///
/// Returns false, inserting nothing, when the claim was lost.
pub fn complete_translation(
    db: &Database,
    id: TextId,
    token: &str,
    words: &[NewWord],
) -> Result<bool, DatabaseError> {
    db.with_transaction(|conn| {
        let changed = conn.execute(
            "UPDATE texts SET translated = 1, claim_token = NULL, claimed_at = NULL
             WHERE id = ?1 AND claim_token = ?2 AND translated = 0",
            params![id, token],
        )?;
        if changed != 1 {
            return Ok(false);
        }
        word_repo::insert_batch_with_conn(conn, id, words)?;
        Ok(true)
    })
}

/// Records one failed attempt and releases the claim. Returns the new
/// attempt count, or `None` when the claim was lost.
pub fn record_failed_attempt(
    db: &Database,
    id: TextId,
    token: &str,
) -> Result<Option<u32>, DatabaseError> {
    db.with_transaction(|conn| {
        let changed = conn.execute(
            "UPDATE texts
             SET translation_attempts = translation_attempts + 1,
                 claim_token = NULL, claimed_at = NULL
             WHERE id = ?1 AND claim_token = ?2 AND translated = 0",
            params![id, token],
        )?;
        if changed != 1 {
            return Ok(None);
        }
        let attempts: u32 = conn.query_row(
            "SELECT translation_attempts FROM texts WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(Some(attempts))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::activity_repo;
    use crate::model::NewActivity;
    use chrono::Duration;

    const CAP: u32 = 3;

    fn test_db() -> (Database, ActivityId) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let activity = activity_repo::insert(
            &db,
            &NewActivity {
                name: "A".to_string(),
                source_lang: "en".to_string(),
                target_lang: "fr".to_string(),
                creator_id: 9,
            },
            Utc::now(),
        )
        .unwrap();
        (db, activity.id)
    }

    fn stale(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(10)
    }

    fn new_word(position: u32, raw: &str) -> NewWord {
        NewWord {
            position,
            source_raw: raw.to_string(),
            source_simplified: raw.to_lowercase(),
            translated: format!("{}-fr", raw),
            category: Some("NOUN".to_string()),
        }
    }

    #[test]
    fn test_insert_creates_pending_text() {
        let (db, activity) = test_db();
        let id = insert(&db, activity, "<p>Hello</p>", Utc::now()).unwrap();

        let text = find_by_id(&db, id).unwrap().unwrap();
        assert!(!text.translated);
        assert_eq!(text.translation_attempts, 0);
        assert_eq!(text.body, "<p>Hello</p>");
        assert_eq!(find_owner(&db, id).unwrap(), Some(activity));
        assert!(exists_for_activity(&db, activity).unwrap());
    }

    #[test]
    fn test_select_pending_batch_orders_and_limits() {
        let (db, activity) = test_db();
        let base = Utc::now() - Duration::hours(1);
        let newest = insert(&db, activity, "c", base + Duration::minutes(2)).unwrap();
        let oldest = insert(&db, activity, "a", base).unwrap();
        let middle = insert(&db, activity, "b", base + Duration::minutes(1)).unwrap();

        let now = Utc::now();
        let batch = select_pending_batch(&db, CAP, stale(now), 2).unwrap();
        let ids: Vec<_> = batch.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![oldest, middle]);
        assert_eq!(batch[0].source_lang, "en");
        assert_eq!(batch[0].creator_id, 9);

        let all = select_pending_batch(&db, CAP, stale(now), 10).unwrap();
        assert_eq!(all.last().map(|t| t.id), Some(newest));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let (db, activity) = test_db();
        let id = insert(&db, activity, "a", Utc::now()).unwrap();
        let now = Utc::now();

        assert!(claim(&db, id, "w1", CAP, now, stale(now)).unwrap());
        assert!(!claim(&db, id, "w2", CAP, now, stale(now)).unwrap());
        // claimed rows are hidden from other runs
        assert!(select_pending_batch(&db, CAP, stale(now), 5).unwrap().is_empty());
    }

    #[test]
    fn test_stale_claim_can_be_taken_over() {
        let (db, activity) = test_db();
        let id = insert(&db, activity, "a", Utc::now()).unwrap();
        let long_ago = Utc::now() - Duration::hours(2);
        assert!(claim(&db, id, "crashed", CAP, long_ago, stale(long_ago)).unwrap());

        let now = Utc::now();
        assert!(claim(&db, id, "w2", CAP, now, stale(now)).unwrap());
        assert_eq!(record_failed_attempt(&db, id, "crashed").unwrap(), None);
        assert_eq!(record_failed_attempt(&db, id, "w2").unwrap(), Some(1));
    }

    #[test]
    fn test_complete_translation_inserts_words_once() {
        let (db, activity) = test_db();
        let id = insert(&db, activity, "a b", Utc::now()).unwrap();
        let now = Utc::now();
        assert!(claim(&db, id, "w1", CAP, now, stale(now)).unwrap());

        let words = vec![new_word(0, "a"), new_word(2, "b")];
        assert!(complete_translation(&db, id, "w1", &words).unwrap());
        // a second completion with the same token finds no claim
        assert!(!complete_translation(&db, id, "w1", &words).unwrap());

        let text = find_by_id(&db, id).unwrap().unwrap();
        assert!(text.translated);
        assert_eq!(text.translation_attempts, 0);
        assert_eq!(word_repo::count_for_text(&db, id).unwrap(), 2);
    }

    #[test]
    fn test_failed_attempts_reach_cap() {
        let (db, activity) = test_db();
        let id = insert(&db, activity, "a", Utc::now()).unwrap();

        for expected in 1..=CAP {
            let now = Utc::now();
            assert!(claim(&db, id, "w", CAP, now, stale(now)).unwrap());
            assert_eq!(record_failed_attempt(&db, id, "w").unwrap(), Some(expected));
        }

        let now = Utc::now();
        assert!(!claim(&db, id, "w", CAP, now, stale(now)).unwrap());
        assert!(select_pending_batch(&db, CAP, stale(now), 5).unwrap().is_empty());

        let counts = count_by_state(&db, activity, CAP).unwrap();
        assert_eq!(counts, StateCounts { translated: 0, pending: 0, failed: 1 });
    }

    #[test]
    fn test_count_by_state_mixed() {
        let (db, activity) = test_db();
        let done = insert(&db, activity, "a", Utc::now()).unwrap();
        insert(&db, activity, "b", Utc::now()).unwrap();
        let now = Utc::now();
        claim(&db, done, "w", CAP, now, stale(now)).unwrap();
        complete_translation(&db, done, "w", &[new_word(0, "a")]).unwrap();

        let counts = count_by_state(&db, activity, CAP).unwrap();
        assert_eq!(counts.translated, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 2);
        assert_eq!(translated_ids(&db, activity).unwrap(), vec![done]);
    }

    #[test]
    fn test_delete_cascades_to_words() {
        let (db, activity) = test_db();
        let id = insert(&db, activity, "a", Utc::now()).unwrap();
        let now = Utc::now();
        claim(&db, id, "w", CAP, now, stale(now)).unwrap();
        complete_translation(&db, id, "w", &[new_word(0, "a")]).unwrap();

        assert!(delete(&db, id).unwrap());
        assert_eq!(word_repo::count_for_text(&db, id).unwrap(), 0);
        assert!(list_for_activity(&db, activity).unwrap().is_empty());
    }
}
