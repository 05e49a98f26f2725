//! Activity repository: CRUD operations for the `activities` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{Activity, ActivityId, NewActivity};

fn from_row(row: &Row<'_>) -> Result<Activity, DatabaseError> {
    let created_at: String = row.get("created_at")?;
    let modified_at: String = row.get("modified_at")?;
    Ok(Activity {
        id: row.get("id")?,
        name: row.get("name")?,
        source_lang: row.get("source_lang")?,
        target_lang: row.get("target_lang")?,
        creator_id: row.get("creator_id")?,
        created_at: parse_timestamp(&created_at)?,
        modified_at: parse_timestamp(&modified_at)?,
    })
}

/// Inserts a new activity on an existing connection (usable inside a
/// transaction).
pub fn insert_with_conn(
    conn: &Connection,
    activity: &NewActivity,
    now: DateTime<Utc>,
) -> Result<Activity, DatabaseError> {
    let ts = format_timestamp(now);
    conn.execute(
        "INSERT INTO activities (name, source_lang, target_lang, creator_id, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            activity.name,
            activity.source_lang,
            activity.target_lang,
            activity.creator_id,
            ts,
        ],
    )?;
    Ok(Activity {
        id: conn.last_insert_rowid(),
        name: activity.name.clone(),
        source_lang: activity.source_lang.clone(),
        target_lang: activity.target_lang.clone(),
        creator_id: activity.creator_id,
        created_at: parse_timestamp(&ts)?,
        modified_at: parse_timestamp(&ts)?,
    })
}

/// Inserts a new activity.
pub fn insert(
    db: &Database,
    activity: &NewActivity,
    now: DateTime<Utc>,
) -> Result<Activity, DatabaseError> {
    db.with_conn(|conn| insert_with_conn(conn, activity, now))
}

/// Finds an activity by its ID.
pub fn find_by_id(db: &Database, id: ActivityId) -> Result<Option<Activity>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM activities WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    })
}

/// Renames an activity. Languages are fixed once texts exist, so only
/// the metadata is writable. Returns false when the activity is gone.
pub fn update_metadata(
    db: &Database,
    id: ActivityId,
    name: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE activities SET name = ?2, modified_at = ?3 WHERE id = ?1",
            params![id, name, format_timestamp(now)],
        )?;
        Ok(changed == 1)
    })
}

/// Deletes an activity; texts, words and selections cascade.
pub fn delete(db: &Database, id: ActivityId) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM activities WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    })
}
