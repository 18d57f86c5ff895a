//! `phases` rows. The partial unique index allows one active row.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::StoreError;
use crate::ids::UserId;
use crate::phase::{Phase, PhaseRecord};

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PhaseRecord> {
    Ok(PhaseRecord {
        id: row.get(0)?,
        phase: row.get(1)?,
        activated_at: row.get(2)?,
        activated_by: row.get(3)?,
        is_active: row.get(4)?,
    })
}

pub(crate) fn active(conn: &Connection) -> Result<Option<PhaseRecord>, StoreError> {
    let record = conn
        .query_row(
            "SELECT id, phase, activated_at, activated_by, is_active FROM phases
             WHERE is_active = 1",
            [],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

pub(crate) fn history(conn: &Connection) -> Result<Vec<PhaseRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, phase, activated_at, activated_by, is_active FROM phases ORDER BY id",
    )?;
    let records = stmt
        .query_map([], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Deactivates the current row and inserts `phase` as the active one.
pub(crate) fn activate(
    conn: &Connection,
    phase: Phase,
    by: Option<UserId>,
    at: DateTime<Utc>,
) -> Result<PhaseRecord, StoreError> {
    conn.execute("UPDATE phases SET is_active = 0 WHERE is_active = 1", [])?;
    conn.execute(
        "INSERT INTO phases (phase, activated_at, activated_by, is_active) VALUES (?1, ?2, ?3, 1)",
        params![phase, at, by],
    )?;
    Ok(PhaseRecord {
        id: conn.last_insert_rowid(),
        phase,
        activated_at: at,
        activated_by: by,
        is_active: true,
    })
}
