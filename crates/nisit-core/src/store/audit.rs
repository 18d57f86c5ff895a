//! `audit_logs` rows. Insert and read only.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use super::StoreError;
use crate::audit::{AuditEntry, NewAuditEntry, ResourceType};
use crate::ids::AuditId;

const AUDIT_COLUMNS: &str =
    "id, actor_id, action, resource_type, resource_id, prior_values, new_values, recorded_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        action: row.get(2)?,
        resource_type: row.get(3)?,
        resource_id: row.get(4)?,
        prior_values: row.get(5)?,
        new_values: row.get(6)?,
        recorded_at: row.get(7)?,
    })
}

pub(crate) fn insert(
    conn: &Connection,
    entry: &NewAuditEntry,
    at: DateTime<Utc>,
) -> Result<AuditId, StoreError> {
    conn.execute(
        "INSERT INTO audit_logs (actor_id, action, resource_type, resource_id, prior_values, new_values, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.actor_id,
            entry.action,
            entry.resource_type,
            entry.resource_id,
            entry.prior_values,
            entry.new_values,
            at,
        ],
    )?;
    Ok(AuditId(conn.last_insert_rowid()))
}

pub(crate) fn for_resource(
    conn: &Connection,
    resource_type: ResourceType,
    resource_id: &str,
) -> Result<Vec<AuditEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_logs
         WHERE resource_type = ?1 AND resource_id = ?2 ORDER BY id"
    ))?;
    let entries = stmt
        .query_map(params![resource_type, resource_id], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// The most recent `limit` entries, oldest first.
pub(crate) fn recent(conn: &Connection, limit: u32) -> Result<Vec<AuditEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM (
             SELECT * FROM audit_logs ORDER BY id DESC LIMIT ?1
         ) ORDER BY id"
    ))?;
    let entries = stmt
        .query_map([limit], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}
