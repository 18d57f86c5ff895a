//! `tickets` rows.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::StoreError;
use crate::ids::{TicketId, UserId};
use crate::ticket::{AwardCategory, NewTicket, Ticket, TicketStatus};

const TICKET_COLUMNS: &str = "id, owner_id, category, academic_year, semester, form_data, status, \
                              created_at, updated_at";

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category: row.get(2)?,
        academic_year: row.get(3)?,
        semester: row.get(4)?,
        form_data: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn insert(
    conn: &Connection,
    owner: UserId,
    input: &NewTicket,
    at: DateTime<Utc>,
) -> Result<TicketId, StoreError> {
    conn.execute(
        "INSERT INTO tickets (owner_id, category, academic_year, semester, form_data, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            owner,
            input.category,
            input.academic_year,
            input.semester,
            input.form_data,
            TicketStatus::Draft,
            at,
        ],
    )?;
    Ok(TicketId(conn.last_insert_rowid()))
}

pub(crate) fn find(conn: &Connection, id: TicketId) -> Result<Option<Ticket>, StoreError> {
    let ticket = conn
        .query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
            [id],
            ticket_from_row,
        )
        .optional()?;
    Ok(ticket)
}

pub(crate) fn for_owner(conn: &Connection, owner: UserId) -> Result<Vec<Ticket>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE owner_id = ?1 ORDER BY id"
    ))?;
    let tickets = stmt
        .query_map([owner], ticket_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tickets)
}

pub(crate) fn with_status(
    conn: &Connection,
    status: TicketStatus,
) -> Result<Vec<Ticket>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE status = ?1 ORDER BY id"
    ))?;
    let tickets = stmt
        .query_map([status], ticket_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tickets)
}

/// Moves a ticket from `from` to `to`.
///
/// Returns `false` if the ticket is no longer in `from`, which means another
/// writer got there first.
pub(crate) fn update_status(
    conn: &Connection,
    id: TicketId,
    from: TicketStatus,
    to: TicketStatus,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE tickets SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from, to, at],
    )?;
    Ok(updated > 0)
}

pub(crate) fn update_content(
    conn: &Connection,
    id: TicketId,
    category: AwardCategory,
    form_data: &serde_json::Value,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE tickets SET category = ?2, form_data = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, category, form_data, at],
    )?;
    Ok(updated > 0)
}
