//! `votes` rows. One row per (ticket, committee member).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::StoreError;
use crate::ids::{TicketId, UserId};
use crate::vote::{Vote, VoteChoice};

fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<Vote> {
    Ok(Vote {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        committee_id: row.get(2)?,
        choice: row.get(3)?,
        cast_at: row.get(4)?,
    })
}

pub(crate) fn find(
    conn: &Connection,
    ticket: TicketId,
    committee: UserId,
) -> Result<Option<Vote>, StoreError> {
    let vote = conn
        .query_row(
            "SELECT id, ticket_id, committee_id, choice, cast_at FROM votes
             WHERE ticket_id = ?1 AND committee_id = ?2",
            params![ticket, committee],
            vote_from_row,
        )
        .optional()?;
    Ok(vote)
}

/// Inserts the member's vote or replaces their earlier choice in place.
pub(crate) fn upsert(
    conn: &Connection,
    ticket: TicketId,
    committee: UserId,
    choice: VoteChoice,
    at: DateTime<Utc>,
) -> Result<Vote, StoreError> {
    let vote = conn.query_row(
        "INSERT INTO votes (ticket_id, committee_id, choice, cast_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (ticket_id, committee_id)
         DO UPDATE SET choice = excluded.choice, cast_at = excluded.cast_at
         RETURNING id, ticket_id, committee_id, choice, cast_at",
        params![ticket, committee, choice, at],
        vote_from_row,
    )?;
    Ok(vote)
}

pub(crate) fn for_ticket(conn: &Connection, ticket: TicketId) -> Result<Vec<Vote>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, ticket_id, committee_id, choice, cast_at FROM votes
         WHERE ticket_id = ?1 ORDER BY id",
    )?;
    let votes = stmt
        .query_map([ticket], vote_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(votes)
}
