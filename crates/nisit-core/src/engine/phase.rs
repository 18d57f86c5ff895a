//! The phase controller.

use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use super::{Engine, log_refusal};
use crate::audit::{AuditAction, NewAuditEntry, ResourceType};
use crate::error::EngineError;
use crate::phase::{Phase, PhaseAdvance, PhaseRecord, validate_advance};
use crate::role::{Identity, Role};
use crate::store::{self, StoreError};
use crate::ticket::TicketStatus;

pub(super) fn active_record(conn: &Connection) -> Result<PhaseRecord, EngineError> {
    store::phases::active(conn)?
        .ok_or_else(|| StoreError::Database(rusqlite::Error::QueryReturnedNoRows).into())
}

pub(super) fn active_phase(conn: &Connection) -> Result<Phase, EngineError> {
    active_record(conn).map(|record| record.phase)
}

impl Engine {
    /// The active phase row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn current_phase(&self) -> Result<PhaseRecord, EngineError> {
        self.store.with_connection(active_record)
    }

    /// Every phase activation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn phase_history(&self) -> Result<Vec<PhaseRecord>, EngineError> {
        Ok(self.store.with_connection(store::phases::history)?)
    }

    /// Advances the global phase to `next`.
    ///
    /// Entering `VOTING_END` closes voting on every `nominated` ticket inside
    /// the same transaction. If any closure fails, nothing is written and the
    /// phase stays where it was.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] unless `actor` is an administrator
    /// - [`EngineError::InvalidPhaseTransition`] unless `next` is the
    ///   immediate successor of the active phase
    /// - [`EngineError::PhaseAdvanceFailed`] if a ticket closure failed
    pub fn advance_phase(
        &self,
        actor: &Identity,
        next: Phase,
    ) -> Result<PhaseAdvance, EngineError> {
        log_refusal("advance_phase", self.advance_phase_inner(actor, next))
    }

    fn advance_phase_inner(
        &self,
        actor: &Identity,
        next: Phase,
    ) -> Result<PhaseAdvance, EngineError> {
        actor.require_any(&[Role::Admin], "advance the phase")?;
        self.store.transaction(|tx| -> Result<PhaseAdvance, EngineError> {
            let current = active_record(tx)?;
            validate_advance(current.phase, next)?;
            let at = self.now();

            let mut closed = Vec::new();
            if next == Phase::VotingEnd {
                for ticket in store::tickets::with_status(tx, TicketStatus::Nominated)? {
                    let outcome = self.close_in(tx, &ticket, next, at).map_err(|err| {
                        EngineError::PhaseAdvanceFailed {
                            target: next,
                            ticket_id: ticket.id,
                            reason: err.to_string(),
                        }
                    })?;
                    closed.push(outcome);
                }
            }

            let record = store::phases::activate(tx, next, Some(actor.user_id), at)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::PhaseChange, ResourceType::Phase, record.id)
                    .actor(Some(actor.user_id))
                    .prior(json!({ "phase": current.phase }))
                    .new_values(json!({ "phase": next, "tickets_closed": closed.len() })),
                at,
            );
            info!(
                from = %current.phase,
                to = %next,
                actor_id = %actor.user_id,
                tickets_closed = closed.len(),
                "phase advanced"
            );
            Ok(PhaseAdvance {
                previous: current.phase,
                record,
                closed,
            })
        })
    }
}
