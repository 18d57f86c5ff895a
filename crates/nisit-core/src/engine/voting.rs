//! Committee voting and tally closure.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use serde_json::json;
use tracing::info;

use super::tickets::load_ticket;
use super::{Engine, log_refusal};
use crate::audit::{AuditAction, NewAuditEntry, ResourceType};
use crate::error::EngineError;
use crate::ids::{TicketId, UserId};
use crate::phase::Phase;
use crate::role::{Identity, Role};
use crate::store;
use crate::ticket::transition::VOTING_PHASES;
use crate::ticket::{Ticket, TicketAction, TicketStatus, TransitionActor, plan_transition};
use crate::vote::{CloseOutcome, CloseResolution, Tally, Vote, VoteChoice};

impl Engine {
    /// Records `identity`'s vote on a nominated ticket.
    ///
    /// Casting again replaces the member's earlier choice; both casts are
    /// audited (`vote_submit`, then `vote_update`).
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] unless `identity` is a committee member
    ///   or the committee president, both in the session and in the stored,
    ///   active account
    /// - [`EngineError::TicketNotFound`] if the ticket does not exist
    /// - [`EngineError::AlreadyTerminal`] for terminal tickets
    /// - [`EngineError::VotingClosed`] unless the ticket is `nominated` and
    ///   the phase is `VOTING`
    pub fn cast_vote(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        choice: VoteChoice,
    ) -> Result<Vote, EngineError> {
        log_refusal("cast_vote", self.cast_vote_inner(identity, ticket_id, choice))
    }

    fn cast_vote_inner(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        choice: VoteChoice,
    ) -> Result<Vote, EngineError> {
        identity.require_any(&Role::VOTERS, "cast votes")?;
        self.store.transaction(|tx| -> Result<Vote, EngineError> {
            // The stored roster decides, not the roles carried by the caller.
            let eligible = store::users::find(tx, identity.user_id)?.is_some_and(|member| {
                member.is_active() && member.roles.intersects(&Role::VOTERS)
            });
            if !eligible {
                return Err(EngineError::Unauthorized {
                    actor_id: identity.user_id,
                    operation: "cast votes without an active committee seat".to_string(),
                });
            }
            let ticket = load_ticket(tx, ticket_id)?;
            if ticket.status.is_terminal() {
                return Err(EngineError::AlreadyTerminal {
                    ticket_id,
                    status: ticket.status,
                });
            }
            let phase = super::phase::active_phase(tx)?;
            if ticket.status != TicketStatus::Nominated || !VOTING_PHASES.contains(&phase) {
                return Err(EngineError::VotingClosed {
                    ticket_id,
                    status: ticket.status,
                    phase,
                });
            }

            let prior = store::votes::find(tx, ticket_id, identity.user_id)?;
            let at = self.now();
            let vote = store::votes::upsert(tx, ticket_id, identity.user_id, choice, at)?;
            let entry = match &prior {
                Some(prior) => {
                    NewAuditEntry::new(AuditAction::VoteUpdate, ResourceType::Vote, vote.id)
                        .prior(json!({ "ticket_id": ticket_id, "choice": prior.choice }))
                },
                None => NewAuditEntry::new(AuditAction::VoteSubmit, ResourceType::Vote, vote.id),
            };
            self.record_audit(
                tx,
                &entry
                    .actor(Some(identity.user_id))
                    .new_values(json!({ "ticket_id": ticket_id, "choice": choice })),
                at,
            );
            info!(
                ticket_id = %ticket_id,
                actor_id = %identity.user_id,
                choice = %choice,
                replaced = prior.is_some(),
                "vote cast"
            );
            Ok(vote)
        })
    }

    /// Counts the current votes on a ticket against the eligible roster.
    ///
    /// Read-only and repeatable. Authoritative only once the phase is
    /// `VOTING_END`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TicketNotFound`] if the ticket does not exist.
    pub fn tally(&self, ticket_id: TicketId) -> Result<Tally, EngineError> {
        self.store.with_connection(|conn| -> Result<Tally, EngineError> {
            load_ticket(conn, ticket_id)?;
            self.tally_in(conn, ticket_id)
        })
    }

    fn tally_in(&self, conn: &Connection, ticket_id: TicketId) -> Result<Tally, EngineError> {
        let votes = store::votes::for_ticket(conn, ticket_id)?;
        let roster = store::users::active_holders(conn, &Role::VOTERS)?;
        Ok(Tally::compute(&votes, &roster, self.tally_policy))
    }

    /// Active users holding `COMMITTEE` or `COMMITTEE_PRESIDENT`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn eligible_roster(&self) -> Result<BTreeSet<UserId>, EngineError> {
        Ok(self
            .store
            .with_connection(|conn| store::users::active_holders(conn, &Role::VOTERS))?)
    }

    /// Current votes on a ticket, in first-cast order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TicketNotFound`] if the ticket does not exist.
    pub fn votes_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<Vote>, EngineError> {
        self.store.with_connection(|conn| -> Result<Vec<Vote>, EngineError> {
            load_ticket(conn, ticket_id)?;
            Ok(store::votes::for_ticket(conn, ticket_id)?)
        })
    }

    /// Tallies a nominated ticket and moves it to `approved` or `rejected`.
    ///
    /// Calling this on a ticket that has already been resolved is a no-op
    /// and returns [`CloseResolution::AlreadyResolved`]. Entering
    /// `VOTING_END` runs this for every nominated ticket.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TicketNotFound`] if the ticket does not exist
    /// - [`EngineError::IllegalTransition`] if the ticket never reached
    ///   `nominated`
    /// - [`EngineError::PhaseViolation`] unless the phase is `VOTING_END`
    pub fn close_voting_for_ticket(
        &self,
        ticket_id: TicketId,
    ) -> Result<CloseOutcome, EngineError> {
        log_refusal(
            "close_voting_for_ticket",
            self.store.transaction(|tx| -> Result<CloseOutcome, EngineError> {
                let ticket = load_ticket(tx, ticket_id)?;
                let phase = super::phase::active_phase(tx)?;
                self.close_in(tx, &ticket, phase, self.now())
            }),
        )
    }

    pub(super) fn close_in(
        &self,
        tx: &mut Transaction<'_>,
        ticket: &Ticket,
        phase: Phase,
        at: DateTime<Utc>,
    ) -> Result<CloseOutcome, EngineError> {
        if matches!(
            ticket.status,
            TicketStatus::Approved | TicketStatus::Rejected | TicketStatus::Announced
        ) {
            return Ok(CloseOutcome {
                ticket_id: ticket.id,
                resolution: CloseResolution::AlreadyResolved {
                    status: ticket.status,
                },
            });
        }
        let tally = self.tally_in(tx, ticket.id)?;
        let action = if tally.passed {
            TicketAction::TallyPass
        } else {
            TicketAction::TallyFail
        };
        let rule = plan_transition(ticket, action, TransitionActor::VotingEngine, phase)?;
        let detail = json!({
            "approve_count": tally.approve_count,
            "reject_count": tally.reject_count,
            "total_eligible": tally.total_eligible,
            "threshold_percent": self.tally_policy.threshold_percent(),
        });
        let after = self.commit_transition(tx, ticket, rule, None, Some(detail), at)?;
        Ok(CloseOutcome {
            ticket_id: ticket.id,
            resolution: CloseResolution::Resolved {
                tally,
                status: after.status,
            },
        })
    }
}
