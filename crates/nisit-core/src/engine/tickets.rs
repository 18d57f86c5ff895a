//! Ticket creation, content edits, lifecycle actions and ticket queries.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use serde_json::json;
use tracing::info;

use super::{Engine, log_refusal};
use crate::audit::{AuditAction, AuditEntry, NewAuditEntry, ResourceType};
use crate::error::EngineError;
use crate::ids::{TicketId, UserId};
use crate::phase::require_phase;
use crate::role::{Identity, Role};
use crate::store;
use crate::ticket::transition::{APPLICATION_PHASES, actionable_statuses};
use crate::ticket::{
    NewTicket, StudentSummary, Ticket, TicketAction, TicketContentUpdate, TicketStatus,
    TransitionActor, TransitionRule, plan_edit, plan_transition, validate_form,
};

pub(super) fn load_ticket(conn: &Connection, ticket_id: TicketId) -> Result<Ticket, EngineError> {
    store::tickets::find(conn, ticket_id)?.ok_or(EngineError::TicketNotFound { ticket_id })
}

impl Engine {
    /// Creates a draft ticket owned by `identity`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] unless `identity` is a student
    /// - [`EngineError::Validation`] for out-of-range input
    /// - [`EngineError::PhaseViolation`] outside `NOMINATION`
    pub fn create_ticket(
        &self,
        identity: &Identity,
        input: &NewTicket,
    ) -> Result<Ticket, EngineError> {
        log_refusal("create_ticket", self.create_ticket_inner(identity, input))
    }

    fn create_ticket_inner(
        &self,
        identity: &Identity,
        input: &NewTicket,
    ) -> Result<Ticket, EngineError> {
        identity.require_any(&[Role::Student], "create tickets")?;
        input.validate()?;
        self.store.transaction(|tx| -> Result<Ticket, EngineError> {
            let phase = super::phase::active_phase(tx)?;
            require_phase(phase, APPLICATION_PHASES, "create ticket")?;
            let at = self.now();
            let id = store::tickets::insert(tx, identity.user_id, input, at)?;
            let ticket = load_ticket(tx, id)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::TicketCreate, ResourceType::Ticket, id)
                    .actor(Some(identity.user_id))
                    .new_values(ticket.audit_snapshot()),
                at,
            );
            info!(
                ticket_id = %id,
                owner_id = %identity.user_id,
                category = %ticket.category,
                "ticket created"
            );
            Ok(ticket)
        })
    }

    /// Edits a ticket's form data or category.
    ///
    /// The owning student may edit a `draft` during `NOMINATION`; an
    /// administrator may edit a ticket in `admin_review`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TicketNotFound`] if the ticket does not exist
    /// - [`EngineError::AlreadyTerminal`] for terminal tickets
    /// - [`EngineError::EditNotPermitted`] for any other status or actor
    /// - [`EngineError::PhaseViolation`] outside the allowed phases
    /// - [`EngineError::Validation`] for an empty update or non-object form
    pub fn update_ticket_content(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        update: &TicketContentUpdate,
    ) -> Result<Ticket, EngineError> {
        log_refusal(
            "update_ticket_content",
            self.update_ticket_content_inner(identity, ticket_id, update),
        )
    }

    fn update_ticket_content_inner(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        update: &TicketContentUpdate,
    ) -> Result<Ticket, EngineError> {
        if update.is_empty() {
            return Err(EngineError::validation("update", "nothing to change"));
        }
        if let Some(form) = &update.form_data {
            validate_form(form)?;
        }
        self.store.transaction(|tx| -> Result<Ticket, EngineError> {
            let before = load_ticket(tx, ticket_id)?;
            let phase = super::phase::active_phase(tx)?;
            plan_edit(&before, identity, phase)?;

            let at = self.now();
            let category = update.category.unwrap_or(before.category);
            let form_data = update.form_data.as_ref().unwrap_or(&before.form_data);
            store::tickets::update_content(tx, ticket_id, category, form_data, at)?;
            let after = load_ticket(tx, ticket_id)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::TicketUpdate, ResourceType::Ticket, ticket_id)
                    .actor(Some(identity.user_id))
                    .prior(before.audit_snapshot())
                    .new_values(after.audit_snapshot()),
                at,
            );
            info!(ticket_id = %ticket_id, actor_id = %identity.user_id, "ticket content updated");
            Ok(after)
        })
    }

    /// Performs a human lifecycle action on a ticket.
    ///
    /// Rejections carry a reason and go through [`Engine::reject_ticket`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for [`TicketAction::Reject`]
    /// - [`EngineError::TicketNotFound`] if the ticket does not exist
    /// - [`EngineError::AlreadyTerminal`] for terminal tickets
    /// - [`EngineError::IllegalTransition`] if the action or actor does not
    ///   match the ticket's status
    /// - [`EngineError::PhaseViolation`] if the current phase forbids it
    pub fn apply_action(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        action: TicketAction,
    ) -> Result<Ticket, EngineError> {
        if action == TicketAction::Reject {
            return log_refusal(
                action.as_str(),
                Err(EngineError::validation(
                    "reason",
                    "a rejection needs a reason; use reject_ticket",
                )),
            );
        }
        self.act(identity, ticket_id, action, None)
    }

    fn act(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        action: TicketAction,
        detail: Option<serde_json::Value>,
    ) -> Result<Ticket, EngineError> {
        log_refusal(
            action.as_str(),
            self.store.transaction(|tx| -> Result<Ticket, EngineError> {
                let ticket = load_ticket(tx, ticket_id)?;
                let phase = super::phase::active_phase(tx)?;
                let actor = TransitionActor::Human(identity);
                let rule = plan_transition(&ticket, action, actor, phase)?;
                let at = self.now();
                self.commit_transition(tx, &ticket, rule, Some(identity.user_id), detail, at)
            }),
        )
    }

    /// The owning student submits a draft.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_action`].
    pub fn submit_ticket(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
    ) -> Result<Ticket, EngineError> {
        self.apply_action(identity, ticket_id, TicketAction::Submit)
    }

    /// A reviewer passes the ticket to the next approval stage.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_action`].
    pub fn accept_ticket(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
    ) -> Result<Ticket, EngineError> {
        self.apply_action(identity, ticket_id, TicketAction::Accept)
    }

    /// A reviewer or administrator rejects the ticket. Terminal.
    ///
    /// `reason` is trimmed and stored in the `ticket_reject` audit entry.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] if `reason` is blank; otherwise see
    /// [`Engine::apply_action`].
    pub fn reject_ticket(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
        reason: &str,
    ) -> Result<Ticket, EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return log_refusal(
                TicketAction::Reject.as_str(),
                Err(EngineError::validation("reason", "must not be empty")),
            );
        }
        self.act(
            identity,
            ticket_id,
            TicketAction::Reject,
            Some(json!({ "reason": reason })),
        )
    }

    /// An administrator nominates the ticket for the committee vote.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_action`].
    pub fn verify_ticket(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
    ) -> Result<Ticket, EngineError> {
        self.apply_action(identity, ticket_id, TicketAction::Verify)
    }

    /// The committee president signs an approved ticket.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_action`].
    pub fn sign_ticket(
        &self,
        identity: &Identity,
        ticket_id: TicketId,
    ) -> Result<Ticket, EngineError> {
        self.apply_action(identity, ticket_id, TicketAction::Sign)
    }

    /// Writes a planned transition and its audit entry. `detail` is added to
    /// the entry's new values.
    pub(super) fn commit_transition(
        &self,
        tx: &mut Transaction<'_>,
        ticket: &Ticket,
        rule: &TransitionRule,
        actor_id: Option<UserId>,
        detail: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<Ticket, EngineError> {
        let moved = store::tickets::update_status(tx, ticket.id, rule.from, rule.to, at)?;
        if !moved {
            return Err(EngineError::IllegalTransition {
                ticket_id: ticket.id,
                status: ticket.status,
                action: rule.action,
            });
        }
        let after = load_ticket(tx, ticket.id)?;
        let mut new_values = json!({ "status": rule.to, "action": rule.action });
        if let Some(detail) = detail {
            new_values["detail"] = detail;
        }
        self.record_audit(
            tx,
            &NewAuditEntry::new(rule.action.audit_action(), ResourceType::Ticket, ticket.id)
                .actor(actor_id)
                .prior(json!({ "status": rule.from }))
                .new_values(new_values),
            at,
        );
        info!(
            ticket_id = %ticket.id,
            from = %rule.from,
            to = %rule.to,
            action = %rule.action,
            actor_id = actor_id.map(UserId::get),
            "ticket transitioned"
        );
        Ok(after)
    }

    /// Looks up a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TicketNotFound`] if the ticket does not exist.
    pub fn ticket(&self, ticket_id: TicketId) -> Result<Ticket, EngineError> {
        self.store.with_connection(|conn| load_ticket(conn, ticket_id))
    }

    /// Tickets owned by `owner`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn tickets_for_owner(&self, owner: UserId) -> Result<Vec<Ticket>, EngineError> {
        Ok(self
            .store
            .with_connection(|conn| store::tickets::for_owner(conn, owner))?)
    }

    /// Tickets currently in `status`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn tickets_with_status(&self, status: TicketStatus) -> Result<Vec<Ticket>, EngineError> {
        Ok(self
            .store
            .with_connection(|conn| store::tickets::with_status(conn, status))?)
    }

    /// Tickets waiting for an action any of `identity`'s roles can take.
    ///
    /// Committee members see the `nominated` ballot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn review_queue(&self, identity: &Identity) -> Result<Vec<Ticket>, EngineError> {
        let mut statuses = actionable_statuses(identity);
        if identity.roles.intersects(&Role::VOTERS) {
            statuses.push(TicketStatus::Nominated);
            statuses.sort_unstable();
            statuses.dedup();
        }
        self.store.with_connection(|conn| -> Result<Vec<Ticket>, EngineError> {
            let mut queue = Vec::new();
            for status in statuses {
                queue.extend(store::tickets::with_status(conn, status)?);
            }
            Ok(queue)
        })
    }

    /// Dashboard counts for one student.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn student_summary(&self, owner: UserId) -> Result<StudentSummary, EngineError> {
        Ok(StudentSummary::from_tickets(&self.tickets_for_owner(owner)?))
    }

    /// Audit entries recorded against a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TicketNotFound`] if the ticket does not exist.
    pub fn ticket_history(&self, ticket_id: TicketId) -> Result<Vec<AuditEntry>, EngineError> {
        self.store.with_connection(|conn| -> Result<Vec<AuditEntry>, EngineError> {
            load_ticket(conn, ticket_id)?;
            Ok(store::audit::for_resource(
                conn,
                ResourceType::Ticket,
                &ticket_id.to_string(),
            )?)
        })
    }
}
