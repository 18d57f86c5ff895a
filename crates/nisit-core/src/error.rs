//! Engine error taxonomy.
//!
//! Every refusal the engine can produce is a variant of [`EngineError`].
//! None of them is process-fatal: the HTTP layer maps each to a rejection
//! with a reason, keyed by [`EngineError::kind`].

use thiserror::Error;

use crate::ids::{TicketId, UserId};
use crate::phase::Phase;
use crate::store::StoreError;
use crate::ticket::{TicketAction, TicketStatus};

/// Errors returned by engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The actor lacks the role the operation requires, or the account is
    /// disabled.
    #[error("user {actor_id} is not authorized to {operation}")]
    Unauthorized {
        /// The acting user.
        actor_id: UserId,
        /// The operation that was refused.
        operation: String,
    },

    /// The action is not valid for the ticket's current status, or the actor
    /// does not match the row of the transition table for that status.
    #[error("ticket {ticket_id}: cannot {action} while {status}")]
    IllegalTransition {
        /// The ticket.
        ticket_id: TicketId,
        /// The ticket's status when the action was attempted.
        status: TicketStatus,
        /// The attempted action.
        action: TicketAction,
    },

    /// The action is valid for the ticket but not during the current phase.
    #[error("{operation} is not allowed during phase {phase}")]
    PhaseViolation {
        /// The refused operation.
        operation: String,
        /// The active phase.
        phase: Phase,
    },

    /// A vote was cast on a ticket that is not open for voting.
    #[error("voting is closed for ticket {ticket_id} (status {status}, phase {phase})")]
    VotingClosed {
        /// The ticket.
        ticket_id: TicketId,
        /// The ticket's status.
        status: TicketStatus,
        /// The active phase.
        phase: Phase,
    },

    /// The ticket is `rejected` or `announced`; nothing may act on it.
    #[error("ticket {ticket_id} is terminal ({status})")]
    AlreadyTerminal {
        /// The ticket.
        ticket_id: TicketId,
        /// The terminal status.
        status: TicketStatus,
    },

    /// The requested phase is not the immediate successor of the active one.
    #[error("cannot advance phase from {from} to {to}")]
    InvalidPhaseTransition {
        /// The active phase.
        from: Phase,
        /// The requested phase.
        to: Phase,
    },

    /// Closing a nominated ticket failed while entering `VOTING_END`; the
    /// phase change was rolled back.
    #[error("advance to {target} rolled back: closing ticket {ticket_id} failed: {reason}")]
    PhaseAdvanceFailed {
        /// The phase that was being entered.
        target: Phase,
        /// The ticket whose closure failed.
        ticket_id: TicketId,
        /// The underlying failure.
        reason: String,
    },

    /// The user holds no roles.
    #[error("user {user_id} has no roles assigned")]
    NoRolesAssigned {
        /// The user without roles.
        user_id: UserId,
    },

    /// Ticket content may not be edited by this actor in this status.
    #[error("ticket {ticket_id} content cannot be edited while {status}")]
    EditNotPermitted {
        /// The ticket.
        ticket_id: TicketId,
        /// The ticket's status.
        status: TicketStatus,
    },

    /// Ticket not found.
    #[error("ticket not found: {ticket_id}")]
    TicketNotFound {
        /// The missing ticket id.
        ticket_id: TicketId,
    },

    /// User not found.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The missing user id.
        user_id: UserId,
    },

    /// Caller-supplied input failed validation.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Storage or transaction failure. The attempted operation was rolled
    /// back in full.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl EngineError {
    /// Stable machine-readable code for the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::PhaseViolation { .. } => "phase_violation",
            Self::VotingClosed { .. } => "voting_closed",
            Self::AlreadyTerminal { .. } => "already_terminal",
            Self::InvalidPhaseTransition { .. } => "invalid_phase_transition",
            Self::PhaseAdvanceFailed { .. } => "phase_advance_failed",
            Self::NoRolesAssigned { .. } => "no_roles_assigned",
            Self::EditNotPermitted { .. } => "edit_not_permitted",
            Self::TicketNotFound { .. } => "ticket_not_found",
            Self::UserNotFound { .. } => "user_not_found",
            Self::Validation { .. } => "validation",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Returns `true` for storage failures, the only errors worth retrying.
    ///
    /// Mutating operations must not be blindly retried: the caller re-reads
    /// the resulting state first.
    #[must_use]
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// A string could not be parsed into one of the crate's enumerations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseValueError {
    /// What was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseValueError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
