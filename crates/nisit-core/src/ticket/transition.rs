//! The per-transition authorization table.
//!
//! Every legal ticket move is one [`TransitionRule`]: the status it leaves,
//! the action, who may perform it, the status it enters and the phases it is
//! legal in. [`plan_transition`] is the only place a move is authorized, so
//! the table is exhaustive by construction.

use serde::Serialize;

use super::{Ticket, TicketAction, TicketStatus};
use crate::error::EngineError;
use crate::ids::UserId;
use crate::phase::{Phase, require_phase};
use crate::role::{Identity, Role};

/// Phases in which drafts may be created, edited and submitted.
pub const APPLICATION_PHASES: &[Phase] = &[Phase::Nomination];

/// Phases in which the human approval chain operates.
pub const REVIEW_PHASES: &[Phase] = &[Phase::Nomination, Phase::ReviewEnd];

/// Phases in which an administrator may nominate a ticket.
pub const NOMINATION_PHASES: &[Phase] = &[Phase::ReviewEnd];

/// Phases in which committee votes are accepted.
pub const VOTING_PHASES: &[Phase] = &[Phase::Voting];

/// Phases in which nominated tickets are tallied.
pub const TALLY_PHASES: &[Phase] = &[Phase::VotingEnd];

/// Phases in which approved tickets are signed.
pub const SIGNING_PHASES: &[Phase] = &[Phase::Certificate];

/// Who may perform a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActorRequirement {
    /// The student who owns the ticket.
    Owner,
    /// Any holder of the role.
    Role(Role),
    /// The voting tally engine, when voting closes.
    VotingEngine,
}

/// Who is attempting a transition.
#[derive(Debug, Clone, Copy)]
pub enum TransitionActor<'a> {
    /// An authenticated user.
    Human(&'a Identity),
    /// The voting tally engine.
    VotingEngine,
}

impl TransitionActor<'_> {
    /// The acting user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Human(identity) => Some(identity.user_id),
            Self::VotingEngine => None,
        }
    }
}

impl ActorRequirement {
    /// Returns `true` if `actor` meets the requirement for a ticket owned by
    /// `owner`.
    #[must_use]
    pub fn is_satisfied_by(&self, actor: TransitionActor<'_>, owner: UserId) -> bool {
        match (self, actor) {
            (Self::Owner, TransitionActor::Human(identity)) => {
                identity.user_id == owner && identity.has_role(Role::Student)
            },
            (Self::Role(role), TransitionActor::Human(identity)) => identity.has_role(*role),
            (Self::VotingEngine, TransitionActor::VotingEngine) => true,
            _ => false,
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionRule {
    /// Status the ticket must be in.
    pub from: TicketStatus,
    /// The action.
    pub action: TicketAction,
    /// Who may perform it.
    pub actor: ActorRequirement,
    /// Resulting status.
    pub to: TicketStatus,
    /// Phases in which the move is legal.
    pub phases: &'static [Phase],
}

const fn rule(
    from: TicketStatus,
    action: TicketAction,
    actor: ActorRequirement,
    to: TicketStatus,
    phases: &'static [Phase],
) -> TransitionRule {
    TransitionRule {
        from,
        action,
        actor,
        to,
        phases,
    }
}

/// Every legal ticket transition.
pub static TRANSITIONS: [TransitionRule; 12] = {
    use ActorRequirement::{Owner, Role as R, VotingEngine};
    use TicketAction::{Accept, Reject, Sign, Submit, TallyFail, TallyPass, Verify};
    use TicketStatus::{
        AdminReview, Announced, Approved, Draft, Nominated, Rejected, SubmittedDean,
        SubmittedStaff, SubmittedSubdean,
    };
    [
        rule(Draft, Submit, Owner, SubmittedStaff, APPLICATION_PHASES),
        rule(SubmittedStaff, Accept, R(Role::Staff), SubmittedSubdean, REVIEW_PHASES),
        rule(SubmittedStaff, Reject, R(Role::Staff), Rejected, REVIEW_PHASES),
        rule(SubmittedSubdean, Accept, R(Role::SubDean), SubmittedDean, REVIEW_PHASES),
        rule(SubmittedSubdean, Reject, R(Role::SubDean), Rejected, REVIEW_PHASES),
        rule(SubmittedDean, Accept, R(Role::Dean), AdminReview, REVIEW_PHASES),
        rule(SubmittedDean, Reject, R(Role::Dean), Rejected, REVIEW_PHASES),
        rule(AdminReview, Verify, R(Role::Admin), Nominated, NOMINATION_PHASES),
        rule(AdminReview, Reject, R(Role::Admin), Rejected, REVIEW_PHASES),
        rule(Nominated, TallyPass, VotingEngine, Approved, TALLY_PHASES),
        rule(Nominated, TallyFail, VotingEngine, Rejected, TALLY_PHASES),
        rule(Approved, Sign, R(Role::CommitteePresident), Announced, SIGNING_PHASES),
    ]
};

/// Looks up the rule for `action` taken from `from`.
#[must_use]
pub fn rule_for(from: TicketStatus, action: TicketAction) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.from == from && rule.action == action)
}

/// Authorizes `action` on `ticket` by `actor` during `phase`.
///
/// Checks run in order: terminal status, table row and actor, phase.
///
/// # Errors
///
/// - [`EngineError::AlreadyTerminal`] if the ticket is `rejected` or
///   `announced`
/// - [`EngineError::IllegalTransition`] if no row matches the ticket's status
///   and action, or the actor does not satisfy the row
/// - [`EngineError::PhaseViolation`] if the row is not legal in `phase`
pub fn plan_transition(
    ticket: &Ticket,
    action: TicketAction,
    actor: TransitionActor<'_>,
    phase: Phase,
) -> Result<&'static TransitionRule, EngineError> {
    if ticket.status.is_terminal() {
        return Err(EngineError::AlreadyTerminal {
            ticket_id: ticket.id,
            status: ticket.status,
        });
    }
    let illegal = || EngineError::IllegalTransition {
        ticket_id: ticket.id,
        status: ticket.status,
        action,
    };
    let rule = rule_for(ticket.status, action).ok_or_else(illegal)?;
    if !rule.actor.is_satisfied_by(actor, ticket.owner_id) {
        return Err(illegal());
    }
    require_phase(
        phase,
        rule.phases,
        &format!("{action} on {} ticket", ticket.status),
    )?;
    Ok(rule)
}

/// Authorizes a content edit of `ticket` by `identity` during `phase`.
///
/// Only the owning student may edit a `draft` (during `NOMINATION`), and only
/// an administrator may edit a ticket in `admin_review`.
///
/// # Errors
///
/// - [`EngineError::AlreadyTerminal`] for terminal tickets
/// - [`EngineError::EditNotPermitted`] for any other status/actor pairing
/// - [`EngineError::PhaseViolation`] outside the allowed phases
pub fn plan_edit(ticket: &Ticket, identity: &Identity, phase: Phase) -> Result<(), EngineError> {
    if ticket.status.is_terminal() {
        return Err(EngineError::AlreadyTerminal {
            ticket_id: ticket.id,
            status: ticket.status,
        });
    }
    let allowed_phases = match ticket.status {
        TicketStatus::Draft
            if ActorRequirement::Owner
                .is_satisfied_by(TransitionActor::Human(identity), ticket.owner_id) =>
        {
            APPLICATION_PHASES
        },
        TicketStatus::AdminReview if identity.has_role(Role::Admin) => REVIEW_PHASES,
        status => {
            return Err(EngineError::EditNotPermitted {
                ticket_id: ticket.id,
                status,
            });
        },
    };
    require_phase(phase, allowed_phases, "edit ticket content")
}

/// Statuses a holder of `identity`'s roles can act on, by the table.
///
/// Owner rows are excluded: they depend on the ticket, not the role.
#[must_use]
pub fn actionable_statuses(identity: &Identity) -> Vec<TicketStatus> {
    let mut statuses: Vec<TicketStatus> = TRANSITIONS
        .iter()
        .filter_map(|rule| match rule.actor {
            ActorRequirement::Role(role) if identity.has_role(role) => Some(rule.from),
            _ => None,
        })
        .collect();
    statuses.sort_unstable();
    statuses.dedup();
    statuses
}
