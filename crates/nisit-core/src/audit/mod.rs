//! Append-only audit log entries.
//!
//! Every committed business change produces exactly one entry. Entries are
//! never updated or deleted; the schema enforces this with triggers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseValueError;
use crate::ids::{AuditId, UserId};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A user registered.
    UserRegister,
    /// A role was granted.
    RoleAssign,
    /// A role was revoked.
    RoleRevoke,
    /// A user was disabled.
    UserDeactivate,
    /// A draft ticket was created.
    TicketCreate,
    /// Ticket content was edited.
    TicketUpdate,
    /// A draft was submitted.
    TicketSubmit,
    /// A reviewer accepted a ticket.
    TicketAccept,
    /// A reviewer or administrator rejected a ticket.
    TicketReject,
    /// An administrator nominated a ticket.
    TicketVerify,
    /// The committee vote passed.
    TicketTallyPass,
    /// The committee vote failed.
    TicketTallyFail,
    /// The committee president signed a ticket.
    TicketSign,
    /// A committee member voted for the first time.
    VoteSubmit,
    /// A committee member changed their vote.
    VoteUpdate,
    /// The global phase advanced.
    PhaseChange,
}

impl AuditAction {
    /// All actions.
    pub const ALL: [Self; 16] = [
        Self::UserRegister,
        Self::RoleAssign,
        Self::RoleRevoke,
        Self::UserDeactivate,
        Self::TicketCreate,
        Self::TicketUpdate,
        Self::TicketSubmit,
        Self::TicketAccept,
        Self::TicketReject,
        Self::TicketVerify,
        Self::TicketTallyPass,
        Self::TicketTallyFail,
        Self::TicketSign,
        Self::VoteSubmit,
        Self::VoteUpdate,
        Self::PhaseChange,
    ];

    /// Returns the stored action name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UserRegister => "user_register",
            Self::RoleAssign => "role_assign",
            Self::RoleRevoke => "role_revoke",
            Self::UserDeactivate => "user_deactivate",
            Self::TicketCreate => "ticket_create",
            Self::TicketUpdate => "ticket_update",
            Self::TicketSubmit => "ticket_submit",
            Self::TicketAccept => "ticket_accept",
            Self::TicketReject => "ticket_reject",
            Self::TicketVerify => "ticket_verify",
            Self::TicketTallyPass => "ticket_tally_pass",
            Self::TicketTallyFail => "ticket_tally_fail",
            Self::TicketSign => "ticket_sign",
            Self::VoteSubmit => "vote_submit",
            Self::VoteUpdate => "vote_update",
            Self::PhaseChange => "phase_change",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseValueError::new("audit action", s))
    }
}

/// Kind of resource an entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A user account.
    User,
    /// A ticket.
    Ticket,
    /// A committee vote.
    Vote,
    /// The phase timeline.
    Phase,
}

impl ResourceType {
    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ticket => "ticket",
            Self::Vote => "vote",
            Self::Phase => "phase",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "ticket" => Ok(Self::Ticket),
            "vote" => Ok(Self::Vote),
            "phase" => Ok(Self::Phase),
            other => Err(ParseValueError::new("resource type", other)),
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Row id; increases in commit order.
    pub id: AuditId,
    /// Who acted. `None` for the voting engine and the seeded phase.
    pub actor_id: Option<UserId>,
    /// What happened.
    pub action: AuditAction,
    /// Kind of resource.
    pub resource_type: ResourceType,
    /// Id of the resource, as text.
    pub resource_id: String,
    /// State before the change, when there was one.
    pub prior_values: Option<serde_json::Value>,
    /// State after the change.
    pub new_values: serde_json::Value,
    /// Commit time.
    pub recorded_at: DateTime<Utc>,
}

/// An audit entry about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub(crate) actor_id: Option<UserId>,
    pub(crate) action: AuditAction,
    pub(crate) resource_type: ResourceType,
    pub(crate) resource_id: String,
    pub(crate) prior_values: Option<serde_json::Value>,
    pub(crate) new_values: serde_json::Value,
}

impl NewAuditEntry {
    /// Starts an entry for `action` on `resource_type` `resource_id`.
    pub fn new(
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: impl fmt::Display,
    ) -> Self {
        Self {
            actor_id: None,
            action,
            resource_type,
            resource_id: resource_id.to_string(),
            prior_values: None,
            new_values: serde_json::Value::Null,
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn actor(mut self, actor_id: Option<UserId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    /// Sets the state before the change.
    #[must_use]
    pub fn prior(mut self, values: serde_json::Value) -> Self {
        self.prior_values = Some(values);
        self
    }

    /// Sets the state after the change.
    #[must_use]
    pub fn new_values(mut self, values: serde_json::Value) -> Self {
        self.new_values = values;
        self
    }
}
