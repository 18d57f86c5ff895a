//! Committee votes and tallying.
//!
//! At most one vote exists per (ticket, committee member); casting again
//! replaces the earlier choice. The tally is measured against the whole
//! eligible roster, so abstentions count against a ticket:
//!
//! ```text
//! passed = approve_count * 100 > total_eligible * pass_threshold_percent
//! ```
//!
//! With the default threshold of 50 this is a strict majority of the roster:
//! 7 approvals of 12 pass, 6 of 12 do not.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ParseValueError};
use crate::ids::{TicketId, UserId, VoteId};
use crate::ticket::TicketStatus;

/// A committee member's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    /// In favour of the award.
    Approve,
    /// Against the award.
    Reject,
}

impl VoteChoice {
    /// Returns the stored choice name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteChoice {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "approve" | "approved" => Ok(Self::Approve),
            "reject" | "not_approved" => Ok(Self::Reject),
            other => Err(ParseValueError::new("vote choice", other)),
        }
    }
}

/// The current vote of one committee member on one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Row id. Stable across re-casts by the same member.
    pub id: VoteId,
    /// The ticket voted on.
    pub ticket_id: TicketId,
    /// The committee member.
    pub committee_id: UserId,
    /// The member's latest choice.
    pub choice: VoteChoice,
    /// When the latest choice was cast.
    pub cast_at: DateTime<Utc>,
}

/// Pass rule for a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyPolicy {
    pass_threshold_percent: u8,
}

impl TallyPolicy {
    /// Approvals must exceed half of the eligible roster.
    pub const STRICT_MAJORITY: Self = Self {
        pass_threshold_percent: 50,
    };

    /// Creates a policy requiring approvals to exceed `percent` of the roster.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] unless `percent` is in `1..=99`.
    pub fn new(percent: u8) -> Result<Self, EngineError> {
        if (1..=99).contains(&percent) {
            Ok(Self {
                pass_threshold_percent: percent,
            })
        } else {
            Err(EngineError::validation(
                "pass_threshold_percent",
                format!("{percent} is outside 1..=99"),
            ))
        }
    }

    /// The threshold percentage.
    #[must_use]
    pub const fn threshold_percent(&self) -> u8 {
        self.pass_threshold_percent
    }

    /// Returns `true` if `approvals` strictly exceed the threshold share of
    /// `eligible`. An empty roster never passes.
    #[must_use]
    pub fn passes(&self, approvals: u32, eligible: u32) -> bool {
        u64::from(approvals) * 100 > u64::from(eligible) * u64::from(self.pass_threshold_percent)
    }
}

impl Default for TallyPolicy {
    fn default() -> Self {
        Self::STRICT_MAJORITY
    }
}

/// Vote counts for one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Approvals from eligible members.
    pub approve_count: u32,
    /// Rejections from eligible members.
    pub reject_count: u32,
    /// Size of the eligible committee roster.
    pub total_eligible: u32,
    /// Whether the ticket passes under the policy used.
    pub passed: bool,
}

impl Tally {
    /// Counts `votes` cast by members of `roster` and applies `policy`.
    ///
    /// Votes from users outside the roster (for example a member who has
    /// since lost the role) are ignored. The result depends only on the
    /// inputs.
    #[must_use]
    pub fn compute(votes: &[Vote], roster: &BTreeSet<UserId>, policy: TallyPolicy) -> Self {
        let mut approve_count = 0_u32;
        let mut reject_count = 0_u32;
        for vote in votes.iter().filter(|v| roster.contains(&v.committee_id)) {
            match vote.choice {
                VoteChoice::Approve => approve_count += 1,
                VoteChoice::Reject => reject_count += 1,
            }
        }
        let total_eligible = u32::try_from(roster.len()).unwrap_or(u32::MAX);
        Self {
            approve_count,
            reject_count,
            total_eligible,
            passed: policy.passes(approve_count, total_eligible),
        }
    }

    /// Eligible members who did not vote.
    #[must_use]
    pub const fn abstain_count(&self) -> u32 {
        self.total_eligible
            .saturating_sub(self.approve_count)
            .saturating_sub(self.reject_count)
    }
}

/// Outcome of closing voting on one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseOutcome {
    /// The ticket.
    pub ticket_id: TicketId,
    /// What happened.
    pub resolution: CloseResolution,
}

/// Whether a closure changed the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseResolution {
    /// The ticket was tallied and moved to `status`.
    Resolved {
        /// The tally that decided it.
        tally: Tally,
        /// `approved` or `rejected`.
        status: TicketStatus,
    },
    /// The ticket had already left `nominated`; nothing changed.
    AlreadyResolved {
        /// The ticket's status.
        status: TicketStatus,
    },
}
