//! The global phase timeline.
//!
//! Exactly one phase is active system-wide. Phases advance along a fixed
//! total order with no skipping and no reversal:
//!
//! ```text
//! NOMINATION -> REVIEW_END -> VOTING -> VOTING_END -> CERTIFICATE
//! ```
//!
//! Which ticket and vote operations a phase admits is recorded next to each
//! transition rule in [`crate::ticket::transition`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ParseValueError};
use crate::ids::UserId;
use crate::vote::CloseOutcome;

/// A system-wide phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Applications are open.
    Nomination,
    /// Applications are closed; reviews and admin verification finish.
    ReviewEnd,
    /// The committee is voting.
    Voting,
    /// Voting is closed and nominated tickets have been tallied.
    VotingEnd,
    /// The committee president signs and announces winners.
    Certificate,
}

impl Phase {
    /// All phases in timeline order.
    pub const ORDER: [Self; 5] = [
        Self::Nomination,
        Self::ReviewEnd,
        Self::Voting,
        Self::VotingEnd,
        Self::Certificate,
    ];

    /// Returns the canonical phase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nomination => "NOMINATION",
            Self::ReviewEnd => "REVIEW_END",
            Self::Voting => "VOTING",
            Self::VotingEnd => "VOTING_END",
            Self::Certificate => "CERTIFICATE",
        }
    }

    /// The only phase this one may advance to, or `None` for the final phase.
    #[must_use]
    pub const fn successor(&self) -> Option<Self> {
        match self {
            Self::Nomination => Some(Self::ReviewEnd),
            Self::ReviewEnd => Some(Self::Voting),
            Self::Voting => Some(Self::VotingEnd),
            Self::VotingEnd => Some(Self::Certificate),
            Self::Certificate => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseValueError::new("phase", s))
    }
}

/// Checks that `next` is the immediate successor of `current`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidPhaseTransition`] for any other target,
/// including `current` itself.
pub fn validate_advance(current: Phase, next: Phase) -> Result<(), EngineError> {
    if current.successor() == Some(next) {
        Ok(())
    } else {
        Err(EngineError::InvalidPhaseTransition {
            from: current,
            to: next,
        })
    }
}

/// Fails with [`EngineError::PhaseViolation`] unless `current` is one of
/// `allowed`.
pub(crate) fn require_phase(
    current: Phase,
    allowed: &[Phase],
    operation: &str,
) -> Result<(), EngineError> {
    if allowed.contains(&current) {
        Ok(())
    } else {
        Err(EngineError::PhaseViolation {
            operation: operation.to_string(),
            phase: current,
        })
    }
}

/// One row of the phase table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Row id; increases with every activation.
    pub id: i64,
    /// The phase.
    pub phase: Phase,
    /// When the phase became active.
    pub activated_at: DateTime<Utc>,
    /// The administrator who activated it; `None` for the seeded initial
    /// phase.
    pub activated_by: Option<UserId>,
    /// Whether this is the currently active row.
    pub is_active: bool,
}

/// Result of a committed phase advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseAdvance {
    /// The phase that was active before.
    pub previous: Phase,
    /// The newly active phase row.
    pub record: PhaseRecord,
    /// Per-ticket voting closures performed on entering `VOTING_END`.
    pub closed: Vec<CloseOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_chain_is_total() {
        let mut phase = Phase::Nomination;
        let mut seen = vec![phase];
        while let Some(next) = phase.successor() {
            assert!(next > phase);
            seen.push(next);
            phase = next;
        }
        assert_eq!(seen, Phase::ORDER);
    }

    #[test]
    fn advance_only_to_immediate_successor() {
        assert!(validate_advance(Phase::Voting, Phase::VotingEnd).is_ok());
        assert!(matches!(
            validate_advance(Phase::Voting, Phase::Certificate),
            Err(EngineError::InvalidPhaseTransition {
                from: Phase::Voting,
                to: Phase::Certificate
            })
        ));
        assert!(validate_advance(Phase::Voting, Phase::ReviewEnd).is_err());
        assert!(validate_advance(Phase::Voting, Phase::Voting).is_err());
        for phase in Phase::ORDER {
            assert!(validate_advance(Phase::Certificate, phase).is_err());
        }
    }

    #[test]
    fn require_phase_reports_active_phase() {
        let err = require_phase(Phase::Voting, &[Phase::Nomination], "submit").unwrap_err();
        assert!(matches!(
            err,
            EngineError::PhaseViolation {
                phase: Phase::Voting,
                ..
            }
        ));
    }

    #[test]
    fn names_round_trip() {
        for phase in Phase::ORDER {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert_eq!("voting_end".parse::<Phase>().unwrap(), Phase::VotingEnd);
        assert!("LUNCH".parse::<Phase>().is_err());
    }
}
