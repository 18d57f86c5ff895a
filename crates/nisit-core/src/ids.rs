//! Strongly typed row identifiers.
//!
//! All identifiers are `SQLite` rowids. Wrapping them keeps a ticket id from
//! being passed where a user id is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseValueError;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw rowid.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ParseValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .map(Self)
                    .ok_or_else(|| ParseValueError::new($kind, s))
            }
        }
    };
}

row_id!(
    /// Identifies a user (student, reviewer, committee member or admin).
    UserId,
    "user id"
);
row_id!(
    /// Identifies an award application.
    TicketId,
    "ticket id"
);
row_id!(
    /// Identifies a committee vote row.
    VoteId,
    "vote id"
);
row_id!(
    /// Identifies an audit log entry.
    AuditId,
    "audit id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        assert_eq!("42".parse::<TicketId>().unwrap(), TicketId(42));
        assert_eq!(" 7 ".parse::<UserId>().unwrap(), UserId(7));
    }

    #[test]
    fn rejects_zero_negative_and_garbage() {
        assert!("0".parse::<TicketId>().is_err());
        assert!("-3".parse::<UserId>().is_err());
        let err = "abc".parse::<VoteId>().unwrap_err();
        assert!(err.to_string().contains("vote id"));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&UserId(9)).unwrap();
        assert_eq!(json, "9");
    }
}
