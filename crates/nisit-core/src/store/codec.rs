//! Column conversions for the crate's ids and enumerations.
//!
//! Ids are stored as `INTEGER` rowids; enumerations as their canonical text
//! names, so the database stays readable with the `sqlite3` shell.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::audit::{AuditAction, ResourceType};
use crate::ids::{AuditId, TicketId, UserId, VoteId};
use crate::phase::Phase;
use crate::role::Role;
use crate::ticket::{AwardCategory, Semester, TicketStatus};
use crate::user::UserStatus;
use crate::vote::VoteChoice;

macro_rules! integer_column {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.0))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    i64::column_result(value).map(Self)
                }
            }
        )*
    };
}

macro_rules! text_column {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|err| FromSqlError::Other(Box::new(err)))
                }
            }
        )*
    };
}

integer_column!(UserId, TicketId, VoteId, AuditId);

text_column!(
    AuditAction,
    ResourceType,
    Phase,
    Role,
    TicketStatus,
    AwardCategory,
    Semester,
    UserStatus,
    VoteChoice,
);
