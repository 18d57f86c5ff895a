//! # nisit-core
//!
//! Ticket lifecycle, committee voting and phase control for the Nisit Deeden
//! outstanding student award.
//!
//! An award application (a *ticket*) moves through a chain of human approvals
//! before a committee votes on it and the committee president announces the
//! winners:
//!
//! ```text
//! draft --submit--> submitted_staff --accept--> submitted_subdean
//!   --accept--> submitted_dean --accept--> admin_review --verify--> nominated
//!   --tally--> approved --sign--> announced
//!
//! any approval stage --reject--> rejected (terminal)
//! nominated --tally fail--> rejected (terminal)
//! ```
//!
//! A single global [`Phase`] gates which of those moves are legal at a given
//! moment, and every committed change is written to the audit log inside the
//! same `SQLite` transaction.
//!
//! ## Modules
//!
//! - [`role`]: roles, role sets, primary-role resolution and authorization
//! - [`user`]: user records and institutional email policy
//! - [`ticket`]: ticket data model and the per-transition authorization table
//! - [`vote`]: votes, tally computation and the pass threshold
//! - [`phase`]: the global phase timeline
//! - [`audit`]: append-only audit entries
//! - [`store`]: `SQLite` persistence
//! - [`engine`]: the operations callers invoke
//! - [`config`]: TOML configuration
//!
//! ## Example
//!
//! ```rust
//! use nisit_core::config::NisitConfig;
//! use nisit_core::engine::Engine;
//! use nisit_core::store::Store;
//! use nisit_core::Phase;
//!
//! # fn main() -> Result<(), nisit_core::EngineError> {
//! let store = Store::in_memory()?;
//! let engine = Engine::new(store, &NisitConfig::default())?;
//! assert_eq!(engine.current_phase()?.phase, Phase::Nomination);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod phase;
pub mod role;
pub mod store;
pub mod ticket;
pub mod user;
pub mod vote;

pub use audit::{AuditAction, AuditEntry, ResourceType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use error::{EngineError, ParseValueError};
pub use ids::{AuditId, TicketId, UserId, VoteId};
pub use phase::{Phase, PhaseRecord};
pub use role::{Identity, Role, RoleSet};
pub use ticket::{AwardCategory, Semester, Ticket, TicketAction, TicketStatus};
pub use user::{User, UserStatus};
pub use vote::{Tally, Vote, VoteChoice};
