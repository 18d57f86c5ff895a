//! Command handlers.
//!
//! Each handler resolves the acting user through the engine, runs one
//! operation and prints the result as pretty JSON.

pub mod phase;
pub mod ticket;
pub mod user;
pub mod vote;

use anyhow::{Context as _, Result, bail};
use nisit_core::engine::Engine;
use nisit_core::{Identity, UserId};
use serde::Serialize;

/// Shared state for one CLI invocation.
pub struct Context {
    engine: Engine,
    acting_user: Option<UserId>,
}

impl Context {
    pub const fn new(engine: Engine, acting_user: Option<UserId>) -> Self {
        Self {
            engine,
            acting_user,
        }
    }

    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The identity given by `--as`.
    pub fn identity(&self) -> Result<Identity> {
        let Some(user_id) = self.acting_user else {
            bail!("this command needs an acting user; pass --as <user-id> or set NISIT_USER");
        };
        self.engine
            .resolve_identity(user_id)
            .with_context(|| format!("cannot act as user {user_id}"))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

/// `nisit audit`
pub fn audit(ctx: &Context, limit: u32) -> Result<()> {
    let entries = ctx
        .engine()
        .recent_audit(limit)
        .context("failed to read audit log")?;
    print_json(&entries)
}

#[cfg(test)]
mod tests {
    use nisit_core::config::NisitConfig;
    use nisit_core::{Phase, TicketStatus};
    use tempfile::TempDir;

    use super::*;

    fn context(dir: &TempDir, acting_user: Option<UserId>) -> Context {
        let mut config = NisitConfig::default();
        config.database.path = dir.path().join("nisit.db");
        Context::new(Engine::open(&config).unwrap(), acting_user)
    }

    #[test]
    fn acting_user_is_required() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, None);
        let err = ctx.identity().unwrap_err();
        assert!(err.to_string().contains("--as"));
    }

    #[test]
    fn init_then_operate_as_admin() {
        let dir = TempDir::new().unwrap();
        user::init(&context(&dir, None), "boss@ku.th", "Boss").unwrap();

        let admin = context(&dir, None)
            .engine()
            .user_by_email("boss@ku.th")
            .unwrap()
            .unwrap();
        let ctx = context(&dir, Some(admin.id));
        user::run(
            &ctx,
            user::UserCommands::Register {
                email: "kaew@ku.th".to_string(),
                name: "Kaew".to_string(),
            },
        )
        .unwrap();
        phase::run(
            &ctx,
            phase::PhaseCommands::Advance {
                phase: Phase::ReviewEnd,
            },
        )
        .unwrap();
        assert_eq!(
            ctx.engine().current_phase().unwrap().phase,
            Phase::ReviewEnd
        );

        // A second init is refused.
        assert!(user::init(&ctx, "other@ku.th", "Other").is_err());
    }

    #[test]
    fn student_files_a_ticket() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, None);
        let student = ctx
            .engine()
            .register_user(&nisit_core::user::NewUser::new("fah@ku.th", "Fah"))
            .unwrap();

        let ctx = context(&dir, Some(student.id));
        ticket::run(
            &ctx,
            ticket::TicketCommands::Create {
                category: nisit_core::AwardCategory::MoralEthics,
                academic_year: 2568,
                semester: nisit_core::Semester::First,
                form: r#"{"volunteer_hours": 120}"#.to_string(),
            },
        )
        .unwrap();
        let tickets = ctx.engine().tickets_for_owner(student.id).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].form_data["volunteer_hours"], 120);

        ticket::run(&ctx, ticket::TicketCommands::Submit { ticket_id: tickets[0].id }).unwrap();
        assert_eq!(
            ctx.engine().ticket(tickets[0].id).unwrap().status,
            TicketStatus::SubmittedStaff
        );

        let bad = ticket::run(
            &ctx,
            ticket::TicketCommands::Create {
                category: nisit_core::AwardCategory::Sport,
                academic_year: 2568,
                semester: nisit_core::Semester::First,
                form: "not json".to_string(),
            },
        );
        assert!(bad.is_err());
    }
}
