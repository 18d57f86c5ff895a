//! `nisit init` and `nisit user` commands.

use anyhow::{Context as _, Result, bail};
use clap::Subcommand;
use nisit_core::user::NewUser;
use nisit_core::{Role, UserId};
use serde_json::json;
use tracing::info;

use super::{Context, print_json};

/// User subcommands.
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a new user with the STUDENT role
    Register {
        /// Institutional email address
        email: String,

        /// Full name
        name: String,
    },

    /// Grant a role (administrators only)
    Grant {
        /// Target user id
        user_id: UserId,

        /// Role name, e.g. COMMITTEE or sub_dean
        role: Role,
    },

    /// Revoke a role (administrators only)
    Revoke {
        /// Target user id
        user_id: UserId,

        /// Role name
        role: Role,
    },

    /// Disable an account (administrators only)
    Deactivate {
        /// Target user id
        user_id: UserId,
    },

    /// Show a user, their primary role and dashboard
    Show {
        /// User id
        user_id: UserId,
    },

    /// Look up a user by email
    Find {
        /// Email address
        email: String,
    },

    /// List all users
    #[command(alias = "ls")]
    List,
}

/// `nisit init`
pub fn init(ctx: &Context, email: &str, name: &str) -> Result<()> {
    let admin = ctx
        .engine()
        .bootstrap_admin(&NewUser::new(email, name))
        .context("failed to create the first administrator")?;
    info!(user_id = %admin.id, "database initialised");
    print_json(&admin)
}

pub fn run(ctx: &Context, cmd: UserCommands) -> Result<()> {
    let engine = ctx.engine();
    match cmd {
        UserCommands::Register { email, name } => {
            let user = engine
                .register_user(&NewUser::new(email, name))
                .context("registration failed")?;
            print_json(&user)
        },
        UserCommands::Grant { user_id, role } => {
            let user = engine
                .assign_role(&ctx.identity()?, user_id, role)
                .with_context(|| format!("failed to grant {role} to user {user_id}"))?;
            print_json(&user)
        },
        UserCommands::Revoke { user_id, role } => {
            let user = engine
                .revoke_role(&ctx.identity()?, user_id, role)
                .with_context(|| format!("failed to revoke {role} from user {user_id}"))?;
            print_json(&user)
        },
        UserCommands::Deactivate { user_id } => {
            let user = engine
                .deactivate_user(&ctx.identity()?, user_id)
                .with_context(|| format!("failed to deactivate user {user_id}"))?;
            print_json(&user)
        },
        UserCommands::Show { user_id } => {
            let user = engine.user(user_id)?;
            let primary = user.roles.primary();
            print_json(&json!({
                "user": user,
                "primary_role": primary,
                "dashboard": primary.map(|role| role.dashboard_path()),
            }))
        },
        UserCommands::Find { email } => match engine.user_by_email(&email)? {
            Some(user) => print_json(&user),
            None => bail!("no user registered as {email}"),
        },
        UserCommands::List => print_json(&engine.users()?),
    }
}
