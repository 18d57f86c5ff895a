//! nisit - operator CLI for the Nisit Deeden award system
//!
//! Runs engine operations directly against the award database. Every
//! mutating command acts as the user given by `--as` (or `NISIT_USER`);
//! results are printed to stdout as JSON, logs go to stderr or `--log-file`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nisit_core::config::NisitConfig;
use nisit_core::engine::Engine;
use nisit_core::UserId;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// nisit - Nisit Deeden award administration
#[derive(Parser, Debug)]
#[command(name = "nisit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults apply if it does not exist)
    #[arg(short, long, default_value = "nisit.toml", env = "NISIT_CONFIG")]
    config: PathBuf,

    /// Database path (overrides `database.path`)
    #[arg(long, env = "NISIT_DB")]
    db: Option<PathBuf>,

    /// User id to act as
    #[arg(long = "as", env = "NISIT_USER")]
    acting_user: Option<UserId>,

    /// Log level (trace, debug, info, warn, error); overrides `log.level`
    #[arg(long)]
    log_level: Option<String>,

    /// Append logs to this file instead of stderr; overrides `log.file`
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and its first administrator
    Init {
        /// Administrator email
        email: String,

        /// Administrator full name
        name: String,
    },

    /// User and role administration
    #[command(subcommand)]
    User(commands::user::UserCommands),

    /// Award applications
    #[command(subcommand)]
    Ticket(commands::ticket::TicketCommands),

    /// Committee voting
    #[command(subcommand)]
    Vote(commands::vote::VoteCommands),

    /// The global award phase
    #[command(subcommand)]
    Phase(commands::phase::PhaseCommands),

    /// Most recent audit entries, oldest first
    Audit {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,
    },
}

fn load_config(cli: &Cli) -> Result<NisitConfig> {
    let mut config = if cli.config.exists() {
        NisitConfig::from_file(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        NisitConfig::default()
    };
    if let Some(db) = &cli.db {
        config.database.path.clone_from(db);
    }
    if let Some(level) = &cli.log_level {
        config.log.level.clone_from(level);
    }
    if let Some(file) = &cli.log_file {
        config.log.file = Some(file.clone());
    }
    Ok(config)
}

fn init_logging(config: &NisitConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_file) = &config.log.file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config)?;
    debug!(db = %config.database.path.display(), "opening award database");

    let engine = Engine::open(&config).context("failed to open award database")?;
    let ctx = commands::Context::new(engine, cli.acting_user);

    match cli.command {
        Commands::Init { email, name } => commands::user::init(&ctx, &email, &name),
        Commands::User(cmd) => commands::user::run(&ctx, cmd),
        Commands::Ticket(cmd) => commands::ticket::run(&ctx, cmd),
        Commands::Vote(cmd) => commands::vote::run(&ctx, cmd),
        Commands::Phase(cmd) => commands::phase::run(&ctx, cmd),
        Commands::Audit { limit } => commands::audit(&ctx, limit),
    }
}

#[cfg(test)]
mod tests {
    use nisit_core::{Phase, Role, TicketId, VoteChoice};

    use super::*;

    #[test]
    fn parses_global_flags() {
        let cli = Cli::try_parse_from([
            "nisit",
            "--db",
            "/tmp/award.db",
            "--as",
            "7",
            "--log-level",
            "debug",
            "phase",
            "show",
        ])
        .unwrap();
        assert_eq!(cli.acting_user, Some(UserId(7)));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/award.db")));

        let config = load_config(&cli).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/award.db"));
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn parses_domain_values() {
        let cli = Cli::try_parse_from(["nisit", "user", "grant", "3", "committee_president"])
            .unwrap();
        match cli.command {
            Commands::User(commands::user::UserCommands::Grant { user_id, role }) => {
                assert_eq!(user_id, UserId(3));
                assert_eq!(role, Role::CommitteePresident);
            },
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["nisit", "vote", "cast", "12", "approve"]).unwrap();
        match cli.command {
            Commands::Vote(commands::vote::VoteCommands::Cast { ticket_id, choice }) => {
                assert_eq!(ticket_id, TicketId(12));
                assert_eq!(choice, VoteChoice::Approve);
            },
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["nisit", "phase", "advance", "voting_end"]).unwrap();
        match cli.command {
            Commands::Phase(commands::phase::PhaseCommands::Advance { phase }) => {
                assert_eq!(phase, Phase::VotingEnd);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn reject_needs_a_reason() {
        assert!(Cli::try_parse_from(["nisit", "ticket", "reject", "4"]).is_err());
        let cli = Cli::try_parse_from([
            "nisit",
            "ticket",
            "reject",
            "4",
            "--reason",
            "missing transcript",
        ])
        .unwrap();
        match cli.command {
            Commands::Ticket(commands::ticket::TicketCommands::Reject { ticket_id, reason }) => {
                assert_eq!(ticket_id, TicketId(4));
                assert_eq!(reason, "missing transcript");
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(Cli::try_parse_from(["nisit", "vote", "cast", "1", "maybe"]).is_err());
        assert!(Cli::try_parse_from(["nisit", "user", "grant", "1", "janitor"]).is_err());
        assert!(Cli::try_parse_from(["nisit", "ticket", "submit", "abc"]).is_err());
    }
}
