//! `nisit phase` commands.

use anyhow::{Context as _, Result};
use clap::Subcommand;
use nisit_core::Phase;

use super::{Context, print_json};

/// Phase subcommands.
#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Show the active phase
    Show,

    /// Advance to the next phase (administrators only)
    Advance {
        /// Target phase; must directly follow the active one
        phase: Phase,
    },

    /// Every phase activation, oldest first
    History,
}

pub fn run(ctx: &Context, cmd: PhaseCommands) -> Result<()> {
    let engine = ctx.engine();
    match cmd {
        PhaseCommands::Show => print_json(&engine.current_phase()?),
        PhaseCommands::Advance { phase } => {
            let advance = engine
                .advance_phase(&ctx.identity()?, phase)
                .with_context(|| format!("cannot advance to {phase}"))?;
            print_json(&advance)
        },
        PhaseCommands::History => print_json(&engine.phase_history()?),
    }
}
