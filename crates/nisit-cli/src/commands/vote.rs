//! `nisit vote` commands.

use anyhow::{Context as _, Result};
use clap::Subcommand;
use nisit_core::{TicketId, VoteChoice};
use serde_json::json;

use super::{Context, print_json};

/// Vote subcommands.
#[derive(Subcommand, Debug)]
pub enum VoteCommands {
    /// Cast or replace the acting member's vote (during VOTING)
    Cast {
        /// Ticket id
        ticket_id: TicketId,

        /// approve or reject
        choice: VoteChoice,
    },

    /// Count the current votes on a ticket
    Tally {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// List the votes on a ticket
    List {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Resolve one ticket from its tally (during VOTING_END)
    Close {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Members whose votes count
    Roster,
}

pub fn run(ctx: &Context, cmd: VoteCommands) -> Result<()> {
    let engine = ctx.engine();
    match cmd {
        VoteCommands::Cast { ticket_id, choice } => {
            let vote = engine
                .cast_vote(&ctx.identity()?, ticket_id, choice)
                .with_context(|| format!("vote on ticket {ticket_id} refused"))?;
            print_json(&vote)
        },
        VoteCommands::Tally { ticket_id } => {
            let tally = engine.tally(ticket_id)?;
            print_json(&json!({
                "ticket_id": ticket_id,
                "tally": tally,
                "abstain_count": tally.abstain_count(),
                "threshold_percent": engine.tally_policy().threshold_percent(),
            }))
        },
        VoteCommands::List { ticket_id } => print_json(&engine.votes_for_ticket(ticket_id)?),
        VoteCommands::Close { ticket_id } => {
            let outcome = engine
                .close_voting_for_ticket(ticket_id)
                .with_context(|| format!("cannot close voting on ticket {ticket_id}"))?;
            print_json(&outcome)
        },
        VoteCommands::Roster => print_json(&engine.eligible_roster()?),
    }
}
