//! `nisit ticket` commands.

use anyhow::{Context as _, Result};
use clap::Subcommand;
use nisit_core::ticket::{NewTicket, TicketContentUpdate};
use nisit_core::{AwardCategory, Semester, TicketAction, TicketId, TicketStatus, UserId};

use super::{Context, print_json};

/// Ticket subcommands.
#[derive(Subcommand, Debug)]
pub enum TicketCommands {
    /// Create a draft application (students, during NOMINATION)
    Create {
        /// Award category, e.g. academic or social_service
        category: AwardCategory,

        /// Academic year (Buddhist era)
        academic_year: u16,

        /// Semester: first, second or summer
        semester: Semester,

        /// Application form as a JSON object
        #[arg(long, default_value = "{}")]
        form: String,
    },

    /// Edit a ticket's category or form
    Edit {
        /// Ticket id
        ticket_id: TicketId,

        /// New award category
        #[arg(long)]
        category: Option<AwardCategory>,

        /// Replacement form as a JSON object
        #[arg(long)]
        form: Option<String>,
    },

    /// Submit a draft for review
    Submit {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Accept at the current approval stage
    Accept {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Reject at the current approval stage
    Reject {
        /// Ticket id
        ticket_id: TicketId,

        /// Reason shown to the student; required
        #[arg(long)]
        reason: String,
    },

    /// Nominate after final review (administrators, during REVIEW_END)
    Verify {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Sign an approved ticket (committee president, during CERTIFICATE)
    Sign {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Show one ticket
    Show {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// List tickets by status, or the acting user's own tickets
    #[command(alias = "ls")]
    List {
        /// Only tickets in this status
        #[arg(long, conflicts_with = "mine")]
        status: Option<TicketStatus>,

        /// Only tickets owned by the acting user
        #[arg(long)]
        mine: bool,
    },

    /// Tickets the acting user can act on now
    Queue,

    /// Audit trail of one ticket
    History {
        /// Ticket id
        ticket_id: TicketId,
    },

    /// Ticket counts for a student's dashboard
    Summary {
        /// Student id (defaults to the acting user)
        user_id: Option<UserId>,
    },
}

fn parse_form(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("--form must be valid JSON")
}

fn act(ctx: &Context, ticket_id: TicketId, action: TicketAction) -> Result<()> {
    let ticket = ctx
        .engine()
        .apply_action(&ctx.identity()?, ticket_id, action)
        .with_context(|| format!("cannot {action} ticket {ticket_id}"))?;
    print_json(&ticket)
}

pub fn run(ctx: &Context, cmd: TicketCommands) -> Result<()> {
    let engine = ctx.engine();
    match cmd {
        TicketCommands::Create {
            category,
            academic_year,
            semester,
            form,
        } => {
            let input = NewTicket {
                category,
                academic_year,
                semester,
                form_data: parse_form(&form)?,
            };
            let ticket = engine
                .create_ticket(&ctx.identity()?, &input)
                .context("failed to create ticket")?;
            print_json(&ticket)
        },
        TicketCommands::Edit {
            ticket_id,
            category,
            form,
        } => {
            let update = TicketContentUpdate {
                category,
                form_data: form.as_deref().map(parse_form).transpose()?,
            };
            let ticket = engine
                .update_ticket_content(&ctx.identity()?, ticket_id, &update)
                .with_context(|| format!("cannot edit ticket {ticket_id}"))?;
            print_json(&ticket)
        },
        TicketCommands::Submit { ticket_id } => act(ctx, ticket_id, TicketAction::Submit),
        TicketCommands::Accept { ticket_id } => act(ctx, ticket_id, TicketAction::Accept),
        TicketCommands::Reject { ticket_id, reason } => {
            let ticket = engine
                .reject_ticket(&ctx.identity()?, ticket_id, &reason)
                .with_context(|| format!("cannot reject ticket {ticket_id}"))?;
            print_json(&ticket)
        },
        TicketCommands::Verify { ticket_id } => act(ctx, ticket_id, TicketAction::Verify),
        TicketCommands::Sign { ticket_id } => act(ctx, ticket_id, TicketAction::Sign),
        TicketCommands::Show { ticket_id } => print_json(&engine.ticket(ticket_id)?),
        TicketCommands::List { status, mine } => {
            let tickets = match status {
                Some(status) => engine.tickets_with_status(status)?,
                None if mine => engine.tickets_for_owner(ctx.identity()?.user_id)?,
                None => {
                    let mut all = Vec::new();
                    for status in TicketStatus::ALL {
                        all.extend(engine.tickets_with_status(status)?);
                    }
                    all.sort_by_key(|t| t.id);
                    all
                },
            };
            print_json(&tickets)
        },
        TicketCommands::Queue => print_json(&engine.review_queue(&ctx.identity()?)?),
        TicketCommands::History { ticket_id } => print_json(&engine.ticket_history(ticket_id)?),
        TicketCommands::Summary { user_id } => {
            let owner = match user_id {
                Some(id) => id,
                None => ctx.identity()?.user_id,
            };
            print_json(&engine.student_summary(owner)?)
        },
    }
}
