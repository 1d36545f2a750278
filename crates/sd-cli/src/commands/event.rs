//! Ticket-domain event commands.
//!
//! The ticket system itself lives elsewhere; these commands feed its events
//! into the engine, which reacts by creating trackers and settling deadlines.

use std::io::Write;
use std::str::FromStr;

use anyhow::{Context, Result};

use sd_core::types::{Priority, TicketId};

use crate::Config;
use crate::cli::EventCommand;
use crate::commands::{open_service, parse_at};
use crate::tickets::FileTicketDirectory;

pub fn run<W: Write>(writer: &mut W, config: &Config, event: &EventCommand) -> Result<()> {
    let mut service = open_service(config)?;
    match event {
        EventCommand::Created { ticket } => {
            let directory = FileTicketDirectory::load(&config.tickets_path)?;
            let snapshot = directory.find(ticket).with_context(|| {
                format!("ticket {ticket} not found in {}", config.tickets_path.display())
            })?;
            match service.on_ticket_created(snapshot)? {
                Some(rule_id) => {
                    writeln!(writer, "Ticket {ticket} bound to rule {rule_id}.")?;
                }
                None => {
                    writeln!(
                        writer,
                        "No enabled rule matches priority {}; ticket {ticket} is untracked.",
                        snapshot.priority.as_str()
                    )?;
                }
            }
        }
        EventCommand::FirstReply { ticket, at } => {
            let ticket_id = TicketId::new(ticket.as_str())?;
            let at = parse_at(at.as_deref())?;
            if service.on_first_agent_reply(&ticket_id, at)? {
                writeln!(writer, "First response recorded for {ticket}.")?;
            } else {
                writeln!(
                    writer,
                    "No first response recorded for {ticket} (untracked, or already recorded)."
                )?;
            }
        }
        EventCommand::Closed { ticket, at } => {
            let ticket_id = TicketId::new(ticket.as_str())?;
            let at = parse_at(at.as_deref())?;
            if service.on_ticket_closed(&ticket_id, at)? {
                writeln!(writer, "Resolution recorded for {ticket}.")?;
            } else {
                writeln!(
                    writer,
                    "No resolution recorded for {ticket} (untracked, or already recorded)."
                )?;
            }
        }
        EventCommand::Priority { ticket, priority } => {
            let ticket_id = TicketId::new(ticket.as_str())?;
            let priority = Priority::from_str(priority)?;
            service.on_priority_changed(&ticket_id, priority)?;
            writeln!(
                writer,
                "Priority change noted for {ticket}; existing deadlines are unchanged."
            )?;
        }
    }
    Ok(())
}
