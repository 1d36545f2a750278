//! Timer commands: start, stop, elapsed.

use std::io::Write;

use anyhow::{Context, Result};

use sd_core::policy::ActionKind;
use sd_core::types::{AgentId, CustomerId, TicketId};

use crate::Config;
use crate::cli::TimerCommand;
use crate::commands::{ensure_allowed, open_service, parse_at};
use crate::tickets::FileTicketDirectory;

pub fn run<W: Write>(writer: &mut W, config: &Config, action: &TimerCommand) -> Result<()> {
    let mut service = open_service(config)?;
    match action {
        TimerCommand::Start { ticket, agent, at } => {
            ensure_allowed(config, ActionKind::StartTimer)?;
            let ticket_id = TicketId::new(ticket.as_str())?;
            let agent_id = AgentId::new(agent.as_str())?;
            let customer_id = customer_for(config, ticket)?;
            let now = parse_at(at.as_deref())?;
            service.start_timer(&ticket_id, &agent_id, &customer_id, now)?;
            writeln!(writer, "Timer started on {ticket} for {agent}.")?;
        }
        TimerCommand::Stop { ticket, agent, at } => {
            ensure_allowed(config, ActionKind::StopTimer)?;
            let ticket_id = TicketId::new(ticket.as_str())?;
            let agent_id = AgentId::new(agent.as_str())?;
            let now = parse_at(at.as_deref())?;
            let hours = service.stop_timer(&ticket_id, &agent_id, now)?;
            writeln!(writer, "Timer stopped on {ticket}: {hours:.2}h logged.")?;
        }
        TimerCommand::Elapsed { ticket, at } => {
            let ticket_id = TicketId::new(ticket.as_str())?;
            let now = parse_at(at.as_deref())?;
            let hours = service.elapsed_for_ticket(&ticket_id, now)?;
            writeln!(writer, "{ticket}: {hours:.2}h")?;
        }
    }
    Ok(())
}

/// The billed customer is the ticket's customer; the ticket file is the
/// source of truth for that link.
fn customer_for(config: &Config, ticket_id: &str) -> Result<CustomerId> {
    let directory = FileTicketDirectory::load(&config.tickets_path)?;
    let snapshot = directory
        .find(ticket_id)
        .with_context(|| format!("ticket {ticket_id} not found in {}", config.tickets_path.display()))?;
    Ok(CustomerId::new(snapshot.customer_id.as_str())?)
}
