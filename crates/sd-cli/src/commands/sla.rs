//! SLA status command for one ticket.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use sd_core::policy::ActionKind;
use sd_core::tracker::time_to_actual;
use sd_core::types::TicketId;

use crate::Config;
use crate::commands::{ensure_allowed, open_service, parse_at};

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    ticket: &str,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    ensure_allowed(config, ActionKind::ViewSlaStatus)?;
    let service = open_service(config)?;
    let ticket_id = TicketId::new(ticket)?;
    let now = parse_at(at)?;
    let status = service.sla_status(&ticket_id, now)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &status)?;
        writeln!(writer)?;
        return Ok(());
    }

    let tracker = &status.tracker;
    writeln!(writer, "Ticket:  {}", tracker.ticket_id)?;
    writeln!(writer, "Rule:    {}", tracker.rule_id)?;
    writeln!(writer, "Created: {}", tracker.created_at.to_rfc3339())?;
    writeln!(writer)?;
    write_deadline(
        writer,
        "First response",
        tracker.first_response_target,
        tracker.first_response_actual,
        status.first_response.as_str(),
        tracker.created_at,
        now,
    )?;
    write_deadline(
        writer,
        "Resolution",
        tracker.resolution_target,
        tracker.resolution_actual,
        status.resolution.as_str(),
        tracker.created_at,
        now,
    )?;
    Ok(())
}

fn write_deadline<W: Write>(
    writer: &mut W,
    label: &str,
    target: DateTime<Utc>,
    actual: Option<DateTime<Utc>>,
    standing: &str,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    writeln!(writer, "{label}: {standing}")?;
    writeln!(writer, "  target: {}", target.to_rfc3339())?;
    match actual {
        Some(actual) => {
            writeln!(
                writer,
                "  actual: {} ({:.2}h after creation)",
                actual.to_rfc3339(),
                time_to_actual(created_at, actual)
            )?;
        }
        None => {
            // Negative once the target has passed.
            let remaining = if now > target {
                -sd_core::hours_between(target, now)
            } else {
                sd_core::hours_between(now, target)
            };
            writeln!(writer, "  remaining: {remaining:.2}h")?;
        }
    }
    Ok(())
}
