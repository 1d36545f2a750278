//! Analytics report command.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use sd_core::policy::ActionKind;
use sd_engine::AnalyticsReport;

use crate::Config;
use crate::commands::{ensure_allowed, format_rate, open_service, parse_at};
use crate::tickets::FileTicketDirectory;

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    start: Option<&str>,
    end: Option<&str>,
    json: bool,
) -> Result<()> {
    ensure_allowed(config, ActionKind::ViewReports)?;
    let now = Utc::now();
    let end = match end {
        Some(value) => parse_at(Some(value))?,
        None => now,
    };
    let start = match start {
        Some(value) => parse_at(Some(value))?,
        None => end - Duration::days(7),
    };

    let service = open_service(config)?;
    let directory = FileTicketDirectory::load(&config.tickets_path)?;
    let report = service.analytics_report(directory.all(), start, end, now)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
        return Ok(());
    }
    render(writer, &report, start, end)
}

fn render<W: Write>(
    writer: &mut W,
    report: &AnalyticsReport,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    writeln!(
        writer,
        "Report {} .. {}",
        start.to_rfc3339(),
        end.to_rfc3339()
    )?;
    writeln!(writer)?;

    writeln!(writer, "Tickets by status:")?;
    for (status, count) in &report.tickets_by_status {
        writeln!(writer, "  {status}: {count}")?;
    }
    writeln!(writer, "Tickets by priority:")?;
    for (priority, count) in &report.tickets_by_priority {
        writeln!(writer, "  {priority}: {count}")?;
    }

    writeln!(writer, "Created per day:")?;
    for (date, count) in &report.created_per_day {
        writeln!(writer, "  {date}: {count}")?;
    }

    match report.avg_resolution_hours {
        Some(hours) => writeln!(writer, "Avg resolution: {hours:.2}h")?,
        None => writeln!(writer, "Avg resolution: n/a")?,
    }
    writeln!(
        writer,
        "First response met: {}",
        format_rate(report.first_response_met_rate)
    )?;
    writeln!(
        writer,
        "Resolution met:     {}",
        format_rate(report.resolution_met_rate)
    )?;

    if !report.agents.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Agents:")?;
        for agent in &report.agents {
            let avg_first_response = agent
                .avg_first_response_hours
                .map_or_else(|| "n/a".to_string(), |h| format!("{h:.2}h"));
            let avg_resolution = agent
                .avg_resolution_hours
                .map_or_else(|| "n/a".to_string(), |h| format!("{h:.2}h"));
            writeln!(
                writer,
                "  {}: {} tickets, {} resolved, avg FR {avg_first_response}, avg res {avg_resolution}",
                agent.agent_id, agent.tickets, agent.resolved
            )?;
        }
    }

    if !report.csat.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Satisfaction:")?;
        for point in &report.csat {
            writeln!(
                writer,
                "  {}: {:.2} avg over {} ratings",
                point.date, point.average, point.ratings
            )?;
        }
    }
    Ok(())
}
