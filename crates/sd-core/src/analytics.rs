//! Read-side rollups for reporting.
//!
//! Straightforward grouped aggregation over ticket snapshots and trackers.
//! Averages ignore rows with no recorded value; counts are exact. Nothing
//! here mutates state, so the engine can rebuild a report at any time.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::hours::round_hours;
use crate::ticket::TicketSnapshot;
use crate::tracker::{SlaTracker, time_to_actual};
use crate::types::{Priority, TicketStatus};

/// Per-agent performance rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub tickets: usize,
    pub resolved: usize,
    /// Mean hours from ticket creation to first response, over trackers with
    /// a recorded first response. `None` when no such tracker exists.
    pub avg_first_response_hours: Option<f64>,
    /// Mean hours from ticket creation to resolution, same convention.
    pub avg_resolution_hours: Option<f64>,
}

/// One day of CSAT ratings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsatPoint {
    pub date: NaiveDate,
    pub ratings: usize,
    pub average: f64,
}

/// Tickets grouped by current status.
#[must_use]
pub fn status_counts(tickets: &[TicketSnapshot]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        *counts.entry(ticket.status.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Tickets grouped by current priority.
#[must_use]
pub fn priority_counts(tickets: &[TicketSnapshot]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        *counts
            .entry(ticket.priority.as_str().to_string())
            .or_insert(0) += 1;
    }
    counts
}

/// Tickets created per day within `[start, end)`.
#[must_use]
pub fn created_per_day(
    tickets: &[TicketSnapshot],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        if ticket.created_at >= start && ticket.created_at < end {
            *counts.entry(ticket.created_at.date_naive()).or_insert(0) += 1;
        }
    }
    counts
}

/// Mean resolution hours across trackers with a recorded resolution.
#[must_use]
pub fn avg_resolution_hours(trackers: &[SlaTracker]) -> Option<f64> {
    mean(
        trackers
            .iter()
            .filter_map(|t| t.resolution_actual.map(|a| time_to_actual(t.created_at, a))),
    )
}

/// Fraction of settled deadlines that were met, per kind.
///
/// Returns `(first_response_met_rate, resolution_met_rate)`; a rate is `None`
/// when no deadline of that kind has settled yet.
#[must_use]
pub fn met_rates(trackers: &[SlaTracker]) -> (Option<f64>, Option<f64>) {
    let fr = rate(trackers.iter().filter_map(|t| t.first_response_met));
    let res = rate(trackers.iter().filter_map(|t| t.resolution_met));
    (fr, res)
}

/// Per-agent rollups, keyed by the ticket's current assignee.
///
/// Unassigned tickets are skipped; trackers with no matching ticket snapshot
/// are skipped too (the ticket domain owns assignment, not the tracker).
#[must_use]
pub fn agent_performance(
    tickets: &[TicketSnapshot],
    trackers: &[SlaTracker],
) -> Vec<AgentPerformance> {
    let tracker_by_ticket: BTreeMap<&str, &SlaTracker> = trackers
        .iter()
        .map(|t| (t.ticket_id.as_str(), t))
        .collect();

    let mut grouped: BTreeMap<&str, Vec<&TicketSnapshot>> = BTreeMap::new();
    for ticket in tickets {
        if let Some(agent) = ticket.agent_id.as_deref() {
            grouped.entry(agent).or_default().push(ticket);
        }
    }

    grouped
        .into_iter()
        .map(|(agent_id, tickets)| {
            let resolved = tickets.iter().filter(|t| t.status.is_terminal()).count();
            let mut first_response = Vec::new();
            let mut resolution = Vec::new();
            for ticket in &tickets {
                if let Some(tracker) = tracker_by_ticket.get(ticket.id.as_str()) {
                    if let Some(actual) = tracker.first_response_actual {
                        first_response.push(time_to_actual(tracker.created_at, actual));
                    }
                    if let Some(actual) = tracker.resolution_actual {
                        resolution.push(time_to_actual(tracker.created_at, actual));
                    }
                }
            }
            AgentPerformance {
                agent_id: agent_id.to_string(),
                tickets: tickets.len(),
                resolved,
                avg_first_response_hours: mean(first_response.into_iter()),
                avg_resolution_hours: mean(resolution.into_iter()),
            }
        })
        .collect()
}

/// Daily CSAT averages over rated tickets, keyed by creation date.
#[must_use]
pub fn csat_trend(tickets: &[TicketSnapshot]) -> Vec<CsatPoint> {
    let mut grouped: BTreeMap<NaiveDate, Vec<u8>> = BTreeMap::new();
    for ticket in tickets {
        if let Some(rating) = ticket.satisfaction_rating {
            grouped
                .entry(ticket.created_at.date_naive())
                .or_default()
                .push(rating);
        }
    }
    grouped
        .into_iter()
        .map(|(date, ratings)| {
            #[allow(clippy::cast_precision_loss)]
            let average = ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64;
            CsatPoint {
                date,
                ratings: ratings.len(),
                average: round_hours(average),
            }
        })
        .collect()
}

/// Backlog ordered by urgency: open tickets, most urgent priority first.
#[must_use]
pub fn open_by_priority(tickets: &[TicketSnapshot]) -> Vec<(Priority, usize)> {
    let mut counts: BTreeMap<Priority, usize> = BTreeMap::new();
    for ticket in tickets {
        if !ticket.status.is_terminal() {
            *counts.entry(ticket.priority).or_insert(0) += 1;
        }
    }
    counts.into_iter().rev().collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(round_hours(values.iter().sum::<f64>() / values.len() as f64))
}

fn rate(values: impl Iterator<Item = bool>) -> Option<f64> {
    let mut total = 0usize;
    let mut met = 0usize;
    for value in values {
        total += 1;
        if value {
            met += 1;
        }
    }
    if total == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(round_hours(met as f64 / total as f64))
}
