//! Analytics report assembly.
//!
//! Pulls trackers from storage, takes ticket snapshots from the caller, and
//! runs the pure rollups in `sd_core::analytics`. Read-only.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use sd_core::analytics::{
    AgentPerformance, CsatPoint, agent_performance, avg_resolution_hours, created_per_day,
    csat_trend, met_rates, priority_counts, status_counts,
};
use sd_core::ticket::TicketSnapshot;
use sd_db::Database;

use crate::error::EngineError;

/// Read-side rollups for the reporting period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub tickets_by_status: BTreeMap<String, usize>,
    pub tickets_by_priority: BTreeMap<String, usize>,
    pub created_per_day: BTreeMap<NaiveDate, usize>,
    /// Mean hours from creation to resolution; `None` until something resolves.
    pub avg_resolution_hours: Option<f64>,
    /// Fraction of settled first-response deadlines that were met.
    pub first_response_met_rate: Option<f64>,
    /// Fraction of settled resolution deadlines that were met.
    pub resolution_met_rate: Option<f64>,
    pub agents: Vec<AgentPerformance>,
    pub csat: Vec<CsatPoint>,
}

pub(crate) fn build(
    db: &Database,
    tickets: &[TicketSnapshot],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<AnalyticsReport, EngineError> {
    let trackers = db.all_trackers()?;
    let (first_response_met_rate, resolution_met_rate) = met_rates(&trackers);
    Ok(AnalyticsReport {
        generated_at: now,
        period_start: start,
        period_end: end,
        tickets_by_status: status_counts(tickets),
        tickets_by_priority: priority_counts(tickets),
        created_per_day: created_per_day(tickets, start, end),
        avg_resolution_hours: avg_resolution_hours(&trackers),
        first_response_met_rate,
        resolution_met_rate,
        agents: agent_performance(tickets, &trackers),
        csat: csat_trend(tickets),
    })
}
