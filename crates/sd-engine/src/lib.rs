//! Service facade for the SLA & time-accounting engine.
//!
//! [`SlaService`] is the one entry point the ticket domain, UI layer, and
//! scheduler talk to: it reacts to ticket events (creation, first reply,
//! close, priority change), controls timers, manages hour allocations,
//! answers SLA status queries, runs the escalation sweep, and assembles
//! analytics reports. It is constructed once at process start and passed
//! down; there is no ambient global state.

mod error;
mod report;
mod sweep;
mod ticket;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sd_core::escalation::EscalationPolicy;
use sd_core::hours::round_hours;
use sd_core::rule::match_rule;
use sd_core::ticket::TicketSnapshot;
use sd_core::tracker::{
    DeadlineStanding, SlaTracker, deadline_targets, standing,
};
use sd_core::types::{AgentId, CustomerId, Priority, TicketId};
use sd_db::{Database, HourAccountRecord, NewTimeEntry, NewTracker};

pub use error::EngineError;
pub use report::AnalyticsReport;
pub use sweep::{SweepError, SweepSummary};
pub use ticket::{DirectoryError, EscalationNotifier, NotifyError, TicketDirectory};

/// The SLA engine service.
pub struct SlaService {
    db: Database,
    policy: EscalationPolicy,
}

/// Tracker snapshot plus display standings, for SLA badges.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SlaStatus {
    pub tracker: SlaTracker,
    pub first_response: DeadlineStanding,
    pub resolution: DeadlineStanding,
}

impl SlaService {
    /// Creates the service over an opened database.
    #[must_use]
    pub fn new(db: Database, policy: EscalationPolicy) -> Self {
        Self { db, policy }
    }

    /// The underlying database, for read-side consumers.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========== Ticket domain events ==========

    /// Reacts to ticket creation: binds the ticket to the rule matching its
    /// priority right now and commits both deadline targets.
    ///
    /// Returns the matched rule id, or `None` when no enabled rule matches —
    /// SLA tracking is opt-in per priority, and every later SLA operation on
    /// such a ticket is a no-op. Re-delivered creation events are ignored.
    pub fn on_ticket_created(&mut self, ticket: &TicketSnapshot) -> Result<Option<i64>, EngineError> {
        let rules = self.db.enabled_rules()?;
        let Some(rule) = match_rule(&rules, ticket.priority) else {
            tracing::debug!(ticket_id = %ticket.id, priority = %ticket.priority, "no SLA rule for priority");
            return Ok(None);
        };
        let (first_response_target, resolution_target) = deadline_targets(rule, ticket.created_at);
        let inserted = self.db.insert_tracker(&NewTracker {
            ticket_id: ticket.id.clone(),
            rule_id: rule.id,
            created_at: ticket.created_at,
            first_response_target,
            resolution_target,
        })?;
        if inserted.is_some() {
            tracing::info!(
                ticket_id = %ticket.id,
                rule_id = rule.id,
                %first_response_target,
                %resolution_target,
                "SLA tracker created"
            );
        }
        Ok(Some(rule.id))
    }

    /// Records the first agent reply, first-write-wins.
    ///
    /// Returns whether this call recorded it: false when the ticket is
    /// untracked or a first response was already recorded.
    pub fn on_first_agent_reply(
        &mut self,
        ticket_id: &TicketId,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let Some(tracker) = self.db.get_tracker(ticket_id.as_str())? else {
            return Ok(false);
        };
        let met = SlaTracker::met(at, tracker.first_response_target);
        let recorded = self.db.record_first_response(ticket_id.as_str(), at, met)?;
        if recorded {
            tracing::info!(ticket_id = %ticket_id, met, "first response recorded");
        }
        Ok(recorded)
    }

    /// Records the resolution when a ticket closes, first-write-wins.
    ///
    /// Resolution can land without a first response (closed with no agent
    /// reply); the first-response fields then stay null. Re-opening a ticket
    /// never resets the tracker.
    pub fn on_ticket_closed(
        &mut self,
        ticket_id: &TicketId,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let Some(tracker) = self.db.get_tracker(ticket_id.as_str())? else {
            return Ok(false);
        };
        let met = SlaTracker::met(at, tracker.resolution_target);
        let recorded = self.db.record_resolution(ticket_id.as_str(), at, met)?;
        if recorded {
            tracing::info!(ticket_id = %ticket_id, met, "resolution recorded");
        }
        Ok(recorded)
    }

    /// Reacts to a priority change.
    ///
    /// The tracker is an append-only commitment from creation time: targets
    /// are never recomputed, so this only logs. Consumed at all so the event
    /// stream is fully handled and the decision is explicit.
    pub fn on_priority_changed(
        &mut self,
        ticket_id: &TicketId,
        new_priority: Priority,
    ) -> Result<(), EngineError> {
        if self.db.get_tracker(ticket_id.as_str())?.is_some() {
            tracing::info!(
                ticket_id = %ticket_id,
                %new_priority,
                "priority changed; SLA targets keep their creation-time commitment"
            );
        }
        Ok(())
    }

    // ========== Timer control ==========

    /// Starts a timer for an agent on a ticket.
    pub fn start_timer(
        &mut self,
        ticket_id: &TicketId,
        agent_id: &AgentId,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<String, EngineError> {
        let entry = NewTimeEntry {
            id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.as_str().to_string(),
            agent_id: agent_id.as_str().to_string(),
            customer_id: customer_id.as_str().to_string(),
            start_time: now,
        };
        self.db.start_timer(&entry)?;
        tracing::info!(ticket_id = %ticket_id, agent_id = %agent_id, "timer started");
        Ok(entry.id)
    }

    /// Stops the running timer for an agent on a ticket and returns the
    /// entry's duration in hours.
    pub fn stop_timer(
        &mut self,
        ticket_id: &TicketId,
        agent_id: &AgentId,
        now: DateTime<Utc>,
    ) -> Result<f64, EngineError> {
        Ok(self
            .db
            .stop_timer(ticket_id.as_str(), agent_id.as_str(), now)?)
    }

    /// Total hours logged against a ticket as of `now`, running timers
    /// included.
    pub fn elapsed_for_ticket(
        &self,
        ticket_id: &TicketId,
        now: DateTime<Utc>,
    ) -> Result<f64, EngineError> {
        Ok(self.db.elapsed_for_ticket(ticket_id.as_str(), now)?)
    }

    // ========== Hour accounts ==========

    /// Adds allocated hours for a customer, creating the account on first
    /// allocation.
    pub fn allocate_hours(
        &mut self,
        customer_id: &CustomerId,
        hours: f64,
        now: DateTime<Utc>,
    ) -> Result<HourAccountRecord, EngineError> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(EngineError::InvalidHours { value: hours });
        }
        Ok(self
            .db
            .allocate_hours(customer_id.as_str(), round_hours(hours), now)?)
    }

    /// Allocated/spent/remaining for a customer, spent derived from the
    /// ledger at read time.
    pub fn customer_hours(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<HourAccountRecord, EngineError> {
        self.db
            .account_summary(customer_id.as_str(), now)?
            .ok_or_else(|| EngineError::AccountNotFound {
                customer_id: customer_id.as_str().to_string(),
            })
    }

    // ========== SLA status ==========

    /// Tracker snapshot with per-deadline standings, for display.
    pub fn sla_status(
        &self,
        ticket_id: &TicketId,
        now: DateTime<Utc>,
    ) -> Result<SlaStatus, EngineError> {
        let tracker = self.db.get_tracker(ticket_id.as_str())?.ok_or_else(|| {
            EngineError::TrackerNotFound {
                ticket_id: ticket_id.as_str().to_string(),
            }
        })?;
        let first_response = standing(
            tracker.created_at,
            tracker.first_response_target,
            tracker.first_response_actual,
            now,
        );
        let resolution = standing(
            tracker.created_at,
            tracker.resolution_target,
            tracker.resolution_actual,
            now,
        );
        Ok(SlaStatus {
            tracker,
            first_response,
            resolution,
        })
    }

    // ========== Escalation sweep ==========

    /// Runs one escalation sweep as of `now`. See [`sweep`] for semantics.
    pub fn run_sweep(
        &mut self,
        now: DateTime<Utc>,
        directory: &mut dyn TicketDirectory,
        notifier: &mut dyn EscalationNotifier,
    ) -> Result<SweepSummary, EngineError> {
        sweep::run(&mut self.db, &self.policy, now, directory, notifier)
    }

    // ========== Analytics ==========

    /// Assembles the read-side report over the given ticket snapshots and
    /// the stored trackers.
    pub fn analytics_report(
        &self,
        tickets: &[TicketSnapshot],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, EngineError> {
        report::build(&self.db, tickets, start, end, now)
    }
}
