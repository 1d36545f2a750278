//! Core domain logic for the support desk SLA engine.
//!
//! This crate contains the fundamental types and logic for:
//! - Hour arithmetic: wall-clock durations rounded to 2 decimals at each boundary
//! - SLA rules and trackers: deadline targets, met/breached computation
//! - Escalation: deciding which breaches still need action
//! - Analytics: read-side rollups over tickets and trackers

pub mod analytics;
pub mod escalation;
pub mod hours;
pub mod policy;
pub mod rule;
pub mod ticket;
pub mod tracker;
pub mod types;

pub use escalation::{
    BreachKind, EscalationAction, EscalationPolicy, pending_breaches, plan_actions,
};
pub use hours::{LedgerEntry, elapsed_hours, hours_between, round_hours};
pub use policy::{ActionKind, Role, can};
pub use rule::{SlaRule, match_rule};
pub use ticket::TicketSnapshot;
pub use tracker::{DeadlineStanding, SlaTracker, deadline_targets, standing, time_to_actual};
pub use types::{AgentId, CustomerId, Priority, TicketId, TicketStatus, ValidationError};
