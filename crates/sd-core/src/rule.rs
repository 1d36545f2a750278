//! SLA rule table.
//!
//! Rules are static configuration rows mapping a ticket priority to
//! first-response and resolution deadlines in hours. Matching happens once,
//! at tracker creation; later rule edits never rewrite existing trackers.

use serde::{Deserialize, Serialize};

use crate::types::Priority;

/// A single SLA rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaRule {
    pub id: i64,
    pub name: String,
    pub priority: Priority,
    pub first_response_hours: f64,
    pub resolution_hours: f64,
    pub enabled: bool,
}

/// Finds the enabled rule for a priority.
///
/// When several enabled rules share a priority, the lowest id wins so the
/// choice is deterministic across replicas.
#[must_use]
pub fn match_rule(rules: &[SlaRule], priority: Priority) -> Option<&SlaRule> {
    rules
        .iter()
        .filter(|r| r.enabled && r.priority == priority)
        .min_by_key(|r| r.id)
}
