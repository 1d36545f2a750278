//! Escalation planning.
//!
//! Pure decisions about which deadline breaches still need action and what
//! the configured actions are. The sweep in sd-engine owns the side effects
//! and the compare-and-set claim that makes each breach fire exactly once.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::TicketSnapshot;
use crate::tracker::SlaTracker;
use crate::types::Priority;

/// Which deadline was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    FirstResponse,
    Resolution,
}

impl BreachKind {
    /// String representation for storage and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstResponse => "first_response",
            Self::Resolution => "resolution",
        }
    }
}

impl fmt::Display for BreachKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a sweep does once a breach is claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Raise ticket priority one level (capped at critical).
    pub raise_priority: bool,
    /// Reassign breached tickets to this agent, if set.
    pub reassign_to: Option<String>,
    /// Emit a breach notification event.
    pub notify: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            raise_priority: true,
            reassign_to: None,
            notify: true,
        }
    }
}

/// A concrete action the sweep will perform for one claimed breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EscalationAction {
    RaisePriority {
        ticket_id: String,
        from: Priority,
        to: Priority,
    },
    Reassign {
        ticket_id: String,
        to_agent: String,
    },
    Notify {
        ticket_id: String,
        breach: BreachKind,
        target: DateTime<Utc>,
    },
}

/// Breach kinds on a tracker that are past target, still pending, and not
/// yet escalated.
///
/// A kind whose actual is recorded is settled (met or breached-and-recorded)
/// and never swept; a kind whose marker is set was already claimed.
#[must_use]
pub fn pending_breaches(tracker: &SlaTracker, now: DateTime<Utc>) -> Vec<BreachKind> {
    let mut kinds = Vec::new();
    if tracker.first_response_actual.is_none()
        && tracker.first_response_target < now
        && tracker.first_response_escalated_at.is_none()
    {
        kinds.push(BreachKind::FirstResponse);
    }
    if tracker.resolution_actual.is_none()
        && tracker.resolution_target < now
        && tracker.resolution_escalated_at.is_none()
    {
        kinds.push(BreachKind::Resolution);
    }
    kinds
}

/// Expands the policy into concrete actions for one claimed breach.
///
/// A ticket already at critical priority gets no raise action; a policy with
/// everything disabled yields an empty plan (the claim alone still dedups).
#[must_use]
pub fn plan_actions(
    policy: &EscalationPolicy,
    ticket: &TicketSnapshot,
    kind: BreachKind,
    target: DateTime<Utc>,
) -> Vec<EscalationAction> {
    let mut actions = Vec::new();
    if policy.raise_priority {
        if let Some(to) = ticket.priority.escalated() {
            actions.push(EscalationAction::RaisePriority {
                ticket_id: ticket.id.clone(),
                from: ticket.priority,
                to,
            });
        }
    }
    if let Some(agent) = &policy.reassign_to {
        if ticket.agent_id.as_deref() != Some(agent.as_str()) {
            actions.push(EscalationAction::Reassign {
                ticket_id: ticket.id.clone(),
                to_agent: agent.clone(),
            });
        }
    }
    if policy.notify {
        actions.push(EscalationAction::Notify {
            ticket_id: ticket.id.clone(),
            breach: kind,
            target,
        });
    }
    actions
}
