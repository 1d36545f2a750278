//! SLA trackers.
//!
//! A tracker binds a ticket to the rule that matched its priority at creation
//! and carries the two deadline commitments (first response, resolution).
//! Targets are fixed at creation; actual/met are written exactly once, the
//! first time the corresponding event is observed. Re-opening a ticket or
//! changing its priority never resets a tracker.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::hours::round_hours;
use crate::rule::SlaRule;

/// Fraction of the deadline window that, once consumed, flips the standing
/// from `OnTrack` to `AtRisk`.
const AT_RISK_REMAINING_FRACTION: f64 = 0.25;

/// Per-ticket SLA tracking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaTracker {
    pub id: i64,
    pub ticket_id: String,
    pub rule_id: i64,
    /// Ticket creation time, the anchor both targets were derived from.
    pub created_at: DateTime<Utc>,
    pub first_response_target: DateTime<Utc>,
    pub first_response_actual: Option<DateTime<Utc>>,
    pub first_response_met: Option<bool>,
    pub resolution_target: DateTime<Utc>,
    pub resolution_actual: Option<DateTime<Utc>>,
    pub resolution_met: Option<bool>,
    /// Escalation markers, one per breach kind. Set exactly once by the
    /// sweep's compare-and-set claim; distinct from actual/met because a
    /// breached deadline with no actual is still pending, not met.
    pub first_response_escalated_at: Option<DateTime<Utc>>,
    pub resolution_escalated_at: Option<DateTime<Utc>>,
}

impl SlaTracker {
    /// Whether the given actual time meets the given target.
    #[must_use]
    pub fn met(actual: DateTime<Utc>, target: DateTime<Utc>) -> bool {
        actual <= target
    }
}

/// Computes the two deadline targets from a rule and the ticket creation time.
///
/// Rule hours are applied with millisecond precision so fractional-hour rules
/// (e.g. 0.5h first response) land where expected.
#[must_use]
pub fn deadline_targets(rule: &SlaRule, created_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        created_at + hours_duration(rule.first_response_hours),
        created_at + hours_duration(rule.resolution_hours),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn hours_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Display standing of a single deadline, for UI badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineStanding {
    /// Actual recorded on or before target.
    Met,
    /// Actual recorded late, or target passed with no actual yet.
    Breached,
    /// No actual yet and 25% or less of the window remains.
    AtRisk,
    /// No actual yet, comfortably before target.
    OnTrack,
}

impl DeadlineStanding {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Met => "met",
            Self::Breached => "breached",
            Self::AtRisk => "at_risk",
            Self::OnTrack => "on_track",
        }
    }
}

/// Computes the standing of one deadline as of `now`.
///
/// `window_start` is the tracker creation time; the at-risk threshold is a
/// fraction of the full window, so a 4h deadline goes at-risk with 1h left
/// while a 30-day deadline goes at-risk with a week left.
#[must_use]
pub fn standing(
    window_start: DateTime<Utc>,
    target: DateTime<Utc>,
    actual: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DeadlineStanding {
    if let Some(actual) = actual {
        return if SlaTracker::met(actual, target) {
            DeadlineStanding::Met
        } else {
            DeadlineStanding::Breached
        };
    }
    if now > target {
        return DeadlineStanding::Breached;
    }
    let window_ms = (target - window_start).num_milliseconds();
    let remaining_ms = (target - now).num_milliseconds();
    if window_ms > 0 {
        #[allow(clippy::cast_precision_loss)]
        let remaining = remaining_ms as f64 / window_ms as f64;
        if remaining <= AT_RISK_REMAINING_FRACTION {
            return DeadlineStanding::AtRisk;
        }
    }
    DeadlineStanding::OnTrack
}

/// Hours between creation and actual, for analytics. Rounded to 2 decimals.
#[must_use]
pub fn time_to_actual(created_at: DateTime<Utc>, actual: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    round_hours((actual - created_at).num_milliseconds() as f64 / 3_600_000.0)
}
