//! The escalation sweep.
//!
//! Runs on a fixed schedule (hourly in the reference deployment). Reads
//! breached, unclaimed trackers, claims each breach with a compare-and-set
//! write, and only then performs the configured actions. The claim is what
//! makes the sweep idempotent: a second run with no intervening state change
//! finds nothing to claim and performs zero actions.
//!
//! Per-ticket failures never abort the sweep. A failed directory lookup or
//! action is collected into the summary and the loop continues; a breach
//! whose claim failed (because a response or resolution landed concurrently)
//! is simply skipped.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sd_core::escalation::{BreachKind, EscalationAction, EscalationPolicy, pending_breaches, plan_actions};
use sd_core::ticket::TicketSnapshot;
use sd_db::Database;

use crate::error::EngineError;
use crate::ticket::{EscalationNotifier, TicketDirectory};

/// A per-ticket failure collected during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepError {
    pub ticket_id: String,
    pub message: String,
}

/// Outcome of one sweep run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SweepSummary {
    /// Trackers examined (breached and unclaimed at read time).
    pub checked: usize,
    /// Breaches claimed and acted on this run.
    pub escalated: usize,
    /// Per-ticket failures; the sweep continued past each.
    pub errors: Vec<SweepError>,
}

pub(crate) fn run(
    db: &mut Database,
    policy: &EscalationPolicy,
    now: DateTime<Utc>,
    directory: &mut dyn TicketDirectory,
    notifier: &mut dyn EscalationNotifier,
) -> Result<SweepSummary, EngineError> {
    let trackers = db.breached_trackers(now)?;
    let mut summary = SweepSummary::default();

    for tracker in trackers {
        summary.checked += 1;

        let ticket = match directory.get(&tracker.ticket_id) {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                summary.errors.push(SweepError {
                    ticket_id: tracker.ticket_id.clone(),
                    message: "ticket not found in directory".to_string(),
                });
                continue;
            }
            Err(err) => {
                summary.errors.push(SweepError {
                    ticket_id: tracker.ticket_id.clone(),
                    message: err.to_string(),
                });
                continue;
            }
        };

        // Terminal tickets fall out of the sweep even when a deadline was
        // missed; the tracker keeps its unmet state for reporting.
        if ticket.status.is_terminal() {
            tracing::debug!(ticket_id = %ticket.id, status = %ticket.status, "skipping terminal ticket");
            continue;
        }

        for kind in pending_breaches(&tracker, now) {
            // Claim before acting. A response/resolution recorded between
            // our read and this write makes the claim fail, and the breach
            // is dropped instead of escalating a just-resolved ticket.
            if !db.claim_escalation(&tracker.ticket_id, kind, now)? {
                tracing::debug!(ticket_id = %tracker.ticket_id, breach = %kind, "breach settled concurrently");
                continue;
            }
            summary.escalated += 1;
            tracing::info!(ticket_id = %tracker.ticket_id, breach = %kind, "escalating breach");

            let target = match kind {
                BreachKind::FirstResponse => tracker.first_response_target,
                BreachKind::Resolution => tracker.resolution_target,
            };
            for action in plan_actions(policy, &ticket, kind, target) {
                if let Err(message) = apply_action(&action, &ticket, directory, notifier) {
                    // The claim already committed: this breach counts as
                    // attempted and will not fire again. Report the failure.
                    tracing::warn!(ticket_id = %tracker.ticket_id, %message, "escalation action failed");
                    summary.errors.push(SweepError {
                        ticket_id: tracker.ticket_id.clone(),
                        message,
                    });
                }
            }
        }
    }

    tracing::info!(
        checked = summary.checked,
        escalated = summary.escalated,
        errors = summary.errors.len(),
        "sweep complete"
    );
    Ok(summary)
}

fn apply_action(
    action: &EscalationAction,
    ticket: &TicketSnapshot,
    directory: &mut dyn TicketDirectory,
    notifier: &mut dyn EscalationNotifier,
) -> Result<(), String> {
    match action {
        EscalationAction::RaisePriority { ticket_id, to, .. } => directory
            .set_priority(ticket_id, *to)
            .map_err(|err| err.to_string()),
        EscalationAction::Reassign {
            ticket_id,
            to_agent,
        } => directory
            .reassign(ticket_id, to_agent)
            .map_err(|err| err.to_string()),
        EscalationAction::Notify { breach, target, .. } => notifier
            .notify_breach(ticket, *breach, *target)
            .map_err(|err| err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::TimeZone;

    use sd_core::types::{Priority, TicketStatus};
    use sd_db::NewTracker;

    use crate::ticket::{DirectoryError, NotifyError};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn snapshot(id: &str, status: TicketStatus) -> TicketSnapshot {
        TicketSnapshot {
            id: id.to_string(),
            priority: Priority::High,
            status,
            created_at: at(0),
            customer_id: "C-1".to_string(),
            agent_id: None,
            satisfaction_rating: None,
        }
    }

    /// In-memory ticket directory for sweep tests.
    #[derive(Default)]
    struct MemoryDirectory {
        tickets: HashMap<String, TicketSnapshot>,
    }

    impl MemoryDirectory {
        fn with(tickets: Vec<TicketSnapshot>) -> Self {
            Self {
                tickets: tickets.into_iter().map(|t| (t.id.clone(), t)).collect(),
            }
        }
    }

    impl TicketDirectory for MemoryDirectory {
        fn get(&self, ticket_id: &str) -> Result<Option<TicketSnapshot>, DirectoryError> {
            Ok(self.tickets.get(ticket_id).cloned())
        }

        fn set_priority(
            &mut self,
            ticket_id: &str,
            priority: Priority,
        ) -> Result<(), DirectoryError> {
            self.tickets
                .get_mut(ticket_id)
                .map(|t| t.priority = priority)
                .ok_or_else(|| DirectoryError::TicketNotFound {
                    ticket_id: ticket_id.to_string(),
                })
        }

        fn reassign(&mut self, ticket_id: &str, agent_id: &str) -> Result<(), DirectoryError> {
            self.tickets
                .get_mut(ticket_id)
                .map(|t| t.agent_id = Some(agent_id.to_string()))
                .ok_or_else(|| DirectoryError::TicketNotFound {
                    ticket_id: ticket_id.to_string(),
                })
        }
    }

    /// Notifier that records calls and optionally fails for one ticket.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Vec<(String, BreachKind)>,
        fail_for: Option<String>,
    }

    impl EscalationNotifier for RecordingNotifier {
        fn notify_breach(
            &mut self,
            ticket: &TicketSnapshot,
            kind: BreachKind,
            _target: DateTime<Utc>,
        ) -> Result<(), NotifyError> {
            if self.fail_for.as_deref() == Some(ticket.id.as_str()) {
                return Err(NotifyError {
                    ticket_id: ticket.id.clone(),
                    message: "smtp refused".to_string(),
                });
            }
            self.sent.push((ticket.id.clone(), kind));
            Ok(())
        }
    }

    fn seeded_db(tickets: &[&str]) -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let rule_id = db
            .insert_rule("critical", Priority::Critical, 1.0, 4.0)
            .unwrap();
        for ticket in tickets {
            db.insert_tracker(&NewTracker {
                ticket_id: (*ticket).to_string(),
                rule_id,
                created_at: at(0),
                first_response_target: at(1),
                resolution_target: at(4),
            })
            .unwrap();
        }
        db
    }

    #[test]
    fn sweep_escalates_each_breach_once() {
        let mut db = seeded_db(&["T-1"]);
        let policy = EscalationPolicy::default();
        let mut directory = MemoryDirectory::with(vec![snapshot("T-1", TicketStatus::Open)]);
        let mut notifier = RecordingNotifier::default();

        let first = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        assert_eq!(first.checked, 1);
        assert_eq!(first.escalated, 1);
        assert!(first.errors.is_empty());
        assert_eq!(
            notifier.sent,
            vec![("T-1".to_string(), BreachKind::FirstResponse)]
        );
        // Priority raised one level
        assert_eq!(
            directory.tickets.get("T-1").unwrap().priority,
            Priority::Critical
        );

        // Second run with no intervening change claims nothing
        let second = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        assert_eq!(second.checked, 0);
        assert_eq!(second.escalated, 0);
    }

    #[test]
    fn later_sweep_picks_up_the_resolution_breach() {
        let mut db = seeded_db(&["T-1"]);
        let policy = EscalationPolicy::default();
        let mut directory = MemoryDirectory::with(vec![snapshot("T-1", TicketStatus::Open)]);
        let mut notifier = RecordingNotifier::default();

        run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        let later = run(&mut db, &policy, at(5), &mut directory, &mut notifier).unwrap();
        assert_eq!(later.escalated, 1);
        assert_eq!(notifier.sent.last().unwrap().1, BreachKind::Resolution);
    }

    #[test]
    fn terminal_tickets_are_skipped() {
        let mut db = seeded_db(&["T-1"]);
        let policy = EscalationPolicy::default();
        let mut directory = MemoryDirectory::with(vec![snapshot("T-1", TicketStatus::Closed)]);
        let mut notifier = RecordingNotifier::default();

        let summary = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.escalated, 0);
        assert!(notifier.sent.is_empty());
    }

    #[test]
    fn one_failing_notification_does_not_abort_the_sweep() {
        let mut db = seeded_db(&["T-1", "T-2"]);
        let policy = EscalationPolicy {
            raise_priority: false,
            reassign_to: None,
            notify: true,
        };
        let mut directory = MemoryDirectory::with(vec![
            snapshot("T-1", TicketStatus::Open),
            snapshot("T-2", TicketStatus::Open),
        ]);
        let mut notifier = RecordingNotifier {
            fail_for: Some("T-1".to_string()),
            ..RecordingNotifier::default()
        };

        let summary = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        // Both breaches claimed; T-1's notification failure is reported
        assert_eq!(summary.escalated, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].ticket_id, "T-1");
        assert_eq!(notifier.sent, vec![("T-2".to_string(), BreachKind::FirstResponse)]);

        // The claimed breach is attempted, not retried endlessly
        let second = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        assert_eq!(second.escalated, 0);
    }

    #[test]
    fn missing_ticket_is_collected_and_sweep_continues() {
        let mut db = seeded_db(&["T-ghost", "T-2"]);
        let policy = EscalationPolicy::default();
        let mut directory = MemoryDirectory::with(vec![snapshot("T-2", TicketStatus::Open)]);
        let mut notifier = RecordingNotifier::default();

        let summary = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.escalated, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].ticket_id, "T-ghost");
    }

    #[test]
    fn reassignment_policy_moves_the_ticket() {
        let mut db = seeded_db(&["T-1"]);
        let policy = EscalationPolicy {
            raise_priority: false,
            reassign_to: Some("agent-lead".to_string()),
            notify: false,
        };
        let mut directory = MemoryDirectory::with(vec![snapshot("T-1", TicketStatus::Open)]);
        let mut notifier = RecordingNotifier::default();

        run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        assert_eq!(
            directory.tickets.get("T-1").unwrap().agent_id.as_deref(),
            Some("agent-lead")
        );
    }

    #[test]
    fn breach_settled_between_read_and_claim_is_not_escalated() {
        // Two connections to the same database: the directory plays a
        // concurrent writer that records the first response while the sweep
        // fetches the ticket, i.e. after the tracker read, before the claim.
        struct ResolvingDirectory {
            inner: MemoryDirectory,
            side_channel: std::cell::RefCell<Database>,
            respond_at: DateTime<Utc>,
        }

        impl TicketDirectory for ResolvingDirectory {
            fn get(&self, ticket_id: &str) -> Result<Option<TicketSnapshot>, DirectoryError> {
                self.side_channel
                    .borrow_mut()
                    .record_first_response(ticket_id, self.respond_at, false)
                    .unwrap();
                self.inner.get(ticket_id)
            }

            fn set_priority(
                &mut self,
                ticket_id: &str,
                priority: Priority,
            ) -> Result<(), DirectoryError> {
                self.inner.set_priority(ticket_id, priority)
            }

            fn reassign(&mut self, ticket_id: &str, agent_id: &str) -> Result<(), DirectoryError> {
                self.inner.reassign(ticket_id, agent_id)
            }
        }

        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sd.db");
        let mut db = Database::open(&path).unwrap();
        let rule_id = db
            .insert_rule("critical", Priority::Critical, 1.0, 4.0)
            .unwrap();
        db.insert_tracker(&NewTracker {
            ticket_id: "T-1".to_string(),
            rule_id,
            created_at: at(0),
            first_response_target: at(1),
            resolution_target: at(4),
        })
        .unwrap();

        let mut directory = ResolvingDirectory {
            inner: MemoryDirectory::with(vec![snapshot("T-1", TicketStatus::Open)]),
            side_channel: std::cell::RefCell::new(Database::open(&path).unwrap()),
            respond_at: at(1),
        };
        let mut notifier = RecordingNotifier::default();
        let policy = EscalationPolicy::default();

        let summary = run(&mut db, &policy, at(2), &mut directory, &mut notifier).unwrap();
        // The breach was read, but the response landed before the claim,
        // so the compare-and-set fails and nothing escalates.
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.escalated, 0);
        assert!(notifier.sent.is_empty());
        let tracker = db.get_tracker("T-1").unwrap().unwrap();
        assert_eq!(tracker.first_response_actual, Some(at(1)));
        assert_eq!(tracker.first_response_escalated_at, None);
    }
}
