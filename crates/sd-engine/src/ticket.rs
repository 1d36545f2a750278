//! Collaborator interfaces to the ticket domain and notification delivery.
//!
//! The engine never owns tickets or sends email; it consumes snapshots and
//! pushes escalation effects through these seams. Implementations live at
//! the edges (the CLI ships a JSONL-file directory; production would wrap
//! the ticket store and the mailer's task queue).

use thiserror::Error;

use chrono::{DateTime, Utc};
use sd_core::escalation::BreachKind;
use sd_core::ticket::TicketSnapshot;
use sd_core::types::Priority;

/// Errors from the ticket domain.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("ticket {ticket_id} not found")]
    TicketNotFound { ticket_id: String },
    #[error("ticket directory unavailable: {0}")]
    Unavailable(String),
}

/// Errors from notification delivery.
#[derive(Debug, Error)]
#[error("notification delivery failed for ticket {ticket_id}: {message}")]
pub struct NotifyError {
    pub ticket_id: String,
    pub message: String,
}

/// Read/write access to the external ticket domain.
pub trait TicketDirectory {
    /// Current snapshot of a ticket, or `None` if it does not exist.
    fn get(&self, ticket_id: &str) -> Result<Option<TicketSnapshot>, DirectoryError>;

    /// Sets the ticket's priority (escalation raising it one level).
    fn set_priority(&mut self, ticket_id: &str, priority: Priority) -> Result<(), DirectoryError>;

    /// Reassigns the ticket to another agent.
    fn reassign(&mut self, ticket_id: &str, agent_id: &str) -> Result<(), DirectoryError>;
}

/// Emits breach notifications.
///
/// Delivery is at-least-once from the sweep's point of view: a breach whose
/// claim did not commit is retried next sweep, and a claimed breach whose
/// notification fails is reported in the sweep summary.
pub trait EscalationNotifier {
    fn notify_breach(
        &mut self,
        ticket: &TicketSnapshot,
        kind: BreachKind,
        target: DateTime<Utc>,
    ) -> Result<(), NotifyError>;
}
