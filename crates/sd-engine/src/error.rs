//! Engine error surface.

use thiserror::Error;

use sd_db::DbError;

/// Errors returned by [`crate::SlaService`] operations.
///
/// Conflicts (`TimerAlreadyRunning`, `NoActiveTimer`) and transient store
/// errors (`Busy`, after bounded retry) pass through from the storage layer;
/// validation and not-found cases are raised here. Over-allocation and SLA
/// breaches are never errors — they are surfaced values.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Allocated hours must be positive and finite.
    #[error("hours must be positive and finite, got {value}")]
    InvalidHours { value: f64 },

    /// Input failed domain validation.
    #[error(transparent)]
    Validation(#[from] sd_core::ValidationError),

    /// No hour account exists for the customer.
    #[error("no hour account for customer {customer_id}")]
    AccountNotFound { customer_id: String },

    /// No SLA tracker exists for the ticket.
    #[error("no SLA tracker for ticket {ticket_id}")]
    TrackerNotFound { ticket_id: String },

    /// A storage error, including conflicts and bounded-retry exhaustion.
    #[error(transparent)]
    Store(#[from] DbError),
}

impl EngineError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store(DbError::Busy { .. }))
    }
}
