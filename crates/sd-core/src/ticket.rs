//! Ticket snapshots consumed from the external ticket domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Priority, TicketStatus};

/// The shape of a ticket as reported by the ticket domain.
///
/// The SLA engine never owns tickets; it reads snapshots like this through
/// the directory interface and reacts to domain events. `satisfaction_rating`
/// is the customer's 1-5 CSAT score, present only after the customer rates
/// a resolved ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub id: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfaction_rating: Option<u8>,
}
