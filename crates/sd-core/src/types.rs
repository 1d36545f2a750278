//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid ticket priority value.
    #[error("invalid priority: {value}")]
    InvalidPriority { value: String },

    /// Invalid ticket status value.
    #[error("invalid ticket status: {value}")]
    InvalidStatus { value: String },

    /// Hours must be a finite, positive number.
    #[error("{field} must be positive and finite, got {value}")]
    NonPositiveHours { field: &'static str, value: f64 },

    /// Invalid role value.
    #[error("invalid role: {value}")]
    InvalidRole { value: String },
}

/// Ticket priority.
///
/// Ordering is by urgency: `Low < Medium < High < Critical`. SLA rules key
/// on priority, and escalation raises it one level at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// The next priority up, or `None` if already at `Critical`.
    #[must_use]
    pub const fn escalated(&self) -> Option<Self> {
        match self {
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => Some(Self::Critical),
            Self::Critical => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ValidationError::InvalidPriority {
                value: s.to_string(),
            }),
        }
    }
}

/// Ticket status as reported by the ticket domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// String representation for storage and display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Whether the ticket has reached a terminal state.
    ///
    /// Terminal tickets are excluded from escalation sweeps.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(ValidationError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated ticket identifier.
    ///
    /// Ticket IDs must be non-empty strings. They are issued by the external
    /// ticket domain; uniqueness is its concern, not ours.
    TicketId, "ticket ID"
);

define_string_id!(
    /// A validated agent identifier.
    AgentId, "agent ID"
);

define_string_id!(
    /// A validated customer identifier.
    ///
    /// Hour accounts and time entries are keyed by customer ID.
    CustomerId, "customer ID"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn priority_round_trips_through_strings() {
        for p in [
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ] {
            assert_eq!(Priority::from_str(p.as_str()).unwrap(), p);
        }
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn priority_escalates_one_level() {
        assert_eq!(Priority::Low.escalated(), Some(Priority::Medium));
        assert_eq!(Priority::High.escalated(), Some(Priority::Critical));
        assert_eq!(Priority::Critical.escalated(), None);
    }

    #[test]
    fn priority_orders_by_urgency() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn resolved_and_closed_are_terminal() {
        assert!(!TicketStatus::Open.is_terminal());
        assert!(!TicketStatus::Pending.is_terminal());
        assert!(TicketStatus::Resolved.is_terminal());
        assert!(TicketStatus::Closed.is_terminal());
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert_eq!(
            TicketStatus::from_str("archived"),
            Err(ValidationError::InvalidStatus {
                value: "archived".to_string()
            })
        );
    }

    #[test]
    fn ids_reject_empty_strings() {
        assert!(TicketId::new("T-1").is_ok());
        assert_eq!(
            TicketId::new(""),
            Err(ValidationError::Empty { field: "ticket ID" })
        );
        assert_eq!(
            CustomerId::new(""),
            Err(ValidationError::Empty {
                field: "customer ID"
            })
        );
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = AgentId::new("agent-7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"agent-7\"");
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
