//! Capability policy.
//!
//! A fixed role/action table in place of ad-hoc permission strings. The CLI
//! reads the acting role from configuration; a real deployment would take it
//! from the authenticated principal.

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// Acting role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Works tickets: timers and SLA status.
    Agent,
    /// Additionally manages hour allocations and runs sweeps.
    Supervisor,
    /// Everything, including rule management.
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Supervisor => "supervisor",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Self::Agent),
            "supervisor" => Ok(Self::Supervisor),
            "admin" => Ok(Self::Admin),
            _ => Err(ValidationError::InvalidRole {
                value: s.to_string(),
            }),
        }
    }
}

/// Guarded operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    StartTimer,
    StopTimer,
    ViewSlaStatus,
    ViewReports,
    AllocateHours,
    RunSweep,
    ManageRules,
}

/// Whether `role` may perform `action`.
#[must_use]
pub const fn can(role: Role, action: ActionKind) -> bool {
    match action {
        ActionKind::StartTimer
        | ActionKind::StopTimer
        | ActionKind::ViewSlaStatus
        | ActionKind::ViewReports => true,
        ActionKind::AllocateHours | ActionKind::RunSweep => {
            matches!(role, Role::Supervisor | Role::Admin)
        }
        ActionKind::ManageRules => matches!(role, Role::Admin),
    }
}
