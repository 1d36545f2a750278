//! CLI subcommand implementations.

pub mod event;
pub mod hours;
pub mod report;
pub mod rules;
pub mod sla;
pub mod status;
pub mod sweep;
pub mod timer;

use std::fs;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use sd_core::policy::{ActionKind, can};
use sd_db::Database;
use sd_engine::SlaService;

use crate::Config;

/// Opens the configured database, creating parent directories as needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Opens the configured database and wraps it in the engine service.
pub fn open_service(config: &Config) -> Result<SlaService> {
    Ok(SlaService::new(
        open_database(config)?,
        config.escalation.clone(),
    ))
}

/// Resolves an optional `--at` argument to a timestamp, defaulting to now.
pub fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(value) => {
            let parsed = DateTime::parse_from_rfc3339(value)
                .with_context(|| format!("invalid RFC 3339 timestamp: {value}"))?;
            Ok(parsed.with_timezone(&Utc))
        }
        None => Ok(Utc::now()),
    }
}

/// Fails if the configured role may not perform the action.
pub fn ensure_allowed(config: &Config, action: ActionKind) -> Result<()> {
    if !can(config.role, action) {
        bail!(
            "role '{}' is not allowed to perform this action",
            config.role.as_str()
        );
    }
    Ok(())
}

/// Formats an optional rate as a percentage.
pub(crate) fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    use sd_core::policy::Role;

    #[test]
    fn parse_at_defaults_to_now() {
        let before = Utc::now();
        let parsed = parse_at(None).unwrap();
        assert!(parsed >= before);
    }

    #[test]
    fn parse_at_accepts_rfc3339_with_offset() {
        let parsed = parse_at(Some("2024-06-01T10:00:00+02:00")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T08:00:00+00:00");
    }

    #[test]
    fn parse_at_rejects_garbage() {
        assert!(parse_at(Some("yesterday")).is_err());
    }

    #[test]
    fn agents_cannot_manage_rules() {
        let config = Config {
            role: Role::Agent,
            ..Config::default()
        };
        assert!(ensure_allowed(&config, ActionKind::ManageRules).is_err());
        assert!(ensure_allowed(&config, ActionKind::StartTimer).is_ok());
    }
}
