//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sd_core::escalation::EscalationPolicy;
use sd_core::policy::Role;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Path to the ticket snapshot file (JSONL), the stand-in for the
    /// external ticket domain.
    pub tickets_path: PathBuf,

    /// Role the CLI acts as, for capability checks.
    pub role: Role,

    /// What the escalation sweep does with each claimed breach.
    pub escalation: EscalationPolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("tickets_path", &self.tickets_path)
            .field("role", &self.role)
            .field("escalation", &self.escalation)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("sd.db"),
            tickets_path: data_dir.join("tickets.jsonl"),
            role: Role::Admin,
            escalation: EscalationPolicy::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SD_*)
        figment = figment.merge(Env::prefixed("SD_"));

        figment.extract()
    }

    /// Lock file guarding against overlapping sweep runs.
    #[must_use]
    pub fn sweep_lock_path(&self) -> PathBuf {
        self.database_path.with_extension("sweep.lock")
    }
}

/// Returns the platform-specific config directory for sd.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sd"))
}

/// Returns the platform-specific data directory for sd.
///
/// On Linux: `~/.local/share/sd`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sd"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_share_the_data_directory() {
        let config = Config::default();
        assert_eq!(
            config.database_path.parent(),
            config.tickets_path.parent()
        );
        assert_eq!(config.role, Role::Admin);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/custom.db"
role = "agent"

[escalation]
raise_priority = false
reassign_to = "agent-lead"
notify = true
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.role, Role::Agent);
        assert!(!config.escalation.raise_priority);
        assert_eq!(config.escalation.reassign_to.as_deref(), Some("agent-lead"));
    }

    #[test]
    fn sweep_lock_sits_next_to_the_database() {
        let config = Config {
            database_path: PathBuf::from("/data/sd.db"),
            ..Config::default()
        };
        assert_eq!(
            config.sweep_lock_path(),
            PathBuf::from("/data/sd.sweep.lock")
        );
    }
}
