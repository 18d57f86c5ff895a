//! Configuration parsing.
//!
//! The engine is configured from a single TOML file:
//!
//! ```toml
//! [database]
//! path = "/var/lib/nisit/award.db"
//! busy_timeout_ms = 5000
//!
//! [identity]
//! allowed_email_domains = ["ku.th", "live.ku.th"]
//!
//! [voting]
//! pass_threshold_percent = 50
//!
//! [log]
//! level = "info"
//! file = "/var/log/nisit/nisit.log"
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::user::EmailPolicy;
use crate::vote::TallyPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NisitConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Identity and registration settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Committee voting settings.
    #[serde(default)]
    pub voting: VotingConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl NisitConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails [`Self::validate`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an empty database path, an
    /// empty domain list or a threshold outside `1..=99`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database.path must not be empty".to_string(),
            ));
        }
        if self
            .identity
            .allowed_email_domains
            .iter()
            .all(|d| d.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "identity.allowed_email_domains must list at least one domain".to_string(),
            ));
        }
        if !(1..=99).contains(&self.voting.pass_threshold_percent) {
            return Err(ConfigError::Validation(format!(
                "voting.pass_threshold_percent must be within 1..=99, got {}",
                self.voting.pass_threshold_percent
            )));
        }
        Ok(())
    }

    /// The email policy described by `[identity]`.
    #[must_use]
    pub fn email_policy(&self) -> EmailPolicy {
        EmailPolicy::new(&self.identity.allowed_email_domains)
    }

    /// The tally policy described by `[voting]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the threshold is out of range.
    pub fn tally_policy(&self) -> Result<TallyPolicy, ConfigError> {
        TallyPolicy::new(self.voting.pass_threshold_percent)
            .map_err(|err| ConfigError::Validation(err.to_string()))
    }
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// How long a writer waits for another writer's lock, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// The busy timeout as a [`Duration`].
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("nisit.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// `[identity]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Email domains allowed to register.
    #[serde(default = "default_email_domains")]
    pub allowed_email_domains: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            allowed_email_domains: default_email_domains(),
        }
    }
}

fn default_email_domains() -> Vec<String> {
    vec!["ku.th".to_string(), "live.ku.th".to_string()]
}

/// `[voting]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Approvals must strictly exceed this percentage of the eligible roster.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold_percent: u8,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            pass_threshold_percent: default_pass_threshold(),
        }
    }
}

const fn default_pass_threshold() -> u8 {
    50
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file. Logs go to stderr when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = NisitConfig::from_toml("").unwrap();
        assert_eq!(config, NisitConfig::default());
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.voting.pass_threshold_percent, 50);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn full_config() {
        let toml = r#"
            [database]
            path = "/var/lib/nisit/award.db"
            busy_timeout_ms = 250

            [identity]
            allowed_email_domains = ["ku.ac.th"]

            [voting]
            pass_threshold_percent = 66

            [log]
            level = "nisit_core=debug"
            file = "/var/log/nisit.log"
        "#;

        let config = NisitConfig::from_toml(toml).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/var/lib/nisit/award.db"));
        assert_eq!(config.database.busy_timeout(), Duration::from_millis(250));
        assert!(config.email_policy().normalize("x@ku.ac.th").is_ok());
        assert!(config.email_policy().normalize("x@ku.th").is_err());
        assert_eq!(config.tally_policy().unwrap().threshold_percent(), 66);
        assert_eq!(config.log.file, Some(PathBuf::from("/var/log/nisit.log")));
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        for value in [0, 100, 200] {
            let toml = format!("[voting]\npass_threshold_percent = {value}\n");
            let err = NisitConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{value}: {err}");
        }
    }

    #[test]
    fn empty_domain_list_is_rejected() {
        let err = NisitConfig::from_toml("[identity]\nallowed_email_domains = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = NisitConfig::from_toml("[voting\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = NisitConfig::default();
        config.voting.pass_threshold_percent = 60;
        config.log.file = Some(PathBuf::from("nisit.log"));
        let text = config.to_toml().unwrap();
        assert_eq!(NisitConfig::from_toml(&text).unwrap(), config);
    }
}
