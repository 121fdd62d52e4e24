//! # configs
//!
//! Layered settings: built-in defaults, then an optional TOML file
//! (`engagement.toml`, or the path in `ENGAGEMENT_CONFIG`), then
//! `ENGAGEMENT_*` environment variables. Nested keys use `__`, e.g.
//! `ENGAGEMENT_MODERATION__REPORT_ESCALATION_THRESHOLD=5`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use services::policy::{self, EngagementPolicy};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "engagement.toml";
pub const CONFIG_PATH_VAR: &str = "ENGAGEMENT_CONFIG";
pub const ENV_PREFIX: &str = "ENGAGEMENT";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub moderation: ModerationSettings,
    pub storage: StorageSettings,
    pub notifications: NotificationSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// Reports that send an approved comment back to PENDING
    pub report_escalation_threshold: u32,
    /// Moderators alerted per report
    pub moderator_fanout_limit: usize,
    pub max_reason_length: usize,
    pub max_comment_length: usize,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            report_escalation_threshold: policy::DEFAULT_ESCALATION_THRESHOLD,
            moderator_fanout_limit: policy::DEFAULT_MODERATOR_FANOUT,
            max_reason_length: policy::DEFAULT_MAX_REASON_LENGTH,
            max_comment_length: policy::DEFAULT_MAX_COMMENT_LENGTH,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub write_attempts: u32,
    /// Only read by binaries built with `db-postgres`; the in-memory store is used otherwise
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            write_attempts: policy::DEFAULT_WRITE_ATTEMPTS,
            database_url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub side_effect_timeout_ms: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            side_effect_timeout_ms: policy::DEFAULT_SIDE_EFFECT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub log_filter: String,
    pub json: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Reads `.env`, then layers the config file and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        // a missing .env is normal outside development
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Same layering with an explicit file path. The file is optional.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        debug!(path = %path.display(), "loading settings");
        let config = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment())
            .build()?;
        Self::finish(config)
    }

    /// Parses settings from a TOML document alone, without the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, SettingsError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            (
                "moderation.report_escalation_threshold",
                self.moderation.report_escalation_threshold as u64,
            ),
            ("moderation.moderator_fanout_limit", self.moderation.moderator_fanout_limit as u64),
            ("moderation.max_reason_length", self.moderation.max_reason_length as u64),
            ("moderation.max_comment_length", self.moderation.max_comment_length as u64),
            ("storage.write_attempts", self.storage.write_attempts as u64),
            ("storage.max_connections", self.storage.max_connections as u64),
            ("notifications.side_effect_timeout_ms", self.notifications.side_effect_timeout_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(SettingsError::Invalid {
                    key,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> EngagementPolicy {
        EngagementPolicy {
            report_escalation_threshold: self.moderation.report_escalation_threshold,
            moderator_fanout_limit: self.moderation.moderator_fanout_limit,
            max_reason_length: self.moderation.max_reason_length,
            max_comment_length: self.moderation.max_comment_length,
            write_attempts: self.storage.write_attempts,
            side_effect_timeout: Duration::from_millis(self.notifications.side_effect_timeout_ms),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
