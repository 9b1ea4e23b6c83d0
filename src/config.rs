//! Configuration loading and management
//!
//! Handles parsing of the `atarefa.toml` file kept in the store root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the configuration file inside the store root
pub const CONFIG_FILE: &str = "atarefa.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task store configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Person registration rules
    #[serde(default)]
    pub people: PeopleConfig,

    /// Invitation e-mail sender
    #[serde(default)]
    pub invites: InvitesConfig,

    /// Current-user resolution
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Local store tuning
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Interval of the overdue recompute timer, in seconds
    #[serde(default = "default_overdue_poll_secs")]
    pub overdue_poll_secs: u64,

    /// Refuse to create tasks whose due date already passed
    #[serde(default = "default_true")]
    pub reject_past_due: bool,
}

fn default_overdue_poll_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            overdue_poll_secs: default_overdue_poll_secs(),
            reject_past_due: true,
        }
    }
}

/// Person registration rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleConfig {
    /// Minimum age, in whole years, at registration
    #[serde(default = "default_min_age_years")]
    pub min_age_years: u32,

    /// Number of digits a national id must carry
    #[serde(default = "default_national_id_digits")]
    pub national_id_digits: usize,
}

fn default_min_age_years() -> u32 {
    14
}

fn default_national_id_digits() -> usize {
    11
}

impl Default for PeopleConfig {
    fn default() -> Self {
        Self {
            min_age_years: default_min_age_years(),
            national_id_digits: default_national_id_digits(),
        }
    }
}

/// Invitation e-mail sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitesConfig {
    /// HTTP endpoint receiving invitation notices (unset disables sending)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Request timeout for the sender, in seconds
    #[serde(default = "default_invite_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_invite_timeout_secs() -> u64 {
    10
}

impl Default for InvitesConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_invite_timeout_secs(),
        }
    }
}

/// Current-user resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Cached current-user key aliases, tried in order
    #[serde(default = "default_cache_keys")]
    pub cache_keys: Vec<String>,
}

fn default_cache_keys() -> Vec<String> {
    ["current-user", "currentUser", "user", "auth-user", "authUser"]
        .iter()
        .map(|key| key.to_string())
        .collect()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cache_keys: default_cache_keys(),
        }
    }
}

/// Local store tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long a mutation waits for a key lock, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the store root, or return defaults
    pub fn load_from_dir(root: &Path) -> Self {
        let config_path = Self::path_in(root);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Location of the config file for a store root
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tasks.overdue_poll_secs == 0 || self.tasks.overdue_poll_secs > 3600 {
            return Err(Error::InvalidConfig(
                "tasks.overdue_poll_secs must be between 1 and 3600".to_string(),
            ));
        }

        if self.people.national_id_digits == 0 {
            return Err(Error::InvalidConfig(
                "people.national_id_digits must be > 0".to_string(),
            ));
        }

        if let Some(endpoint) = &self.invites.endpoint {
            let endpoint = endpoint.trim();
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "invites.endpoint must be an http(s) URL, got '{endpoint}'"
                )));
            }
        }
        if self.invites.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "invites.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.identity.cache_keys.is_empty() {
            return Err(Error::InvalidConfig(
                "identity.cache_keys cannot be empty".to_string(),
            ));
        }
        for key in &self.identity.cache_keys {
            let trimmed = key.trim();
            if trimmed.is_empty()
                || !trimmed
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
            {
                return Err(Error::InvalidConfig(format!(
                    "identity.cache_keys entry '{key}' must be alphanumeric"
                )));
            }
        }

        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
