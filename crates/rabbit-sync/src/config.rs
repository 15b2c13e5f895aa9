//! # Rabbit Configuration
//!
//! Configuration for edit sessions, share links and the local store.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RABBIT_DEBOUNCE_MS=500                                             │
//! │     RABBIT_SHARE_BASE_URL=https://split.example                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/rabbit-tab/rabbit.toml (Linux)                           │
//! │     ~/Library/Application Support/tab.rabbit.rabbit-tab/rabbit.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     1s debounce, 15s flush timeout, 90 day share links                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # rabbit.toml
//! [session]
//! debounce_ms = 1000
//! flush_timeout_secs = 15
//!
//! [share]
//! base_url = "https://rabbit.tab"
//! ttl_days = 90
//! prefer_compact = true
//! redis_url = "redis://127.0.0.1:6379"
//!
//! [store]
//! database_path = "/var/lib/rabbit/rabbit.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Session Settings
// =============================================================================

/// Timing of the background flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Inactivity window after the last edit before a flush starts.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound for one flush against the remote store.
    /// Expiry counts as a failed flush.
    #[serde(default = "default_flush_timeout")]
    pub flush_timeout_secs: u64,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_flush_timeout() -> u64 {
    15
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            debounce_ms: default_debounce_ms(),
            flush_timeout_secs: default_flush_timeout(),
        }
    }
}

impl SessionSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

// =============================================================================
// Share Settings
// =============================================================================

/// Share link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Origin that share URLs are built on (`<base_url>/bill/<token>`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Lifetime of short links stored in the key-value store.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,

    /// Use self-contained compact tokens unless a short link is asked for.
    #[serde(default = "default_true")]
    pub prefer_compact: bool,

    /// Redis server for short links. Without it the local store is used.
    #[serde(default)]
    pub redis_url: Option<String>,
}

fn default_base_url() -> String {
    "https://rabbit.tab".to_string()
}

fn default_ttl_days() -> u64 {
    90
}

fn default_true() -> bool {
    true
}

impl Default for ShareSettings {
    fn default() -> Self {
        ShareSettings {
            base_url: default_base_url(),
            ttl_days: default_ttl_days(),
            prefer_compact: true,
            redis_url: None,
        }
    }
}

impl ShareSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days * 24 * 60 * 60)
    }
}

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabbitConfig {
    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub share: ShareSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl RabbitConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (rabbit.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let base = url::Url::parse(&self.share.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Share base URL must start with http:// or https://, got: {}",
                self.share.base_url
            )));
        }
        if base.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(format!(
                "Share base URL cannot carry a path: {}",
                self.share.base_url
            )));
        }

        if let Some(ref redis_url) = self.share.redis_url {
            if !redis_url.starts_with("redis://") && !redis_url.starts_with("rediss://") {
                return Err(SyncError::InvalidUrl(format!(
                    "Redis URL must start with redis:// or rediss://, got: {}",
                    redis_url
                )));
            }
        }

        if self.share.ttl_days == 0 {
            return Err(SyncError::InvalidConfig(
                "ttl_days must be greater than 0".into(),
            ));
        }

        if self.session.flush_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "flush_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `RABBIT_*` overrides looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(ms) = var("RABBIT_DEBOUNCE_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => {
                    debug!(debounce_ms = ms, "Overriding debounce from environment");
                    self.session.debounce_ms = ms;
                }
                Err(_) => warn!(value = %ms, "Ignoring invalid RABBIT_DEBOUNCE_MS"),
            }
        }

        if let Some(secs) = var("RABBIT_FLUSH_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.session.flush_timeout_secs = secs;
            }
        }

        if let Some(url) = var("RABBIT_SHARE_BASE_URL") {
            debug!(url = %url, "Overriding share base URL from environment");
            self.share.base_url = url;
        }

        if let Some(days) = var("RABBIT_SHARE_TTL_DAYS") {
            if let Ok(days) = days.parse::<u64>() {
                self.share.ttl_days = days;
            }
        }

        if let Some(flag) = var("RABBIT_PREFER_COMPACT") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.share.prefer_compact = true,
                "0" | "false" | "no" => self.share.prefer_compact = false,
                _ => warn!(value = %flag, "Ignoring invalid RABBIT_PREFER_COMPACT"),
            }
        }

        if let Some(url) = var("RABBIT_REDIS_URL") {
            self.share.redis_url = Some(url).filter(|u| !u.is_empty());
        }

        if let Some(path) = var("RABBIT_DATABASE_PATH") {
            self.store.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("rabbit.toml"))
    }

    /// SQLite file to open: configured path or the platform data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.store.database_path.clone().or_else(|| {
            Self::project_dirs().map(|dirs| dirs.data_dir().join("rabbit.db"))
        })
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("tab", "rabbit", "rabbit-tab")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RabbitConfig::default();
        assert_eq!(config.session.debounce_ms, 1000);
        assert_eq!(config.session.flush_timeout_secs, 15);
        assert_eq!(config.share.ttl_days, 90);
        assert_eq!(config.share.ttl(), Duration::from_secs(90 * 86_400));
        assert!(config.share.prefer_compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RabbitConfig::default();

        config.share.base_url = "ftp://rabbit.tab".to_string();
        assert!(config.validate().is_err());

        config.share.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.share.base_url = "http://localhost:8080".to_string();
        assert!(config.validate().is_ok());

        config.share.redis_url = Some("http://localhost:6379".to_string());
        assert!(config.validate().is_err());

        config.share.redis_url = Some("redis://localhost:6379".to_string());
        assert!(config.validate().is_ok());

        config.share.ttl_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env = overrides(&[
            ("RABBIT_DEBOUNCE_MS", "250"),
            ("RABBIT_SHARE_BASE_URL", "https://split.example"),
            ("RABBIT_PREFER_COMPACT", "false"),
            ("RABBIT_DATABASE_PATH", "/tmp/rabbit.db"),
        ]);
        let mut config = RabbitConfig::default();
        config.apply_overrides(|k| env.get(k).cloned());

        assert_eq!(config.session.debounce_ms, 250);
        assert_eq!(config.share.base_url, "https://split.example");
        assert!(!config.share.prefer_compact);
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/rabbit.db")));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let env = overrides(&[
            ("RABBIT_DEBOUNCE_MS", "soon"),
            ("RABBIT_PREFER_COMPACT", "maybe"),
        ]);
        let mut config = RabbitConfig::default();
        config.apply_overrides(|k| env.get(k).cloned());

        assert_eq!(config.session.debounce_ms, 1000);
        assert!(config.share.prefer_compact);
    }

    #[test]
    fn test_partial_toml() {
        let config: RabbitConfig = toml::from_str("[session]\ndebounce_ms = 300\n").unwrap();
        assert_eq!(config.session.debounce_ms, 300);
        assert_eq!(config.session.flush_timeout_secs, 15);
        assert_eq!(config.share, ShareSettings::default());
    }

    #[test]
    fn test_toml_serialization() {
        let config = RabbitConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[share]"));

        let back: RabbitConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }
}
