use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// General settings: log filter directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

/// Scheduler and collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Consecutive probe failures before a rule is marked failed.
    #[serde(default = "default_failure_budget")]
    pub failure_budget: u32,
    /// Hard timeout for a single collector probe, in seconds.
    #[serde(default = "default_collector_timeout")]
    pub collector_timeout_secs: u64,
    /// Concurrent probes allowed against one source.
    #[serde(default = "default_max_inflight")]
    pub max_inflight_per_source: usize,
    /// How often the scheduler reconciles the rule set with the store.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
    /// Smallest interval accepted for a new rule.
    #[serde(default = "default_min_rule_interval")]
    pub min_rule_interval_secs: u64,
}

/// Graph traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default = "default_max_depth")]
    pub default_max_depth: usize,
}

/// Alert delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
}

/// Database storage path (tilde-expanded at point of use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Alerts and cached lookups older than this are purged on startup.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

// --- Defaults ---

fn default_log_filter() -> String {
    "info".into()
}

const fn default_failure_budget() -> u32 {
    5
}

const fn default_collector_timeout() -> u64 {
    10
}

const fn default_max_inflight() -> usize {
    4
}

const fn default_reconcile_interval() -> u64 {
    30
}

const fn default_min_rule_interval() -> u64 {
    30
}

const fn default_max_depth() -> usize {
    3
}

const fn default_webhook_timeout() -> u64 {
    5
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_backoff_base() -> u64 {
    1
}

// NOTE: Stored as raw string with tilde — expand with shellexpand at point of use.
fn default_database_path() -> String {
    "~/.local/share/argus/argus.db".into()
}

// 30 days
const fn default_retention_hours() -> u64 {
    720
}

// --- Default impls ---

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            failure_budget: default_failure_budget(),
            collector_timeout_secs: default_collector_timeout(),
            max_inflight_per_source: default_max_inflight(),
            reconcile_interval_secs: default_reconcile_interval(),
            min_rule_interval_secs: default_min_rule_interval(),
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_webhook_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load config from default path or create default config file
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the file cannot be read, or the TOML content is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_or_create(&path)
    }

    /// Load from a specific path, or create a default config file if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the default config file cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML content is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to a specific path, creating parent directories if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("argus").join("config.toml"))
    }

    /// Database path with `~` expanded.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).into_owned())
    }
}
