//! Coordinator, store and shutdown configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::shutdown::ExitPolicy;

const fn default_max_task_duration_secs() -> u64 {
    28 * 60 * 60
}

const fn default_pool_size() -> usize {
    crate::core::selector::DEFAULT_POOL_SIZE
}

const fn default_recent_window_hours() -> u32 {
    crate::core::coordinator::DEFAULT_RECENT_WINDOW_HOURS
}

const fn default_audit_capacity() -> usize {
    1024
}

const fn default_action_timeout_secs() -> u64 {
    crate::core::shutdown::DEFAULT_ACTION_TIMEOUT.as_secs()
}

const fn default_true() -> bool {
    true
}

fn default_stream() -> String {
    "lanes".into()
}

/// Lane store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreBackendConfig {
    /// In-memory store for development/testing.
    InMemory,
    /// JSON-lines file store.
    File {
        /// Directory holding the store file.
        path: PathBuf,
        /// Stream name; the file is `<stream>_slots.jsonl`.
        #[serde(default = "default_stream")]
        stream: String,
    },
}

impl Default for StoreBackendConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

/// Shutdown hook behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Only install from the process's main thread.
    #[serde(default = "default_true")]
    pub require_primary_thread: bool,
    /// Listen for SIGINT/SIGTERM; when false only `trigger()` starts the sweep.
    #[serde(default = "default_true")]
    pub listen_for_signals: bool,
    /// Terminate the process after the sweep.
    #[serde(default = "default_true")]
    pub exit_after_sweep: bool,
    /// Exit code used when terminating.
    #[serde(default)]
    pub exit_code: i32,
    /// Deadline for each compensating action, in seconds.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            require_primary_thread: true,
            listen_for_signals: true,
            exit_after_sweep: true,
            exit_code: 0,
            action_timeout_secs: default_action_timeout_secs(),
        }
    }
}

impl ShutdownConfig {
    /// Exit policy derived from the flags.
    #[must_use]
    pub const fn exit_policy(&self) -> ExitPolicy {
        if self.exit_after_sweep {
            ExitPolicy::Exit(self.exit_code)
        } else {
            ExitPolicy::Return
        }
    }

    /// Per-action deadline as a duration.
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

/// Root coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Runs older than this many seconds are considered abandoned.
    #[serde(default = "default_max_task_duration_secs")]
    pub max_task_duration_secs: u64,
    /// Lanes per pool probed by the selector.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Trailing window for "recently completed" checks.
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: u32,
    /// Audit buffer size; 0 disables auditing.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
    /// Store backend.
    #[serde(default)]
    pub store: StoreBackendConfig,
    /// Shutdown behavior.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_task_duration_secs: default_max_task_duration_secs(),
            pool_size: default_pool_size(),
            recent_window_hours: default_recent_window_hours(),
            audit_capacity: default_audit_capacity(),
            store: StoreBackendConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}

impl CoordinatorConfig {
    /// Stale-run limit as a duration.
    #[must_use]
    pub const fn max_task_duration(&self) -> Duration {
        Duration::from_secs(self.max_task_duration_secs)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_task_duration_secs == 0 {
            return Err("max_task_duration_secs must be greater than 0".into());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be greater than 0".into());
        }
        if self.recent_window_hours == 0 {
            return Err("recent_window_hours must be greater than 0".into());
        }
        if self.shutdown.action_timeout_secs == 0 {
            return Err("shutdown.action_timeout_secs must be greater than 0".into());
        }
        if let StoreBackendConfig::File { path, stream } = &self.store {
            if path.as_os_str().is_empty() {
                return Err("store path must not be empty".into());
            }
            if stream.trim().is_empty() {
                return Err("store stream must not be empty".into());
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SLOT_*` environment variables, loading a
    /// `.env` file first if present. Unset variables keep their defaults.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `SLOT_MAX_TASK_DURATION_SECS` | `max_task_duration_secs` |
    /// | `SLOT_POOL_SIZE` | `pool_size` |
    /// | `SLOT_RECENT_WINDOW_HOURS` | `recent_window_hours` |
    /// | `SLOT_AUDIT_CAPACITY` | `audit_capacity` |
    /// | `SLOT_STORE_PATH` | file store directory (selects the file backend) |
    /// | `SLOT_STORE_STREAM` | file store stream |
    /// | `SLOT_SHUTDOWN_EXIT` | `shutdown.exit_after_sweep` |
    ///
    /// # Errors
    ///
    /// Unparseable values or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = env_parse("SLOT_MAX_TASK_DURATION_SECS")? {
            cfg.max_task_duration_secs = v;
        }
        if let Some(v) = env_parse("SLOT_POOL_SIZE")? {
            cfg.pool_size = v;
        }
        if let Some(v) = env_parse("SLOT_RECENT_WINDOW_HOURS")? {
            cfg.recent_window_hours = v;
        }
        if let Some(v) = env_parse("SLOT_AUDIT_CAPACITY")? {
            cfg.audit_capacity = v;
        }
        if let Some(path) = env_parse::<PathBuf>("SLOT_STORE_PATH")? {
            let stream = env_parse::<String>("SLOT_STORE_STREAM")?.unwrap_or_else(default_stream);
            cfg.store = StoreBackendConfig::File { path, stream };
        }
        if let Some(v) = env_parse("SLOT_SHUTDOWN_EXIT")? {
            cfg.shutdown.exit_after_sweep = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
