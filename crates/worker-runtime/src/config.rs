//! # Worker Configuration
//!
//! Runtime parameters with defaults and environment overrides.
//!
//! ## Security Requirements
//!
//! - The runtime directory holds the instance lock and the socket; it must be
//!   writable by the worker only.
//! - Privileged helper actions are granted to root and to the uids listed in
//!   `PW_AUTHORIZED_UIDS`, nobody else.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use pw_01_transaction_queue::{
    DEFAULT_ACTION_PREFIX, DEFAULT_FINISHED_HISTORY, DEFAULT_IDLE_TIMEOUT_MS,
};
use shared_types::Uid;
use thiserror::Error;

/// Complete worker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Directory holding `worker.lock` and the socket.
    pub runtime_dir: PathBuf,
    /// Socket file name inside `runtime_dir`.
    pub socket_name: String,
    /// Destination of `CopyArchiveToCache`.
    pub archive_cache_dir: PathBuf,
    /// Idle supervision.
    pub idle: IdleConfig,
    /// Authorization policy.
    pub authorization: AuthorizationConfig,
    /// Terminal transactions kept for status queries.
    pub finished_history: usize,
    /// Duration of one simulated engine step.
    pub simulated_step_ms: u64,
    /// Longest request line a client may send (bytes).
    pub max_frame_bytes: usize,
}

/// Default request line limit (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Idle supervision parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleConfig {
    /// Inactivity after which the worker stops (ms).
    pub timeout_ms: u64,
    /// Period between idle checks (ms).
    pub check_interval_ms: u64,
}

/// Authorization parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConfig {
    /// Uids allowed privileged actions in addition to root.
    pub authorized_uids: Vec<Uid>,
    /// Reverse-domain prefix of action ids.
    pub action_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("/run/pkg-worker"),
            socket_name: "worker.sock".to_string(),
            archive_cache_dir: PathBuf::from("/var/cache/apt/archives"),
            idle: IdleConfig::default(),
            authorization: AuthorizationConfig::default(),
            finished_history: DEFAULT_FINISHED_HISTORY,
            simulated_step_ms: 200,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            check_interval_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            authorized_uids: Vec::new(),
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A size limit that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// Action ids would have no namespace.
    #[error("action prefix must not be empty")]
    EmptyActionPrefix,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PW_RUNTIME_DIR` | `/run/pkg-worker` |
    /// | `PW_SOCKET_NAME` | `worker.sock` |
    /// | `PW_ARCHIVE_CACHE_DIR` | `/var/cache/apt/archives` |
    /// | `PW_IDLE_TIMEOUT_MS` | `30000` |
    /// | `PW_IDLE_CHECK_INTERVAL_MS` | `30000` |
    /// | `PW_AUTHORIZED_UIDS` | empty |
    /// | `PW_ACTION_PREFIX` | `org.pkgworker.worker` |
    /// | `PW_FINISHED_HISTORY` | `64` |
    /// | `PW_SIMULATED_STEP_MS` | `200` |
    /// | `PW_MAX_FRAME_BYTES` | `16777216` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source, then validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("PW_RUNTIME_DIR") {
            config.runtime_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("PW_SOCKET_NAME") {
            config.socket_name = name;
        }
        if let Some(dir) = lookup("PW_ARCHIVE_CACHE_DIR") {
            config.archive_cache_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var(&lookup, "PW_IDLE_TIMEOUT_MS")? {
            config.idle.timeout_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "PW_IDLE_CHECK_INTERVAL_MS")? {
            config.idle.check_interval_ms = ms;
        }
        if let Some(uids) = lookup("PW_AUTHORIZED_UIDS") {
            config.authorization.authorized_uids = parse_uids(&uids)?;
        }
        if let Some(prefix) = lookup("PW_ACTION_PREFIX") {
            config.authorization.action_prefix = prefix;
        }
        if let Some(n) = parse_var(&lookup, "PW_FINISHED_HISTORY")? {
            config.finished_history = n;
        }
        if let Some(ms) = parse_var(&lookup, "PW_SIMULATED_STEP_MS")? {
            config.simulated_step_ms = ms;
        }
        if let Some(n) = parse_var(&lookup, "PW_MAX_FRAME_BYTES")? {
            config.max_frame_bytes = n;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle.timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("PW_IDLE_TIMEOUT_MS"));
        }
        if self.idle.check_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("PW_IDLE_CHECK_INTERVAL_MS"));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroLimit("PW_MAX_FRAME_BYTES"));
        }
        if self.authorization.action_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyActionPrefix);
        }
        Ok(())
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.socket_name)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle.check_interval_ms)
    }

    pub fn simulated_step(&self) -> Duration {
        Duration::from_millis(self.simulated_step_ms)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

fn parse_uids(value: &str) -> Result<Vec<Uid>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidValue {
                var: "PW_AUTHORIZED_UIDS",
                value: value.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.idle.timeout_ms, 30_000);
        assert_eq!(config.idle.check_interval_ms, 30_000);
        assert_eq!(config.socket_path(), PathBuf::from("/run/pkg-worker/worker.sock"));
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("PW_RUNTIME_DIR", "/tmp/pw"),
            ("PW_IDLE_TIMEOUT_MS", "500"),
            ("PW_AUTHORIZED_UIDS", "1000, 1001,"),
            ("PW_FINISHED_HISTORY", "0"),
            ("PW_MAX_FRAME_BYTES", "4096"),
        ]))
        .unwrap();

        assert_eq!(config.socket_path(), PathBuf::from("/tmp/pw/worker.sock"));
        assert_eq!(config.idle.timeout_ms, 500);
        assert_eq!(config.authorization.authorized_uids, vec![1000, 1001]);
        assert_eq!(config.finished_history, 0);
        assert_eq!(config.max_frame_bytes, 4096);
    }

    #[test]
    fn test_unparsable_value_rejected() {
        let result = WorkerConfig::from_lookup(lookup_from(&[("PW_IDLE_TIMEOUT_MS", "soon")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                var: "PW_IDLE_TIMEOUT_MS",
                value: "soon".to_string()
            })
        );

        let result = WorkerConfig::from_lookup(lookup_from(&[("PW_AUTHORIZED_UIDS", "1000,bob")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { var: "PW_AUTHORIZED_UIDS", .. })));
    }

    #[test]
    fn test_validate() {
        let result = WorkerConfig::from_lookup(lookup_from(&[("PW_IDLE_CHECK_INTERVAL_MS", "0")]));
        assert_eq!(result, Err(ConfigError::ZeroDuration("PW_IDLE_CHECK_INTERVAL_MS")));

        let result = WorkerConfig::from_lookup(lookup_from(&[("PW_ACTION_PREFIX", "  ")]));
        assert_eq!(result, Err(ConfigError::EmptyActionPrefix));

        let result = WorkerConfig::from_lookup(lookup_from(&[("PW_MAX_FRAME_BYTES", "0")]));
        assert_eq!(result, Err(ConfigError::ZeroLimit("PW_MAX_FRAME_BYTES")));
    }
}
