//! Harness configuration
//!
//! Values are layered, later layers winning:
//!
//! 1. Built-in defaults (`NUM_PROCESSES=10`, `NUM_UPDATES=1000`)
//! 2. An optional TOML file
//! 3. Environment variables
//! 4. Command-line flags (applied by the CLI on top of the result)
//!
//! ```toml
//! num_processes = 10
//! num_updates = 1000
//! think_time_ms = 0
//!
//! [database]
//! path = "counterlab.db"
//! busy_timeout_ms = 30000
//!
//! [retry]
//! max_attempts = 50
//! base_backoff_ms = 1
//! max_backoff_ms = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CounterError, CounterResult};

/// Default number of concurrent workers
pub const DEFAULT_NUM_PROCESSES: usize = 10;
/// Default iterations per worker
pub const DEFAULT_NUM_UPDATES: usize = 1000;
/// Default database file
pub const DEFAULT_DB_PATH: &str = "counterlab.db";
/// Default time a connection waits on a held lock before erroring (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;
/// Default cap on OCC backoff (ms)
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 100;

/// Full harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Number of concurrent workers (`NUM_PROCESSES`)
    pub num_processes: usize,
    /// Increment iterations per worker (`NUM_UPDATES`)
    pub num_updates: usize,
    /// Delay between the read and the write of a read-modify-write step
    pub think_time_ms: u64,
    /// Store connection settings
    pub database: DatabaseConfig,
    /// OCC retry policy
    pub retry: RetryConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            num_processes: DEFAULT_NUM_PROCESSES,
            num_updates: DEFAULT_NUM_UPDATES,
            think_time_ms: 0,
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Connection settings for the relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file every worker connects to
    pub path: PathBuf,
    /// How long a statement waits on a held lock before failing
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl DatabaseConfig {
    /// Settings for a database at `path` with default timeouts
    pub fn at(path: impl AsRef<Path>) -> Self {
        DatabaseConfig {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Busy timeout as a `Duration`
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// OCC retry settings
///
/// `max_attempts = None` retries forever with no backoff, which is the
/// classic behavior of the demonstration. Setting a bound turns on
/// exponential backoff between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per iteration before giving up; `None` is unbounded
    pub max_attempts: Option<u32>,
    /// Backoff before the second attempt (ms), doubled per attempt
    pub base_backoff_ms: u64,
    /// Backoff ceiling (ms)
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: None,
            base_backoff_ms: 0,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl HarnessConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> CounterResult<Self> {
        toml::from_str(s).map_err(|e| CounterError::InvalidConfig(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> CounterResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CounterError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> CounterResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) -> CounterResult<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable lookup
    ///
    /// Recognized variables: `NUM_PROCESSES`, `NUM_UPDATES`, `THINK_TIME_MS`,
    /// `DB_PATH`, `DB_NAME` (used as `<name>.db` when `DB_PATH` is unset),
    /// `DB_BUSY_TIMEOUT_MS`, `OCC_MAX_RETRIES`, `OCC_BACKOFF_MS`,
    /// `OCC_MAX_BACKOFF_MS`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> CounterResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "NUM_PROCESSES")? {
            self.num_processes = v;
        }
        if let Some(v) = parse_var(&lookup, "NUM_UPDATES")? {
            self.num_updates = v;
        }
        if let Some(v) = parse_var(&lookup, "THINK_TIME_MS")? {
            self.think_time_ms = v;
        }

        match (lookup("DB_PATH"), lookup("DB_NAME")) {
            (Some(path), _) if !path.trim().is_empty() => {
                self.database.path = PathBuf::from(path.trim());
            }
            (_, Some(name)) if !name.trim().is_empty() => {
                self.database.path = PathBuf::from(format!("{}.db", name.trim()));
            }
            _ => {}
        }
        if let Some(v) = parse_var(&lookup, "DB_BUSY_TIMEOUT_MS")? {
            self.database.busy_timeout_ms = v;
        }

        if let Some(v) = parse_var(&lookup, "OCC_MAX_RETRIES")? {
            self.retry.max_attempts = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "OCC_BACKOFF_MS")? {
            self.retry.base_backoff_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "OCC_MAX_BACKOFF_MS")? {
            self.retry.max_backoff_ms = v;
        }
        Ok(())
    }

    /// Reject values that make a run meaningless
    pub fn validate(&self) -> CounterResult<()> {
        if self.num_processes == 0 {
            return Err(CounterError::InvalidConfig(
                "num_processes must be at least 1".to_string(),
            ));
        }
        if self.num_updates == 0 {
            return Err(CounterError::InvalidConfig(
                "num_updates must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(CounterError::InvalidConfig(
                "retry.max_attempts must be at least 1 when set".to_string(),
            ));
        }
        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(CounterError::InvalidConfig(format!(
                "retry.base_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.base_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(CounterError::InvalidConfig(
                "database.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Think time as a `Duration`
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }

    /// `num_processes * num_updates`
    pub fn expected_total(&self) -> i64 {
        (self.num_processes as i64).saturating_mul(self.num_updates as i64)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> CounterResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            CounterError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))
        }),
    }
}
