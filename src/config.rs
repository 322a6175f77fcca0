//! Configuration for the connection core.
//!
//! [`NetworkConfig`] is built in code with the `with_*` methods or parsed
//! from a JSON document. Missing JSON fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionError, Result};

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_NAME: &str = "connections.db";

/// Default number of lock stripes used to serialize pair mutations.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Default `SQLite` busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// What happens to close friend markers when a connection is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseMarkerPolicy {
    /// Delete markers in both directions together with the edge.
    #[default]
    Cascade,
    /// Delete only the edge. Markers stay behind but are invisible until
    /// the pair connects again.
    Retain,
}

/// Configuration for the connection core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub database_name: String,
    /// Close marker handling on disconnect.
    pub close_marker_policy: CloseMarkerPolicy,
    /// Number of mutexes pair mutations are striped across.
    pub lock_stripes: usize,
    /// How long a storage call waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            close_marker_policy: CloseMarkerPolicy::default(),
            lock_stripes: DEFAULT_LOCK_STRIPES,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl NetworkConfig {
    /// Creates a configuration rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidConfig`] if the document is
    /// malformed or describes an unusable configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConnectionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns an error if `lock_stripes` is zero or `database_name` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.lock_stripes == 0 {
            return Err(ConnectionError::InvalidConfig(
                "lock_stripes must be at least 1".to_string(),
            ));
        }
        if self.database_name.is_empty() {
            return Err(ConnectionError::InvalidConfig("database_name is empty".to_string()));
        }
        Ok(())
    }

    /// Sets the database file name.
    #[must_use]
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets the close marker policy.
    #[must_use]
    pub const fn with_close_marker_policy(mut self, policy: CloseMarkerPolicy) -> Self {
        self.close_marker_policy = policy;
        self
    }

    /// Sets the number of lock stripes. Zero is rejected by
    /// [`Self::validate`].
    #[must_use]
    pub const fn with_lock_stripes(mut self, stripes: usize) -> Self {
        self.lock_stripes = stripes;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Full path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_name)
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Busy timeout as a [`Duration`].
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
