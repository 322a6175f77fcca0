//! High-level connection management API.
//!
//! [`ConnectionManager`] is the only writer of the connection tables. Every
//! mutation takes the lock for its pair, re-reads the pair's state, checks
//! its preconditions against that fresh state and only then writes.
//!
//! The pair locks live in one manager. Each write is also a single
//! conditional statement (or one transaction), so managers in different
//! processes sharing a database file cannot leave a close marker on a
//! removed pair or accept a request that was withdrawn meanwhile.
//!
//! # Transitions
//!
//! ```text
//! request(v, o)            NONE      -> OUTGOING (v) / INCOMING (o)
//! accept(o, v)             INCOMING  -> CONNECTED (both sides)
//! mark_close(v, o)         CONNECTED -> CLOSE (v only)
//! remove_close(v, o)       CLOSE     -> CONNECTED (v only)
//! remove_connection(v, o)  any       -> NONE
//! ```

use std::sync::Arc;

use super::error::{ConnectionError, Result};
use super::lock::PairLocks;
use super::query::{compute_relationship, ConnectionQueries};
use super::storage::ConnectionStorage;
use super::types::{CloseFriend, Edge, PairKey, Relationship};
use crate::account::{AccountDirectory, AccountStorage};
use crate::config::{CloseMarkerPolicy, NetworkConfig};

/// High-level API for connection management.
///
/// The viewer is passed explicitly to every call; the manager never reads
/// session state.
///
/// # Example
///
/// ```ignore
/// use student_network_core::connection::ConnectionManager;
/// use student_network_core::NetworkConfig;
///
/// let manager = ConnectionManager::new(&NetworkConfig::new("/data/network"))?;
/// manager.directory().register("bob")?;
/// manager.request("alice", "bob")?;
/// ```
pub struct ConnectionManager<D = AccountStorage> {
    storage: Arc<ConnectionStorage>,
    directory: D,
    locks: PairLocks,
    close_marker_policy: CloseMarkerPolicy,
}

impl ConnectionManager<AccountStorage> {
    /// Creates a manager with a `SQLite` account directory in the same
    /// database as the connections.
    ///
    /// Creates the data directory and database if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or initialization
    /// fails.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        create_data_dir(config)?;
        let directory = AccountStorage::new(&config.database_path(), config.busy_timeout())?;
        Self::with_directory(config, directory)
    }
}

impl<D: AccountDirectory> ConnectionManager<D> {
    /// Creates a manager backed by the database named in `config`, using
    /// `directory` to check that request targets exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or initialization
    /// fails.
    pub fn with_directory(config: &NetworkConfig, directory: D) -> Result<Self> {
        config.validate()?;
        create_data_dir(config)?;
        let storage = ConnectionStorage::new(&config.database_path(), config.busy_timeout())?;
        Ok(Self::from_parts(storage, directory, config))
    }

    fn from_parts(storage: ConnectionStorage, directory: D, config: &NetworkConfig) -> Self {
        Self {
            storage: Arc::new(storage),
            directory,
            locks: PairLocks::new(config.lock_stripes),
            close_marker_policy: config.close_marker_policy,
        }
    }

    /// Creates a manager over in-memory storage for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory(directory: D, config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(
            ConnectionStorage::in_memory()?,
            directory,
            config,
        ))
    }

    /// The account directory.
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// The close marker policy applied by [`Self::remove_connection`].
    #[must_use]
    pub const fn close_marker_policy(&self) -> CloseMarkerPolicy {
        self.close_marker_policy
    }

    /// Read-only projections sharing this manager's storage.
    #[must_use]
    pub fn queries(&self) -> ConnectionQueries {
        ConnectionQueries::new(Arc::clone(&self.storage))
    }

    /// Derives the relationship `viewer` has with `other`. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn compute_relationship(&self, viewer: &str, other: &str) -> Result<Relationship> {
        compute_relationship(&self.storage, viewer, other)
    }

    // ==================== Requests ====================

    /// Sends a connection request from `viewer` to `other`.
    ///
    /// A pair can hold one edge at a time, so this fails while a request in
    /// either direction is pending and once the pair is connected.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::SelfRelation`] if `viewer == other`
    /// - [`ConnectionError::UnknownUser`] if `other` does not exist
    /// - [`ConnectionError::DuplicateRequest`] if the pair already has an edge
    /// - [`ConnectionError::StorageUnavailable`] if the database fails
    pub fn request(&self, viewer: &str, other: &str) -> Result<Edge> {
        log_outcome("request", viewer, other, self.try_request(viewer, other))
    }

    fn try_request(&self, viewer: &str, other: &str) -> Result<Edge> {
        if viewer == other {
            return Err(ConnectionError::SelfRelation(viewer.to_string()));
        }
        if !self.directory.exists(other)? {
            return Err(ConnectionError::UnknownUser(other.to_string()));
        }

        let _guard = self.locks.lock(&PairKey::new(viewer, other));
        if self.storage.get_edge(viewer, other)?.is_some() {
            return Err(ConnectionError::duplicate(viewer, other));
        }
        self.storage.create_edge(viewer, other)
    }

    /// Accepts the pending request `other` sent to `viewer`.
    ///
    /// The stored edge keeps its direction; only its type changes.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::NoPendingRequest`] unless `other` has a pending
    ///   request to `viewer`
    /// - [`ConnectionError::StorageUnavailable`] if the database fails
    pub fn accept(&self, viewer: &str, other: &str) -> Result<Edge> {
        log_outcome("accept", viewer, other, self.try_accept(viewer, other))
    }

    fn try_accept(&self, viewer: &str, other: &str) -> Result<Edge> {
        let _guard = self.locks.lock(&PairKey::new(viewer, other));

        let pending = self
            .storage
            .get_edge(other, viewer)?
            .is_some_and(|edge| edge.is_pending() && edge.user1 == other && edge.user2 == viewer);
        if !pending {
            return Err(ConnectionError::no_pending(other, viewer));
        }

        self.storage
            .set_connected(other, viewer)?
            .ok_or_else(|| ConnectionError::no_pending(other, viewer))
    }

    /// Removes whatever edge links `viewer` and `other`.
    ///
    /// Cancels an outgoing request, declines an incoming one or dissolves a
    /// connection. Returns whether an edge was removed; removing a missing
    /// edge succeeds. Close friend markers follow the configured
    /// [`CloseMarkerPolicy`].
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::SelfRelation`] if `viewer == other`
    /// - [`ConnectionError::StorageUnavailable`] if the database fails
    pub fn remove_connection(&self, viewer: &str, other: &str) -> Result<bool> {
        log_outcome(
            "remove_connection",
            viewer,
            other,
            self.try_remove_connection(viewer, other),
        )
    }

    fn try_remove_connection(&self, viewer: &str, other: &str) -> Result<bool> {
        if viewer == other {
            return Err(ConnectionError::SelfRelation(viewer.to_string()));
        }

        let _guard = self.locks.lock(&PairKey::new(viewer, other));
        match self.close_marker_policy {
            CloseMarkerPolicy::Cascade => self.storage.delete_pair(viewer, other),
            CloseMarkerPolicy::Retain => self.storage.delete_edge(viewer, other),
        }
    }

    // ==================== Close Friends ====================

    /// Marks `other` as a close friend of `viewer`.
    ///
    /// Only `viewer`'s view changes; `other` keeps seeing a plain
    /// connection.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::NotConnected`] unless `viewer` currently sees
    ///   `other` as connected (this includes already being close)
    /// - [`ConnectionError::StorageUnavailable`] if the database fails
    pub fn mark_close(&self, viewer: &str, other: &str) -> Result<CloseFriend> {
        log_outcome("mark_close", viewer, other, self.try_mark_close(viewer, other))
    }

    fn try_mark_close(&self, viewer: &str, other: &str) -> Result<CloseFriend> {
        let _guard = self.locks.lock(&PairKey::new(viewer, other));

        if compute_relationship(&self.storage, viewer, other)? != Relationship::Connected {
            return Err(ConnectionError::not_connected(viewer, other));
        }
        self.storage
            .create_close(viewer, other)?
            .ok_or_else(|| ConnectionError::not_connected(viewer, other))
    }

    /// Drops `viewer`'s close friend marker on `other`.
    ///
    /// The guard is that the pair is connected, not that a marker exists:
    /// on a connected pair without a marker this succeeds and returns
    /// `false`.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::NotConnected`] unless the pair's edge is
    ///   connected
    /// - [`ConnectionError::StorageUnavailable`] if the database fails
    pub fn remove_close(&self, viewer: &str, other: &str) -> Result<bool> {
        log_outcome(
            "remove_close",
            viewer,
            other,
            self.try_remove_close(viewer, other),
        )
    }

    fn try_remove_close(&self, viewer: &str, other: &str) -> Result<bool> {
        if viewer == other {
            return Err(ConnectionError::not_connected(viewer, other));
        }

        let _guard = self.locks.lock(&PairKey::new(viewer, other));
        let connected = self
            .storage
            .get_edge(viewer, other)?
            .is_some_and(|edge| edge.is_connected());
        if !connected {
            return Err(ConnectionError::not_connected(viewer, other));
        }
        self.storage.delete_close(viewer, other)
    }
}

impl<D> std::fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("locks", &self.locks)
            .field("close_marker_policy", &self.close_marker_policy)
            .finish_non_exhaustive()
    }
}

fn create_data_dir(config: &NetworkConfig) -> Result<()> {
    std::fs::create_dir_all(config.data_dir()).map_err(|e| {
        ConnectionError::StorageUnavailable(format!("Failed to create data directory: {e}"))
    })
}

/// Logs the outcome of a mutation and hands the result back unchanged.
fn log_outcome<T>(op: &str, viewer: &str, other: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => log::info!("{op}: {viewer} -> {other}"),
        Err(e) if e.is_recoverable() => {
            log::debug!("{op} rejected ({:?}): {viewer} -> {other}: {e}", e.kind());
        }
        Err(e) => log::error!("{op} failed: {viewer} -> {other}: {e}"),
    }
    result
}
