//! Account directory consulted before a connection request is stored.
//!
//! Registration, login and profiles live elsewhere; the connection core
//! only needs to know whether a username exists. [`AccountStorage`] keeps
//! that list in `SQLite` next to the connection tables.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashSet;
use std::hash::BuildHasher;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::connection::{ConnectionError, Result};

/// Answers whether an account exists.
pub trait AccountDirectory {
    /// Returns whether `username` names an existing account.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be consulted.
    fn exists(&self, username: &str) -> Result<bool>;
}

impl<S: BuildHasher> AccountDirectory for HashSet<String, S> {
    fn exists(&self, username: &str) -> Result<bool> {
        Ok(self.contains(username))
    }
}

impl<T: AccountDirectory + ?Sized> AccountDirectory for Arc<T> {
    fn exists(&self, username: &str) -> Result<bool> {
        (**self).exists(username)
    }
}

impl<T: AccountDirectory + ?Sized> AccountDirectory for &T {
    fn exists(&self, username: &str) -> Result<bool> {
        (**self).exists(username)
    }
}

/// `SQLite`-backed account list.
pub struct AccountStorage {
    conn: Mutex<Connection>,
}

impl AccountStorage {
    /// Opens (or creates) the account table in the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory account list for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                username TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            ConnectionError::StorageUnavailable(format!("Failed to acquire database lock: {e}"))
        })
    }

    /// Registers `username`. Returns `false` if it was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn register(&self, username: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn()?;

        let rows = conn.execute(
            "INSERT INTO accounts (username, created_at) VALUES (?1, ?2) ON CONFLICT(username) DO NOTHING",
            params![username, now],
        )?;

        Ok(rows > 0)
    }

    /// Removes `username`. Returns whether it was present.
    ///
    /// Connections involving the account are not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, username: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM accounts WHERE username = ?1",
            params![username],
        )?;
        Ok(rows > 0)
    }
}

impl AccountDirectory for AccountStorage {
    fn exists(&self, username: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM accounts WHERE username = ?1",
                params![username],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
