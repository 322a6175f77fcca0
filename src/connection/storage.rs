//! `SQLite` storage for connections and close friend markers.
//!
//! This is a thin persistence layer: it writes exactly what it is told and
//! reads it back. It holds no business rules, but every write is a single
//! statement or transaction whose own conditions keep the stored state
//! valid when several managers share one database file:
//! - a uniqueness constraint over the canonical (unordered) pair, so two
//!   edges for the same pair never coexist
//! - `set_connected` only flips a pending request in the given direction
//! - `create_close` only inserts next to a connected edge

// SQLite operations need to hold the lock for the duration of the operation.
// Dropping the guard earlier would require restructuring all methods.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::{ConnectionError, Result};
use super::types::{CloseFriend, ConnectionType, Edge, PairKey};

const EDGE_COLUMNS: &str = "user1, user2, connection_type, created_at, updated_at";

type EdgeRow = (String, String, String, i64, i64);

/// `SQLite`-based storage for connection data.
///
/// Only [`super::ConnectionManager`] writes through this type.
///
/// Thread-safe wrapper around a `SQLite` connection storing edges and
/// close friend markers.
pub struct ConnectionStorage {
    conn: Mutex<Connection>,
}

impl ConnectionStorage {
    /// Creates a new storage instance at the given path.
    ///
    /// Creates the database file and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Raw connection handle for tests that need to plant bad rows.
    #[cfg(test)]
    pub(crate) fn raw(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            ConnectionError::StorageUnavailable(format!("Failed to acquire database lock: {e}"))
        })
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r"
            -- One row per unordered pair; user1 asked user2
            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user1 TEXT NOT NULL,
                user2 TEXT NOT NULL,
                pair_low TEXT NOT NULL,
                pair_high TEXT NOT NULL,
                connection_type TEXT NOT NULL DEFAULT 'request',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CHECK (user1 <> user2),
                CHECK (pair_low < pair_high),
                UNIQUE (pair_low, pair_high)
            );

            CREATE INDEX IF NOT EXISTS idx_connections_user2
                ON connections (user2, connection_type);
            CREATE INDEX IF NOT EXISTS idx_connections_user1
                ON connections (user1, connection_type);

            -- Directional close friend markers (from_user marked to_user)
            CREATE TABLE IF NOT EXISTS close_friends (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_user TEXT NOT NULL,
                to_user TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (from_user, to_user)
            );
            ",
        )?;

        Ok(())
    }

    // ==================== Edge Operations ====================

    /// Retrieves the edge for the unordered pair `{a, b}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_edge(&self, a: &str, b: &str) -> Result<Option<Edge>> {
        let key = PairKey::new(a, b);
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {EDGE_COLUMNS} FROM connections WHERE pair_low = ?1 AND pair_high = ?2"
                ),
                params![key.low(), key.high()],
                read_edge_row,
            )
            .optional()?;

        row.map(into_edge).transpose()
    }

    /// Inserts a pending request edge `from -> to`.
    ///
    /// The caller is expected to have checked that no edge exists for the
    /// pair. If one does anyway, the uniqueness constraint rejects the
    /// insert.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::DuplicateRequest`] if an edge already
    /// exists for the pair, or a storage error if the database fails.
    pub fn create_edge(&self, from: &str, to: &str) -> Result<Edge> {
        let key = PairKey::new(from, to);
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn()?;

        let inserted = conn.execute(
            r"
            INSERT INTO connections (user1, user2, pair_low, pair_high, connection_type, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ",
            params![
                from,
                to,
                key.low(),
                key.high(),
                ConnectionType::Request.as_str(),
                now,
            ],
        );

        match inserted {
            Ok(_) => Ok(Edge {
                user1: from.to_string(),
                user2: to.to_string(),
                connection_type: ConnectionType::Request,
                created_at: now,
                updated_at: now,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(ConnectionError::duplicate(from, to))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Turns the pending request `from -> to` into a connection and returns
    /// the updated edge.
    ///
    /// `user1`/`user2` are left untouched. The update is a single
    /// conditional statement: if the pair holds no pending request in that
    /// direction nothing is written and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_connected(&self, from: &str, to: &str) -> Result<Option<Edge>> {
        let key = PairKey::new(from, to);
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!(
                    r"
                    UPDATE connections
                    SET connection_type = ?1, updated_at = ?2
                    WHERE pair_low = ?3 AND pair_high = ?4
                      AND user1 = ?5 AND connection_type = ?6
                    RETURNING {EDGE_COLUMNS}
                    "
                ),
                params![
                    ConnectionType::Connected.as_str(),
                    now,
                    key.low(),
                    key.high(),
                    from,
                    ConnectionType::Request.as_str(),
                ],
                read_edge_row,
            )
            .optional()?;

        row.map(into_edge).transpose()
    }

    /// Deletes the edge for `{a, b}`. Close friend markers are untouched.
    ///
    /// Returns whether an edge was removed; a missing edge is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_edge(&self, a: &str, b: &str) -> Result<bool> {
        let key = PairKey::new(a, b);
        let conn = self.conn()?;

        let rows = conn.execute(
            "DELETE FROM connections WHERE pair_low = ?1 AND pair_high = ?2",
            params![key.low(), key.high()],
        )?;

        Ok(rows > 0)
    }

    /// Deletes the edge for `{a, b}` together with the close friend
    /// markers in both directions, in one transaction.
    ///
    /// Returns whether an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails. Nothing is
    /// deleted in that case.
    pub fn delete_pair(&self, a: &str, b: &str) -> Result<bool> {
        let key = PairKey::new(a, b);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r"
            DELETE FROM close_friends
            WHERE (from_user = ?1 AND to_user = ?2) OR (from_user = ?2 AND to_user = ?1)
            ",
            params![key.low(), key.high()],
        )?;
        let rows = tx.execute(
            "DELETE FROM connections WHERE pair_low = ?1 AND pair_high = ?2",
            params![key.low(), key.high()],
        )?;

        tx.commit()?;
        Ok(rows > 0)
    }

    /// Lists pending requests received by `user`, oldest insert first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_incoming_requests(&self, user: &str) -> Result<Vec<Edge>> {
        self.query_edges(
            "WHERE user2 = ?1 AND connection_type = ?2 ORDER BY id",
            params![user, ConnectionType::Request.as_str()],
        )
    }

    /// Counts pending requests received by `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_incoming_requests(&self, user: &str) -> Result<usize> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM connections WHERE user2 = ?1 AND connection_type = ?2",
            params![user, ConnectionType::Request.as_str()],
            |row| row.get(0),
        )?;

        usize::try_from(count).map_err(|_| {
            ConnectionError::StorageUnavailable(format!("Invalid request count: {count}"))
        })
    }

    /// Lists pending requests sent by `user`, oldest insert first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_outgoing_requests(&self, user: &str) -> Result<Vec<Edge>> {
        self.query_edges(
            "WHERE user1 = ?1 AND connection_type = ?2 ORDER BY id",
            params![user, ConnectionType::Request.as_str()],
        )
    }

    /// Lists connected edges touching `user`, oldest insert first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_connections(&self, user: &str) -> Result<Vec<Edge>> {
        self.query_edges(
            "WHERE (user1 = ?1 OR user2 = ?1) AND connection_type = ?2 ORDER BY id",
            params![user, ConnectionType::Connected.as_str()],
        )
    }

    fn query_edges(&self, filter: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Edge>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!("SELECT {EDGE_COLUMNS} FROM connections {filter}"))?;
        let rows = stmt
            .query_map(params, read_edge_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_edge).collect()
    }

    // ==================== Close Friend Operations ====================

    /// Retrieves the marker `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_close(&self, from: &str, to: &str) -> Result<Option<CloseFriend>> {
        let conn = self.conn()?;

        let marker = conn
            .query_row(
                r"
                SELECT from_user, to_user, created_at
                FROM close_friends
                WHERE from_user = ?1 AND to_user = ?2
                ",
                params![from, to],
                read_close_row,
            )
            .optional()?;

        Ok(marker)
    }

    /// Creates the marker `from -> to` if the pair is connected and the
    /// marker does not exist yet.
    ///
    /// Markers only ever attach to a connected edge. The check and the
    /// insert are one statement, so a concurrent disconnect cannot slip in
    /// between them. Returns `None` when nothing was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create_close(&self, from: &str, to: &str) -> Result<Option<CloseFriend>> {
        let key = PairKey::new(from, to);
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn()?;

        let marker = conn
            .query_row(
                r"
                INSERT INTO close_friends (from_user, to_user, created_at)
                SELECT ?1, ?2, ?3
                WHERE EXISTS (
                    SELECT 1 FROM connections
                    WHERE pair_low = ?4 AND pair_high = ?5 AND connection_type = ?6
                )
                ON CONFLICT(from_user, to_user) DO NOTHING
                RETURNING from_user, to_user, created_at
                ",
                params![
                    from,
                    to,
                    now,
                    key.low(),
                    key.high(),
                    ConnectionType::Connected.as_str(),
                ],
                read_close_row,
            )
            .optional()?;

        Ok(marker)
    }

    /// Deletes the marker `from -> to`.
    ///
    /// Returns whether a marker was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_close(&self, from: &str, to: &str) -> Result<bool> {
        let conn = self.conn()?;

        let rows = conn.execute(
            "DELETE FROM close_friends WHERE from_user = ?1 AND to_user = ?2",
            params![from, to],
        )?;

        Ok(rows > 0)
    }

    /// Lists every marker created by `user`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_close_from(&self, user: &str) -> Result<Vec<CloseFriend>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r"
            SELECT from_user, to_user, created_at
            FROM close_friends
            WHERE from_user = ?1
            ORDER BY id
            ",
        )?;

        let markers = stmt
            .query_map(params![user], read_close_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(markers)
    }
}

fn read_edge_row(row: &Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_edge((user1, user2, type_str, created_at, updated_at): EdgeRow) -> Result<Edge> {
    let connection_type = ConnectionType::parse(&type_str).ok_or_else(|| {
        ConnectionError::StorageUnavailable(format!("Invalid connection_type: {type_str}"))
    })?;

    Ok(Edge {
        user1,
        user2,
        connection_type,
        created_at,
        updated_at,
    })
}

fn read_close_row(row: &Row<'_>) -> rusqlite::Result<CloseFriend> {
    Ok(CloseFriend {
        from: row.get(0)?,
        to: row.get(1)?,
        created_at: row.get(2)?,
    })
}
