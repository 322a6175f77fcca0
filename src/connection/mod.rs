//! Connection management between accounts.
//!
//! Two accounts are either unrelated, have a pending request between them,
//! or are connected. On top of a connection each side can privately mark
//! the other as a close friend.
//!
//! # Architecture
//!
//! ```text
//! ConnectionManager (mutations, preconditions under pair locks)
//!     ├── PairLocks (striped mutexes keyed by PairKey)
//!     ├── AccountDirectory (does the target exist?)
//!     └── ConnectionStorage (SQLite: connections, close_friends)
//!
//! ConnectionQueries (read-only labels and lists for presentation)
//!     └── ConnectionStorage
//! ```
//!
//! # Types
//!
//! - [`Edge`]: The stored record for a pair, pending or connected
//! - [`CloseFriend`]: One-directional close friend marker
//! - [`Relationship`]: What a viewer sees, derived on read
//! - [`PairKey`]: Canonical unordered pair used for lookups and locking

mod error;
mod lock;
mod manager;
mod query;
mod storage;
pub mod types;

pub use error::{ConnectionError, ErrorKind, Result};
pub use lock::PairLocks;
pub use manager::ConnectionManager;
pub use query::ConnectionQueries;
pub use types::{
    CloseFriend, ConnectionType, Edge, PairKey, PendingRequest, Relationship, RelationshipAction,
};
