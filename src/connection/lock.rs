//! Per-pair mutual exclusion for relationship mutations.
//!
//! Mutations on the same unordered pair must not interleave their
//! read-check-write sequences. [`PairLocks`] hashes the [`PairKey`] onto a
//! fixed set of mutexes; two pairs may share a stripe, which only costs
//! throughput. Each mutation holds exactly one stripe, so there is no lock
//! ordering to get wrong.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::PairKey;

/// Striped mutexes keyed by canonical pair.
pub struct PairLocks {
    stripes: Box<[Mutex<()>]>,
}

impl PairLocks {
    /// Creates a lock table with `stripes` mutexes (at least one).
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// Blocks until the stripe for `key` is free and returns its guard.
    ///
    /// The mutexes guard no data, so a poisoned stripe is simply reused.
    pub fn lock(&self, key: &PairKey) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_index(key)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_possible_truncation)] // Result is below stripes.len().
    fn stripe_index(&self, key: &PairKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

impl std::fmt::Debug for PairLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairLocks")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}
