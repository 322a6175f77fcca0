//! Read-only projections for the presentation layer.
//!
//! Nothing here takes the pair locks: a label may describe a state that
//! an in-flight mutation is about to replace. That is fine for rendering
//! a page. Mutations never rely on these reads and check their own
//! preconditions under the lock instead.

use std::sync::Arc;

use super::error::Result;
use super::storage::ConnectionStorage;
use super::types::{PendingRequest, Relationship, RelationshipAction};

/// Derives the relationship `viewer` has with `other` from storage.
///
/// The close marker is only looked up when the edge is connected.
pub(crate) fn compute_relationship(
    storage: &ConnectionStorage,
    viewer: &str,
    other: &str,
) -> Result<Relationship> {
    if viewer == other {
        return Ok(Relationship::Myself);
    }
    let edge = storage.get_edge(viewer, other)?;
    let close_marked = match &edge {
        Some(edge) if edge.is_connected() => storage.get_close(viewer, other)?.is_some(),
        _ => false,
    };
    Ok(Relationship::derive(viewer, other, edge.as_ref(), close_marked))
}

/// Read-only view over the connection graph.
///
/// Obtained from [`super::ConnectionManager::queries`]. Cheap to clone;
/// clones share the same storage.
#[derive(Clone)]
pub struct ConnectionQueries {
    storage: Arc<ConnectionStorage>,
}

impl ConnectionQueries {
    /// Creates a query view over `storage`.
    #[must_use]
    pub(crate) const fn new(storage: Arc<ConnectionStorage>) -> Self {
        Self { storage }
    }

    /// Relationship label `viewer` sees on `other`'s profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn relationship_label(&self, viewer: &str, other: &str) -> Result<Relationship> {
        compute_relationship(&self.storage, viewer, other)
    }

    /// Actions `viewer` can take on `other`, for choosing which buttons
    /// to render.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn available_actions(
        &self,
        viewer: &str,
        other: &str,
    ) -> Result<&'static [RelationshipAction]> {
        Ok(self.relationship_label(viewer, other)?.actions())
    }

    /// Accounts with a pending request to `user`, in the order the
    /// requests were stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_pending_requesters(&self, user: &str) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_incoming_requests(user)?
            .into_iter()
            .map(|edge| edge.user1)
            .collect())
    }

    /// Pending requests to `user` with the time each was sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_pending_requests(&self, user: &str) -> Result<Vec<PendingRequest>> {
        Ok(self
            .storage
            .list_incoming_requests(user)?
            .into_iter()
            .map(|edge| PendingRequest {
                requester: edge.user1,
                requested_at: edge.created_at,
            })
            .collect())
    }

    /// Number of pending requests to `user`, for the notification badge.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_pending_requests(&self, user: &str) -> Result<usize> {
        self.storage.count_incoming_requests(user)
    }

    /// Accounts `user` has asked and who have not answered yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_outgoing_requests(&self, user: &str) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_outgoing_requests(user)?
            .into_iter()
            .map(|edge| edge.user2)
            .collect())
    }

    /// Accounts connected with `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_connections(&self, user: &str) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_connections(user)?
            .iter()
            .filter_map(|edge| edge.other(user).map(str::to_string))
            .collect())
    }

    /// Accounts `user` has marked as close friends and is still
    /// connected with.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_close_friends(&self, user: &str) -> Result<Vec<String>> {
        let mut close = Vec::new();
        for marker in self.storage.list_close_from(user)? {
            let connected = self
                .storage
                .get_edge(user, &marker.to)?
                .is_some_and(|edge| edge.is_connected());
            if connected {
                close.push(marker.to);
            }
        }
        Ok(close)
    }
}

impl std::fmt::Debug for ConnectionQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionQueries").finish_non_exhaustive()
    }
}
