//! Core types for connection management.
//!
//! A connection between two accounts is stored as a single [`Edge`] whose
//! `user1`/`user2` order records who asked whom. Lookups never depend on
//! that order: they go through the [`PairKey`], the canonical unordered
//! form of the pair. The [`Relationship`] a viewer sees is derived from
//! the edge and the viewer's own [`CloseFriend`] marker, never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a stored edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// `user1` asked `user2`, who has not answered yet.
    Request,
    /// Both accounts are connected.
    Connected,
}

impl ConnectionType {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Connected => "connected",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "connected" => Some(Self::Connected),
            _ => None,
        }
    }
}

/// Canonical unordered key for a pair of accounts.
///
/// `PairKey::new("bob", "alice") == PairKey::new("alice", "bob")`. Used for
/// every edge lookup and as the lock key for mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: String,
    high: String,
}

impl PairKey {
    /// Builds the key for `{a, b}`.
    #[must_use]
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    /// The lexicographically smaller account.
    #[must_use]
    pub fn low(&self) -> &str {
        &self.low
    }

    /// The lexicographically larger account.
    #[must_use]
    pub fn high(&self) -> &str {
        &self.high
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}

/// A stored relationship between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Account that sent the original request.
    pub user1: String,
    /// Account that received the original request.
    pub user2: String,
    /// Pending or connected.
    pub connection_type: ConnectionType,
    /// When the request was sent (Unix timestamp).
    pub created_at: i64,
    /// When the edge last changed type (Unix timestamp).
    pub updated_at: i64,
}

impl Edge {
    /// Returns whether the edge is still a pending request.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.connection_type == ConnectionType::Request
    }

    /// Returns whether the edge is an established connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_type == ConnectionType::Connected
    }

    /// Returns the endpoint opposite `user`, if `user` is on this edge.
    #[must_use]
    pub fn other(&self, user: &str) -> Option<&str> {
        if self.user1 == user {
            Some(&self.user2)
        } else if self.user2 == user {
            Some(&self.user1)
        } else {
            None
        }
    }
}

/// One-directional close friend marker: `from` marked `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFriend {
    /// Account that created the marker.
    pub from: String,
    /// Account that was marked.
    pub to: String,
    /// When the marker was created (Unix timestamp).
    pub created_at: i64,
}

/// A pending request as seen by its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Account that sent the request.
    pub requester: String,
    /// When the request was sent (Unix timestamp).
    pub requested_at: i64,
}

/// Relationship between a viewer and a target, from the viewer's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// Viewer and target are the same account.
    #[serde(rename = "self")]
    Myself,
    /// No edge exists.
    None,
    /// The viewer sent a request that is still pending.
    Outgoing,
    /// The target sent the viewer a request that is still pending.
    Incoming,
    /// Connected, and the viewer has not marked the target close.
    Connected,
    /// Connected, and the viewer has marked the target close.
    Close,
}

impl Relationship {
    /// Derives the viewer's relationship from the pair's edge and the
    /// viewer's own close marker.
    ///
    /// `close_marked` only matters for a connected edge; a marker left
    /// behind on a pending or missing edge is ignored.
    #[must_use]
    pub fn derive(viewer: &str, other: &str, edge: Option<&Edge>, close_marked: bool) -> Self {
        if viewer == other {
            return Self::Myself;
        }
        let Some(edge) = edge else {
            return Self::None;
        };
        match edge.connection_type {
            ConnectionType::Connected if close_marked => Self::Close,
            ConnectionType::Connected => Self::Connected,
            ConnectionType::Request if edge.user1 == viewer => Self::Outgoing,
            ConnectionType::Request => Self::Incoming,
        }
    }

    /// Converts to the label used by the presentation layer.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Myself => "self",
            Self::None => "none",
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Connected => "connected",
            Self::Close => "close",
        }
    }

    /// Parses from the label representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "self" => Some(Self::Myself),
            "none" => Some(Self::None),
            "outgoing" => Some(Self::Outgoing),
            "incoming" => Some(Self::Incoming),
            "connected" => Some(Self::Connected),
            "close" => Some(Self::Close),
            _ => None,
        }
    }

    /// Returns whether an edge of type CONNECTED backs this view.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Close)
    }

    /// Actions the viewer can take from this state.
    #[must_use]
    pub const fn actions(&self) -> &'static [RelationshipAction] {
        match self {
            Self::Myself => &[],
            Self::None => &[RelationshipAction::Request],
            Self::Outgoing => &[RelationshipAction::Cancel],
            Self::Incoming => &[RelationshipAction::Accept, RelationshipAction::Decline],
            Self::Connected => &[RelationshipAction::Remove, RelationshipAction::MarkClose],
            Self::Close => &[RelationshipAction::Remove, RelationshipAction::RemoveClose],
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing action on a relationship, used to pick which buttons
/// to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipAction {
    /// Send a connection request.
    Request,
    /// Withdraw an outgoing request.
    Cancel,
    /// Accept an incoming request.
    Accept,
    /// Refuse an incoming request.
    Decline,
    /// Dissolve the connection.
    Remove,
    /// Mark the target as a close friend.
    MarkClose,
    /// Drop the close friend marker.
    RemoveClose,
}
