//! Integration tests for the connection module.
//!
//! These tests drive `ConnectionManager` and `ConnectionQueries` against a
//! real on-disk database:
//! - Request / accept / remove lifecycle
//! - Close friend asymmetry
//! - Pending request listing and badge count
//! - Persistence across reopening
//! - Close marker policies on disconnect

mod helpers;

use helpers::{connect, create_manager, create_manager_with_policy};
use student_network_core::connection::{
    ConnectionManager, ErrorKind, Relationship, RelationshipAction,
};
use student_network_core::{CloseMarkerPolicy, NetworkConfig};

// ============================================================================
// Full lifecycle
// ============================================================================

#[test]
fn alice_and_bob_full_lifecycle() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob"]);
    let queries = manager.queries();

    manager.request("alice", "bob").unwrap();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Outgoing
    );
    assert_eq!(
        queries.relationship_label("bob", "alice").unwrap(),
        Relationship::Incoming
    );
    assert_eq!(queries.count_pending_requests("bob").unwrap(), 1);

    manager.accept("bob", "alice").unwrap();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Connected
    );
    assert_eq!(
        queries.relationship_label("bob", "alice").unwrap(),
        Relationship::Connected
    );
    assert_eq!(queries.count_pending_requests("bob").unwrap(), 0);

    manager.mark_close("alice", "bob").unwrap();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Close
    );
    assert_eq!(
        queries.relationship_label("bob", "alice").unwrap(),
        Relationship::Connected
    );

    manager.remove_close("alice", "bob").unwrap();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Connected
    );

    manager.remove_connection("bob", "alice").unwrap();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::None
    );
    assert_eq!(
        queries.relationship_label("bob", "alice").unwrap(),
        Relationship::None
    );
}

#[test]
fn labels_drive_available_actions() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob"]);
    let queries = manager.queries();

    assert!(queries.available_actions("alice", "alice").unwrap().is_empty());
    assert_eq!(
        queries.available_actions("alice", "bob").unwrap(),
        &[RelationshipAction::Request]
    );

    manager.request("alice", "bob").unwrap();
    assert_eq!(
        queries.available_actions("alice", "bob").unwrap(),
        &[RelationshipAction::Cancel]
    );
    assert!(queries
        .available_actions("bob", "alice")
        .unwrap()
        .contains(&RelationshipAction::Accept));

    manager.accept("bob", "alice").unwrap();
    assert!(queries
        .available_actions("alice", "bob")
        .unwrap()
        .contains(&RelationshipAction::MarkClose));
}

// ============================================================================
// Errors surfaced to the presentation layer
// ============================================================================

#[test]
fn request_to_unregistered_account_fails() {
    let (manager, _temp_dir) = create_manager(&["alice"]);
    let err = manager.request("alice", "bob").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownUser);
    assert!(err.is_recoverable());

    manager.directory().register("bob").unwrap();
    manager.request("alice", "bob").unwrap();
}

#[test]
fn every_self_operation_is_rejected() {
    let (manager, _temp_dir) = create_manager(&["alice"]);

    assert_eq!(
        manager.request("alice", "alice").unwrap_err().kind(),
        ErrorKind::SelfRelation
    );
    assert_eq!(
        manager.remove_connection("alice", "alice").unwrap_err().kind(),
        ErrorKind::SelfRelation
    );
    assert_eq!(
        manager.accept("alice", "alice").unwrap_err().kind(),
        ErrorKind::NoPendingRequest
    );
    assert_eq!(
        manager.mark_close("alice", "alice").unwrap_err().kind(),
        ErrorKind::NotConnected
    );
    assert_eq!(
        manager.remove_close("alice", "alice").unwrap_err().kind(),
        ErrorKind::NotConnected
    );
    assert_eq!(
        manager.compute_relationship("alice", "alice").unwrap(),
        Relationship::Myself
    );
}

#[test]
fn connection_can_only_be_requested_once() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob"]);
    manager.request("alice", "bob").unwrap();

    for (from, to) in [("alice", "bob"), ("bob", "alice")] {
        assert_eq!(
            manager.request(from, to).unwrap_err().kind(),
            ErrorKind::DuplicateRequest
        );
    }

    manager.accept("bob", "alice").unwrap();
    for (from, to) in [("alice", "bob"), ("bob", "alice")] {
        assert_eq!(
            manager.request(from, to).unwrap_err().kind(),
            ErrorKind::DuplicateRequest
        );
    }
}

#[test]
fn repeated_removals_are_safe() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob"]);
    connect(&manager, "alice", "bob");
    manager.mark_close("bob", "alice").unwrap();

    assert!(manager.remove_close("bob", "alice").unwrap());
    assert!(!manager.remove_close("bob", "alice").unwrap());

    assert!(manager.remove_connection("alice", "bob").unwrap());
    assert!(!manager.remove_connection("alice", "bob").unwrap());
    assert!(!manager.remove_connection("bob", "alice").unwrap());
}

// ============================================================================
// Pending requests
// ============================================================================

#[test]
fn pending_requests_listed_in_request_order() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob", "carol", "dave"]);
    let queries = manager.queries();

    manager.request("dave", "bob").unwrap();
    manager.request("alice", "bob").unwrap();
    manager.request("carol", "bob").unwrap();
    assert!(manager.request("bob", "alice").is_err());

    assert_eq!(
        queries.list_pending_requesters("bob").unwrap(),
        ["dave", "alice", "carol"]
    );
    assert_eq!(queries.count_pending_requests("bob").unwrap(), 3);

    manager.accept("bob", "alice").unwrap();
    manager.remove_connection("bob", "dave").unwrap();

    assert_eq!(queries.list_pending_requesters("bob").unwrap(), ["carol"]);
    assert_eq!(queries.count_pending_requests("bob").unwrap(), 1);
    assert_eq!(queries.list_connections("bob").unwrap(), ["alice"]);
    assert_eq!(queries.list_outgoing_requests("carol").unwrap(), ["bob"]);

    let detailed = queries.list_pending_requests("bob").unwrap();
    assert_eq!(detailed.len(), 1);
    assert_eq!(detailed[0].requester, "carol");
}

// ============================================================================
// Close friends
// ============================================================================

#[test]
fn close_friend_lists_are_per_viewer() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob", "carol"]);
    let queries = manager.queries();
    connect(&manager, "alice", "bob");
    connect(&manager, "carol", "alice");

    manager.mark_close("alice", "carol").unwrap();
    manager.mark_close("alice", "bob").unwrap();
    manager.mark_close("bob", "alice").unwrap();

    assert_eq!(
        queries.list_close_friends("alice").unwrap(),
        ["carol", "bob"]
    );
    assert_eq!(queries.list_close_friends("bob").unwrap(), ["alice"]);
    assert!(queries.list_close_friends("carol").unwrap().is_empty());
}

#[test]
fn cascade_policy_clears_markers_on_disconnect() {
    let (manager, _temp_dir) = create_manager(&["alice", "bob"]);
    connect(&manager, "alice", "bob");
    manager.mark_close("alice", "bob").unwrap();
    manager.mark_close("bob", "alice").unwrap();

    manager.remove_connection("alice", "bob").unwrap();
    connect(&manager, "alice", "bob");

    let queries = manager.queries();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Connected
    );
    assert!(queries.list_close_friends("alice").unwrap().is_empty());
    assert!(queries.list_close_friends("bob").unwrap().is_empty());
}

#[test]
fn retain_policy_restores_markers_on_reconnect() {
    let (manager, _temp_dir) =
        create_manager_with_policy(&["alice", "bob"], CloseMarkerPolicy::Retain);
    connect(&manager, "alice", "bob");
    manager.mark_close("alice", "bob").unwrap();

    manager.remove_connection("bob", "alice").unwrap();
    let queries = manager.queries();
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::None
    );
    assert!(queries.list_close_friends("alice").unwrap().is_empty());

    connect(&manager, "bob", "alice");
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Close
    );
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn state_survives_reopening() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = NetworkConfig::new(temp_dir.path()).with_database_name("network.db");

    {
        let manager = ConnectionManager::new(&config).unwrap();
        manager.directory().register("alice").unwrap();
        manager.directory().register("bob").unwrap();
        manager.directory().register("carol").unwrap();
        connect(&manager, "alice", "bob");
        manager.mark_close("bob", "alice").unwrap();
        manager.request("carol", "alice").unwrap();
    }

    assert!(temp_dir.path().join("network.db").exists());

    let manager = ConnectionManager::new(&config).unwrap();
    let queries = manager.queries();
    assert_eq!(
        queries.relationship_label("bob", "alice").unwrap(),
        Relationship::Close
    );
    assert_eq!(
        queries.relationship_label("alice", "bob").unwrap(),
        Relationship::Connected
    );
    assert_eq!(queries.list_pending_requesters("alice").unwrap(), ["carol"]);
    assert_eq!(
        manager.request("alice", "carol").unwrap_err().kind(),
        ErrorKind::DuplicateRequest
    );
}

#[test]
fn config_loaded_from_json() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let json = format!(
        r#"{{"data_dir": {:?}, "close_marker_policy": "retain", "lock_stripes": 4}}"#,
        temp_dir.path().to_str().unwrap()
    );
    let config = NetworkConfig::from_json(&json).unwrap();
    let manager = ConnectionManager::new(&config).unwrap();

    assert_eq!(manager.close_marker_policy(), CloseMarkerPolicy::Retain);
    assert!(temp_dir.path().join("connections.db").exists());
}
