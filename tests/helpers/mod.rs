//! Shared setup for connection integration tests.
//!
//! Managers are backed by a real on-disk database in a temporary
//! directory, with the named accounts registered up front.

#![allow(dead_code)] // Not every test binary uses every helper.

use std::collections::HashSet;

use student_network_core::connection::ConnectionManager;
use student_network_core::{CloseMarkerPolicy, NetworkConfig};
use tempfile::TempDir;

/// Creates an on-disk manager with `users` registered.
///
/// Keep the returned `TempDir` alive for as long as the manager is used.
pub fn create_manager(users: &[&str]) -> (ConnectionManager, TempDir) {
    create_manager_with_policy(users, CloseMarkerPolicy::Cascade)
}

/// Same as [`create_manager`] with an explicit close marker policy.
pub fn create_manager_with_policy(
    users: &[&str],
    policy: CloseMarkerPolicy,
) -> (ConnectionManager, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = NetworkConfig::new(temp_dir.path()).with_close_marker_policy(policy);
    let manager = ConnectionManager::new(&config).expect("should create manager");
    for user in users {
        manager
            .directory()
            .register(user)
            .expect("should register account");
    }
    (manager, temp_dir)
}

/// Creates an in-memory manager over a fixed set of accounts.
pub fn create_memory_manager(users: &[&str]) -> ConnectionManager<HashSet<String>> {
    let directory = users.iter().map(|u| (*u).to_string()).collect();
    ConnectionManager::in_memory(directory, &NetworkConfig::default())
        .expect("should create in-memory manager")
}

/// Requests and accepts so that `a` and `b` end up connected.
pub fn connect<D>(manager: &ConnectionManager<D>, a: &str, b: &str)
where
    D: student_network_core::AccountDirectory,
{
    manager.request(a, b).expect("request should succeed");
    manager.accept(b, a).expect("accept should succeed");
}
