//! Test assertions for compiled topologies.

use crate::core::{GrantMode, GrantResource, Topology};

/// Asserts that `principal` holds exactly `mode` on `resource`.
pub fn assert_grant(
    topology: &Topology,
    principal: &str,
    resource: &GrantResource,
    mode: GrantMode,
) {
    let grant = topology.grant(principal, resource);
    assert!(
        grant.is_some(),
        "Expected '{}' to hold a grant on {:?}, but it holds none",
        principal,
        resource
    );
    assert_eq!(
        grant.map(|g| g.mode),
        Some(mode),
        "Expected '{principal}' to hold {mode} on {resource:?}"
    );
}

/// Asserts that `principal` holds no grant on `resource`.
pub fn assert_no_grant(topology: &Topology, principal: &str, resource: &GrantResource) {
    assert!(
        topology.grant(principal, resource).is_none(),
        "Expected '{principal}' to hold no grant on {resource:?}"
    );
}

/// Asserts the number of storage grants.
pub fn assert_storage_grant_count(topology: &Topology, expected: usize) {
    let actual = topology.storage_grants().count();
    assert_eq!(
        actual, expected,
        "Expected {expected} storage grants, got {actual}"
    );
}

/// Asserts the number of invocation grants.
pub fn assert_invocation_grant_count(topology: &Topology, expected: usize) {
    let actual = topology.invocation_grants().count();
    assert_eq!(
        actual, expected,
        "Expected {expected} invocation grants, got {actual}"
    );
}
