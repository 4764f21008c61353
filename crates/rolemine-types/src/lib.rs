//! # rolemine-types: Core types for rolemine
//!
//! Shared types used across the role-mining workspace:
//! - Entity IDs ([`UserId`], [`PermissionId`], [`RoleId`])
//! - Set aliases ([`PermissionSet`], [`UserSet`], [`RoleSet`])
//! - The structural-complexity metric ([`Wsc`])
//!
//! Identifiers are opaque integers: the miner never interprets them beyond
//! equality and ordering. Ordered containers are used everywhere so that
//! "first k" and "minimal element" choices are deterministic across runs.

use std::{collections::BTreeSet, fmt::Display, ops::Add};

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs - All Copy (cheap 4-byte values)
// ============================================================================

/// Unique identifier for a user in the access relation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct UserId(u32);

impl UserId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UserId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<UserId> for u32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Unique identifier for a permission in the access relation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PermissionId(u32);

impl PermissionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PermissionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<PermissionId> for u32 {
    fn from(id: PermissionId) -> Self {
        id.0
    }
}

/// Unique identifier for a mined role.
///
/// Role ids are allocated from a monotonically increasing counter and are
/// never reused or recycled, even after a role has been deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RoleId(u32);

impl RoleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Add for RoleId {
    type Output = RoleId;

    fn add(self, rhs: Self) -> Self::Output {
        RoleId::new(self.0 + rhs.0)
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RoleId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<RoleId> for u32 {
    fn from(id: RoleId) -> Self {
        id.0
    }
}

// ============================================================================
// Set aliases
// ============================================================================

/// Ordered set of permissions (a role signature, or a user's grants).
pub type PermissionSet = BTreeSet<PermissionId>;

/// Ordered set of users.
pub type UserSet = BTreeSet<UserId>;

/// Ordered set of role ids.
pub type RoleSet = BTreeSet<RoleId>;

// ============================================================================
// Weighted Structural Complexity
// ============================================================================

/// Weighted Structural Complexity of an RBAC decomposition.
///
/// `total = roles + ua_edges + pa_edges`: the standard objective every
/// mining heuristic minimizes. Number of roles, plus user-assignment edges,
/// plus permission-assignment edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wsc {
    pub total: usize,
    pub roles: usize,
    pub ua_edges: usize,
    pub pa_edges: usize,
}

impl Wsc {
    /// Builds a metric record from its three components.
    pub fn new(roles: usize, ua_edges: usize, pa_edges: usize) -> Self {
        Self {
            total: roles + ua_edges + pa_edges,
            roles,
            ua_edges,
            pa_edges,
        }
    }
}

impl Display for Wsc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wsc={} roles={} |ua|={} |pa|={}",
            self.total, self.roles, self.ua_edges, self.pa_edges
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_ordered_by_value() {
        assert!(UserId::new(1) < UserId::new(2));
        assert!(PermissionId::new(9) < PermissionId::new(10));
        assert!(RoleId::new(3) < RoleId::new(30));
    }

    #[test]
    fn role_id_addition() {
        assert_eq!(RoleId::new(4) + RoleId::new(1), RoleId::new(5));
    }

    #[test]
    fn wsc_total_is_sum_of_components() {
        let wsc = Wsc::new(3, 10, 7);
        assert_eq!(wsc.total, 20);
        assert_eq!(wsc.to_string(), "wsc=20 roles=3 |ua|=10 |pa|=7");
    }
}
