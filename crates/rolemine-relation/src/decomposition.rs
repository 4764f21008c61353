//! RBAC decompositions: the mined UA/PA pair.
//!
//! A [`Decomposition`] owns the user-assignment and permission-assignment
//! relations plus the monotone role-id counter. During mining, role ids are
//! resolved by signature before a new one is allocated, so mined PA never
//! holds two ids with the same permission set. Cardinality enforcement is
//! the one caller that clones a signature deliberately, via
//! [`allocate_clone`](Decomposition::allocate_clone).

use std::collections::BTreeMap;

use rolemine_types::{PermissionSet, RoleId, RoleSet, UserId, UserSet, Wsc};

/// A user-assignment / permission-assignment pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    ua: BTreeMap<UserId, RoleSet>,
    pa: BTreeMap<RoleId, PermissionSet>,
    /// Next id to mint. Monotone; never rewound, even after deletions.
    next_role: RoleId,
}

impl Decomposition {
    /// Creates an empty decomposition. Role ids start at 1.
    pub fn new() -> Self {
        Self {
            ua: BTreeMap::new(),
            pa: BTreeMap::new(),
            next_role: RoleId::new(1),
        }
    }

    /// Builds a decomposition from pre-existing relations (e.g. a parsed
    /// role-block file). The id counter resumes past the largest given id.
    pub fn from_parts(ua: BTreeMap<UserId, RoleSet>, pa: BTreeMap<RoleId, PermissionSet>) -> Self {
        let next_role = pa
            .keys()
            .next_back()
            .copied()
            .map_or(RoleId::new(1), |max| max + RoleId::new(1));
        Self { ua, pa, next_role }
    }

    /// Looks up a role by signature.
    pub fn find_role(&self, permissions: &PermissionSet) -> Option<RoleId> {
        self.pa
            .iter()
            .find(|(_, signature)| *signature == permissions)
            .map(|(&role, _)| role)
    }

    /// True if some role already carries this signature.
    pub fn contains_signature(&self, permissions: &PermissionSet) -> bool {
        self.find_role(permissions).is_some()
    }

    /// Resolves the role id for a signature, allocating a fresh id only
    /// when the lookup fails. Returns the id and whether it is new.
    pub fn resolve_or_allocate(&mut self, permissions: &PermissionSet) -> (RoleId, bool) {
        if let Some(role) = self.find_role(permissions) {
            return (role, false);
        }
        (self.mint(permissions.clone()), true)
    }

    /// Unconditionally mints a fresh id for `permissions`, even when the
    /// signature already exists. Used by cardinality enforcement to clone
    /// over-subscribed roles.
    pub fn allocate_clone(&mut self, permissions: PermissionSet) -> RoleId {
        self.mint(permissions)
    }

    fn mint(&mut self, permissions: PermissionSet) -> RoleId {
        let role = self.next_role;
        self.next_role = self.next_role + RoleId::new(1);
        self.pa.insert(role, permissions);
        role
    }

    /// Grants `role` to `user`.
    pub fn grant(&mut self, user: UserId, role: RoleId) {
        debug_assert!(self.pa.contains_key(&role), "grant of unknown role {role}");
        self.ua.entry(user).or_default().insert(role);
    }

    /// Removes `role` from `user`'s assignment, if held.
    pub fn revoke(&mut self, user: UserId, role: RoleId) -> bool {
        self.ua.get_mut(&user).is_some_and(|roles| roles.remove(&role))
    }

    /// Deletes a role from PA. The id is never reused.
    pub fn remove_role(&mut self, role: RoleId) {
        self.pa.remove(&role);
    }

    /// The users currently holding `role`.
    pub fn users_of(&self, role: RoleId) -> UserSet {
        self.ua
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(&user, _)| user)
            .collect()
    }

    /// Assigned-user count per role, for every role referenced in UA.
    pub fn assignment_counts(&self) -> BTreeMap<RoleId, usize> {
        let mut counts: BTreeMap<RoleId, usize> = BTreeMap::new();
        for roles in self.ua.values() {
            for &role in roles {
                *counts.entry(role).or_default() += 1;
            }
        }
        counts
    }

    /// The union of a user's role signatures.
    pub fn effective_permissions(&self, user: UserId) -> PermissionSet {
        let mut permissions = PermissionSet::new();
        if let Some(roles) = self.ua.get(&user) {
            for role in roles {
                if let Some(signature) = self.pa.get(role) {
                    permissions.extend(signature.iter().copied());
                }
            }
        }
        permissions
    }

    /// Weighted structural complexity of this decomposition.
    pub fn wsc(&self) -> Wsc {
        let ua_edges = self.ua.values().map(RoleSet::len).sum();
        let pa_edges = self.pa.values().map(PermissionSet::len).sum();
        Wsc::new(self.pa.len(), ua_edges, pa_edges)
    }

    /// Read-only view of PA.
    pub fn roles(&self) -> &BTreeMap<RoleId, PermissionSet> {
        &self.pa
    }

    /// Read-only view of UA.
    pub fn assignments(&self) -> &BTreeMap<UserId, RoleSet> {
        &self.ua
    }

    pub fn role_count(&self) -> usize {
        self.pa.len()
    }

    pub fn next_role_id(&self) -> RoleId {
        self.next_role
    }
}

impl Default for Decomposition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolemine_types::PermissionId;

    fn perms(ids: &[u32]) -> PermissionSet {
        ids.iter().copied().map(PermissionId::new).collect()
    }

    #[test]
    fn resolve_reuses_existing_signature() {
        let mut decomposition = Decomposition::new();
        let (first, minted) = decomposition.resolve_or_allocate(&perms(&[1, 2]));
        assert!(minted);
        assert_eq!(first, RoleId::new(1));

        let (again, minted) = decomposition.resolve_or_allocate(&perms(&[1, 2]));
        assert!(!minted);
        assert_eq!(again, first);
        assert_eq!(decomposition.role_count(), 1);
    }

    #[test]
    fn clone_allocation_duplicates_signature() {
        let mut decomposition = Decomposition::new();
        let (original, _) = decomposition.resolve_or_allocate(&perms(&[1, 2]));
        let clone = decomposition.allocate_clone(perms(&[1, 2]));

        assert_ne!(original, clone);
        assert_eq!(decomposition.roles()[&original], decomposition.roles()[&clone]);
    }

    #[test]
    fn ids_are_never_recycled() {
        let mut decomposition = Decomposition::new();
        let (role, _) = decomposition.resolve_or_allocate(&perms(&[1]));
        decomposition.remove_role(role);

        let (next, _) = decomposition.resolve_or_allocate(&perms(&[1]));
        assert!(next > role);
    }

    #[test]
    fn counter_resumes_past_loaded_ids() {
        let mut pa = BTreeMap::new();
        pa.insert(RoleId::new(7), perms(&[1]));
        let mut decomposition = Decomposition::from_parts(BTreeMap::new(), pa);

        let clone = decomposition.allocate_clone(perms(&[2]));
        assert_eq!(clone, RoleId::new(8));
    }

    #[test]
    fn wsc_counts_roles_and_edges() {
        let mut decomposition = Decomposition::new();
        let (r1, _) = decomposition.resolve_or_allocate(&perms(&[1, 2]));
        let (r2, _) = decomposition.resolve_or_allocate(&perms(&[3]));
        decomposition.grant(UserId::new(1), r1);
        decomposition.grant(UserId::new(1), r2);
        decomposition.grant(UserId::new(2), r1);

        let wsc = decomposition.wsc();
        assert_eq!(wsc.roles, 2);
        assert_eq!(wsc.ua_edges, 3);
        assert_eq!(wsc.pa_edges, 3);
        assert_eq!(wsc.total, 8);
    }

    #[test]
    fn effective_permissions_union_signatures() {
        let mut decomposition = Decomposition::new();
        let (r1, _) = decomposition.resolve_or_allocate(&perms(&[1, 2]));
        let (r2, _) = decomposition.resolve_or_allocate(&perms(&[2, 3]));
        decomposition.grant(UserId::new(1), r1);
        decomposition.grant(UserId::new(1), r2);

        assert_eq!(decomposition.effective_permissions(UserId::new(1)), perms(&[1, 2, 3]));
        assert!(decomposition.effective_permissions(UserId::new(9)).is_empty());
    }
}
