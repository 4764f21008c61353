//! Residual (uncovered) views of the access relation.
//!
//! A [`Residual`] is a snapshot of UPA/PUA taken once at engine
//! construction and exclusively mutated by the owning engine. It shrinks
//! monotonically as roles are assigned and empties exactly when a
//! non-strict covering run terminates.

use std::collections::BTreeMap;

use rolemine_types::{PermissionId, PermissionSet, UserId, UserSet};

use crate::relation::AccessRelation;

/// The part of the relation not yet explained by any assigned role.
///
/// Rows and columns are dropped as soon as they empty, so `unc_users` and
/// `unc_upa` always have the same key set (likewise on the permission
/// side).
#[derive(Debug, Clone)]
pub struct Residual {
    unc_upa: BTreeMap<UserId, PermissionSet>,
    unc_pua: BTreeMap<PermissionId, UserSet>,
    unc_users: UserSet,
    unc_permissions: PermissionSet,
}

impl Residual {
    /// Takes a snapshot of the full relation.
    pub fn snapshot(relation: &AccessRelation) -> Self {
        Self {
            unc_upa: relation.upa().clone(),
            unc_pua: relation.pua().clone(),
            unc_users: relation.users().clone(),
            unc_permissions: relation.permissions().clone(),
        }
    }

    /// Records that `permissions` are now covered for each user in `users`:
    /// subtracts them from the users' residual rows and the users from the
    /// permissions' residual columns, dropping rows/columns that empty.
    pub fn advance(&mut self, users: &UserSet, permissions: &PermissionSet) {
        for user in users {
            let Some(row) = self.unc_upa.get_mut(user) else {
                continue;
            };
            row.retain(|p| !permissions.contains(p));
            if row.is_empty() {
                self.unc_upa.remove(user);
                self.unc_users.remove(user);
            }
        }

        for permission in permissions {
            let Some(column) = self.unc_pua.get_mut(permission) else {
                continue;
            };
            column.retain(|u| !users.contains(u));
            if column.is_empty() {
                self.unc_pua.remove(permission);
                self.unc_permissions.remove(permission);
            }
        }
    }

    /// True once every grant has been explained.
    pub fn is_exhausted(&self) -> bool {
        self.unc_users.is_empty()
    }

    pub fn users(&self) -> &UserSet {
        &self.unc_users
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.unc_permissions
    }

    /// A user's residual permission row, if any permissions remain
    /// uncovered for them.
    pub fn row(&self, user: UserId) -> Option<&PermissionSet> {
        self.unc_upa.get(&user)
    }

    /// A permission's residual user column.
    pub fn column(&self, permission: PermissionId) -> Option<&UserSet> {
        self.unc_pua.get(&permission)
    }

    pub fn rows(&self) -> &BTreeMap<UserId, PermissionSet> {
        &self.unc_upa
    }

    pub fn columns(&self) -> &BTreeMap<PermissionId, UserSet> {
        &self.unc_pua
    }

    /// Number of uncovered grants remaining.
    pub fn grant_count(&self) -> usize {
        self.unc_upa.values().map(PermissionSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn relation() -> AccessRelation {
        let mut upa: BTreeMap<UserId, PermissionSet> = BTreeMap::new();
        upa.insert(UserId::new(1), [10, 20].map(PermissionId::new).into());
        upa.insert(UserId::new(2), [10].map(PermissionId::new).into());
        AccessRelation::from_upa("test", upa)
    }

    #[test]
    fn advance_drops_emptied_rows_and_columns() {
        let mut residual = Residual::snapshot(&relation());
        assert_eq!(residual.grant_count(), 3);

        let users: UserSet = [UserId::new(1), UserId::new(2)].into();
        let permissions: PermissionSet = [PermissionId::new(10)].into();
        residual.advance(&users, &permissions);

        // user 2 is fully covered, user 1 still owes permission 20
        assert!(!residual.users().contains(&UserId::new(2)));
        assert!(residual.users().contains(&UserId::new(1)));
        assert!(residual.column(PermissionId::new(10)).is_none());
        assert_eq!(residual.grant_count(), 1);
    }

    #[test]
    fn exhaustion_matches_empty_user_set() {
        let mut residual = Residual::snapshot(&relation());
        assert!(!residual.is_exhausted());

        let users: UserSet = [UserId::new(1), UserId::new(2)].into();
        let permissions: PermissionSet = [10, 20].map(PermissionId::new).into();
        residual.advance(&users, &permissions);

        assert!(residual.is_exhausted());
        assert_eq!(residual.grant_count(), 0);
        assert!(residual.permissions().is_empty());
    }
}
