//! The immutable access relation (UPA and its inverse PUA).
//!
//! An [`AccessRelation`] is the ground truth a mining run works against.
//! It is loaded once, from a pairwise file, a role-block file, or a
//! ready-made mapping, and is read-only afterwards. Engines take snapshots
//! of it (see [`crate::Residual`]) and never mutate it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rolemine_types::{PermissionId, PermissionSet, RoleSet, UserId, UserSet};
use tracing::debug;

use crate::error::RelationError;
use crate::parse;

/// Source of a dataset: a file path or a direct user→permission mapping.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    /// A pairwise or role-block file on disk.
    Path(PathBuf),
    /// A ready-made UPA mapping, bypassing file parsing.
    Upa(BTreeMap<UserId, PermissionSet>),
}

impl From<PathBuf> for DatasetSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for DatasetSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<BTreeMap<UserId, PermissionSet>> for DatasetSource {
    fn from(upa: BTreeMap<UserId, PermissionSet>) -> Self {
        Self::Upa(upa)
    }
}

/// The user-permission assignment relation and its inverse.
///
/// Invariant: `pua` is exactly the inverse of `upa`, maintained in
/// lock-step at construction; neither changes afterwards.
#[derive(Debug, Clone)]
pub struct AccessRelation {
    label: String,
    upa: BTreeMap<UserId, PermissionSet>,
    pua: BTreeMap<PermissionId, UserSet>,
    users: UserSet,
    permissions: PermissionSet,
    /// Total number of distinct grants (pairs) in the relation.
    grants: usize,
    /// Duplicate-user groups, present only after
    /// [`collapse_duplicate_users`](Self::collapse_duplicate_users):
    /// representative → every original user it stands for (itself included).
    duplicate_groups: Option<BTreeMap<UserId, Vec<UserId>>>,
}

impl AccessRelation {
    /// Loads a relation from any recognized source.
    ///
    /// Fails with a configuration error if a file matches neither input
    /// shape.
    pub fn load(source: DatasetSource) -> Result<Self, RelationError> {
        match source {
            DatasetSource::Path(path) => Self::from_path(&path),
            DatasetSource::Upa(upa) => Ok(Self::from_upa("direct upa initialization", upa)),
        }
    }

    /// Loads a relation from a dataset file, sniffing the format.
    pub fn from_path(path: &Path) -> Result<Self, RelationError> {
        let text = fs::read_to_string(path).map_err(|source| RelationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let upa = if parse::looks_like_role_blocks(&text) {
            parse::parse_role_blocks(path, &text)?.upa
        } else {
            parse::parse_pairwise(path, &text)?
        };

        Ok(Self::from_upa(path.display().to_string(), upa))
    }

    /// Builds a relation from a user→permission-set mapping.
    pub fn from_upa(label: impl Into<String>, upa: BTreeMap<UserId, PermissionSet>) -> Self {
        let mut pua: BTreeMap<PermissionId, UserSet> = BTreeMap::new();
        let mut grants = 0;
        for (&user, permissions) in &upa {
            grants += permissions.len();
            for &permission in permissions {
                pua.entry(permission).or_default().insert(user);
            }
        }

        let relation = Self {
            label: label.into(),
            users: upa.keys().copied().collect(),
            permissions: pua.keys().copied().collect(),
            upa,
            pua,
            grants,
            duplicate_groups: None,
        };

        debug!(
            dataset = %relation.label,
            users = relation.users.len(),
            permissions = relation.permissions.len(),
            grants = relation.grants,
            "loaded access relation"
        );
        relation
    }

    /// Merges users with identical permission sets into their smallest-id
    /// representative, shrinking the problem before mining.
    ///
    /// The grouping is retained so a mined assignment can later be expanded
    /// back to original users (see [`expand_assignment`](Self::expand_assignment)).
    /// Returns the number of users removed.
    pub fn collapse_duplicate_users(&mut self) -> usize {
        let mut groups: BTreeMap<PermissionSet, Vec<UserId>> = BTreeMap::new();
        for (&user, permissions) in &self.upa {
            groups.entry(permissions.clone()).or_default().push(user);
        }

        let before = self.users.len();
        let mut reduced: BTreeMap<UserId, PermissionSet> = BTreeMap::new();
        let mut retained: BTreeMap<UserId, Vec<UserId>> = BTreeMap::new();
        for (permissions, members) in groups {
            // members are in ascending id order; the first is the representative
            let representative = members[0];
            reduced.insert(representative, permissions);
            retained.insert(representative, members);
        }

        let rebuilt = Self::from_upa(self.label.clone(), reduced);
        *self = Self {
            duplicate_groups: Some(retained),
            ..rebuilt
        };

        let removed = before - self.users.len();
        debug!(
            dataset = %self.label,
            removed,
            remaining = self.users.len(),
            "collapsed duplicate users"
        );
        removed
    }

    /// Expands an assignment over representatives back to all original
    /// users. A no-op when the relation was never collapsed.
    pub fn expand_assignment(
        &self,
        ua: &BTreeMap<UserId, RoleSet>,
    ) -> BTreeMap<UserId, RoleSet> {
        let Some(groups) = &self.duplicate_groups else {
            return ua.clone();
        };

        let mut expanded = BTreeMap::new();
        for (user, roles) in ua {
            match groups.get(user) {
                Some(members) => {
                    for &member in members {
                        expanded.insert(member, roles.clone());
                    }
                }
                None => {
                    expanded.insert(*user, roles.clone());
                }
            }
        }
        expanded
    }

    /// The duplicate-user grouping, if the relation has been collapsed.
    pub fn duplicate_groups(&self) -> Option<&BTreeMap<UserId, Vec<UserId>>> {
        self.duplicate_groups.as_ref()
    }

    /// Human-readable dataset label (the file path, for file sources).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn upa(&self) -> &BTreeMap<UserId, PermissionSet> {
        &self.upa
    }

    pub fn pua(&self) -> &BTreeMap<PermissionId, UserSet> {
        &self.pua
    }

    /// A user's full permission row. `None` for unknown users.
    pub fn permissions_of(&self, user: UserId) -> Option<&PermissionSet> {
        self.upa.get(&user)
    }

    /// A permission's full user column. `None` for unknown permissions.
    pub fn users_of(&self, permission: PermissionId) -> Option<&UserSet> {
        self.pua.get(&permission)
    }

    pub fn users(&self) -> &UserSet {
        &self.users
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Total number of distinct grants in the relation.
    pub fn grant_count(&self) -> usize {
        self.grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn upa(rows: &[(u32, &[u32])]) -> BTreeMap<UserId, PermissionSet> {
        rows.iter()
            .map(|&(u, ps)| {
                (
                    UserId::new(u),
                    ps.iter().copied().map(PermissionId::new).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn pua_is_inverse_of_upa() {
        let relation =
            AccessRelation::from_upa("test", upa(&[(1, &[10, 20]), (2, &[20]), (3, &[10])]));

        assert_eq!(relation.grant_count(), 4);
        let holders_10: UserSet = [UserId::new(1), UserId::new(3)].into();
        let holders_20: UserSet = [UserId::new(1), UserId::new(2)].into();
        assert_eq!(relation.users_of(PermissionId::new(10)), Some(&holders_10));
        assert_eq!(relation.users_of(PermissionId::new(20)), Some(&holders_20));
    }

    #[test]
    fn load_pairwise_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "1 10\n1 20\n2 10\n").expect("write dataset");

        let relation = AccessRelation::from_path(file.path()).expect("valid dataset");
        assert_eq!(relation.user_count(), 2);
        assert_eq!(relation.grant_count(), 3);
    }

    #[test]
    fn load_role_block_file_builds_user_view() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "role:1\npermissions:10,20\nusers:1,2\nrole:2\npermissions:30\nusers:1\n"
        )
        .expect("write dataset");

        let relation = AccessRelation::from_path(file.path()).expect("valid dataset");
        assert_eq!(relation.user_count(), 2);
        assert_eq!(
            relation.permissions_of(UserId::new(1)).unwrap().len(),
            3
        );
    }

    #[test]
    fn load_rejects_unrecognized_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not a dataset\n").expect("write dataset");

        let err = AccessRelation::from_path(file.path()).unwrap_err();
        assert!(matches!(err, RelationError::MalformedPair { .. }));
    }

    #[test]
    fn collapse_merges_identical_rows() {
        let mut relation =
            AccessRelation::from_upa("test", upa(&[(1, &[10, 20]), (2, &[10, 20]), (3, &[10])]));

        let removed = relation.collapse_duplicate_users();
        assert_eq!(removed, 1);
        assert_eq!(relation.user_count(), 2);
        // smallest id is the representative
        assert!(relation.users().contains(&UserId::new(1)));
        assert!(!relation.users().contains(&UserId::new(2)));

        let groups = relation.duplicate_groups().expect("collapsed");
        assert_eq!(groups[&UserId::new(1)], vec![UserId::new(1), UserId::new(2)]);
    }

    #[test]
    fn expand_assignment_covers_group_members() {
        let mut relation =
            AccessRelation::from_upa("test", upa(&[(1, &[10]), (2, &[10])]));
        relation.collapse_duplicate_users();

        let mut ua = BTreeMap::new();
        ua.insert(UserId::new(1), RoleSet::from([rolemine_types::RoleId::new(1)]));

        let expanded = relation.expand_assignment(&ua);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[&UserId::new(1)], expanded[&UserId::new(2)]);
    }
}
