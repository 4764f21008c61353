//! Dataset file parsing.
//!
//! Two on-disk formats are recognized:
//! - pairwise: one `user permission` integer pair per line;
//! - role-block: repeating `role:` / `permissions:` / `users:` blocks
//!   describing an existing decomposition.
//!
//! Parsing is strict: a malformed line is a configuration error, not a
//! recoverable condition.

use std::collections::BTreeMap;
use std::path::Path;

use rolemine_types::{PermissionId, PermissionSet, RoleId, RoleSet, UserId};

use crate::error::RelationError;

/// A parsed role-block file: the decomposition it describes plus the
/// per-user permission view accumulated from role memberships.
#[derive(Debug, Clone)]
pub(crate) struct RoleBlocks {
    pub ua: BTreeMap<UserId, RoleSet>,
    pub pa: BTreeMap<RoleId, PermissionSet>,
    pub upa: BTreeMap<UserId, PermissionSet>,
}

/// Returns true if the file content looks like the role-block format.
pub(crate) fn looks_like_role_blocks(text: &str) -> bool {
    text.lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("role"))
}

/// Parses the pairwise `user permission` format. Duplicate pairs are
/// idempotent.
pub(crate) fn parse_pairwise(
    path: &Path,
    text: &str,
) -> Result<BTreeMap<UserId, PermissionSet>, RelationError> {
    let mut upa: BTreeMap<UserId, PermissionSet> = BTreeMap::new();
    let mut seen_any = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let malformed = || RelationError::MalformedPair {
            path: path.to_path_buf(),
            line: idx + 1,
            content: raw.to_string(),
        };

        let mut fields = line.split_whitespace();
        let user = fields
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        let permission = fields
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        if fields.next().is_some() {
            return Err(malformed());
        }

        upa.entry(UserId::new(user))
            .or_default()
            .insert(PermissionId::new(permission));
        seen_any = true;
    }

    if !seen_any {
        return Err(RelationError::UnrecognizedDataset {
            path: path.to_path_buf(),
        });
    }

    Ok(upa)
}

/// Parses the role-block format.
///
/// Every listed user is granted the preceding role; direct permission
/// totals accumulate into the auxiliary per-user view used later for
/// verification.
pub(crate) fn parse_role_blocks(path: &Path, text: &str) -> Result<RoleBlocks, RelationError> {
    let mut blocks = RoleBlocks {
        ua: BTreeMap::new(),
        pa: BTreeMap::new(),
        upa: BTreeMap::new(),
    };

    let mut current_role: Option<RoleId> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let block_error = |reason: String| RelationError::MalformedBlock {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };

        let Some((key, value)) = line.split_once(':') else {
            return Err(block_error(format!("expected \"key: value\", got {raw:?}")));
        };

        match key.trim() {
            "role" => {
                let id = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| block_error(format!("bad role id: {e}")))?;
                current_role = Some(RoleId::new(id));
            }
            "permissions" => {
                let role =
                    current_role.ok_or_else(|| block_error("permissions before role".into()))?;
                let permissions = parse_csv(value)
                    .map_err(|e| block_error(format!("bad permission list: {e}")))?
                    .into_iter()
                    .map(PermissionId::new)
                    .collect::<PermissionSet>();
                blocks.pa.insert(role, permissions);
            }
            "users" => {
                let role = current_role.ok_or_else(|| block_error("users before role".into()))?;
                let permissions = blocks
                    .pa
                    .get(&role)
                    .cloned()
                    .ok_or_else(|| block_error("users before permissions".into()))?;
                let users = parse_csv(value)
                    .map_err(|e| block_error(format!("bad user list: {e}")))?;

                for user in users.into_iter().map(UserId::new) {
                    blocks.ua.entry(user).or_default().insert(role);
                    blocks
                        .upa
                        .entry(user)
                        .or_default()
                        .extend(permissions.iter().copied());
                }
            }
            other => {
                return Err(block_error(format!("unknown key {other:?}")));
            }
        }
    }

    if blocks.pa.is_empty() || blocks.ua.is_empty() {
        return Err(RelationError::UnrecognizedDataset {
            path: path.to_path_buf(),
        });
    }

    Ok(blocks)
}

fn parse_csv(value: &str) -> Result<Vec<u32>, std::num::ParseIntError> {
    value
        .split(',')
        .map(|field| field.trim().parse::<u32>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("test.txt")
    }

    #[test]
    fn pairwise_accepts_duplicates() {
        let upa = parse_pairwise(&path(), "1 10\n1 10\n2 20\n").expect("valid pairwise file");
        assert_eq!(upa.len(), 2);
        assert_eq!(upa[&UserId::new(1)].len(), 1);
    }

    #[test]
    fn pairwise_rejects_garbage() {
        let err = parse_pairwise(&path(), "1 ten\n").unwrap_err();
        assert!(matches!(err, RelationError::MalformedPair { line: 1, .. }));

        let err = parse_pairwise(&path(), "1 2 3\n").unwrap_err();
        assert!(matches!(err, RelationError::MalformedPair { .. }));
    }

    #[test]
    fn pairwise_rejects_empty_file() {
        let err = parse_pairwise(&path(), "\n\n").unwrap_err();
        assert!(matches!(err, RelationError::UnrecognizedDataset { .. }));
    }

    #[test]
    fn role_blocks_accumulate_user_view() {
        let text = "role:1\npermissions:10,20\nusers:1,2\nrole:2\npermissions:20,30\nusers:2\n";
        let blocks = parse_role_blocks(&path(), text).expect("valid role blocks");

        assert_eq!(blocks.pa.len(), 2);
        assert_eq!(blocks.ua[&UserId::new(2)].len(), 2);
        // user 2 holds both roles, so its view is the union of both
        let view = &blocks.upa[&UserId::new(2)];
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn role_blocks_reject_orphan_users() {
        let err = parse_role_blocks(&path(), "users:1,2\n").unwrap_err();
        assert!(matches!(err, RelationError::MalformedBlock { .. }));
    }

    #[test]
    fn format_sniffing() {
        assert!(looks_like_role_blocks("role:1\npermissions:1\nusers:2\n"));
        assert!(!looks_like_role_blocks("1 10\n2 20\n"));
    }
}
