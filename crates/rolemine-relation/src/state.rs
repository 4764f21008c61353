//! Starting RBAC states loaded from role-block files.
//!
//! A [`RbacState`] packages an existing decomposition (typically produced
//! by some other miner and serialized as role blocks) together with the
//! per-user permission view accumulated while parsing it. It is the input
//! of the post-processing optimizer.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rolemine_types::{PermissionSet, UserId};

use crate::decomposition::Decomposition;
use crate::error::RelationError;
use crate::parse;

/// An existing decomposition plus the user→permission view it implies.
#[derive(Debug, Clone)]
pub struct RbacState {
    upa: BTreeMap<UserId, PermissionSet>,
    decomposition: Decomposition,
}

impl RbacState {
    /// Loads a starting state from a role-block file.
    pub fn from_path(path: &Path) -> Result<Self, RelationError> {
        let text = fs::read_to_string(path).map_err(|source| RelationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if !parse::looks_like_role_blocks(&text) {
            return Err(RelationError::UnrecognizedDataset {
                path: path.to_path_buf(),
            });
        }

        let blocks = parse::parse_role_blocks(path, &text)?;
        Ok(Self {
            upa: blocks.upa,
            decomposition: Decomposition::from_parts(blocks.ua, blocks.pa),
        })
    }

    /// Builds a state from in-memory parts (mainly for tests and for
    /// optimizing decompositions produced by the engines themselves).
    pub fn from_decomposition(decomposition: Decomposition) -> Self {
        let upa = decomposition
            .assignments()
            .keys()
            .map(|&user| (user, decomposition.effective_permissions(user)))
            .collect();
        Self { upa, decomposition }
    }

    /// Checks that the decomposition actually produces the accumulated
    /// per-user view. Diagnostic; true for every state built by this crate.
    pub fn is_sound(&self) -> bool {
        self.upa
            .iter()
            .all(|(&user, permissions)| {
                self.decomposition.effective_permissions(user) == *permissions
            })
    }

    pub fn upa(&self) -> &BTreeMap<UserId, PermissionSet> {
        &self.upa
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn into_parts(self) -> (BTreeMap<UserId, PermissionSet>, Decomposition) {
        (self.upa, self.decomposition)
    }
}
