//! Post-processing optimizer for existing decompositions.
//!
//! Works on a decomposition produced elsewhere (a role-block file or one
//! of the engines): prunes roles made redundant by larger roles the same
//! user already holds, deletes roles no user references, then retrofits
//! the MUR cap by cloning over-subscribed roles. Pruning runs before
//! enforcement so clones are only minted for roles still in use.
//!
//! Removing a role that was never marked redundant is an
//! internal-consistency violation and panics; it is a defect, not a
//! recoverable condition.

use std::collections::BTreeMap;

use rolemine_relation::{Decomposition, RbacState};
use rolemine_types::{PermissionSet, RoleId, RoleSet, UserId, Wsc};
use tracing::debug;

use crate::report::CoverageReport;

/// Cardinality retrofitter and role pruner.
#[derive(Debug)]
pub struct PostOptimizer {
    /// Per-user permission view implied by the original decomposition.
    upa: BTreeMap<UserId, PermissionSet>,
    /// The input decomposition, untouched, for verification.
    original: Decomposition,
    /// The working decomposition being optimized.
    decomposition: Decomposition,
    /// Redundancy marks from the last `redundant_roles` pass.
    redundant: Option<BTreeMap<UserId, RoleSet>>,
    mur: usize,
}

impl PostOptimizer {
    /// Wraps a starting state. `mur == 0` means "no cap".
    pub fn new(state: RbacState, mur: usize) -> Self {
        let (upa, original) = state.into_parts();
        let mur = if mur == 0 { upa.len() } else { mur };
        Self {
            upa,
            decomposition: original.clone(),
            original,
            redundant: None,
            mur,
        }
    }

    /// Marks, per user, every role whose signature is contained in another
    /// role the same user holds. Returns the marks.
    pub fn redundant_roles(&mut self) -> &BTreeMap<UserId, RoleSet> {
        let mut marks: BTreeMap<UserId, RoleSet> = BTreeMap::new();

        for (&user, roles) in self.decomposition.assignments() {
            // smallest signatures first, so the subsumed role is always
            // the earlier of a pair
            let mut held: Vec<(RoleId, &PermissionSet)> = roles
                .iter()
                .filter_map(|&role| self.decomposition.roles().get(&role).map(|s| (role, s)))
                .collect();
            held.sort_by_key(|&(role, signature)| (signature.len(), role));

            for (i, &(smaller, smaller_sig)) in held.iter().enumerate() {
                for &(_, larger_sig) in &held[i + 1..] {
                    if smaller_sig.is_subset(larger_sig) {
                        marks.entry(user).or_default().insert(smaller);
                    }
                }
            }
        }

        self.redundant = Some(marks);
        self.redundant.as_ref().expect("just set")
    }

    /// Strips exactly the roles marked by the last `redundant_roles` pass.
    ///
    /// # Panics
    ///
    /// Panics if a marked role is not actually held by the user, which
    /// would mean the marks and the assignment went out of sync.
    pub fn remove_redundant(&mut self) {
        let marks = self.redundant.take().unwrap_or_default();
        for (user, roles) in marks {
            for role in roles {
                let held = self.decomposition.revoke(user, role);
                assert!(
                    held,
                    "role {role} marked redundant for user {user} but not assigned"
                );
            }
        }
    }

    /// Role ids referenced by no user.
    pub fn unused_roles(&self) -> RoleSet {
        let mut referenced = RoleSet::new();
        for roles in self.decomposition.assignments().values() {
            referenced.extend(roles.iter().copied());
        }
        self.decomposition
            .roles()
            .keys()
            .copied()
            .filter(|role| !referenced.contains(role))
            .collect()
    }

    /// Deletes every unused role from PA. Idempotent: a second call
    /// removes nothing. Returns the number of roles deleted.
    pub fn remove_unused(&mut self) -> usize {
        let unused = self.unused_roles();
        for &role in &unused {
            self.decomposition.remove_role(role);
        }
        unused.len()
    }

    /// Redundancy pruning followed by unused-role deletion.
    pub fn prune(&mut self) {
        self.redundant_roles();
        self.remove_redundant();
        let deleted = self.remove_unused();
        debug!(deleted, "pruned decomposition");
    }

    /// Retrofits the MUR cap: every role keeps its first MUR users
    /// (ascending id); each excess user moves to a clone carrying the same
    /// signature, with a fresh clone minted per MUR excess users.
    pub fn enforce_cardinality(&mut self) {
        let counts = self.decomposition.assignment_counts();
        for (role, count) in counts {
            if count <= self.mur {
                continue;
            }

            let members = self.decomposition.users_of(role);
            let signature = self.decomposition.roles()[&role].clone();
            let mut clone: Option<RoleId> = None;

            for (index, &user) in members.iter().skip(self.mur).enumerate() {
                if index % self.mur == 0 {
                    clone = Some(self.decomposition.allocate_clone(signature.clone()));
                }
                let target = clone.expect("clone minted on the first excess user");
                self.decomposition.revoke(user, role);
                self.decomposition.grant(user, target);
            }

            debug!(role = %role, excess = count - self.mur, "cloned over-subscribed role");
        }
    }

    /// Full pass: optional pruning, then cardinality enforcement.
    /// Pruning first means clones are only minted for roles still in use.
    pub fn optimize(&mut self, prune: bool) {
        if prune {
            self.prune();
        }
        self.enforce_cardinality();
    }

    /// Verifies that the optimized decomposition grants every user exactly
    /// what the original decomposition granted. The optimizer preserves
    /// the input's semantics rather than re-deriving ground truth.
    pub fn check_solution(&self) -> CoverageReport {
        let mut report = CoverageReport::new();
        for &user in self.original.assignments().keys() {
            let expected = self.original.effective_permissions(user);
            let actual = self.decomposition.effective_permissions(user);
            let missing = expected.difference(&actual).copied().collect();
            let unexpected = actual.difference(&expected).copied().collect();
            report.record(user, missing, unexpected);
        }
        report
    }

    pub fn wsc(&self) -> Wsc {
        self.decomposition.wsc()
    }

    /// The per-user permission view of the input state.
    pub fn upa(&self) -> &BTreeMap<UserId, PermissionSet> {
        &self.upa
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn into_decomposition(self) -> Decomposition {
        self.decomposition
    }
}
