//! Greedy covering engine (unconstrained variant family).
//!
//! One shared loop builds a decomposition from scratch: pick a seed with
//! the smallest residual footprint, turn it into a role, assign it to every
//! qualifying user (at most MUR of them), and advance the residual state.
//! The variants differ only in how the seed and the qualifying users are
//! chosen, so they are a [`SeedPolicy`] value rather than a type hierarchy.
//!
//! Every policy strictly shrinks the residual grant count per iteration,
//! which is the termination argument. A policy returning an empty user set
//! would be a modeling defect, not a runtime condition, so the loop panics
//! rather than spinning.

use std::str::FromStr;

use rolemine_types::{PermissionSet, UserId, UserSet, Wsc};
use rolemine_relation::{AccessRelation, Decomposition, Residual};
use tracing::debug;

use crate::ParseEnumError;
use crate::report::CoverageReport;

/// Seed-selection policy for the covering loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Seed with the residual user owning the smallest residual row; the
    /// role is that whole row. Qualifying users are tested against their
    /// residual rows, ordered by descending residual size then ascending
    /// id, and truncated to MUR.
    ByUser,
    /// Seed with whichever is smaller: the minimal residual user row or
    /// the minimal residual permission column (ties favor the user).
    ByUserOrPermission,
    /// Full-matrix variant: seed with the smallest full row among residual
    /// users; superset tests run against the original UPA.
    ByFullRow,
    /// Full-matrix variant: seed with the smallest residual row, but test
    /// qualifying users against the original UPA.
    ByResidualRowFullTest,
}

impl SeedPolicy {
    /// Every policy, in reporting order.
    pub const ALL: [SeedPolicy; 4] = [
        SeedPolicy::ByUser,
        SeedPolicy::ByUserOrPermission,
        SeedPolicy::ByFullRow,
        SeedPolicy::ByResidualRowFullTest,
    ];

    /// Short label used in experiment tables.
    pub fn label(self) -> &'static str {
        match self {
            SeedPolicy::ByUser => "by-user",
            SeedPolicy::ByUserOrPermission => "by-user-or-permission",
            SeedPolicy::ByFullRow => "by-full-row",
            SeedPolicy::ByResidualRowFullTest => "by-residual-row-full-test",
        }
    }
}

impl FromStr for SeedPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by-user" => Ok(SeedPolicy::ByUser),
            "by-user-or-permission" => Ok(SeedPolicy::ByUserOrPermission),
            "by-full-row" => Ok(SeedPolicy::ByFullRow),
            "by-residual-row-full-test" => Ok(SeedPolicy::ByResidualRowFullTest),
            other => Err(ParseEnumError::new(
                "seed policy",
                other,
                "by-user, by-user-or-permission, by-full-row, by-residual-row-full-test",
            )),
        }
    }
}

/// Greedy set-covering miner without a cardinality ceiling beyond the
/// per-role truncation to MUR.
#[derive(Debug)]
pub struct CoveringEngine {
    relation: AccessRelation,
    residual: Residual,
    decomposition: Decomposition,
    policy: SeedPolicy,
    mur: usize,
}

impl CoveringEngine {
    /// Creates an engine over its own snapshot of the relation.
    ///
    /// `mur == 0` means "no cap" (the cap becomes the user count).
    pub fn new(relation: AccessRelation, policy: SeedPolicy, mur: usize) -> Self {
        let mur = if mur == 0 { relation.user_count() } else { mur };
        let residual = Residual::snapshot(&relation);
        Self {
            relation,
            residual,
            decomposition: Decomposition::new(),
            policy,
            mur,
        }
    }

    /// Runs the covering loop to exhaustion.
    pub fn mine(&mut self) {
        while !self.residual.is_exhausted() {
            let (users, permissions) = self.pick_candidate();
            assert!(
                !users.is_empty(),
                "seed policy {:?} produced no qualifying users",
                self.policy
            );

            let (role, minted) = self.decomposition.resolve_or_allocate(&permissions);
            let users: UserSet = users.into_iter().collect();
            for &user in &users {
                self.decomposition.grant(user, role);
            }
            debug!(
                role = %role,
                minted,
                users = users.len(),
                permissions = permissions.len(),
                "assigned covering role"
            );
            self.residual.advance(&users, &permissions);
        }
    }

    /// Selects the next (users, permission-set) candidate per the policy.
    fn pick_candidate(&self) -> (Vec<UserId>, PermissionSet) {
        match self.policy {
            SeedPolicy::ByUser => self.pick_by_user(),
            SeedPolicy::ByUserOrPermission => self.pick_by_user_or_permission(),
            SeedPolicy::ByFullRow => self.pick_full_matrix(true),
            SeedPolicy::ByResidualRowFullTest => self.pick_full_matrix(false),
        }
    }

    fn pick_by_user(&self) -> (Vec<UserId>, PermissionSet) {
        let (_, permissions) = self.min_residual_row();
        let permissions = permissions.clone();

        // qualifying users, largest residual rows first so the role keeps
        // covering as much as possible before the cap bites
        let mut qualifying: Vec<(UserId, usize)> = self
            .residual
            .rows()
            .iter()
            .filter(|(_, row)| permissions.is_subset(row))
            .map(|(&user, row)| (user, row.len()))
            .collect();
        qualifying.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        qualifying.truncate(self.mur);

        (qualifying.into_iter().map(|(user, _)| user).collect(), permissions)
    }

    fn pick_by_user_or_permission(&self) -> (Vec<UserId>, PermissionSet) {
        let (seed_user, user_row) = self.min_residual_row();
        let (seed_permission, permission_column) = self.min_residual_column();

        if user_row.len() <= permission_column.len() {
            let permissions = self.residual.row(seed_user).cloned().unwrap_or_default();
            let users: Vec<UserId> = self
                .residual
                .rows()
                .iter()
                .filter(|(_, row)| permissions.is_subset(row))
                .map(|(&user, _)| user)
                .take(self.mur)
                .collect();
            (users, permissions)
        } else {
            let users: Vec<UserId> = permission_column.iter().copied().take(self.mur).collect();
            let capped: UserSet = users.iter().copied().collect();

            // every residual permission whose full user column covers the
            // capped seed users joins the role
            let permissions: PermissionSet = self
                .residual
                .permissions()
                .iter()
                .copied()
                .filter(|&p| {
                    self.relation
                        .users_of(p)
                        .is_some_and(|column| capped.is_subset(column))
                })
                .collect();

            debug_assert!(permissions.contains(&seed_permission));
            (users, permissions)
        }
    }

    /// Full-matrix arithmetic: membership is tested against the original
    /// UPA. `seed_full_row` selects whether the seed role is the seed
    /// user's full row or their residual row.
    fn pick_full_matrix(&self, seed_full_row: bool) -> (Vec<UserId>, PermissionSet) {
        let (seed, permissions) = if seed_full_row {
            let seed = self
                .residual
                .users()
                .iter()
                .copied()
                .min_by_key(|&user| {
                    (
                        self.relation
                            .permissions_of(user)
                            .map_or(0, PermissionSet::len),
                        user,
                    )
                })
                .expect("residual user set is non-empty inside the loop");
            let row = self
                .relation
                .permissions_of(seed)
                .cloned()
                .unwrap_or_default();
            (seed, row)
        } else {
            let (seed, row) = self.min_residual_row();
            (seed, row.clone())
        };
        let mut qualifying: Vec<UserId> = self
            .residual
            .users()
            .iter()
            .copied()
            .filter(|&user| {
                self.relation
                    .permissions_of(user)
                    .is_some_and(|row| permissions.is_subset(row))
            })
            .collect();

        if qualifying.len() > self.mur {
            // the seed user is always retained; the remaining slots fill in
            // ascending id order
            qualifying.retain(|&user| user != seed);
            qualifying.truncate(self.mur.saturating_sub(1));
            qualifying.insert(0, seed);
        }

        (qualifying, permissions)
    }

    /// The residual user with the smallest residual row (ties: smallest id).
    fn min_residual_row(&self) -> (UserId, &PermissionSet) {
        self.residual
            .rows()
            .iter()
            .map(|(&user, row)| (user, row))
            .min_by_key(|(user, row)| (row.len(), *user))
            .expect("residual user set is non-empty inside the loop")
    }

    /// The residual permission with the smallest residual column.
    fn min_residual_column(&self) -> (rolemine_types::PermissionId, &UserSet) {
        self.residual
            .columns()
            .iter()
            .map(|(&permission, column)| (permission, column))
            .min_by_key(|(permission, column)| (column.len(), *permission))
            .expect("residual permission set is non-empty inside the loop")
    }

    /// Structural complexity of the mined decomposition.
    pub fn wsc(&self) -> Wsc {
        self.decomposition.wsc()
    }

    /// Number of grants not reproduced by the mined roles. Zero once a run
    /// has finished.
    pub fn verify(&self) -> usize {
        let reproduced: usize = self
            .decomposition
            .assignments()
            .keys()
            .map(|&user| self.decomposition.effective_permissions(user).len())
            .sum();
        self.relation.grant_count() - reproduced
    }

    /// Diagnostic per-user comparison of mined grants against UPA.
    pub fn check_solution(&self) -> CoverageReport {
        let mut report = CoverageReport::new();
        for (&user, expected) in self.relation.upa() {
            let actual = self.decomposition.effective_permissions(user);
            let missing = expected.difference(&actual).copied().collect();
            let unexpected = actual.difference(expected).copied().collect();
            report.record(user, missing, unexpected);
        }
        report
    }

    pub fn relation(&self) -> &AccessRelation {
        &self.relation
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn into_decomposition(self) -> Decomposition {
        self.decomposition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use rolemine_types::PermissionId;
    use test_case::test_case;

    fn relation(rows: &[(u32, &[u32])]) -> AccessRelation {
        let upa: BTreeMap<UserId, PermissionSet> = rows
            .iter()
            .map(|&(u, ps)| {
                (
                    UserId::new(u),
                    ps.iter().copied().map(PermissionId::new).collect(),
                )
            })
            .collect();
        AccessRelation::from_upa("test", upa)
    }

    #[test_case(SeedPolicy::ByUser)]
    #[test_case(SeedPolicy::ByUserOrPermission)]
    #[test_case(SeedPolicy::ByFullRow)]
    #[test_case(SeedPolicy::ByResidualRowFullTest)]
    fn exact_cover_holds_for_every_policy(policy: SeedPolicy) {
        let relation = relation(&[
            (1, &[10, 20, 30]),
            (2, &[10, 20]),
            (3, &[20, 30]),
            (4, &[10]),
        ]);
        let mut engine = CoveringEngine::new(relation, policy, 2);
        engine.mine();

        assert!(engine.check_solution().is_covered());
        assert_eq!(engine.verify(), 0);
    }

    #[test]
    fn smallest_row_seeds_first() {
        // user 3 owns the smallest row, so {10} is the first role mined
        let relation = relation(&[(1, &[10, 20]), (2, &[10, 20]), (3, &[10])]);
        let mut engine = CoveringEngine::new(relation, SeedPolicy::ByUser, 2);
        engine.mine();

        let first_role = engine.decomposition().roles()[&rolemine_types::RoleId::new(1)].clone();
        assert_eq!(first_role, [PermissionId::new(10)].into());
        assert!(engine.check_solution().is_covered());
    }

    #[test]
    fn truncation_never_breaks_the_cover() {
        // four identical users under a cap of 2: the role is assigned over
        // two iterations, reusing the {10} signature rather than minting a
        // duplicate
        let relation = relation(&[(1, &[10]), (2, &[10]), (3, &[10]), (4, &[10])]);
        let mut engine = CoveringEngine::new(relation, SeedPolicy::ByUser, 2);
        engine.mine();

        assert_eq!(engine.decomposition().role_count(), 1);
        assert!(engine.check_solution().is_covered());
    }

    #[test]
    fn signatures_stay_unique() {
        let relation = relation(&[(1, &[10, 20]), (2, &[10]), (3, &[20]), (4, &[10, 20])]);
        let mut engine = CoveringEngine::new(relation, SeedPolicy::ByUserOrPermission, 1);
        engine.mine();

        let signatures: Vec<_> = engine.decomposition().roles().values().collect();
        for (i, a) in signatures.iter().enumerate() {
            for b in &signatures[i + 1..] {
                assert_ne!(a, b, "two roles share a signature");
            }
        }
    }

    #[test]
    fn policy_labels_round_trip() {
        for policy in SeedPolicy::ALL {
            assert_eq!(policy.label().parse::<SeedPolicy>().unwrap(), policy);
        }
        assert!("by-magic".parse::<SeedPolicy>().is_err());
    }
}
