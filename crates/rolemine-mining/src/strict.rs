//! Strict cardinality-constrained mining engine.
//!
//! Enforces the MUR ceiling online: a role whose assigned-user count
//! reaches MUR has its signature marked forbidden and accepts no further
//! users. When the candidate role for a seed user is forbidden, the engine
//! tries to split it into two legal halves; when no legal split exists,
//! the user's residual permissions are granted directly (DUPA), bypassing
//! roles entirely. Split exhaustion is therefore never an error: every
//! iteration fully covers the seed user, one way or the other.

use std::collections::BTreeMap;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use rolemine_relation::{AccessRelation, Decomposition, Residual};
use rolemine_types::{PermissionSet, RoleId, UserId, UserSet, Wsc};
use tracing::{debug, warn};

use crate::ParseEnumError;
use crate::report::CoverageReport;

/// Which access matrix drives seed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixKind {
    /// Rank seed users by their full UPA rows.
    #[default]
    Full,
    /// Rank seed users by their residual rows.
    Residual,
}

impl FromStr for MatrixKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(MatrixKind::Full),
            "residual" => Ok(MatrixKind::Residual),
            other => Err(ParseEnumError::new("access matrix", other, "full, residual")),
        }
    }
}

/// Min- or max-cardinality seed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criterion {
    #[default]
    Min,
    Max,
}

impl FromStr for Criterion {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(Criterion::Min),
            "max" => Ok(Criterion::Max),
            other => Err(ParseEnumError::new("criterion", other, "min, max")),
        }
    }
}

/// Tuning knobs for the strict engine.
#[derive(Debug, Clone)]
pub struct StrictOptions {
    /// Maximum users per role. 0 means "no cap" (the user count).
    pub mur: usize,
    pub matrix: MatrixKind,
    pub criterion: Criterion,
    /// Retry budget for random bipartitions during splitting.
    pub split_retries: usize,
    /// Seed for the local RNG; `None` draws from entropy. Runs with the
    /// same seed on the same dataset are fully reproducible.
    pub rng_seed: Option<u64>,
}

impl Default for StrictOptions {
    fn default() -> Self {
        Self {
            mur: 0,
            matrix: MatrixKind::Full,
            criterion: Criterion::Min,
            split_retries: 10,
            rng_seed: None,
        }
    }
}

/// What `pick_candidate` decided for the chosen seed user.
enum Candidate {
    /// The candidate signature is legal: assign it directly.
    Assign(UserId, PermissionSet),
    /// The candidate is forbidden but splits into two legal halves.
    Split(UserId, PermissionSet, PermissionSet),
    /// No legal role or split exists: grant the residual row directly.
    Fallback(UserId),
}

/// Role miner with online MUR enforcement and DUPA fallback.
#[derive(Debug)]
pub struct StrictEngine {
    relation: AccessRelation,
    residual: Residual,
    decomposition: Decomposition,
    mur: usize,
    matrix: MatrixKind,
    criterion: Criterion,
    split_retries: usize,
    rng: StdRng,
    /// Assigned-user count per role.
    au: BTreeMap<RoleId, usize>,
    /// Signatures of roles that reached MUR.
    forbidden: std::collections::BTreeSet<PermissionSet>,
    /// Direct user-permission grants for users no legal role could cover.
    dupa: BTreeMap<UserId, PermissionSet>,
}

impl StrictEngine {
    pub fn new(relation: AccessRelation, options: StrictOptions) -> Self {
        let mur = if options.mur == 0 {
            relation.user_count()
        } else {
            options.mur
        };
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let residual = Residual::snapshot(&relation);
        Self {
            relation,
            residual,
            decomposition: Decomposition::new(),
            mur,
            matrix: options.matrix,
            criterion: options.criterion,
            split_retries: options.split_retries,
            rng,
            au: BTreeMap::new(),
            forbidden: std::collections::BTreeSet::new(),
            dupa: BTreeMap::new(),
        }
    }

    /// Runs the constrained covering loop to exhaustion.
    ///
    /// Forward progress: the seed user's residual row empties every
    /// iteration, through a role, a split, or DUPA.
    pub fn mine(&mut self) {
        while !self.residual.is_exhausted() {
            match self.pick_candidate() {
                Candidate::Assign(seed, permissions) => {
                    let users = self.assign_role(seed, &permissions);
                    self.residual.advance(&users, &permissions);
                }
                Candidate::Split(seed, first, second) => {
                    debug!(user = %seed, "assigning split role pair");
                    for permissions in [first, second] {
                        let users = self.assign_role(seed, &permissions);
                        self.residual.advance(&users, &permissions);
                    }
                }
                Candidate::Fallback(seed) => {
                    let row = self
                        .residual
                        .row(seed)
                        .cloned()
                        .expect("seed user has a residual row inside the loop");
                    debug!(user = %seed, permissions = row.len(), "falling back to direct grants");
                    self.dupa
                        .entry(seed)
                        .or_default()
                        .extend(row.iter().copied());
                    self.residual.advance(&UserSet::from([seed]), &row);
                }
            }
        }
    }

    /// Selects the seed user by the configured criterion over the
    /// configured matrix, then decides what to do with their residual row.
    fn pick_candidate(&mut self) -> Candidate {
        let seed = self.select_seed();
        let candidate = self
            .residual
            .row(seed)
            .cloned()
            .expect("seed user has a residual row inside the loop");

        if !self.forbidden.contains(&candidate) {
            return Candidate::Assign(seed, candidate);
        }

        // a single permission cannot be split; DUPA handles it
        if candidate.len() == 1 {
            return Candidate::Fallback(seed);
        }

        match self.split(&candidate) {
            Some((first, second)) => Candidate::Split(seed, first, second),
            None => Candidate::Fallback(seed),
        }
    }

    fn select_seed(&self) -> UserId {
        let weight = |user: UserId| self.matrix_row_len(user);
        let users = self.residual.users().iter().copied();
        match self.criterion {
            Criterion::Min => users.min_by_key(|&u| (weight(u), u)),
            Criterion::Max => users.max_by_key(|&u| (weight(u), std::cmp::Reverse(u))),
        }
        .expect("residual user set is non-empty inside the loop")
    }

    fn matrix_row_len(&self, user: UserId) -> usize {
        match self.matrix {
            MatrixKind::Full => self
                .relation
                .permissions_of(user)
                .map_or(0, PermissionSet::len),
            MatrixKind::Residual => self.residual.row(user).map_or(0, PermissionSet::len),
        }
    }

    /// Attempts to split a forbidden candidate into two legal roles, in
    /// order of preference:
    /// 1. a pair of mined, non-forbidden proper subsets whose union is the
    ///    candidate exactly, minimizing combined assigned-user count;
    /// 2. a mined subset plus its complement, if the complement is unmined;
    /// 3. a bounded number of random non-trivial bipartitions with both
    ///    halves unmined.
    fn split(&mut self, candidate: &PermissionSet) -> Option<(PermissionSet, PermissionSet)> {
        // proper subsets still accepting users
        let contained: Vec<(PermissionSet, usize)> = self
            .decomposition
            .roles()
            .iter()
            .filter(|&(role, signature)| {
                signature.is_subset(candidate)
                    && signature != candidate
                    && self.au.get(role).copied().unwrap_or(0) < self.mur
            })
            .map(|(role, signature)| (signature.clone(), self.au.get(role).copied().unwrap_or(0)))
            .collect();

        // 1. pairs of existing roles covering the candidate exactly
        let mut best: Option<(usize, &PermissionSet, &PermissionSet)> = None;
        for (i, (first, first_au)) in contained.iter().enumerate() {
            for (second, second_au) in &contained[i + 1..] {
                if first.union(second).copied().collect::<PermissionSet>() == *candidate {
                    let combined = first_au + second_au;
                    if best.is_none_or(|(current, _, _)| combined < current) {
                        best = Some((combined, first, second));
                    }
                }
            }
        }
        if let Some((_, first, second)) = best {
            return Some((first.clone(), second.clone()));
        }

        // 2. a contained role plus its unmined complement
        for (signature, _) in &contained {
            let complement: PermissionSet = candidate.difference(signature).copied().collect();
            if !self.decomposition.contains_signature(&complement) {
                return Some((signature.clone(), complement));
            }
        }

        // 3. random non-trivial bipartitions, bounded by the retry budget
        for _ in 0..self.split_retries {
            let cut = self.rng.gen_range(1..candidate.len());
            let first: PermissionSet = candidate
                .iter()
                .copied()
                .choose_multiple(&mut self.rng, cut)
                .into_iter()
                .collect();
            let second: PermissionSet = candidate.difference(&first).copied().collect();

            if !self.decomposition.contains_signature(&first)
                && !self.decomposition.contains_signature(&second)
            {
                return Some((first, second));
            }
        }

        None
    }

    /// Resolves the role, assigns it to the seed user first and then to
    /// other qualifying residual users until the cap is reached. Returns
    /// the users covered this round.
    fn assign_role(&mut self, seed: UserId, permissions: &PermissionSet) -> UserSet {
        let (role, minted) = self.decomposition.resolve_or_allocate(permissions);
        self.au.entry(role).or_insert(0);

        // residual users holding the whole signature with residual overlap,
        // ordered by the configured criterion
        let mut others: Vec<UserId> = self
            .residual
            .users()
            .iter()
            .copied()
            .filter(|&user| user != seed)
            .filter(|&user| {
                self.relation
                    .permissions_of(user)
                    .is_some_and(|row| permissions.is_subset(row))
                    && self
                        .residual
                        .row(user)
                        .is_some_and(|row| !row.is_disjoint(permissions))
            })
            .collect();
        match self.criterion {
            Criterion::Min => others.sort_by_key(|&u| (self.matrix_row_len(u), u)),
            Criterion::Max => {
                others.sort_by_key(|&u| (std::cmp::Reverse(self.matrix_row_len(u)), u));
            }
        }

        let mut covered = UserSet::new();
        for user in std::iter::once(seed).chain(others) {
            let count = self.au.get_mut(&role).expect("au entry exists");
            if *count >= self.mur {
                break;
            }
            self.decomposition.grant(user, role);
            *count += 1;
            covered.insert(user);

            if *count == self.mur {
                self.forbidden.insert(permissions.clone());
                break;
            }
        }

        debug_assert!(
            covered.contains(&seed),
            "seed user must always receive the role it was picked for"
        );
        debug!(
            role = %role,
            minted,
            users = covered.len(),
            "assigned constrained role"
        );
        covered
    }

    /// Diagnostic per-user check of exact-cover-with-fallback: role unions
    /// plus this instance's own direct grants must reproduce UPA.
    pub fn check_solution(&self) -> CoverageReport {
        let mut report = CoverageReport::new();
        for (&user, expected) in self.relation.upa() {
            let mut actual = self.decomposition.effective_permissions(user);
            if let Some(direct) = self.dupa.get(&user) {
                actual.extend(direct.iter().copied());
            }

            let missing: PermissionSet = expected.difference(&actual).copied().collect();
            let unexpected: PermissionSet = actual.difference(expected).copied().collect();
            if !missing.is_empty() || !unexpected.is_empty() {
                warn!(user = %user, missing = missing.len(), unexpected = unexpected.len(),
                    "strict cover mismatch");
            }
            report.record(user, missing, unexpected);
        }
        report
    }

    /// Reports users whose direct grants could in fact be covered by
    /// mined roles that still accept users. Diagnostic only; a non-empty
    /// result means the fallback was more conservative than necessary.
    pub fn verify_dupa_covering(&self) -> Vec<UserId> {
        let mut coverable = Vec::new();
        for (&user, direct) in &self.dupa {
            let mut remaining = direct.clone();
            for (role, signature) in self.decomposition.roles() {
                if signature.is_subset(direct) && self.au.get(role).copied().unwrap_or(0) < self.mur
                {
                    remaining.retain(|p| !signature.contains(p));
                }
            }
            if remaining.is_empty() {
                warn!(user = %user, "direct grants coverable by mined roles");
                coverable.push(user);
            }
        }
        coverable
    }

    /// Total number of directly granted permissions.
    pub fn dupa_size(&self) -> usize {
        self.dupa.values().map(PermissionSet::len).sum()
    }

    /// Read-only view of the direct grants.
    pub fn dupa(&self) -> &BTreeMap<UserId, PermissionSet> {
        &self.dupa
    }

    pub fn wsc(&self) -> Wsc {
        self.decomposition.wsc()
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn relation(&self) -> &AccessRelation {
        &self.relation
    }

    pub fn into_decomposition(self) -> Decomposition {
        self.decomposition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolemine_types::PermissionId;
    use std::collections::BTreeMap;

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

    fn perms(ids: &[u32]) -> PermissionSet {
        ids.iter().copied().map(PermissionId::new).collect()
    }

    fn options(mur: usize) -> StrictOptions {
        StrictOptions {
            mur,
            matrix: MatrixKind::Residual,
            criterion: Criterion::Min,
            rng_seed: Some(7),
            ..StrictOptions::default()
        }
    }

    fn cardinality_holds(engine: &StrictEngine, mur: usize) {
        for (&role, _) in engine.decomposition().roles() {
            assert!(
                engine.decomposition().users_of(role).len() <= mur,
                "role {role} exceeds the cap"
            );
        }
    }

    #[test]
    fn unconstrained_run_never_needs_dupa() {
        let relation = relation(&[(1, &[10, 20]), (2, &[10, 20]), (3, &[10])]);
        let mut engine = StrictEngine::new(relation, StrictOptions::default());
        engine.mine();

        assert_eq!(engine.dupa_size(), 0);
        assert!(engine.check_solution().is_covered());
    }

    #[test]
    fn forbidden_role_is_split_not_oversubscribed() {
        // X and Y hold {A,B,C}; Z holds {A,B}; cap of 1. Whatever the
        // split, no role may end up with two users.
        let relation = relation(&[(1, &[1, 2, 3]), (2, &[1, 2, 3]), (3, &[1, 2])]);
        let mut engine = StrictEngine::new(relation, options(1));
        engine.mine();

        cardinality_holds(&engine, 1);
        assert!(engine.check_solution().is_covered());
    }

    #[test]
    fn split_prefers_existing_role_pairs() {
        let relation = relation(&[(1, &[1, 2]), (2, &[3]), (3, &[1, 2, 3])]);
        let mut engine = StrictEngine::new(relation, options(3));

        // mine {1,2} and {3} with spare capacity, then forbid their union
        engine.assign_role(UserId::new(1), &perms(&[1, 2]));
        engine.assign_role(UserId::new(2), &perms(&[3]));
        engine.forbidden.insert(perms(&[1, 2, 3]));

        let (first, second) = engine.split(&perms(&[1, 2, 3])).expect("mined pair covers the union");
        let union: PermissionSet = first.union(&second).copied().collect();
        assert_eq!(union, perms(&[1, 2, 3]));
        assert!(engine.decomposition().contains_signature(&first));
        assert!(engine.decomposition().contains_signature(&second));
    }

    #[test]
    fn forbidden_candidate_is_split_mid_run() {
        // max criterion mines {1,2,3} first and fills it; the third holder
        // arrives to a forbidden signature and must be covered by a split
        let relation = relation(&[
            (1, &[1, 2]),
            (2, &[3]),
            (3, &[1, 2, 3]),
            (4, &[1, 2, 3]),
            (5, &[1, 2, 3]),
        ]);
        let options = StrictOptions {
            mur: 2,
            matrix: MatrixKind::Residual,
            criterion: Criterion::Max,
            rng_seed: Some(7),
            ..StrictOptions::default()
        };
        let mut engine = StrictEngine::new(relation, options);
        engine.mine();

        cardinality_holds(&engine, 2);
        assert!(engine.check_solution().is_covered());
        // two sub-roles of {1,2,3} exist alongside it
        assert!(engine.decomposition().role_count() >= 3);
    }

    #[test]
    fn singleton_forbidden_role_degrades_to_dupa() {
        // every user holds only permission 1; cap of 1 forbids {1} after
        // the first assignment and singletons cannot split
        let relation = relation(&[(1, &[1]), (2, &[1]), (3, &[1])]);
        let mut engine = StrictEngine::new(relation, options(1));
        engine.mine();

        cardinality_holds(&engine, 1);
        assert!(engine.check_solution().is_covered());
        assert!(engine.dupa_size() > 0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let rows: &[(u32, &[u32])] = &[
            (1, &[1, 2, 3, 4]),
            (2, &[1, 2, 3, 4]),
            (3, &[1, 2, 3, 4]),
            (4, &[2, 3]),
            (5, &[1, 4]),
        ];
        let mut first = StrictEngine::new(relation(rows), options(1));
        first.mine();
        let mut second = StrictEngine::new(relation(rows), options(1));
        second.mine();

        assert_eq!(first.decomposition(), second.decomposition());
        assert_eq!(first.dupa(), second.dupa());
    }

    #[test]
    fn mur_zero_means_uncapped() {
        let relation = relation(&[(1, &[1]), (2, &[1]), (3, &[1]), (4, &[1])]);
        let mut engine = StrictEngine::new(relation, options(0));
        engine.mine();

        assert_eq!(engine.decomposition().role_count(), 1);
        assert_eq!(engine.dupa_size(), 0);
        assert!(engine.check_solution().is_covered());
    }

    #[test]
    fn dupa_covering_diagnostic_reports_coverable_users() {
        // contrived: after mining, no user's direct grants should be
        // coverable on a clean run
        let relation = relation(&[(1, &[1]), (2, &[1])]);
        let mut engine = StrictEngine::new(relation, options(1));
        engine.mine();

        assert!(engine.verify_dupa_covering().is_empty());
    }

    #[test]
    fn option_strings_parse() {
        assert_eq!("full".parse::<MatrixKind>().unwrap(), MatrixKind::Full);
        assert_eq!("residual".parse::<MatrixKind>().unwrap(), MatrixKind::Residual);
        assert_eq!("min".parse::<Criterion>().unwrap(), Criterion::Min);
        assert_eq!("max".parse::<Criterion>().unwrap(), Criterion::Max);
        assert!("median".parse::<Criterion>().is_err());
    }
}
