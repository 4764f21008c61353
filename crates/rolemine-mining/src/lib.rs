//! Role mining engines under a per-role user cardinality ceiling.
//!
//! Three ways of turning a user/permission relation into roles:
//!
//! - [`CoveringEngine`] mines greedily by set covering, truncating each
//!   candidate role's membership to the cap per iteration. The cap is not
//!   a hard guarantee here; signature reuse across iterations can grow a
//!   role past it.
//! - [`StrictEngine`] enforces the cap while mining. Roles that fill up
//!   become forbidden signatures; a blocked candidate is split into two
//!   smaller roles, and a user no split can serve falls back to direct
//!   permission grants.
//! - [`PostOptimizer`] retrofits the cap onto an existing decomposition
//!   by cloning over-subscribed roles, after optionally pruning redundant
//!   and unused roles.
//!
//! Every engine ends with a [`CoverageReport`] check that compares what
//! users end up with against what they are owed.

pub mod cover;
pub mod post;
pub mod report;
pub mod strict;

pub use cover::{CoveringEngine, SeedPolicy};
pub use post::PostOptimizer;
pub use report::{CoverageFault, CoverageReport};
pub use strict::{Criterion, MatrixKind, StrictEngine, StrictOptions};

/// Failure to parse one of the engine selector strings.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} `{value}`, expected one of: {expected}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
            expected,
        }
    }
}
