//! Diagnostic coverage reports.
//!
//! Verification never aborts a batch: engines return a per-user mismatch
//! report and let the caller decide. A report with no faults means the
//! decomposition reproduces the expected grants exactly.

use std::fmt::{self, Display};

use rolemine_types::{PermissionSet, UserId};

/// A single user whose effective permissions diverge from the expected set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageFault {
    pub user: UserId,
    /// Permissions the user should hold but does not.
    pub missing: PermissionSet,
    /// Permissions the user holds but should not.
    pub unexpected: PermissionSet,
}

/// Per-user mismatch report produced by a `check_solution` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    faults: Vec<CoverageFault>,
}

impl CoverageReport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, user: UserId, missing: PermissionSet, unexpected: PermissionSet) {
        if missing.is_empty() && unexpected.is_empty() {
            return;
        }
        self.faults.push(CoverageFault {
            user,
            missing,
            unexpected,
        });
    }

    /// True when every user's grants match exactly.
    pub fn is_covered(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn faults(&self) -> &[CoverageFault] {
        &self.faults
    }

    pub fn fault_count(&self) -> usize {
        self.faults.len()
    }
}

impl Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_covered() {
            return write!(f, "covered");
        }
        write!(f, "{} user(s) with mismatched grants:", self.faults.len())?;
        for fault in &self.faults {
            write!(
                f,
                " [user {} missing {} unexpected {}]",
                fault.user,
                fault.missing.len(),
                fault.unexpected.len()
            )?;
        }
        Ok(())
    }
}
