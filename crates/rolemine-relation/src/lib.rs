//! # rolemine-relation: The relation store
//!
//! Owns the ground-truth access relation and the derived structures every
//! mining engine works with:
//!
//! - [`AccessRelation`]: UPA and its inverse PUA, loaded once from a
//!   pairwise file, a role-block file, or a direct mapping; read-only
//!   afterwards.
//! - [`Residual`]: the shrinking uncovered view an engine owns and
//!   advances as roles are assigned.
//! - [`Decomposition`]: the mined UA/PA pair with signature-unique role
//!   allocation and the WSC metric.
//! - [`RbacState`]: an existing decomposition parsed from role blocks,
//!   input to the post-processing optimizer.
//!
//! No mining policy lives here; engines are in `rolemine-mining`.

mod decomposition;
mod error;
mod parse;
mod relation;
mod residual;
mod state;

pub use decomposition::Decomposition;
pub use error::RelationError;
pub use relation::{AccessRelation, DatasetSource};
pub use residual::Residual;
pub use state::RbacState;

/// Re-exported so downstream crates can name the metric a
/// [`Decomposition`] reports without depending on the types crate.
pub use rolemine_types::Wsc;
