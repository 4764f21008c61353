//! CLI command implementations.

pub mod mine;
pub mod post;
pub mod strict;
pub mod sweep;
