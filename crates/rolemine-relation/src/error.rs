//! Relation store error types.
//!
//! All of these are construction-time configuration errors: they are fatal
//! to the instance being built and are never produced once mining has
//! started.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("failed to read dataset at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed pair at {path}:{line}: expected \"user permission\", got {content:?}")]
    MalformedPair {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("malformed role block at {path}:{line}: {reason}")]
    MalformedBlock {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("dataset at {path} matches neither the pairwise nor the role-block format")]
    UnrecognizedDataset { path: PathBuf },
}
