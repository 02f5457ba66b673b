//! Error types raised by loading and resolution.
//!
//! Malformed rule lines and unresolvable filter references are *not* errors:
//! the parser recovers from them locally. Only failures that make a pass
//! meaningless (I/O on the snapshot, logic faults, cancellation) surface here.

use std::path::PathBuf;

use thiserror::Error;

use crate::form::FormKey;

/// Errors surfaced by the engine and its loaders.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("resolution pass was cancelled")]
    Cancelled,

    #[error("npc {0} appears more than once in the snapshot")]
    DuplicateNpc(FormKey),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
