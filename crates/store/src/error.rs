use codec::CodecError;
use config::ConfigError;
use sidecar::SidecarError;
use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A file could not be checked, opened, created, written or deleted.
    Filesystem,
    /// Construction parameters are invalid or disagree with the sidecar.
    Config,
    /// Unknown stream id, element index out of range, or no id generated yet.
    Index,
    /// The codec failed to encode or decode a record.
    Codec,
    /// The sidecar is malformed or inconsistent with the data file.
    Metadata,
    /// The store was nuked.
    Destroyed,
}

/// Every failure a record store operation can report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("sidecar {field} mismatch: expected {expected:?}, found {found:?}")]
    ConfigMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("invalid store config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("unknown stream id {0}")]
    UnknownStream(u64),

    #[error("index {index} out of range for stream {stream} ({count} elements)")]
    IndexOutOfRange {
        stream: u64,
        index: usize,
        count: usize,
    },

    #[error("no retId has been generated yet")]
    NoRetIdGenerated,

    #[error("retId counter exhausted")]
    RetIdExhausted,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("metadata error: {0}")]
    Metadata(#[from] SidecarError),

    #[error("store has been nuked")]
    Destroyed,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Filesystem { .. } => ErrorKind::Filesystem,
            StoreError::Metadata(SidecarError::Io { .. }) => ErrorKind::Filesystem,
            StoreError::ConfigMismatch { .. } | StoreError::InvalidConfig(_) => ErrorKind::Config,
            StoreError::UnknownStream(_)
            | StoreError::IndexOutOfRange { .. }
            | StoreError::NoRetIdGenerated
            | StoreError::RetIdExhausted => ErrorKind::Index,
            StoreError::Codec(_) => ErrorKind::Codec,
            StoreError::Metadata(_) => ErrorKind::Metadata,
            StoreError::Destroyed => ErrorKind::Destroyed,
        }
    }
}

/// Builds a `map_err` adapter that wraps an I/O error with `context`.
pub(crate) fn fs_context(context: impl Into<String>) -> impl FnOnce(io::Error) -> StoreError {
    let context = context.into();
    move |source| StoreError::Filesystem { context, source }
}
