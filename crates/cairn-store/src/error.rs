use std::path::PathBuf;

use cairn_types::ObjectId;

/// Errors from object store and tree building operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object header is malformed: no NUL within the scan window, an
    /// unrecognized kind token, or a non-decimal length field.
    #[error("corrupt object header: {0}")]
    CorruptHeader(String),

    /// The header's declared length disagrees with the actual payload.
    #[error("length mismatch: header declares {declared} bytes, payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The compressed object stream could not be inflated.
    #[error("decompression failed: {0}")]
    DecompressionFailure(String),

    /// Persisting an object to its final location failed.
    #[error("failed to write object to {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object decoded fine but its content is not what the caller asked for.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// A tree entry name is empty or contains '/' or NUL.
    #[error("invalid tree entry name: {0:?}")]
    InvalidEntryName(String),

    /// Reading from a snapshot source failed.
    #[error("snapshot error at {path}: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a tree payload failed to decode. Offsets are byte positions of the
/// offending entry within the payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeParseError {
    #[error("entry at {offset}: missing mode separator")]
    MissingMode { offset: usize },

    #[error("entry at {offset}: unknown mode {mode:?}")]
    UnknownMode { offset: usize, mode: String },

    #[error("entry at {offset}: unterminated name")]
    UnterminatedName { offset: usize },

    #[error("entry at {offset}: truncated object id")]
    TruncatedId { offset: usize },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
