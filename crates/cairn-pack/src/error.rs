use cairn_store::StoreError;
use thiserror::Error;

use crate::entry::BaseRef;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("corrupt pack header: {0}")]
    CorruptHeader(String),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("unknown object type {code} at offset {offset}")]
    UnknownObjectType { offset: u64, code: u8 },

    #[error("delta base {base} for entry at offset {offset} is not available")]
    DeltaBaseMissing { offset: u64, base: BaseRef },

    #[error("decompression failed at offset {offset}: {reason}")]
    DecompressionFailure { offset: u64, reason: String },

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}

impl PackError {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            offset,
            reason: reason.into(),
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
