//! Git packfile reading for cairn.
//!
//! A pack is a `PACK` signature, a big-endian version (2 or 3) and entry
//! count, the entries themselves, and a SHA-1 trailer over everything before
//! it. Each entry is a variable-length `(type, size)` header followed by a
//! zlib stream; delta entries additionally name their base, either by a
//! backwards offset within the pack or by object id.
//!
//! # Phases
//!
//! [`PackReader::unpack`] moves through `Header → Entries → ResolvePending →
//! Persist`. Nothing reaches the object store until every delta has been
//! reconstructed, so a malformed or incomplete pack leaves the store as it
//! was. [`PackReader::inspect`] stops before Persist.

pub mod config;
pub mod delta;
pub mod entry;
pub mod error;
pub mod reader;
mod resolve;

#[cfg(test)]
mod fixtures;

pub use config::{PackConfig, DEFAULT_MAX_DELTA_DEPTH};
pub use delta::{apply_delta, DeltaError};
pub use entry::{BaseRef, PackEntry, PackObjectType, UnpackedObject};
pub use error::{PackError, PackResult};
pub use reader::{PackHeader, PackReader, PACK_SIGNATURE};
