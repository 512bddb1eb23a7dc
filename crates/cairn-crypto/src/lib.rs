//! Content hashing for cairn.
//!
//! Maps `(kind, payload)` to an [`ObjectId`](cairn_types::ObjectId) by
//! hashing the canonical encoding `"{kind} {len}\0" + payload` with SHA-1.
//! Pure functions only: no I/O and no failure modes.
//!
//! All hashing wraps the `sha1` crate; there is no custom cryptography here.

pub mod hasher;

pub use hasher::{compute_id, object_header, ContentHasher};
