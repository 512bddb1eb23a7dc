//! Content-addressed object storage for cairn.
//!
//! Objects use git's loose-object layout: the payload is prefixed with a
//! `"{kind} {len}\0"` header, zlib-compressed, and written to
//! `objects/xx/yyyy…` under the SHA-1 of the uncompressed bytes. A
//! repository written here is readable by stock git and vice versa.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`LooseObjectStore`] -- on-disk fan-out directory, atomic writes
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Trees
//!
//! [`TreeBuilder`] turns a [`Snapshot`] of a directory into blobs and trees,
//! bottom-up, and returns the root tree id.
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; rewriting the same id is a no-op.
//! 2. Writes go through a temporary file and a no-clobber rename, so readers
//!    never observe a partially written object.
//! 3. Concurrent writers of the same object all succeed.

pub mod builder;
pub mod config;
pub mod error;
pub mod loose;
pub mod memory;
pub mod object;
pub mod snapshot;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use builder::{build_tree, BuildOptions, TreeBuilder};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult, TreeParseError};
pub use loose::LooseObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{
    validate_entry_name, EntryMode, GitObject, Tree, TreeEntry, DEFAULT_HEADER_SCAN_LIMIT,
};
pub use snapshot::{FsSnapshot, MemoryNode, MemorySnapshot, Snapshot, SnapshotEntry};
pub use traits::ObjectStore;
