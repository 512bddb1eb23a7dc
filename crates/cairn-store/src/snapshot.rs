//! Directory-walk sources consumed by the tree builder.
//!
//! A [`Snapshot`] lists one directory level as `(name, is_directory)` pairs
//! and hands out byte readers for files and nested snapshots for
//! subdirectories. [`FsSnapshot`] walks a live directory; [`MemorySnapshot`]
//! is an in-memory fixture for tests and embedding.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

/// One entry of a snapshot directory level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Entry name as raw bytes.
    pub name: Vec<u8>,
    /// `true` for subdirectories, `false` for anything stored as file content.
    pub is_dir: bool,
}

/// A directory snapshot that can be walked one level at a time.
pub trait Snapshot {
    /// List the entries of this directory, in any order.
    fn list(&self) -> StoreResult<Vec<SnapshotEntry>>;

    /// Open a reader over the content of the file `name`.
    fn open(&self, name: &[u8]) -> StoreResult<Box<dyn Read + '_>>;

    /// Descend into the subdirectory `name`.
    fn descend(&self, name: &[u8]) -> StoreResult<Box<dyn Snapshot + '_>>;
}

impl<T: Snapshot + ?Sized> Snapshot for &T {
    fn list(&self) -> StoreResult<Vec<SnapshotEntry>> {
        (**self).list()
    }

    fn open(&self, name: &[u8]) -> StoreResult<Box<dyn Read + '_>> {
        (**self).open(name)
    }

    fn descend(&self, name: &[u8]) -> StoreResult<Box<dyn Snapshot + '_>> {
        (**self).descend(name)
    }
}

// ---------------------------------------------------------------------------
// FsSnapshot
// ---------------------------------------------------------------------------

/// A live directory on the local filesystem.
///
/// Symbolic links are not followed: their content is the link target path,
/// and they are listed as files. Sockets, FIFOs and devices are skipped.
#[derive(Clone, Debug)]
pub struct FsSnapshot {
    root: PathBuf,
}

impl FsSnapshot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Snapshot {
            path: path.display().to_string(),
            source,
        }
    }
}

impl Snapshot for FsSnapshot {
    fn list(&self) -> StoreResult<Vec<SnapshotEntry>> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);
        for entry in walker {
            let entry = entry.map_err(|e| Self::snapshot_error(&self.root, e.into()))?;
            let file_type = entry.file_type();
            if !(file_type.is_dir() || file_type.is_file() || file_type.is_symlink()) {
                debug!(path = %entry.path().display(), "skipping special file");
                continue;
            }
            entries.push(SnapshotEntry {
                name: os_to_bytes(entry.file_name()),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }

    fn open(&self, name: &[u8]) -> StoreResult<Box<dyn Read + '_>> {
        let path = self.root.join(bytes_to_os(name));
        let meta = fs::symlink_metadata(&path).map_err(|e| Self::snapshot_error(&path, e))?;
        if meta.file_type().is_symlink() {
            let target = fs::read_link(&path).map_err(|e| Self::snapshot_error(&path, e))?;
            return Ok(Box::new(Cursor::new(os_to_bytes(target.as_os_str()))));
        }
        let file = File::open(&path).map_err(|e| Self::snapshot_error(&path, e))?;
        Ok(Box::new(file))
    }

    fn descend(&self, name: &[u8]) -> StoreResult<Box<dyn Snapshot + '_>> {
        Ok(Box::new(FsSnapshot::new(self.root.join(bytes_to_os(name)))))
    }
}

#[cfg(unix)]
fn os_to_bytes(name: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_to_bytes(name: &OsStr) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn bytes_to_os(name: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    OsStr::from_bytes(name).to_os_string()
}

#[cfg(not(unix))]
fn bytes_to_os(name: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(name).into_owned())
}

// ---------------------------------------------------------------------------
// MemorySnapshot
// ---------------------------------------------------------------------------

/// A node of a [`MemorySnapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryNode {
    File(Vec<u8>),
    Directory(MemorySnapshot),
}

/// An in-memory directory tree. Entries keep their insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    entries: Vec<(Vec<u8>, MemoryNode)>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file entry.
    pub fn file(mut self, name: impl Into<Vec<u8>>, content: impl Into<Vec<u8>>) -> Self {
        self.entries
            .push((name.into(), MemoryNode::File(content.into())));
        self
    }

    /// Add a subdirectory entry.
    pub fn dir(mut self, name: impl Into<Vec<u8>>, children: MemorySnapshot) -> Self {
        self.entries
            .push((name.into(), MemoryNode::Directory(children)));
        self
    }

    fn node(&self, name: &[u8]) -> StoreResult<&MemoryNode> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
            .ok_or_else(|| StoreError::Snapshot {
                path: String::from_utf8_lossy(name).into_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such snapshot entry"),
            })
    }

    fn wrong_type(name: &[u8], expected: &str) -> StoreError {
        StoreError::Snapshot {
            path: String::from_utf8_lossy(name).into_owned(),
            source: io::Error::new(io::ErrorKind::InvalidInput, format!("not a {expected}")),
        }
    }
}

impl Snapshot for MemorySnapshot {
    fn list(&self) -> StoreResult<Vec<SnapshotEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|(name, node)| SnapshotEntry {
                name: name.clone(),
                is_dir: matches!(node, MemoryNode::Directory(_)),
            })
            .collect())
    }

    fn open(&self, name: &[u8]) -> StoreResult<Box<dyn Read + '_>> {
        match self.node(name)? {
            MemoryNode::File(content) => Ok(Box::new(content.as_slice())),
            MemoryNode::Directory(_) => Err(Self::wrong_type(name, "file")),
        }
    }

    fn descend(&self, name: &[u8]) -> StoreResult<Box<dyn Snapshot + '_>> {
        match self.node(name)? {
            MemoryNode::Directory(children) => Ok(Box::new(children)),
            MemoryNode::File(_) => Err(Self::wrong_type(name, "directory")),
        }
    }
}
