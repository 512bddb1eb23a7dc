use cairn_types::ObjectId;

use crate::error::StoreResult;
use crate::object::GitObject;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same kind and payload always
///   produce the same ID, so writing an existing object is a no-op.
/// - Writes are safe to issue concurrently, including for the same ID.
/// - A reader never observes a partially written object.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `StoreError::NotFound` if the object does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<GitObject>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op (idempotent).
    fn write(&self, object: &GitObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read multiple objects in a batch.
    ///
    /// Default implementation calls `read()` for each ID and fails on the
    /// first missing or unreadable object.
    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<GitObject>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Write multiple objects in a batch and return their IDs.
    ///
    /// Default implementation calls `write()` for each object.
    fn write_batch(&self, objects: &[GitObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }
}
