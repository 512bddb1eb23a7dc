use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard};

use cairn_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::GitObject;
use crate::traits::ObjectStore;

/// Object store that keeps decoded objects in a map instead of on disk.
///
/// Ids are computed exactly as the loose store computes them, so trees and
/// packs resolved against it name the same objects git would.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, GitObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, GitObject>> {
        self.objects.read().expect("lock poisoned")
    }

    /// Number of distinct objects held.
    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<GitObject> {
        self.objects()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }

    fn write(&self, object: &GitObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        self.objects
            .write()
            .expect("lock poisoned")
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects().contains_key(id))
    }
}

impl fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &self.len())
            .finish()
    }
}
