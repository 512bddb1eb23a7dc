use cairn_types::{ObjectId, ObjectKind};
use sha1::{Digest, Sha1};

/// Kind-tagged SHA-1 content hasher.
///
/// Each hasher carries the object kind whose ASCII name is prepended, along
/// with the payload length, to every hash computation. A blob and a tree with
/// identical bytes therefore hash to different ids.
pub struct ContentHasher {
    kind: ObjectKind,
}

impl ContentHasher {
    /// Hasher for blob objects.
    pub const BLOB: Self = Self {
        kind: ObjectKind::Blob,
    };
    /// Hasher for tree objects.
    pub const TREE: Self = Self {
        kind: ObjectKind::Tree,
    };
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self {
        kind: ObjectKind::Commit,
    };
    /// Hasher for tag objects.
    pub const TAG: Self = Self {
        kind: ObjectKind::Tag,
    };

    /// Hasher for an arbitrary kind.
    pub const fn for_kind(kind: ObjectKind) -> Self {
        Self { kind }
    }

    /// Hash a payload under this hasher's kind.
    pub fn hash(&self, payload: &[u8]) -> ObjectId {
        let mut hasher = Sha1::new();
        hasher.update(object_header(self.kind, payload.len()));
        hasher.update(payload);
        ObjectId::from_raw(digest_bytes(&hasher.finalize()))
    }

    /// Raw SHA-1 without any header (pack trailers, whole-file checksums).
    pub fn raw_hash(data: &[u8]) -> [u8; 20] {
        digest_bytes(&Sha1::digest(data))
    }

    /// The kind tag used by this hasher.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

/// Canonical object header: ASCII kind, one space, decimal length, one NUL.
pub fn object_header(kind: ObjectKind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind.as_str(), len).into_bytes()
}

fn digest_bytes(digest: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(digest);
    out
}

/// Compute the content-addressed id of `(kind, payload)`.
pub fn compute_id(kind: ObjectKind, payload: &[u8]) -> ObjectId {
    ContentHasher::for_kind(kind).hash(payload)
}
