use std::borrow::Cow;

use cairn_crypto::{compute_id, object_header};
use cairn_types::{ObjectId, ObjectKind, OBJECT_ID_LEN};

use crate::error::{StoreError, StoreResult, TreeParseError};

/// Default number of bytes searched for the header's NUL terminator.
///
/// The longest legal header is `"commit " + 20 digits + "\0"`.
pub const DEFAULT_HEADER_SCAN_LIMIT: usize = 64;

/// A stored object: kind tag + payload bytes.
///
/// `GitObject` is the unit of storage. Its id is always derived with
/// [`GitObject::compute_id`], never carried alongside, so it cannot drift
/// from the content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The raw payload, without header.
    pub payload: Vec<u8>,
}

impl GitObject {
    /// Create a new object from kind and payload.
    pub fn new(kind: ObjectKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Create a blob.
    pub fn blob(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(ObjectKind::Blob, payload.into())
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        compute_id(self.kind, &self.payload)
    }

    /// Canonical encoding: `"{kind} {len}\0"` followed by the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = object_header(self.kind, self.payload.len());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a canonical encoding back into an object.
    ///
    /// The NUL terminator must appear within the first `scan_limit` bytes.
    pub fn decode(raw: &[u8], scan_limit: usize) -> StoreResult<Self> {
        let window = &raw[..raw.len().min(scan_limit)];
        let nul = window.iter().position(|&b| b == 0).ok_or_else(|| {
            StoreError::CorruptHeader(format!("no NUL terminator in first {scan_limit} bytes"))
        })?;
        let header = &raw[..nul];

        let space = header
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| StoreError::CorruptHeader("missing space after kind".into()))?;
        let (kind_token, len_token) = (&header[..space], &header[space + 1..]);

        let kind = ObjectKind::from_name(kind_token).ok_or_else(|| {
            StoreError::CorruptHeader(format!(
                "unknown kind {:?}",
                String::from_utf8_lossy(kind_token)
            ))
        })?;
        let declared = parse_decimal(len_token).ok_or_else(|| {
            StoreError::CorruptHeader(format!(
                "invalid length field {:?}",
                String::from_utf8_lossy(len_token)
            ))
        })?;

        let payload = &raw[nul + 1..];
        if payload.len() != declared {
            return Err(StoreError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        Ok(Self::new(kind, payload.to_vec()))
    }
}

fn parse_decimal(token: &[u8]) -> Option<usize> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// File mode for a tree entry.
///
/// Trees built locally only ever use `Regular` and `Directory`; the other
/// modes exist so trees received in packs can be decoded and listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000).
    Symlink,
    /// Subtree / directory (0o040000).
    Directory,
    /// Submodule commit reference (0o160000).
    Gitlink,
}

impl EntryMode {
    /// Octal mode value.
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Directory => 0o040000,
            Self::Gitlink => 0o160000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o040000 => Some(Self::Directory),
            0o160000 => Some(Self::Gitlink),
            _ => None,
        }
    }

    /// Parse the ASCII octal token used inside tree payloads.
    pub fn from_octal(token: &[u8]) -> Option<Self> {
        if token.is_empty() || !token.iter().all(|b| (b'0'..=b'7').contains(b)) {
            return None;
        }
        let text = std::str::from_utf8(token).ok()?;
        Self::from_mode_bits(u32::from_str_radix(text, 8).ok()?)
    }

    /// The kind of object an entry with this mode points at.
    pub fn target_kind(&self) -> ObjectKind {
        match self {
            Self::Directory => ObjectKind::Tree,
            Self::Gitlink => ObjectKind::Commit,
            _ => ObjectKind::Blob,
        }
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// File mode.
    pub mode: EntryMode,
    /// Entry name as raw bytes (no '/' or NUL).
    pub name: Vec<u8>,
    /// Content-addressed ID of the referenced object.
    pub target: ObjectId,
}

impl TreeEntry {
    /// Create a new tree entry.
    pub fn new(mode: EntryMode, name: impl Into<Vec<u8>>, target: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            target,
        }
    }

    /// A regular-file entry.
    pub fn file(name: impl Into<Vec<u8>>, target: ObjectId) -> Self {
        Self::new(EntryMode::Regular, name, target)
    }

    /// A subdirectory entry.
    pub fn directory(name: impl Into<Vec<u8>>, target: ObjectId) -> Self {
        Self::new(EntryMode::Directory, name, target)
    }

    /// The name for display, with invalid UTF-8 replaced.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// Reject names that would break the tree encoding.
pub fn validate_entry_name(name: &[u8]) -> StoreResult<()> {
    if name.is_empty() || name.contains(&b'/') || name.contains(&0) {
        return Err(StoreError::InvalidEntryName(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }
    Ok(())
}

/// Directory listing object.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Tree {
    /// Entries in serialization order.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a new tree with the given entries.
    ///
    /// Entries are sorted by the raw bytes of their names, so the input
    /// order never affects the serialized form or the id.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort();
        Self { entries }
    }

    /// Create an empty tree.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serialize as `"{mode} {name}\0" + 20 raw id bytes` per entry.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * (OBJECT_ID_LEN + 16));
        for entry in &self.entries {
            // Canonical octal has no leading zero ("40000", not "040000").
            out.extend_from_slice(format!("{:o} ", entry.mode.mode_bits()).as_bytes());
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.target.as_bytes());
        }
        out
    }

    /// Decode a tree payload, keeping the stored entry order.
    pub fn parse(payload: &[u8]) -> Result<Self, TreeParseError> {
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < payload.len() {
            let offset = pos;
            let rest = &payload[pos..];
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or(TreeParseError::MissingMode { offset })?;
            let mode = EntryMode::from_octal(&rest[..space]).ok_or_else(|| {
                TreeParseError::UnknownMode {
                    offset,
                    mode: String::from_utf8_lossy(&rest[..space]).into_owned(),
                }
            })?;
            let nul = rest[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .map(|n| space + 1 + n)
                .ok_or(TreeParseError::UnterminatedName { offset })?;
            let name = rest[space + 1..nul].to_vec();
            let target = rest
                .get(nul + 1..nul + 1 + OBJECT_ID_LEN)
                .and_then(|raw| ObjectId::from_slice(raw).ok())
                .ok_or(TreeParseError::TruncatedId { offset })?;
            entries.push(TreeEntry { mode, name, target });
            pos += nul + 1 + OBJECT_ID_LEN;
        }
        Ok(Self { entries })
    }

    /// Convert into a `GitObject` for storage.
    pub fn to_object(&self) -> GitObject {
        GitObject::new(ObjectKind::Tree, self.serialize())
    }

    /// Decode from a `GitObject`.
    pub fn from_object(obj: &GitObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Tree {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected tree, got {}", obj.kind),
            });
        }
        Self::parse(&obj.payload).map_err(|e| StoreError::CorruptObject {
            id: obj.compute_id(),
            reason: e.to_string(),
        })
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_crypto::ContentHasher;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_raw([byte; 20])
    }

    // -----------------------------------------------------------------------
    // GitObject encoding
    // -----------------------------------------------------------------------

    #[test]
    fn encode_hello_blob() {
        let obj = GitObject::blob(&b"hello"[..]);
        assert_eq!(obj.encode(), b"blob 5\0hello");
        assert_eq!(
            obj.compute_id().to_hex(),
            "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
        );
    }

    #[test]
    fn decode_hello_blob() {
        let obj = GitObject::decode(b"blob 5\0hello", DEFAULT_HEADER_SCAN_LIMIT).unwrap();
        assert_eq!(obj.kind, ObjectKind::Blob);
        assert_eq!(obj.payload, b"hello");
    }

    #[test]
    fn decode_payload_may_contain_nul() {
        let obj = GitObject::new(ObjectKind::Commit, b"a\0b\0c".to_vec());
        let decoded = GitObject::decode(&obj.encode(), DEFAULT_HEADER_SCAN_LIMIT).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn decode_without_nul_is_corrupt_header() {
        let err = GitObject::decode(b"blob 5 hello", DEFAULT_HEADER_SCAN_LIMIT).unwrap_err();
        assert!(matches!(err, StoreError::CorruptHeader(_)));
    }

    #[test]
    fn decode_nul_beyond_scan_window_is_corrupt_header() {
        let mut raw = vec![b'x'; 100];
        raw.push(0);
        let err = GitObject::decode(&raw, DEFAULT_HEADER_SCAN_LIMIT).unwrap_err();
        assert!(matches!(err, StoreError::CorruptHeader(_)));
    }

    #[test]
    fn decode_unknown_kind_is_corrupt_header() {
        let err = GitObject::decode(b"blub 5\0hello", DEFAULT_HEADER_SCAN_LIMIT).unwrap_err();
        assert!(matches!(err, StoreError::CorruptHeader(_)));
    }

    #[test]
    fn decode_non_decimal_length_is_corrupt_header() {
        for raw in [&b"blob +5\0hello"[..], b"blob \0hello", b"blob 5x\0hello", b"blob\0"] {
            let err = GitObject::decode(raw, DEFAULT_HEADER_SCAN_LIMIT).unwrap_err();
            assert!(matches!(err, StoreError::CorruptHeader(_)), "{raw:?}");
        }
    }

    #[test]
    fn decode_length_mismatch() {
        let err = GitObject::decode(b"blob 7\0hello", DEFAULT_HEADER_SCAN_LIMIT).unwrap_err();
        assert!(matches!(
            err,
            StoreError::LengthMismatch {
                declared: 7,
                actual: 5
            }
        ));
    }

    // -----------------------------------------------------------------------
    // Tree
    // -----------------------------------------------------------------------

    #[test]
    fn tree_entries_sorted_by_raw_bytes() {
        let tree = Tree::new(vec![
            TreeEntry::file("zebra.txt", id(1)),
            TreeEntry::file("Alpha.txt", id(2)),
            TreeEntry::directory("middle", id(3)),
            TreeEntry::file("alpha.txt", id(4)),
        ]);
        let names: Vec<_> = tree.entries.iter().map(|e| e.name_lossy().into_owned()).collect();
        assert_eq!(names, ["Alpha.txt", "alpha.txt", "middle", "zebra.txt"]);
    }

    #[test]
    fn tree_serialization_is_order_independent() {
        let a = Tree::new(vec![TreeEntry::file("b", id(1)), TreeEntry::file("a", id(2))]);
        let b = Tree::new(vec![TreeEntry::file("a", id(2)), TreeEntry::file("b", id(1))]);
        assert_eq!(a.serialize(), b.serialize());
        assert_eq!(a.to_object().compute_id(), b.to_object().compute_id());
    }

    #[test]
    fn tree_serialization_layout() {
        let blob = ContentHasher::BLOB.hash(b"hello");
        let tree = Tree::new(vec![TreeEntry::file("hello.txt", blob)]);
        let mut expected = b"100644 hello.txt\0".to_vec();
        expected.extend_from_slice(blob.as_bytes());
        assert_eq!(tree.serialize(), expected);
    }

    #[test]
    fn directory_mode_serializes_without_leading_zero() {
        let tree = Tree::new(vec![TreeEntry::directory("sub", id(9))]);
        assert!(tree.serialize().starts_with(b"40000 sub\0"));
    }

    #[test]
    fn tree_parse_roundtrip_preserves_id() {
        let tree = Tree::new(vec![
            TreeEntry::file("file.txt", id(1)),
            TreeEntry::directory("subdir", id(2)),
        ]);
        let obj = tree.to_object();
        let decoded = Tree::from_object(&obj).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.to_object().compute_id(), obj.compute_id());
    }

    #[test]
    fn tree_parse_accepts_foreign_modes() {
        let mut payload = Vec::new();
        for (mode, name, byte) in [
            ("100755", "run.sh", 1u8),
            ("120000", "link", 2),
            ("040000", "padded", 3),
            ("160000", "module", 4),
        ] {
            payload.extend_from_slice(format!("{mode} {name}\0").as_bytes());
            payload.extend_from_slice(&[byte; 20]);
        }
        let tree = Tree::parse(&payload).unwrap();
        let modes: Vec<_> = tree.entries.iter().map(|e| e.mode).collect();
        assert_eq!(
            modes,
            [
                EntryMode::Executable,
                EntryMode::Symlink,
                EntryMode::Directory,
                EntryMode::Gitlink
            ]
        );
        assert_eq!(tree.get(b"module").unwrap().mode.target_kind(), ObjectKind::Commit);
    }

    #[test]
    fn tree_parse_truncated_id() {
        let mut payload = b"100644 a\0".to_vec();
        payload.extend_from_slice(&[0u8; 10]);
        assert_eq!(
            Tree::parse(&payload),
            Err(TreeParseError::TruncatedId { offset: 0 })
        );
    }

    #[test]
    fn tree_parse_reports_failing_entry() {
        let mut payload = b"100644 a\0".to_vec();
        payload.extend_from_slice(&[1u8; 20]);
        let second = payload.len();
        payload.extend_from_slice(b"777 b\0");
        payload.extend_from_slice(&[2u8; 20]);
        assert_eq!(
            Tree::parse(&payload),
            Err(TreeParseError::UnknownMode { offset: second, mode: "777".into() })
        );

        let mut unterminated = b"100644 a\0".to_vec();
        unterminated.extend_from_slice(&[1u8; 20]);
        unterminated.extend_from_slice(b"100644 b");
        assert_eq!(
            Tree::parse(&unterminated),
            Err(TreeParseError::UnterminatedName { offset: second })
        );
        assert_eq!(
            Tree::parse(b"no-separator"),
            Err(TreeParseError::MissingMode { offset: 0 })
        );
    }

    #[test]
    fn tree_from_non_tree_object() {
        let err = Tree::from_object(&GitObject::blob(&b"not a tree"[..])).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn empty_tree_matches_git() {
        let tree = Tree::empty();
        assert!(tree.is_empty());
        assert_eq!(
            tree.to_object().compute_id().to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn entry_name_validation() {
        assert!(validate_entry_name(b"ok.txt").is_ok());
        for bad in [&b""[..], b"a/b", b"nul\0byte"] {
            assert!(matches!(
                validate_entry_name(bad),
                Err(StoreError::InvalidEntryName(_))
            ));
        }
    }

    #[test]
    fn entry_mode_bits_roundtrip() {
        for mode in [
            EntryMode::Regular,
            EntryMode::Executable,
            EntryMode::Symlink,
            EntryMode::Directory,
            EntryMode::Gitlink,
        ] {
            assert_eq!(EntryMode::from_mode_bits(mode.mode_bits()), Some(mode));
        }
        assert!(EntryMode::from_mode_bits(0o777).is_none());
        assert!(EntryMode::from_octal(b"10064x").is_none());
    }

    #[test]
    fn entry_mode_display_is_six_digits() {
        assert_eq!(EntryMode::Directory.to_string(), "040000");
        assert_eq!(EntryMode::Regular.to_string(), "100644");
    }
}
