use std::collections::HashSet;
use std::io::Read;

use cairn_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{validate_entry_name, GitObject, Tree, TreeEntry};
use crate::snapshot::Snapshot;
use crate::traits::ObjectStore;

/// Options controlling which snapshot entries become tree entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Entry names skipped at every directory level.
    pub ignore: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            ignore: vec![".git".into()],
        }
    }
}

impl BuildOptions {
    fn is_ignored(&self, name: &[u8]) -> bool {
        self.ignore.iter().any(|i| i.as_bytes() == name)
    }
}

/// Writes a directory snapshot into an object store, bottom-up.
///
/// Every file becomes a blob with mode `100644`, every subdirectory a tree
/// with mode `40000`. Executable bits and symbolic links are not
/// distinguished; both are stored as regular files.
pub struct TreeBuilder<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    options: BuildOptions,
}

impl<'a, S: ObjectStore + ?Sized> TreeBuilder<'a, S> {
    /// Builder with default options.
    pub fn new(store: &'a S) -> Self {
        Self::with_options(store, BuildOptions::default())
    }

    pub fn with_options(store: &'a S, options: BuildOptions) -> Self {
        Self { store, options }
    }

    /// Build the tree for `snapshot` and return the root tree id.
    pub fn build(&self, snapshot: &dyn Snapshot) -> StoreResult<ObjectId> {
        let root = self.build_level(snapshot, 0)?;
        debug!(root = %root, "tree built");
        Ok(root)
    }

    fn build_level(&self, snapshot: &dyn Snapshot, depth: usize) -> StoreResult<ObjectId> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for item in snapshot.list()? {
            if self.options.is_ignored(&item.name) {
                continue;
            }
            validate_entry_name(&item.name)?;
            if !seen.insert(item.name.clone()) {
                return Err(StoreError::InvalidEntryName(format!(
                    "duplicate entry {}",
                    String::from_utf8_lossy(&item.name)
                )));
            }

            if item.is_dir {
                let child = snapshot.descend(&item.name)?;
                let id = self.build_level(child.as_ref(), depth + 1)?;
                entries.push(TreeEntry::directory(item.name, id));
            } else {
                let mut content = Vec::new();
                snapshot
                    .open(&item.name)?
                    .read_to_end(&mut content)
                    .map_err(|source| StoreError::Snapshot {
                        path: String::from_utf8_lossy(&item.name).into_owned(),
                        source,
                    })?;
                let id = self.store.write(&GitObject::blob(content))?;
                entries.push(TreeEntry::file(item.name, id));
            }
        }

        let tree = Tree::new(entries);
        let id = self.store.write(&tree.to_object())?;
        debug!(tree = %id, depth, entries = tree.len(), "tree level written");
        Ok(id)
    }
}

/// Build and store the tree for `snapshot` with default options.
pub fn build_tree<S: ObjectStore + ?Sized>(
    store: &S,
    snapshot: &dyn Snapshot,
) -> StoreResult<ObjectId> {
    TreeBuilder::new(store).build(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::loose::LooseObjectStore;
    use crate::memory::InMemoryObjectStore;
    use crate::object::EntryMode;
    use crate::snapshot::{FsSnapshot, MemorySnapshot};
    use cairn_crypto::ContentHasher;
    use cairn_types::ObjectKind;

    fn read_tree(store: &dyn ObjectStore, id: &ObjectId) -> Tree {
        Tree::from_object(&store.read(id).unwrap()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    #[test]
    fn single_file_tree() {
        let store = InMemoryObjectStore::new();
        let snap = MemorySnapshot::new().file("hello.txt", "hello");
        let root = build_tree(&store, &snap).unwrap();

        let tree = read_tree(&store, &root);
        assert_eq!(tree.len(), 1);
        let entry = tree.get(b"hello.txt").unwrap();
        assert_eq!(entry.mode, EntryMode::Regular);
        assert_eq!(entry.target, ContentHasher::BLOB.hash(b"hello"));
        assert_eq!(store.read(&entry.target).unwrap().payload, b"hello");
    }

    #[test]
    fn nested_directories_become_subtrees() {
        let store = InMemoryObjectStore::new();
        let snap = MemorySnapshot::new()
            .file("README", "top")
            .dir(
                "src",
                MemorySnapshot::new()
                    .file("main.rs", "fn main() {}")
                    .dir("util", MemorySnapshot::new().file("mod.rs", "")),
            );
        let root = build_tree(&store, &snap).unwrap();

        let top = read_tree(&store, &root);
        let src = top.get(b"src").unwrap();
        assert_eq!(src.mode, EntryMode::Directory);
        assert_eq!(store.read(&src.target).unwrap().kind, ObjectKind::Tree);

        let src_tree = read_tree(&store, &src.target);
        let util = read_tree(&store, &src_tree.get(b"util").unwrap().target);
        assert_eq!(
            util.get(b"mod.rs").unwrap().target,
            ContentHasher::BLOB.hash(b"")
        );
        // 3 blobs + 3 trees
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn input_order_does_not_change_root() {
        let store = InMemoryObjectStore::new();
        let forward = MemorySnapshot::new().file("a", "1").file("b", "2");
        let reverse = MemorySnapshot::new().file("b", "2").file("a", "1");
        assert_eq!(
            build_tree(&store, &forward).unwrap(),
            build_tree(&store, &reverse).unwrap()
        );
    }

    #[test]
    fn empty_snapshot_is_empty_tree() {
        let store = InMemoryObjectStore::new();
        let root = build_tree(&store, &MemorySnapshot::new()).unwrap();
        assert_eq!(root.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn matches_git_for_known_layout() {
        // `git write-tree` of a directory holding hello.txt = "hello".
        let store = InMemoryObjectStore::new();
        let root = build_tree(&store, &MemorySnapshot::new().file("hello.txt", "hello")).unwrap();
        let mut payload = b"100644 hello.txt\0".to_vec();
        payload.extend_from_slice(ContentHasher::BLOB.hash(b"hello").as_bytes());
        assert_eq!(root, ContentHasher::TREE.hash(&payload));
    }

    // -----------------------------------------------------------------------
    // Options and validation
    // -----------------------------------------------------------------------

    #[test]
    fn git_dir_ignored_by_default() {
        let store = InMemoryObjectStore::new();
        let with_git = MemorySnapshot::new()
            .file("a", "1")
            .dir(".git", MemorySnapshot::new().file("HEAD", "ref"));
        let without = MemorySnapshot::new().file("a", "1");
        assert_eq!(
            build_tree(&store, &with_git).unwrap(),
            build_tree(&store, &without).unwrap()
        );
    }

    #[test]
    fn custom_ignore_list() {
        let store = InMemoryObjectStore::new();
        let options = BuildOptions {
            ignore: vec!["target".into()],
        };
        let snap = MemorySnapshot::new()
            .file("keep", "k")
            .dir("target", MemorySnapshot::new().file("junk", "j"));
        let root = TreeBuilder::with_options(&store, options)
            .build(&snap)
            .unwrap();
        let tree = read_tree(&store, &root);
        assert!(tree.get(b"target").is_none());
        assert!(tree.get(b"keep").is_some());
    }

    #[test]
    fn invalid_names_rejected() {
        let store = InMemoryObjectStore::new();
        let snap = MemorySnapshot::new().file("a/b", "x");
        assert!(matches!(
            build_tree(&store, &snap),
            Err(StoreError::InvalidEntryName(_))
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let store = InMemoryObjectStore::new();
        let snap = MemorySnapshot::new().file("a", "1").file("a", "2");
        assert!(matches!(
            build_tree(&store, &snap),
            Err(StoreError::InvalidEntryName(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Filesystem
    // -----------------------------------------------------------------------

    #[test]
    fn filesystem_snapshot_into_loose_store() {
        let work = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join("b.txt"), b"bravo").unwrap();
        std::fs::write(work.path().join("a.txt"), b"alpha").unwrap();
        std::fs::create_dir(work.path().join("dir")).unwrap();
        std::fs::write(work.path().join("dir").join("c.txt"), b"charlie").unwrap();
        std::fs::create_dir(work.path().join(".git")).unwrap();

        let store = LooseObjectStore::init(StoreConfig::for_git_dir(&work.path().join(".git")))
            .unwrap();
        let root = build_tree(&store, &FsSnapshot::new(work.path())).unwrap();

        let expected = build_tree(
            &InMemoryObjectStore::new(),
            &MemorySnapshot::new()
                .file("a.txt", "alpha")
                .file("b.txt", "bravo")
                .dir("dir", MemorySnapshot::new().file("c.txt", "charlie")),
        )
        .unwrap();
        assert_eq!(root, expected);

        let names: Vec<_> = read_tree(&store, &root)
            .entries
            .iter()
            .map(|e| e.name_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "dir"]);
    }
}
