use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use cairn_types::ObjectId;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::GitObject;
use crate::traits::ObjectStore;

/// Filesystem object store using the loose-object layout.
///
/// Each object lives at `objects/{id[0:2]}/{id[2:40]}` as the zlib stream of
/// its canonical encoding. Writes go to a temporary file in the fan-out
/// directory and are linked into place without clobbering, so concurrent
/// writers of the same id race harmlessly and readers never see a torn file.
#[derive(Clone, Debug)]
pub struct LooseObjectStore {
    config: StoreConfig,
}

impl LooseObjectStore {
    /// Create a store over an existing or yet-to-be-created objects directory.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Open with default settings over `objects_dir`.
    pub fn open(objects_dir: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig {
            objects_dir: objects_dir.into(),
            ..Default::default()
        })
    }

    /// Create the objects directory if needed and return the store.
    pub fn init(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.objects_dir)?;
        Ok(Self::new(config))
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Root of the fan-out directories.
    pub fn objects_dir(&self) -> &Path {
        &self.config.objects_dir
    }

    /// Path at which `id` is (or would be) stored.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (dir, file) = id.fan_out();
        self.config.objects_dir.join(dir).join(file)
    }

    /// List every object id present, sorted.
    ///
    /// Entries that do not look like object files are skipped.
    pub fn list_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let root = &self.config.objects_dir;
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let prefix = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy());
            let Some(prefix) = prefix.filter(|p| p.len() == 2) else {
                continue;
            };
            let rest = entry.file_name().to_string_lossy();
            if let Ok(id) = ObjectId::from_hex(&format!("{prefix}{rest}")) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn compress(&self, raw: &[u8], dir: &Path) -> io::Result<NamedTempFile> {
        let tmp = NamedTempFile::new_in(dir)?;
        let mut encoder = ZlibEncoder::new(tmp, Compression::new(self.config.compression_level));
        encoder.write_all(raw)?;
        encoder.finish()
    }
}

impl ObjectStore for LooseObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<GitObject> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(*id)),
            Err(e) => return Err(e.into()),
        };

        let mut raw = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|e| StoreError::DecompressionFailure(format!("{id}: {e}")))?;

        GitObject::decode(&raw, self.config.header_scan_limit)
    }

    fn write(&self, object: &GitObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.is_file() {
            debug!(id = %id, "object already present");
            return Ok(id);
        }

        let dir = path
            .parent()
            .unwrap_or(&self.config.objects_dir)
            .to_path_buf();
        // create_dir_all treats a directory created concurrently as success.
        fs::create_dir_all(&dir).map_err(|source| StoreError::WriteFailure {
            path: dir.clone(),
            source,
        })?;

        let tmp = self
            .compress(&object.encode(), &dir)
            .map_err(|source| StoreError::WriteFailure {
                path: path.clone(),
                source,
            })?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(id = %id, kind = %object.kind, size = object.size(), "object written");
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(id = %id, "object written concurrently by another writer");
            }
            Err(e) => {
                return Err(StoreError::WriteFailure {
                    path,
                    source: e.error,
                })
            }
        }
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        match fs::metadata(self.object_path(id)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
