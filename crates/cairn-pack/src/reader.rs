use cairn_crypto::ContentHasher;
use cairn_store::ObjectStore;
use cairn_types::OBJECT_ID_LEN;
use tracing::{debug, info};

use crate::config::PackConfig;
use crate::entry::{decode_entry, PackEntry, UnpackedObject};
use crate::error::{PackError, PackResult};
use crate::resolve::{resolve_entries, summarize, ResolvedObject};

/// Magic bytes opening every pack.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";

const HEADER_LEN: usize = 12;

/// Fixed pack header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u32,
    pub count: u32,
}

impl PackHeader {
    /// Parse and validate the 12-byte header.
    pub fn parse(data: &[u8]) -> PackResult<Self> {
        let header = data
            .get(..HEADER_LEN)
            .ok_or_else(|| PackError::CorruptHeader(format!("pack is only {} bytes", data.len())))?;
        if &header[0..4] != PACK_SIGNATURE {
            return Err(PackError::CorruptHeader(format!(
                "bad signature {:?}",
                String::from_utf8_lossy(&header[0..4])
            )));
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != 2 && version != 3 {
            return Err(PackError::UnsupportedVersion(version));
        }
        let count = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        Ok(Self { version, count })
    }
}

/// Decodes packfiles and persists their objects into an object store.
///
/// Unpacking runs in strict phases: the header and every entry are decoded,
/// then all deltas are resolved, and only then is anything written. A pack
/// that fails any phase leaves the store untouched.
pub struct PackReader<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    config: PackConfig,
}

impl<'a, S: ObjectStore + ?Sized> PackReader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, PackConfig::default())
    }

    pub fn with_config(store: &'a S, config: PackConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Decode and resolve `data` without writing to the store.
    pub fn inspect(&self, data: &[u8]) -> PackResult<Vec<UnpackedObject>> {
        let resolved = self.decode_and_resolve(data)?;
        Ok(summarize(&resolved))
    }

    /// Decode, resolve and persist every object in `data`.
    pub fn unpack(&self, data: &[u8]) -> PackResult<Vec<UnpackedObject>> {
        let resolved = self.decode_and_resolve(data)?;
        self.persist(&resolved)?;
        Ok(summarize(&resolved))
    }

    fn decode_and_resolve(&self, data: &[u8]) -> PackResult<Vec<ResolvedObject>> {
        let entries = self.decode_entries(data)?;
        resolve_entries(entries, self.store, &self.config)
    }

    /// Header and entry phases.
    fn decode_entries(&self, data: &[u8]) -> PackResult<Vec<PackEntry>> {
        let header = PackHeader::parse(data)?;
        info!(version = header.version, count = header.count, "reading pack");

        if data.len() < HEADER_LEN + OBJECT_ID_LEN {
            return Err(PackError::CorruptHeader("pack has no trailer".into()));
        }
        let body_end = data.len() - OBJECT_ID_LEN;
        if self.config.verify_trailer {
            let expected = &data[body_end..];
            let actual = ContentHasher::raw_hash(&data[..body_end]);
            if actual.as_slice() != expected {
                return Err(PackError::CorruptHeader("trailer checksum mismatch".into()));
            }
        }

        let body = &data[..body_end];
        let mut entries = Vec::with_capacity((header.count as usize).min(1 << 16));
        let mut offset = HEADER_LEN as u64;
        for _ in 0..header.count {
            if offset >= body_end as u64 {
                return Err(PackError::corrupt(
                    offset,
                    format!(
                        "pack ends after {} of {} entries",
                        entries.len(),
                        header.count
                    ),
                ));
            }
            let (entry, next) = decode_entry(body, offset)?;
            debug!(
                offset,
                kind = ?entry.kind,
                size = entry.declared_size,
                "decoded pack entry"
            );
            entries.push(entry);
            offset = next;
        }

        if offset != body_end as u64 {
            return Err(PackError::corrupt(
                offset,
                format!("{} unexpected bytes before trailer", body_end as u64 - offset),
            ));
        }
        Ok(entries)
    }

    /// Persist phase. Runs only once every entry has resolved.
    fn persist(&self, resolved: &[ResolvedObject]) -> PackResult<()> {
        for r in resolved {
            let written = self.store.write(&r.object)?;
            debug_assert_eq!(written, r.id);
        }
        info!(objects = resolved.len(), "pack unpacked");
        Ok(())
    }
}
