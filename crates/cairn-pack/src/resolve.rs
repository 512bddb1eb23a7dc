use std::collections::HashMap;

use cairn_crypto::compute_id;
use cairn_store::{GitObject, ObjectStore, StoreError};
use cairn_types::{ObjectId, ObjectKind};
use tracing::debug;

use crate::config::PackConfig;
use crate::delta::apply_delta;
use crate::entry::{BaseRef, PackEntry, UnpackedObject};
use crate::error::{PackError, PackResult};

/// A fully reconstructed pack object and where its entry sat in the pack.
#[derive(Debug)]
pub(crate) struct ResolvedObject {
    pub id: ObjectId,
    pub object: GitObject,
    pub depth: usize,
    pub offset: u64,
    pub packed_size: u64,
}

/// Base bytes a pending delta can be applied to.
struct Base<'r> {
    kind: ObjectKind,
    payload: &'r [u8],
    depth: usize,
}

/// Resolve every entry of a pack, in pack order.
///
/// Full entries resolve immediately. Deltas are retried in rounds until a
/// round makes no progress, so a ref-delta may name a base that appears
/// later in the pack or that already lives in `store`. The store is only
/// read, never written. Full entries hand their data over to the resolved
/// objects, so `entries` is consumed.
pub(crate) fn resolve_entries<S: ObjectStore + ?Sized>(
    mut entries: Vec<PackEntry>,
    store: &S,
    config: &PackConfig,
) -> PackResult<Vec<ResolvedObject>> {
    let by_offset: HashMap<u64, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.offset, i))
        .collect();

    let mut resolved: Vec<Option<ResolvedObject>> = Vec::with_capacity(entries.len());
    let mut by_id: HashMap<ObjectId, usize> = HashMap::new();
    let mut pending = Vec::new();

    for (i, entry) in entries.iter_mut().enumerate() {
        match entry.kind.object_kind() {
            Some(kind) => {
                let payload = std::mem::take(&mut entry.data);
                let id = compute_id(kind, &payload);
                by_id.entry(id).or_insert(i);
                resolved.push(Some(ResolvedObject {
                    id,
                    object: GitObject::new(kind, payload),
                    depth: 0,
                    offset: entry.offset,
                    packed_size: entry.packed_size,
                }));
            }
            None => {
                resolved.push(None);
                pending.push(i);
            }
        }
    }

    // Store bases are looked up once; `None` records a miss.
    let mut external: HashMap<ObjectId, Option<(ObjectKind, Vec<u8>)>> = HashMap::new();
    let mut round = 0usize;

    while !pending.is_empty() {
        round += 1;
        let before = pending.len();
        let mut still_pending = Vec::new();

        for &i in &pending {
            let entry = &entries[i];
            let Some(base_ref) = entry.base else {
                continue;
            };

            let base_index = match base_ref {
                BaseRef::Offset(offset) => Some(*by_offset.get(&offset).ok_or_else(|| {
                    PackError::corrupt(entry.offset, format!("no entry at base offset {offset}"))
                })?),
                BaseRef::Id(id) => by_id.get(&id).copied(),
            };

            let outcome = {
                let base = match base_index {
                    Some(b) => resolved[b].as_ref().map(|r| Base {
                        kind: r.object.kind,
                        payload: &r.object.payload,
                        depth: r.depth,
                    }),
                    None => match base_ref {
                        BaseRef::Id(id) => lookup_external(store, &mut external, id)?,
                        BaseRef::Offset(_) => None,
                    },
                };
                match base {
                    Some(base) => Some(apply(entry, base, config)?),
                    None => None,
                }
            };

            match outcome {
                Some(object) => {
                    by_id.entry(object.id).or_insert(i);
                    resolved[i] = Some(object);
                }
                None => still_pending.push(i),
            }
        }

        debug!(
            round,
            resolved = before - still_pending.len(),
            pending = still_pending.len(),
            "delta resolution round"
        );

        if still_pending.len() == before {
            let entry = &entries[still_pending[0]];
            return Err(PackError::DeltaBaseMissing {
                offset: entry.offset,
                base: entry
                    .base
                    .unwrap_or(BaseRef::Offset(entry.offset)),
            });
        }
        pending = still_pending;
    }

    Ok(resolved.into_iter().flatten().collect())
}

fn lookup_external<'r, S: ObjectStore + ?Sized>(
    store: &S,
    cache: &'r mut HashMap<ObjectId, Option<(ObjectKind, Vec<u8>)>>,
    id: ObjectId,
) -> PackResult<Option<Base<'r>>> {
    if !cache.contains_key(&id) {
        let found = match store.read(&id) {
            Ok(object) => Some((object.kind, object.payload)),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        debug!(base = %id, found = found.is_some(), "looked up delta base in store");
        cache.insert(id, found);
    }
    Ok(cache.get(&id).and_then(|found| {
        found.as_ref().map(|(kind, payload)| Base {
            kind: *kind,
            payload,
            depth: 0,
        })
    }))
}

fn apply(entry: &PackEntry, base: Base<'_>, config: &PackConfig) -> PackResult<ResolvedObject> {
    let depth = base.depth + 1;
    if depth > config.max_delta_depth {
        return Err(PackError::corrupt(
            entry.offset,
            format!("delta chain deeper than {}", config.max_delta_depth),
        ));
    }
    let payload = apply_delta(base.payload, &entry.data)
        .map_err(|e| PackError::corrupt(entry.offset, e.to_string()))?;
    Ok(ResolvedObject {
        id: compute_id(base.kind, &payload),
        object: GitObject::new(base.kind, payload),
        depth,
        offset: entry.offset,
        packed_size: entry.packed_size,
    })
}

/// Per-object records, in pack order.
pub(crate) fn summarize(resolved: &[ResolvedObject]) -> Vec<UnpackedObject> {
    resolved
        .iter()
        .map(|r| UnpackedObject {
            id: r.id,
            kind: r.object.kind,
            size: r.object.size() as u64,
            packed_size: r.packed_size,
            offset: r.offset,
            depth: r.depth,
        })
        .collect()
}
