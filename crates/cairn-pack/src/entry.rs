use std::fmt;
use std::io::Read;

use cairn_types::{ObjectId, ObjectKind, OBJECT_ID_LEN};
use flate2::bufread::ZlibDecoder;
use serde::Serialize;

use crate::error::{PackError, PackResult};

/// Type tag of a pack entry, as stored in bits 4-6 of its first header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PackObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
    /// Delta against an entry earlier in the same pack.
    OfsDelta,
    /// Delta against an object named by id.
    RefDelta,
}

impl PackObjectType {
    /// Parse a 3-bit type code. Codes 0 and 5 are reserved.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            6 => Some(Self::OfsDelta),
            7 => Some(Self::RefDelta),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
            Self::OfsDelta => 6,
            Self::RefDelta => 7,
        }
    }

    /// The object kind for full entries, `None` for deltas.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Tag => Some(ObjectKind::Tag),
            Self::OfsDelta | Self::RefDelta => None,
        }
    }
}

/// Where a delta entry finds its base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseRef {
    /// Absolute pack offset of the base entry.
    Offset(u64),
    /// Object id of the base, in this pack or already in the store.
    Id(ObjectId),
}

impl fmt::Display for BaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset(offset) => write!(f, "at offset {offset}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// One decoded, still possibly delta-encoded, pack entry.
#[derive(Clone, Debug)]
pub struct PackEntry {
    /// Offset of the entry's first header byte within the pack.
    pub offset: u64,
    pub kind: PackObjectType,
    /// Inflated length declared by the entry header.
    pub declared_size: u64,
    /// Inflated entry data: the object payload, or delta instructions.
    pub data: Vec<u8>,
    /// Bytes the entry occupies in the pack, header included.
    pub packed_size: u64,
    /// Base reference for delta entries.
    pub base: Option<BaseRef>,
}

impl PackEntry {
    pub fn is_delta(&self) -> bool {
        self.base.is_some()
    }
}

/// Decode the entry starting at `offset`. `body` is the pack without its
/// trailer; returns the entry and the offset just past it.
pub(crate) fn decode_entry(body: &[u8], offset: u64) -> PackResult<(PackEntry, u64)> {
    let start = usize::try_from(offset)
        .map_err(|_| PackError::corrupt(offset, "entry offset out of range"))?;
    let mut pos = start;

    let mut byte = next_byte(body, &mut pos, offset)?;
    let code = (byte >> 4) & 0x07;
    let kind = PackObjectType::from_code(code)
        .ok_or(PackError::UnknownObjectType { offset, code })?;

    let mut declared_size = u64::from(byte & 0x0f);
    let mut shift = 4u32;
    while byte & 0x80 != 0 {
        byte = next_byte(body, &mut pos, offset)?;
        if shift > 57 {
            return Err(PackError::corrupt(offset, "entry size overflows 64 bits"));
        }
        declared_size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    let base = match kind {
        PackObjectType::OfsDelta => {
            let distance = decode_base_distance(body, &mut pos, offset)?;
            let base_offset = offset
                .checked_sub(distance)
                .filter(|_| distance != 0)
                .ok_or_else(|| {
                    PackError::corrupt(offset, format!("invalid base distance {distance}"))
                })?;
            Some(BaseRef::Offset(base_offset))
        }
        PackObjectType::RefDelta => {
            let end = pos + OBJECT_ID_LEN;
            let raw = body
                .get(pos..end)
                .ok_or_else(|| PackError::corrupt(offset, "truncated base id"))?;
            pos = end;
            let id = ObjectId::from_slice(raw)
                .map_err(|e| PackError::corrupt(offset, e.to_string()))?;
            Some(BaseRef::Id(id))
        }
        _ => None,
    };

    let (data, consumed) = inflate(&body[pos..], offset, declared_size)?;
    pos += consumed;

    if data.len() as u64 != declared_size {
        return Err(PackError::corrupt(
            offset,
            format!(
                "declared size {declared_size} but inflated {} bytes",
                data.len()
            ),
        ));
    }

    let next = pos as u64;
    let entry = PackEntry {
        offset,
        kind,
        declared_size,
        data,
        packed_size: next - offset,
        base,
    };
    Ok((entry, next))
}

fn next_byte(body: &[u8], pos: &mut usize, offset: u64) -> PackResult<u8> {
    let byte = *body
        .get(*pos)
        .ok_or_else(|| PackError::corrupt(offset, "truncated entry header"))?;
    *pos += 1;
    Ok(byte)
}

/// Big-endian base-128 distance with the "+1 per continuation" bias that
/// makes every encoding length cover a distinct range.
fn decode_base_distance(body: &[u8], pos: &mut usize, offset: u64) -> PackResult<u64> {
    let mut byte = next_byte(body, pos, offset)?;
    let mut distance = u64::from(byte & 0x7f);
    while byte & 0x80 != 0 {
        byte = next_byte(body, pos, offset)?;
        distance = distance
            .checked_add(1)
            .and_then(|d| d.checked_mul(128))
            .map(|d| d | u64::from(byte & 0x7f))
            .ok_or_else(|| PackError::corrupt(offset, "base distance overflows 64 bits"))?;
    }
    Ok(distance)
}

/// Inflate one zlib stream from the front of `input`, returning the data and
/// the number of compressed bytes the stream occupied. Output is capped one
/// byte past `declared_size`, so an entry can never inflate further than its
/// header claims.
fn inflate(input: &[u8], offset: u64, declared_size: u64) -> PackResult<(Vec<u8>, usize)> {
    let mut decoder = ZlibDecoder::new(input);
    let mut data = Vec::new();
    decoder
        .by_ref()
        .take(declared_size.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| PackError::DecompressionFailure {
            offset,
            reason: e.to_string(),
        })?;
    if data.len() as u64 > declared_size {
        return Err(PackError::corrupt(
            offset,
            format!("stream inflates past declared size {declared_size}"),
        ));
    }
    Ok((data, decoder.total_in() as usize))
}

/// Summary of one resolved pack object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnpackedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Payload length after delta resolution.
    pub size: u64,
    /// Bytes the entry occupies in the pack.
    pub packed_size: u64,
    pub offset: u64,
    /// Number of delta links to the full base; 0 for full entries.
    pub depth: usize,
}
