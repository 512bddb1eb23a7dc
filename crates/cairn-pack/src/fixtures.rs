//! Pack and delta encoders used to drive the reader in tests.

use std::io::Write;

use cairn_crypto::ContentHasher;
use cairn_types::{ObjectId, ObjectKind};
use flate2::write::ZlibEncoder;
use flate2::Compression;

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Variable-length `(type, size)` entry header.
pub fn entry_header(code: u8, size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = (code << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest != 0 {
        out.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(byte);
    out
}

/// Encoded distance from an ofs-delta entry back to its base.
pub fn ofs_distance(distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & 0x7f) as u8];
    let mut rest = distance >> 7;
    while rest != 0 {
        rest -= 1;
        out.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.reverse();
    out
}

fn kind_code(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
        ObjectKind::Tag => 4,
    }
}

/// Assembles a pack: header, entries, SHA-1 trailer.
pub struct PackBuilder {
    version: u32,
    count: Option<u32>,
    body: Vec<u8>,
    entries: u32,
}

impl PackBuilder {
    pub fn new() -> Self {
        Self {
            version: 2,
            count: None,
            body: Vec::new(),
            entries: 0,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Override the entry count written to the header.
    pub fn declared_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Offset the next entry will start at.
    fn next_offset(&self) -> u64 {
        12 + self.body.len() as u64
    }

    /// Append a full object; returns its pack offset.
    pub fn object(&mut self, kind: ObjectKind, payload: &[u8]) -> u64 {
        self.raw(kind_code(kind), payload.len() as u64, &[], &compress(payload))
    }

    /// Append a delta against the entry at `base_offset`.
    pub fn ofs_delta(&mut self, base_offset: u64, delta: &[u8]) -> u64 {
        let distance = self.next_offset() - base_offset;
        self.raw(6, delta.len() as u64, &ofs_distance(distance), &compress(delta))
    }

    /// Append a delta against the object `base`.
    pub fn ref_delta(&mut self, base: ObjectId, delta: &[u8]) -> u64 {
        self.raw(7, delta.len() as u64, base.as_bytes(), &compress(delta))
    }

    /// Append an entry from its parts, unchecked.
    pub fn raw(&mut self, code: u8, size: u64, extra: &[u8], stream: &[u8]) -> u64 {
        let offset = self.next_offset();
        self.body.extend(entry_header(code, size));
        self.body.extend_from_slice(extra);
        self.body.extend_from_slice(stream);
        self.entries += 1;
        offset
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut pack = b"PACK".to_vec();
        pack.extend_from_slice(&self.version.to_be_bytes());
        pack.extend_from_slice(&self.count.unwrap_or(self.entries).to_be_bytes());
        pack.extend_from_slice(&self.body);
        let trailer = ContentHasher::raw_hash(&pack);
        pack.extend_from_slice(&trailer);
        pack
    }
}

/// Builds delta instruction streams.
pub struct DeltaBuilder {
    base_len: usize,
    result_len: usize,
    ops: Vec<u8>,
}

impl DeltaBuilder {
    pub fn new(base_len: usize) -> Self {
        Self {
            base_len,
            result_len: 0,
            ops: Vec::new(),
        }
    }

    pub fn copy(mut self, offset: usize, size: usize) -> Self {
        let mut op = 0x80u8;
        let mut args = Vec::new();
        for i in 0..4 {
            let byte = (offset >> (8 * i)) as u8;
            if byte != 0 {
                op |= 1 << i;
                args.push(byte);
            }
        }
        let encoded_size = if size == 0x10000 { 0 } else { size };
        for i in 0..3 {
            let byte = (encoded_size >> (8 * i)) as u8;
            if byte != 0 {
                op |= 1 << (4 + i);
                args.push(byte);
            }
        }
        self.ops.push(op);
        self.ops.extend(args);
        self.result_len += size;
        self
    }

    pub fn insert(mut self, literal: &[u8]) -> Self {
        for chunk in literal.chunks(0x7f) {
            self.ops.push(chunk.len() as u8);
            self.ops.extend_from_slice(chunk);
        }
        self.result_len += literal.len();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = varint(self.base_len as u64);
        out.extend(varint(self.result_len as u64));
        out.extend(self.ops);
        out
    }
}

fn varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
