//! Delta instruction application.
//!
//! A delta payload opens with two little-endian base-128 varints, the base
//! size and the result size, followed by instructions:
//!
//! - `1xxxxxxx`: copy from the base. Bits 0-3 flag which of four offset
//!   bytes follow, bits 4-6 which of three size bytes follow, both
//!   little-endian. A size of zero means `0x10000`.
//! - `0nnnnnnn` with `n > 0`: insert the next `n` literal bytes.
//! - `00000000`: reserved.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("truncated delta header")]
    TruncatedHeader,

    #[error("delta expects a {expected}-byte base, got {actual} bytes")]
    BaseSizeMismatch { expected: u64, actual: u64 },

    #[error("delta produced {actual} bytes, header declares {expected}")]
    ResultSizeMismatch { expected: u64, actual: u64 },

    #[error("copy of {size} bytes at {offset} exceeds {base_len}-byte base")]
    CopyOutOfRange {
        offset: u64,
        size: u64,
        base_len: u64,
    },

    #[error("truncated instruction at delta byte {0}")]
    TruncatedInstruction(usize),

    #[error("reserved instruction 0x00 at delta byte {0}")]
    ReservedInstruction(usize),
}

/// Apply `delta` to `base`, returning the reconstructed bytes.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let mut pos = 0;
    let base_size = read_size(delta, &mut pos)?;
    let result_size = read_size(delta, &mut pos)?;

    if base_size != base.len() as u64 {
        return Err(DeltaError::BaseSizeMismatch {
            expected: base_size,
            actual: base.len() as u64,
        });
    }

    let mut out = Vec::with_capacity(result_size.min(1 << 24) as usize);
    while pos < delta.len() {
        let op_at = pos;
        let op = delta[pos];
        pos += 1;

        if op & 0x80 != 0 {
            let offset = read_sparse(delta, &mut pos, op, 0, 4, op_at)?;
            let mut size = read_sparse(delta, &mut pos, op, 4, 3, op_at)?;
            if size == 0 {
                size = 0x10000;
            }
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len() as u64)
                .ok_or(DeltaError::CopyOutOfRange {
                    offset,
                    size,
                    base_len: base.len() as u64,
                })?;
            out.extend_from_slice(&base[offset as usize..end as usize]);
        } else if op != 0 {
            let end = pos + usize::from(op);
            let literal = delta
                .get(pos..end)
                .ok_or(DeltaError::TruncatedInstruction(op_at))?;
            out.extend_from_slice(literal);
            pos = end;
        } else {
            return Err(DeltaError::ReservedInstruction(op_at));
        }
    }

    if out.len() as u64 != result_size {
        return Err(DeltaError::ResultSizeMismatch {
            expected: result_size,
            actual: out.len() as u64,
        });
    }
    Ok(out)
}

fn read_size(delta: &[u8], pos: &mut usize) -> Result<u64, DeltaError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *delta.get(*pos).ok_or(DeltaError::TruncatedHeader)?;
        *pos += 1;
        if shift > 63 {
            return Err(DeltaError::TruncatedHeader);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Read up to `count` little-endian bytes, present only where `op` has the
/// corresponding flag bit (starting at `first_bit`) set.
fn read_sparse(
    delta: &[u8],
    pos: &mut usize,
    op: u8,
    first_bit: u32,
    count: u32,
    op_at: usize,
) -> Result<u64, DeltaError> {
    let mut value = 0u64;
    for i in 0..count {
        if op & (1 << (first_bit + i)) != 0 {
            let byte = *delta
                .get(*pos)
                .ok_or(DeltaError::TruncatedInstruction(op_at))?;
            *pos += 1;
            value |= u64::from(byte) << (8 * i);
        }
    }
    Ok(value)
}
