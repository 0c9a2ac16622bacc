//! Footer index (`spec.md` §4.J, §4.H "Random access"): one entry per
//! block, written after all block bodies when `INDEXED` is set, enabling
//! O(log blocks) seeks to any row range without decoding the whole file.

use cast_bytes::{read_varint, write_varint, CastError, Result};

pub const FOOTER_MAGIC: u32 = 0x494E_4458; // "INDX"

/// One block's entry in the footer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterEntry {
    pub compressed_offset: u64,
    pub compressed_length: u64,
    /// 1-based row index of this block's first row.
    pub first_row_index: u64,
    pub row_count: u64,
}

impl FooterEntry {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.compressed_offset.to_le_bytes());
        write_varint(self.compressed_length, out);
        write_varint(self.first_row_index, out);
        write_varint(self.row_count, out);
    }
}

/// Serializes the full footer (entry table, fixed-width length, magic) as
/// it should appear at the tail of the container.
pub fn write_footer(entries: &[FooterEntry], out: &mut Vec<u8>) {
    let start = out.len();
    write_varint(entries.len() as u64, out);
    for entry in entries {
        entry.write(out);
    }
    let footer_length = (out.len() - start) as u64;
    out.extend_from_slice(&footer_length.to_le_bytes());
    out.extend_from_slice(&FOOTER_MAGIC.to_le_bytes());
}

/// Parses a footer from `tail`, which must be exactly the bytes from the
/// footer's start to end of file (the caller locates this by reading the
/// final 12 bytes — `footer_length: u64` + `magic: u32` — and seeking back
/// `8 + footer_length` bytes from the end).
pub fn read_footer(tail: &[u8]) -> Result<Vec<FooterEntry>> {
    let mut pos = 0usize;
    let (count, consumed) = read_varint(tail)?;
    pos += consumed;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if pos + 8 > tail.len() {
            return Err(CastError::ContainerMalformed { reason: "footer entry truncated".into() });
        }
        let compressed_offset = u64::from_le_bytes(tail[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let (compressed_length, c1) = read_varint(&tail[pos..])?;
        pos += c1;
        let (first_row_index, c2) = read_varint(&tail[pos..])?;
        pos += c2;
        let (row_count, c3) = read_varint(&tail[pos..])?;
        pos += c3;
        entries.push(FooterEntry { compressed_offset, compressed_length, first_row_index, row_count });
    }
    Ok(entries)
}

/// Splits the final 12 bytes of a complete container file into
/// `(footer_length, magic)`.
pub fn read_footer_trailer(last_12_bytes: &[u8]) -> Result<(u64, u32)> {
    if last_12_bytes.len() != 12 {
        return Err(CastError::ContainerMalformed { reason: "container too short for a footer trailer".into() });
    }
    let footer_length = u64::from_le_bytes(last_12_bytes[0..8].try_into().unwrap());
    let magic = u32::from_le_bytes(last_12_bytes[8..12].try_into().unwrap());
    if magic != FOOTER_MAGIC {
        return Err(CastError::ContainerMalformed {
            reason: format!("bad footer magic {:#010x}", magic),
        });
    }
    Ok((footer_length, magic))
}

/// Binary-searches `entries` (sorted by ascending `first_row_index`, as
/// they are always written) for the index range of blocks intersecting the
/// 1-based inclusive row range `[lo, hi]`.
pub fn blocks_for_row_range(entries: &[FooterEntry], lo: u64, hi: u64) -> Vec<usize> {
    let mut indices = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let entry_last = entry.first_row_index + entry.row_count - 1;
        if entry.first_row_index > hi {
            break;
        }
        if entry_last >= lo {
            indices.push(i);
        }
    }
    indices
}
