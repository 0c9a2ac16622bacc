//! Container file header (`spec.md` §4.J, §6): `magic || version || flags
//! || input_size`, written once at the start of the file, ahead of the
//! block stream.

use bitflags::bitflags;
use cast_bytes::{read_varint, write_varint, CastError, Result, VarintReader};

pub const CONTAINER_MAGIC: u32 = 0x4341_5354; // "CAST", shared with the block magic (distinct framing layer)
pub const CONTAINER_VERSION: u8 = 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContainerFlags: u8 {
        const INDEXED = 0b0000_0001;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub flags: ContainerFlags,
    /// Total input byte size, or 0 when unknown (streaming input).
    pub input_size: u64,
}

impl ContainerHeader {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&CONTAINER_MAGIC.to_le_bytes());
        out.push(CONTAINER_VERSION);
        out.push(self.flags.bits());
        write_varint(self.input_size, out);
    }

    pub fn read(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 6 {
            return Err(CastError::ContainerMalformed { reason: "container header truncated".into() });
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != CONTAINER_MAGIC {
            return Err(CastError::ContainerMalformed {
                reason: format!("bad container magic {:#010x}", magic),
            });
        }
        let version = buf[4];
        if version != CONTAINER_VERSION {
            return Err(CastError::ContainerMalformed {
                reason: format!("unsupported container version {version}"),
            });
        }
        let flags = ContainerFlags::from_bits_truncate(buf[5]);
        let mut reader = VarintReader::new(&buf[6..]);
        let input_size = reader.read()?;
        let consumed = 6 + (buf[6..].len() - reader.remaining().len());
        Ok((Self { flags, input_size }, consumed))
    }
}

/// Reads the `varint(compressed_len) || compressed_bytes` framing of one
/// block body, returning the compressed bytes and total bytes consumed.
pub fn read_framed_block<'a>(buf: &'a [u8]) -> Result<(&'a [u8], usize)> {
    let (len, prefix_len) = read_varint(buf)?;
    let len = len as usize;
    let end = prefix_len + len;
    if end > buf.len() {
        return Err(CastError::ContainerMalformed { reason: "block body truncated".into() });
    }
    Ok((&buf[prefix_len..end], end))
}

pub fn write_framed_block(compressed: &[u8], out: &mut Vec<u8>) {
    write_varint(compressed.len() as u64, out);
    out.extend_from_slice(compressed);
}
