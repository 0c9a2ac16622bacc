//! Block header (`spec.md` §4.G): a fixed 6-byte prefix followed by three
//! varints.

use cast_bytes::{CastError, Result, VarintReader};

use crate::flags::BlockFlags;

pub const BLOCK_MAGIC: u32 = 0x4341_5354;
pub const BLOCK_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub flags: BlockFlags,
    pub uncompressed_len: u64,
    pub row_count: u64,
    pub template_count: u64,
}

impl BlockHeader {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        out.push(BLOCK_VERSION);
        out.push(self.flags.bits());
        cast_bytes::write_varint(self.uncompressed_len, out);
        cast_bytes::write_varint(self.row_count, out);
        cast_bytes::write_varint(self.template_count, out);
    }

    /// Parses a header from the front of `buf`, returning it alongside the
    /// number of bytes consumed.
    pub fn read(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 6 {
            return Err(CastError::ContainerMalformed { reason: "block header truncated".into() });
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != BLOCK_MAGIC {
            return Err(CastError::ContainerMalformed {
                reason: format!("bad block magic {:#010x}", magic),
            });
        }
        let version = buf[4];
        if version != BLOCK_VERSION {
            return Err(CastError::ContainerMalformed {
                reason: format!("unsupported block version {version}"),
            });
        }
        let flags = BlockFlags::from_bits_truncate(buf[5]);

        let mut reader = VarintReader::new(&buf[6..]);
        let uncompressed_len = reader.read()?;
        let row_count = reader.read()?;
        let template_count = reader.read()?;
        let consumed = 6 + (buf.len() - 6 - reader.remaining().len());

        Ok((Self { flags, uncompressed_len, row_count, template_count }, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = BlockHeader {
            flags: BlockFlags::COLSEP | BlockFlags::INDEXED,
            uncompressed_len: 12345,
            row_count: 42,
            template_count: 3,
        };
        let mut buf = Vec::new();
        h.write(&mut buf);
        let (parsed, consumed) = BlockHeader::read(&buf).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = [0u8; 10];
        assert!(BlockHeader::read(&buf).is_err());
    }

    #[test]
    fn truncated_header_is_rejected() {
        let buf = [0x54, 0x53, 0x41, 0x43];
        assert!(BlockHeader::read(&buf).is_err());
    }
}
