//! Serializer (`spec.md` §4.G): turns an `AssembledBlock` (or a raw OPAQUE
//! payload) into the on-disk block layout, ready to be handed to a coder
//! adapter.

use cast_bytes::{crc32, write_varint};

use crate::assembler::AssembledBlock;
use crate::colsep::ColSepMode;
use crate::flags::BlockFlags;
use crate::header::BlockHeader;

/// Either side of the OPAQUE/structured fork a block can take.
pub enum BlockPayload<'a> {
    Opaque(&'a [u8]),
    Structured(AssembledBlock<'a>),
}

/// Serializes `payload` into the block's uncompressed logical byte layout.
/// The result is what gets handed to the coder adapter; it is not itself
/// compressed.
pub fn serialize_block(payload: BlockPayload, colsep: ColSepMode, indexed: bool) -> Vec<u8> {
    match payload {
        BlockPayload::Opaque(bytes) => serialize_opaque(bytes, indexed),
        BlockPayload::Structured(block) => serialize_structured(&block, colsep, indexed),
    }
}

fn serialize_opaque(bytes: &[u8], indexed: bool) -> Vec<u8> {
    let mut flags = BlockFlags::OPAQUE;
    if indexed {
        flags |= BlockFlags::INDEXED;
    }
    let header = BlockHeader {
        flags,
        uncompressed_len: bytes.len() as u64,
        row_count: 0,
        template_count: 0,
    };

    let mut out = Vec::with_capacity(bytes.len() + 16);
    header.write(&mut out);
    out.extend_from_slice(bytes);
    out.extend_from_slice(&crc32(bytes).to_le_bytes());
    out
}

fn serialize_structured(block: &AssembledBlock, colsep: ColSepMode, indexed: bool) -> Vec<u8> {
    let mut flags = BlockFlags::empty();
    if indexed {
        flags |= BlockFlags::INDEXED;
    }
    if colsep.flag_bit() {
        flags |= BlockFlags::COLSEP;
    }
    if block.strategy.flag_bit() {
        flags |= BlockFlags::STRATEGY;
    }

    let header = BlockHeader {
        flags,
        uncompressed_len: block.uncompressed_len,
        row_count: block.row_count(),
        template_count: block.registry.len() as u64,
    };

    let mut out = Vec::new();
    header.write(&mut out);

    // TEMPLATE_TABLE, in registry (first-seen) ID order.
    for template in block.templates() {
        let key = template.key_bytes();
        write_varint(key.len() as u64, &mut out);
        out.extend_from_slice(&key);
    }

    // ROW_ORDER_STREAM
    for &id in &block.row_order {
        write_varint(id as u64, &mut out);
    }

    // COLUMN_STREAMS, template by template in ID order, column by column.
    for columns in &block.columns {
        for column in columns {
            let mut stream = Vec::new();
            for (i, span) in column.iter().enumerate() {
                colsep.append(&mut stream, span.resolve(block.buf), i == 0);
            }
            write_varint(stream.len() as u64, &mut out);
            out.extend_from_slice(&stream);
        }
    }

    out.extend_from_slice(&block.crc.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::BlockAssembler;
    use cast_bytes::iter_rows;
    use cast_tokenizer::Strategy;

    #[test]
    fn opaque_block_header_carries_raw_bytes() {
        let payload = b"\x00\x01\xff\xfe random binary";
        let out = serialize_block(BlockPayload::Opaque(payload), ColSepMode::LengthPrefixed, false);
        let (header, consumed) = BlockHeader::read(&out).unwrap();
        assert!(header.flags.contains(BlockFlags::OPAQUE));
        assert_eq!(header.uncompressed_len, payload.len() as u64);
        assert_eq!(&out[consumed..consumed + payload.len()], payload);
    }

    #[test]
    fn structured_block_has_expected_header_flags() {
        let input = b"a,b\nc,d\n".to_vec();
        let mut asm = BlockAssembler::new(&input, Strategy::Strict { delim: b',' });
        for row in iter_rows(&input) {
            asm.push_row(row);
        }
        let block = asm.seal();
        let out = serialize_block(BlockPayload::Structured(block), ColSepMode::LengthPrefixed, true);
        let (header, _) = BlockHeader::read(&out).unwrap();
        assert!(!header.flags.contains(BlockFlags::OPAQUE));
        assert!(header.flags.contains(BlockFlags::INDEXED));
        assert!(header.flags.contains(BlockFlags::COLSEP));
        assert!(!header.flags.contains(BlockFlags::STRATEGY));
        assert_eq!(header.row_count, 2);
        assert_eq!(header.template_count, 1);
    }
}
