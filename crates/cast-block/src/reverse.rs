//! Reverse path (`spec.md` §4.H): decodes one serialized block back into
//! the exact original byte sequence, verifying its CRC32 trailer.

use cast_bytes::{crc32, CastError, Result, VarintReader};
use cast_registry::TemplateId;
use cast_tokenizer::Template;

use crate::colsep::{ColSepMode, ColumnCursor};
use crate::flags::BlockFlags;
use crate::header::BlockHeader;

/// Decodes a single block (the uncompressed logical bytes produced by the
/// coder adapter's `decode`) into its reconstructed plaintext.
///
/// `block_index` is only used to label `IntegrityFail`/`ContainerMalformed`
/// errors; it plays no role in decoding itself.
pub fn decode_block(block: &[u8], block_index: usize) -> Result<Vec<u8>> {
    let (header, mut pos) = BlockHeader::read(block)?;

    if header.flags.contains(BlockFlags::OPAQUE) {
        let len = header.uncompressed_len as usize;
        let end = pos + len;
        if end + 4 > block.len() {
            return Err(CastError::ContainerMalformed {
                reason: "opaque block payload truncated".into(),
            });
        }
        let payload = &block[pos..end];
        verify_crc(payload, &block[end..end + 4], block_index, end as u64)?;
        return Ok(payload.to_vec());
    }

    let colsep = ColSepMode::from_flag_bit(header.flags.contains(BlockFlags::COLSEP));

    let mut reader = VarintReader::new(&block[pos..]);

    let mut templates = Vec::with_capacity(header.template_count as usize);
    for _ in 0..header.template_count {
        let len = reader.read()? as usize;
        let bytes = reader.read_bytes(len)?;
        templates.push(Template::from_key_bytes(bytes));
    }

    let mut row_order = Vec::with_capacity(header.row_count as usize);
    for _ in 0..header.row_count {
        row_order.push(reader.read()? as TemplateId);
    }

    let mut column_cursors: Vec<Vec<ColumnCursor>> = Vec::with_capacity(templates.len());
    for template in &templates {
        let mut cursors = Vec::with_capacity(template.arity());
        for _ in 0..template.arity() {
            let len = reader.read()? as usize;
            let bytes = reader.read_bytes(len)?;
            cursors.push(ColumnCursor::new(colsep, bytes));
        }
        column_cursors.push(cursors);
    }

    pos += block[pos..].len() - reader.remaining().len();

    let mut out = Vec::with_capacity(header.uncompressed_len as usize);
    let mut scratch: Vec<Vec<u8>> = Vec::new();
    for &tid in &row_order {
        let template = templates.get(tid as usize).ok_or_else(|| CastError::ContainerMalformed {
            reason: format!("row references unknown template id {tid}"),
        })?;
        let cursors = column_cursors.get_mut(tid as usize).ok_or_else(|| CastError::ContainerMalformed {
            reason: format!("row references template id {tid} with no column streams"),
        })?;

        scratch.clear();
        for cursor in cursors.iter_mut() {
            scratch.push(cursor.next_value()?.into_owned());
        }
        let var_refs: Vec<&[u8]> = scratch.iter().map(|v| v.as_slice()).collect();
        out.extend_from_slice(&template.reconstruct(&var_refs));
    }

    if pos + 4 > block.len() {
        return Err(CastError::ContainerMalformed { reason: "block missing CRC32 trailer".into() });
    }
    verify_crc(&out, &block[pos..pos + 4], block_index, pos as u64)?;

    Ok(out)
}

fn verify_crc(plaintext: &[u8], stored: &[u8], block_index: usize, offset: u64) -> Result<()> {
    let stored_crc = u32::from_le_bytes(stored.try_into().unwrap());
    let actual_crc = crc32(plaintext);
    if actual_crc != stored_crc {
        return Err(CastError::IntegrityFail { block: block_index, offset });
    }
    Ok(())
}
