//! Container driver (`spec.md` §4.J, §5): orchestrates chunking, the
//! reader → workers → writer pipeline, container/footer framing, and the
//! reverse path, including indexed row-range queries.

use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use cast_block::decode_block;
use cast_bytes::{iter_rows, CastError, Result};
use cast_codec::coder_for;
use cast_guard::Verdict;

use crate::cancel::CancellationToken;
use crate::chunker::{collect_block_rows, compute_rows_per_block, BlockSizeMode, RowFeed};
use crate::config::{CastConfig, ROW_SIZE_SAMPLE_ROWS};
use crate::container_header::{write_framed_block, ContainerFlags, ContainerHeader, CONTAINER_MAGIC};
use crate::footer::{blocks_for_row_range, read_footer, read_footer_trailer, write_footer, FooterEntry};
use crate::pipeline::build_block;

/// Upper bound on how deep the writer's reorder buffer grows before a gap
/// signals a pipeline bug rather than ordinary out-of-order arrival. Purely
/// a sanity ceiling; worker concurrency is already bounded by the raw-block
/// channel's own capacity.
const REORDER_GUARD: usize = 1 << 20;

struct RawBlock {
    seq: u64,
    serialized: Vec<u8>,
    row_count: u64,
}

struct EncodedBlock {
    seq: u64,
    compressed: Vec<u8>,
    row_count: u64,
}

/// Reads up to `cap` bytes from the front of `reader` without losing them:
/// callers get the head bytes back and can still read everything after via
/// `Cursor::new(head).chain(reader)`.
fn peek_head<R: Read>(reader: &mut R, cap: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; cap];
    let mut total = 0usize;
    loop {
        if total == cap {
            break;
        }
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    buf.truncate(total);
    Ok(buf)
}

/// Compresses `reader` into `writer` per `config`. `cancel` is checked
/// cooperatively by every pipeline stage after each block (`spec.md` §5).
pub fn compress<R, W>(mut reader: R, writer: W, config: &CastConfig, cancel: CancellationToken) -> Result<()>
where
    R: Read + Send + 'static,
    W: Write,
{
    let head = peek_head(&mut reader, cast_guard::SAMPLE_CAP)?;
    let verdict = cast_guard::classify(&head);
    let combined = Cursor::new(head).chain(reader);

    match verdict {
        Verdict::Opaque => compress_opaque(combined, writer, config),
        Verdict::Structurable => compress_structured(combined, writer, config, cancel),
    }
}

fn compress_opaque<R: Read, W: Write>(mut reader: R, mut writer: W, config: &CastConfig) -> Result<()> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    tracing::debug!(bytes = raw.len(), "binary guard: OPAQUE, skipping structural work");

    let serialized = cast_block::serialize_block(
        cast_block::BlockPayload::Opaque(&raw),
        config.colsep.to_colsep(),
        config.indexed,
    );
    let coder = coder_for(config.coder);
    let compressed = coder
        .encode(&serialized, config.dict_size, 1)
        .map_err(|e| CastError::CodecEncodeFail { block: 0, reason: e.0 })?;

    let header = ContainerHeader {
        flags: if config.indexed { ContainerFlags::INDEXED } else { ContainerFlags::empty() },
        input_size: raw.len() as u64,
    };
    let mut out = Vec::new();
    header.write(&mut out);
    let body_offset = out.len() as u64;
    write_framed_block(&compressed, &mut out);

    if config.indexed {
        let entries = [FooterEntry {
            compressed_offset: body_offset,
            compressed_length: compressed.len() as u64,
            first_row_index: 1,
            row_count: 0,
        }];
        write_footer(&entries, &mut out);
    }

    writer.write_all(&out)?;
    Ok(())
}

fn compress_structured<R, W>(reader: R, mut writer: W, config: &CastConfig, cancel: CancellationToken) -> Result<()>
where
    R: Read + Send + 'static,
    W: Write,
{
    let mut feed = RowFeed::new(BufReader::new(reader));

    let mode = if config.indexed {
        let rows_per_block =
            compute_rows_per_block(&mut feed, ROW_SIZE_SAMPLE_ROWS, config.target_block_bytes)?;
        tracing::debug!(rows_per_block, "indexed container: row-size mode computed");
        BlockSizeMode::Rows { rows_per_block }
    } else {
        BlockSizeMode::Bytes { target_bytes: config.target_block_bytes }
    };

    let worker_count = config.threads.max(1) as usize;
    let (raw_tx, raw_rx) = crossbeam_channel::bounded::<RawBlock>(worker_count * 2);
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<EncodedBlock>();
    let error_slot: Arc<Mutex<Option<CastError>>> = Arc::new(Mutex::new(None));

    let mut worker_handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let raw_rx = raw_rx.clone();
        let done_tx = done_tx.clone();
        let error_slot = error_slot.clone();
        let cancel = cancel.clone();
        let coder_kind = config.coder;
        let dict_size = config.dict_size;
        worker_handles.push(thread::spawn(move || {
            let coder = coder_for(coder_kind);
            for item in raw_rx {
                if cancel.is_cancelled() {
                    break;
                }
                match coder.encode(&item.serialized, dict_size, 1) {
                    Ok(compressed) => {
                        if done_tx.send(EncodedBlock { seq: item.seq, compressed, row_count: item.row_count }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        *error_slot.lock().unwrap() =
                            Some(CastError::CodecEncodeFail { block: item.seq as usize, reason: e.0 });
                        cancel.cancel();
                        break;
                    }
                }
            }
        }));
    }
    drop(raw_rx);
    drop(done_tx);

    let reader_error = error_slot.clone();
    let reader_cancel = cancel.clone();
    let reader_config = config.clone();
    let indexed = config.indexed;
    let seq_counter = Arc::new(AtomicU64::new(0));
    let reader_seq_counter = seq_counter.clone();
    let reader_handle = thread::spawn(move || {
        loop {
            if reader_cancel.is_cancelled() {
                break;
            }
            let rows = match collect_block_rows(&mut feed, mode) {
                Ok(rows) => rows,
                Err(e) => {
                    *reader_error.lock().unwrap() = Some(CastError::Io(e));
                    reader_cancel.cancel();
                    break;
                }
            };
            if rows.is_empty() {
                break;
            }

            let built = build_block(rows, &reader_config, indexed);
            if !built.leftover_rows.is_empty() {
                feed.push_back_all(built.leftover_rows);
            }

            let seq = reader_seq_counter.fetch_add(1, Ordering::SeqCst);
            let raw = RawBlock { seq, serialized: built.serialized, row_count: built.row_count };
            if raw_tx.send(raw).is_err() {
                break;
            }
        }
    });

    // Writer role: drain `done_rx`, reordering by `seq`, writing the
    // container header first, then each block frame in order, then the
    // footer (if indexed). Runs on the calling thread.
    let header = ContainerHeader {
        flags: if config.indexed { ContainerFlags::INDEXED } else { ContainerFlags::empty() },
        input_size: 0, // unknown: compression streams from an arbitrary Read
    };
    let mut header_bytes = Vec::new();
    header.write(&mut header_bytes);
    writer.write_all(&header_bytes)?;

    let mut running_offset = header_bytes.len() as u64;
    let mut next_row_index = 1u64;
    let mut footer_entries = Vec::new();
    let mut pending: std::collections::HashMap<u64, EncodedBlock> = std::collections::HashMap::new();
    let mut expected = 0u64;
    let mut write_err: Option<CastError> = None;

    for encoded in done_rx {
        pending.insert(encoded.seq, encoded);
        while let Some(block) = pending.remove(&expected) {
            let mut frame = Vec::new();
            write_framed_block(&block.compressed, &mut frame);
            if let Err(e) = writer.write_all(&frame) {
                write_err = Some(CastError::Io(e));
            }
            if config.indexed {
                footer_entries.push(FooterEntry {
                    compressed_offset: running_offset,
                    compressed_length: block.compressed.len() as u64,
                    first_row_index: next_row_index,
                    row_count: block.row_count,
                });
                next_row_index += block.row_count;
            }
            running_offset += frame.len() as u64;
            expected += 1;
        }
        if pending.len() > REORDER_GUARD {
            write_err = Some(CastError::ContainerMalformed { reason: "writer reorder buffer overflowed".into() });
            cancel.cancel();
            break;
        }
        if write_err.is_some() {
            cancel.cancel();
            break;
        }
    }

    reader_handle.join().expect("reader thread panicked");
    for handle in worker_handles {
        handle.join().expect("worker thread panicked");
    }

    if let Some(e) = write_err {
        return Err(e);
    }
    if let Some(e) = error_slot.lock().unwrap().take() {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(CastError::Cancelled);
    }

    if config.indexed {
        let mut footer_bytes = Vec::new();
        write_footer(&footer_entries, &mut footer_bytes);
        writer.write_all(&footer_bytes)?;
    }

    Ok(())
}

/// Result of a full-container decompression or verification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub blocks: u64,
    pub bytes: u64,
}

fn read_u8<R: Read>(r: &mut R) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    match r.read(&mut b)? {
        0 => Ok(None),
        _ => Ok(Some(b[0])),
    }
}

fn read_varint_stream<R: Read>(r: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        if shift >= 64 {
            return Err(CastError::ContainerMalformed { reason: "varint exceeds 64 bits".into() });
        }
        let byte = read_u8(r)?.ok_or_else(|| CastError::ContainerMalformed { reason: "truncated varint".into() })?;
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

fn read_container_header<R: Read>(r: &mut R) -> Result<ContainerHeader> {
    let mut magic_bytes = [0u8; 4];
    r.read_exact(&mut magic_bytes)?;
    let magic = u32::from_le_bytes(magic_bytes);
    if magic != CONTAINER_MAGIC {
        return Err(CastError::ContainerMalformed { reason: format!("bad container magic {magic:#010x}") });
    }
    let mut rest = [0u8; 2];
    r.read_exact(&mut rest)?;
    let version = rest[0];
    if version != crate::container_header::CONTAINER_VERSION {
        return Err(CastError::ContainerMalformed { reason: format!("unsupported container version {version}") });
    }
    let flags = ContainerFlags::from_bits_truncate(rest[1]);
    let input_size = read_varint_stream(r)?;
    Ok(ContainerHeader { flags, input_size })
}

/// Reads one `varint(compressed_len) || compressed_bytes` frame from a
/// streaming reader, or `None` at a clean frame boundary (true EOF on the
/// very first byte of the length varint).
fn read_one_frame<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>> {
    let Some(first) = read_u8(r)? else {
        return Ok(None);
    };
    let mut result = (first & 0x7F) as u64;
    let mut shift = 7u32;
    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = read_u8(r)?.ok_or_else(|| CastError::ContainerMalformed { reason: "truncated varint".into() })?;
        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
    }
    let mut body = vec![0u8; result as usize];
    r.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Streams the full reverse path: every block is decoded, CRC-checked, and
/// its plaintext written to `writer` in order (`spec.md` §4.H, §6
/// "Decompress"). `writer` may be `io::sink()` to implement `Verify`
/// without writing anything. Assumes the container was produced by the
/// native LZMA2 backend; use `decompress_with` for `7zip`-encoded ones.
pub fn decompress<R: Read + Seek, W: Write>(reader: R, writer: W) -> Result<VerifyStats> {
    decompress_with(reader, writer, cast_codec::CoderKind::Native)
}

/// Like `decompress`, but with an explicit coder backend. The container
/// format does not record which backend produced it (`spec.md` §6 passes
/// `mode` explicitly on decompress for this reason).
pub fn decompress_with<R: Read + Seek, W: Write>(
    reader: R,
    mut writer: W,
    coder_kind: cast_codec::CoderKind,
) -> Result<VerifyStats> {
    let mut reader = BufReader::new(reader);
    let total_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    let header = read_container_header(&mut reader)?;
    let header_end = reader.stream_position()?;

    let body_end = if header.flags.contains(ContainerFlags::INDEXED) {
        if total_len < 12 {
            return Err(CastError::ContainerMalformed { reason: "indexed container missing footer".into() });
        }
        reader.seek(SeekFrom::End(-12))?;
        let mut trailer = [0u8; 12];
        reader.read_exact(&mut trailer)?;
        let (footer_length, _magic) = read_footer_trailer(&trailer)?;
        let footer_start = total_len
            .checked_sub(12 + footer_length)
            .ok_or_else(|| CastError::ContainerMalformed { reason: "footer length exceeds container size".into() })?;
        reader.seek(SeekFrom::Start(header_end))?;
        footer_start
    } else {
        total_len
    };

    let mut stats = VerifyStats::default();
    let coder = coder_for(coder_kind);
    loop {
        if reader.stream_position()? >= body_end {
            break;
        }
        let Some(compressed) = read_one_frame(&mut reader)? else { break };
        let serialized = coder
            .decode(&compressed)
            .map_err(|e| CastError::CodecDecodeFail { block: stats.blocks as usize, reason: e.0 })?;
        let plaintext = decode_block(&serialized, stats.blocks as usize)?;
        writer.write_all(&plaintext)?;
        stats.bytes += plaintext.len() as u64;
        stats.blocks += 1;
    }

    Ok(stats)
}

/// Serves the 1-based inclusive row range `[row_lo, row_hi]` from an
/// `INDEXED` container, decoding only the blocks that intersect it
/// (`spec.md` §4.H "Random access").
pub fn decompress_range<R: Read + Seek, W: Write>(reader: R, writer: W, row_lo: u64, row_hi: u64) -> Result<()> {
    decompress_range_with(reader, writer, row_lo, row_hi, cast_codec::CoderKind::Native)
}

/// Like `decompress_range`, but with an explicit coder backend.
pub fn decompress_range_with<R: Read + Seek, W: Write>(
    reader: R,
    mut writer: W,
    row_lo: u64,
    row_hi: u64,
    coder_kind: cast_codec::CoderKind,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let total_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    let header = read_container_header(&mut reader)?;

    if !header.flags.contains(ContainerFlags::INDEXED) {
        return Err(CastError::RangeOutOfBounds { lo: row_lo, hi: row_hi, total: 0 });
    }
    if total_len < 12 {
        return Err(CastError::ContainerMalformed { reason: "indexed container missing footer".into() });
    }

    reader.seek(SeekFrom::End(-12))?;
    let mut trailer = [0u8; 12];
    reader.read_exact(&mut trailer)?;
    let (footer_length, _) = read_footer_trailer(&trailer)?;
    let footer_start = total_len
        .checked_sub(12 + footer_length)
        .ok_or_else(|| CastError::ContainerMalformed { reason: "footer length exceeds container size".into() })?;

    reader.seek(SeekFrom::Start(footer_start))?;
    let mut footer_bytes = vec![0u8; footer_length as usize];
    reader.read_exact(&mut footer_bytes)?;
    let entries = read_footer(&footer_bytes)?;

    let total_rows: u64 = entries.iter().map(|e| e.row_count).sum();
    if row_lo == 0 || row_lo > row_hi || row_hi > total_rows {
        return Err(CastError::RangeOutOfBounds { lo: row_lo, hi: row_hi, total: total_rows });
    }

    let coder = coder_for(coder_kind);
    for idx in blocks_for_row_range(&entries, row_lo, row_hi) {
        let entry = entries[idx];
        reader.seek(SeekFrom::Start(entry.compressed_offset))?;
        // compressed_offset points at the varint length prefix; read it
        // through the same streaming frame reader used by full decompress.
        let compressed = read_one_frame(&mut reader)?
            .ok_or_else(|| CastError::ContainerMalformed { reason: "footer points past end of container".into() })?;

        let serialized = coder
            .decode(&compressed)
            .map_err(|e| CastError::CodecDecodeFail { block: idx, reason: e.0 })?;
        let plaintext = decode_block(&serialized, idx)?;

        let block_last_row = entry.first_row_index + entry.row_count - 1;
        let local_lo = row_lo.max(entry.first_row_index) - entry.first_row_index;
        let local_hi = row_hi.min(block_last_row) - entry.first_row_index;

        for (i, row) in iter_rows(&plaintext).enumerate() {
            let i = i as u64;
            if i < local_lo {
                continue;
            }
            if i > local_hi {
                break;
            }
            writer.write_all(row)?;
        }
    }

    Ok(())
}
