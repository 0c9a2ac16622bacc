//! Row feed and block-size bookkeeping (`spec.md` §3 "Input row", §4.F
//! "Row-size mode"). `RowFeed` pulls one LF-terminated row at a time from a
//! `BufRead`, with a pushback queue so a block that seals early on
//! registry overflow can return its leftover rows to the front of the feed
//! for the next block to pick up.

use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Pulls rows off a buffered reader, owning each row's bytes (the reader
/// itself is not `Clone`/seekable in the streaming case, so each row is
/// copied into the block's arena exactly once here).
pub struct RowFeed<R: BufRead> {
    reader: R,
    pending: VecDeque<Vec<u8>>,
    eof: bool,
}

impl<R: BufRead> RowFeed<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, pending: VecDeque::new(), eof: false }
    }

    /// Returns the next row (including its LF/CRLF terminator, if any), or
    /// `None` at end of input. Rows previously returned to the feed via
    /// `push_back` are served first, in the order they were pushed.
    pub fn next_row(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(row) = self.pending.pop_front() {
            return Ok(Some(row));
        }
        if self.eof {
            return Ok(None);
        }
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            self.eof = true;
            return Ok(None);
        }
        Ok(Some(buf))
    }

    /// Returns `rows` to the front of the feed, in order, so the next call
    /// to `next_row` yields `rows[0]` first. Used when a block seals early
    /// (registry overflow) and must hand its unconsumed rows to the next
    /// block.
    pub fn push_back_all(&mut self, rows: Vec<Vec<u8>>) {
        for row in rows.into_iter().rev() {
            self.pending.push_front(row);
        }
    }
}

/// How a block's row set is bounded before tokenization begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSizeMode {
    /// Solid mode: accumulate whole rows until at least `target_bytes` of
    /// row content have been read (the last block may be short of it).
    Bytes { target_bytes: usize },
    /// Indexed mode: exactly `rows_per_block` rows (the last block may
    /// have fewer).
    Rows { rows_per_block: usize },
}

/// Reads up to `ROW_SIZE_SAMPLE_ROWS` rows, computes their mean length, and
/// derives `ROWS_PER_BLOCK = max(1, ceil(target_block_bytes / mean))`
/// (`spec.md` §4.F). The sampled rows are pushed back so they are not lost
/// to the first block.
pub fn compute_rows_per_block<R: BufRead>(
    feed: &mut RowFeed<R>,
    sample_cap: usize,
    target_block_bytes: usize,
) -> io::Result<usize> {
    let mut sample = Vec::new();
    let mut total_bytes = 0usize;
    for _ in 0..sample_cap {
        match feed.next_row()? {
            Some(row) => {
                total_bytes += row.len();
                sample.push(row);
            }
            None => break,
        }
    }
    let n = sample.len();
    feed.push_back_all(sample);

    if n == 0 {
        return Ok(1);
    }
    let mean = total_bytes as f64 / n as f64;
    if mean <= 0.0 {
        return Ok(1);
    }
    Ok(((target_block_bytes as f64 / mean).ceil() as usize).max(1))
}

/// Pulls the next candidate block's rows off `feed` per `mode`. Returns an
/// empty vector only at true end of input.
pub fn collect_block_rows<R: BufRead>(
    feed: &mut RowFeed<R>,
    mode: BlockSizeMode,
) -> io::Result<Vec<Vec<u8>>> {
    let mut rows = Vec::new();
    let mut total_bytes = 0usize;
    loop {
        let boundary_reached = match mode {
            BlockSizeMode::Bytes { target_bytes } => !rows.is_empty() && total_bytes >= target_bytes,
            BlockSizeMode::Rows { rows_per_block } => rows.len() >= rows_per_block,
        };
        if boundary_reached {
            break;
        }
        match feed.next_row()? {
            Some(row) => {
                total_bytes += row.len();
                rows.push(row);
            }
            None => break,
        }
    }
    Ok(rows)
}
