//! Column stream value framing (`spec.md` §3, §4.G). Two disciplines, both
//! exact for arbitrary byte content:
//!
//! - `LengthPrefixed`: each value is `varint(len) || bytes`. No escaping
//!   needed; this is the default CAST uses because it is exact for any
//!   input without per-byte scanning.
//! - `Sentinel`: values are joined by a single 0x1F byte. Because a
//!   variable field can legitimately contain a 0x1F byte (arbitrary input
//!   isn't guaranteed to avoid it, unlike NUL which Binary Guard excludes),
//!   a literal 0x1F inside a value is escaped as two consecutive 0x1F
//!   bytes; an unescaped single 0x1F is a value separator. This keeps the
//!   discipline exact at the cost of a 2x blow-up on 0x1F-heavy columns,
//!   which in practice never occurs in delimited text.

use std::borrow::Cow;

use cast_bytes::{CastError, Result, VarintReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColSepMode {
    Sentinel,
    LengthPrefixed,
}

const SENTINEL: u8 = 0x1F;

impl ColSepMode {
    pub fn from_flag_bit(set: bool) -> Self {
        if set {
            ColSepMode::LengthPrefixed
        } else {
            ColSepMode::Sentinel
        }
    }

    pub fn flag_bit(&self) -> bool {
        matches!(self, ColSepMode::LengthPrefixed)
    }

    pub fn append(&self, out: &mut Vec<u8>, value: &[u8], is_first_in_stream: bool) {
        match self {
            ColSepMode::LengthPrefixed => {
                cast_bytes::write_varint(value.len() as u64, out);
                out.extend_from_slice(value);
            }
            ColSepMode::Sentinel => {
                if !is_first_in_stream {
                    out.push(SENTINEL);
                }
                for &b in value {
                    if b == SENTINEL {
                        out.push(SENTINEL);
                        out.push(SENTINEL);
                    } else {
                        out.push(b);
                    }
                }
            }
        }
    }
}

/// A pull cursor over one column stream, handed one value at a time in the
/// order the row-order stream will ask for them. Holds no copy of the
/// stream beyond the shared slice it was built from.
pub struct ColumnCursor<'a> {
    mode: ColSepMode,
    buf: &'a [u8],
    pos: usize,
    started: bool,
}

impl<'a> ColumnCursor<'a> {
    pub fn new(mode: ColSepMode, buf: &'a [u8]) -> Self {
        Self { mode, buf, pos: 0, started: false }
    }

    /// Returns the next value. Borrowed (zero-copy) unless the value
    /// contained an escaped separator byte, in which case it is unescaped
    /// into a fresh buffer.
    pub fn next_value(&mut self) -> Result<Cow<'a, [u8]>> {
        match self.mode {
            ColSepMode::LengthPrefixed => {
                let mut reader = VarintReader::new(&self.buf[self.pos..]);
                let len = reader.read()? as usize;
                let consumed_prefix = self.buf[self.pos..].len() - reader.remaining().len();
                let start = self.pos + consumed_prefix;
                let end = start + len;
                if end > self.buf.len() {
                    return Err(CastError::ContainerMalformed {
                        reason: "column stream value exceeds stream length".into(),
                    });
                }
                self.pos = end;
                Ok(Cow::Borrowed(&self.buf[start..end]))
            }
            ColSepMode::Sentinel => {
                if self.started {
                    if self.pos >= self.buf.len() || self.buf[self.pos] != SENTINEL {
                        return Err(CastError::ContainerMalformed {
                            reason: "expected sentinel between column values".into(),
                        });
                    }
                    self.pos += 1;
                }
                self.started = true;
                let start = self.pos;
                let mut had_escape = false;
                loop {
                    match self.buf[self.pos..].iter().position(|&b| b == SENTINEL) {
                        None => {
                            self.pos = self.buf.len();
                            break;
                        }
                        Some(rel) => {
                            let at = self.pos + rel;
                            if at + 1 < self.buf.len() && self.buf[at + 1] == SENTINEL {
                                had_escape = true;
                                self.pos = at + 2;
                                continue;
                            }
                            self.pos = at;
                            break;
                        }
                    }
                }
                let span = &self.buf[start..self.pos];
                if !had_escape {
                    Ok(Cow::Borrowed(span))
                } else {
                    let mut unescaped = Vec::with_capacity(span.len());
                    let mut i = 0;
                    while i < span.len() {
                        unescaped.push(span[i]);
                        if span[i] == SENTINEL {
                            i += 2;
                        } else {
                            i += 1;
                        }
                    }
                    Ok(Cow::Owned(unescaped))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefixed_round_trips() {
        let values: [&[u8]; 3] = [b"a", b"", b"hello world"];
        let mut buf = Vec::new();
        for (i, v) in values.iter().enumerate() {
            ColSepMode::LengthPrefixed.append(&mut buf, v, i == 0);
        }
        let mut cur = ColumnCursor::new(ColSepMode::LengthPrefixed, &buf);
        for v in values {
            assert_eq!(cur.next_value().unwrap().as_ref(), v);
        }
    }

    #[test]
    fn sentinel_round_trips() {
        let values: [&[u8]; 3] = [b"a", b"", b"z"];
        let mut buf = Vec::new();
        for (i, v) in values.iter().enumerate() {
            ColSepMode::Sentinel.append(&mut buf, v, i == 0);
        }
        let mut cur = ColumnCursor::new(ColSepMode::Sentinel, &buf);
        for v in values {
            assert_eq!(cur.next_value().unwrap().as_ref(), v);
        }
    }

    #[test]
    fn sentinel_escapes_literal_separator_byte() {
        let values: [&[u8]; 2] = [b"a\x1fb", b"c"];
        let mut buf = Vec::new();
        for (i, v) in values.iter().enumerate() {
            ColSepMode::Sentinel.append(&mut buf, v, i == 0);
        }
        let mut cur = ColumnCursor::new(ColSepMode::Sentinel, &buf);
        assert_eq!(cur.next_value().unwrap().as_ref(), b"a\x1fb");
        assert_eq!(cur.next_value().unwrap().as_ref(), b"c");
    }

    #[test]
    fn sentinel_empty_stream_single_empty_value() {
        let mut buf = Vec::new();
        ColSepMode::Sentinel.append(&mut buf, b"", true);
        let mut cur = ColumnCursor::new(ColSepMode::Sentinel, &buf);
        assert_eq!(cur.next_value().unwrap().as_ref(), b"".as_slice());
    }
}
