//! Block Assembler (`spec.md` §4.F): consumes rows one at a time, tokenizes
//! them under a fixed strategy, interns their templates, and accumulates
//! row order plus per-column variable spans. Column bytes are never copied
//! here — spans reference the caller-owned input buffer and are resolved
//! only at serialization time.

use cast_bytes::{ByteSpan, Crc32};
use cast_registry::{RegistryOverflow, TemplateId, TemplateRegistry};
use cast_tokenizer::{tokenize_row, Strategy, Template};

/// Default block size target; a block seals once its accumulated
/// reconstructed-row length reaches this many bytes.
pub const TARGET_BLOCK_BYTES: usize = 64 * 1024 * 1024;

/// Outcome of pushing one row onto an assembler in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The row was tokenized and appended.
    Appended,
    /// The row's template would overflow the registry cap; the row was
    /// *not* appended. The caller must seal the current block and start a
    /// fresh assembler, then retry this same row there.
    RegistryFull,
}

/// A block assembled so far, with its strategy fixed and registry growing
/// monotonically. `'a` is the lifetime of the shared input buffer that
/// every variable span is resolved against.
pub struct BlockAssembler<'a> {
    buf: &'a [u8],
    strategy: Strategy,
    registry: TemplateRegistry,
    row_order: Vec<TemplateId>,
    /// `columns[template_id][field_index]` holds the spans assigned to that
    /// column, in row order.
    columns: Vec<Vec<Vec<ByteSpan>>>,
    uncompressed_len: u64,
    crc: Crc32,
}

impl<'a> BlockAssembler<'a> {
    pub fn new(buf: &'a [u8], strategy: Strategy) -> Self {
        Self::with_registry(buf, strategy, TemplateRegistry::new())
    }

    pub fn with_registry(buf: &'a [u8], strategy: Strategy, registry: TemplateRegistry) -> Self {
        Self {
            buf,
            strategy,
            registry,
            row_order: Vec::new(),
            columns: Vec::new(),
            uncompressed_len: 0,
            crc: Crc32::new(),
        }
    }

    pub fn row_count(&self) -> u64 {
        self.row_order.len() as u64
    }

    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed_len
    }

    pub fn is_full(&self, target_bytes: usize) -> bool {
        self.uncompressed_len as usize >= target_bytes
    }

    /// Tokenizes and appends `row` (a slice of `buf`). `row` must include
    /// its terminator if present, as produced by `cast_bytes::iter_rows`.
    pub fn push_row(&mut self, row: &'a [u8]) -> PushOutcome {
        let tokenized = tokenize_row(row, self.strategy);
        let id = match self.registry.intern(&tokenized.template) {
            Ok(id) => id,
            Err(RegistryOverflow) => {
                tracing::debug!(
                    templates = self.registry.len(),
                    rows = self.row_order.len(),
                    "template registry full, sealing block early"
                );
                return PushOutcome::RegistryFull;
            }
        };

        if id as usize == self.columns.len() {
            self.columns.push(vec![Vec::new(); tokenized.template.arity()]);
        }
        for (i, span) in tokenized.variables.iter().enumerate() {
            self.columns[id as usize][i].push(*span);
        }

        self.row_order.push(id);
        self.uncompressed_len += row.len() as u64;
        self.crc.update(row);
        PushOutcome::Appended
    }

    /// Seals the block, consuming the assembler.
    pub fn seal(self) -> AssembledBlock<'a> {
        AssembledBlock {
            buf: self.buf,
            strategy: self.strategy,
            registry: self.registry,
            row_order: self.row_order,
            columns: self.columns,
            uncompressed_len: self.uncompressed_len,
            crc: self.crc.finalize(),
        }
    }
}

/// A fully tokenized block, ready for the serializer. Kept separate from
/// `BlockAssembler` so the CRC accumulator (which must see every row byte
/// exactly once) cannot be mutated after sealing.
pub struct AssembledBlock<'a> {
    pub buf: &'a [u8],
    pub strategy: Strategy,
    pub registry: TemplateRegistry,
    pub row_order: Vec<TemplateId>,
    pub columns: Vec<Vec<Vec<ByteSpan>>>,
    pub uncompressed_len: u64,
    pub crc: u32,
}

impl<'a> AssembledBlock<'a> {
    pub fn row_count(&self) -> u64 {
        self.row_order.len() as u64
    }

    pub fn templates(&self) -> &[Template] {
        self.registry.templates_in_order()
    }
}

/// Sanity check used by the container driver: recomputing CRC32 over the
/// raw concatenation of `rows` must match the assembler's incremental
/// accumulation. Exercised in tests rather than on the hot path.
#[cfg(test)]
fn crc_of_rows(rows: &[&[u8]]) -> u32 {
    let mut all = Vec::new();
    for r in rows {
        all.extend_from_slice(r);
    }
    cast_bytes::crc32(&all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_bytes::iter_rows;

    #[test]
    fn trivial_csv_assembles_one_template() {
        let input = b"a,b,c\nd,e,f\n".to_vec();
        let rows: Vec<&[u8]> = iter_rows(&input).collect();
        let mut asm = BlockAssembler::new(&input, Strategy::Strict { delim: b',' });
        for row in &rows {
            assert_eq!(asm.push_row(row), PushOutcome::Appended);
        }
        let block = asm.seal();
        assert_eq!(block.row_count(), 2);
        assert_eq!(block.templates().len(), 1);
        assert_eq!(block.row_order, vec![0, 0]);
        assert_eq!(block.crc, crc_of_rows(&rows));
    }

    #[test]
    fn registry_overflow_does_not_append_row() {
        let input = b"a,b\nc,d,e\n".to_vec();
        let rows: Vec<&[u8]> = iter_rows(&input).collect();
        let mut asm =
            BlockAssembler::with_registry(&input, Strategy::Strict { delim: b',' }, cast_registry::TemplateRegistry::with_cap(1));
        assert_eq!(asm.push_row(rows[0]), PushOutcome::Appended);
        assert_eq!(asm.push_row(rows[1]), PushOutcome::RegistryFull);
        assert_eq!(asm.row_count(), 1);
    }

    #[test]
    fn mixed_arity_rows_build_distinct_columns() {
        let input = b"x,1\ny,2\nx,3\n".to_vec();
        let rows: Vec<&[u8]> = iter_rows(&input).collect();
        let mut asm = BlockAssembler::new(&input, Strategy::Strict { delim: b',' });
        for row in &rows {
            asm.push_row(row);
        }
        let block = asm.seal();
        assert_eq!(block.templates().len(), 1);
        assert_eq!(block.row_order, vec![0, 0, 0]);
        let col0 = &block.columns[0][0];
        let resolved: Vec<&[u8]> = col0.iter().map(|s| s.resolve(&input)).collect();
        assert_eq!(resolved, vec![b"x".as_slice(), b"y", b"x"]);
    }
}
