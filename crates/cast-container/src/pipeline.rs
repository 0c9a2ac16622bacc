//! Per-block build step: takes one candidate row set off the `RowFeed` and
//! runs it through the Strategy Sampler, Block Assembler, and Serializer
//! (`spec.md` §4.C–§4.G), producing the block's uncompressed logical bytes
//! ready for the coder adapter. Lives between the chunker and the coding
//! pipeline so the reader thread (§5) can do this work single-threaded
//! while workers handle the CPU-heavy entropy coding concurrently.

use cast_bytes::iter_rows;
use cast_block::{serialize_block, BlockAssembler, BlockPayload, PushOutcome};
use cast_registry::TemplateRegistry;
use cast_sampler::{choose_strategy, SampleVerdict};

use crate::config::CastConfig;

/// The outcome of building one block from a candidate row set.
pub struct BuiltBlock {
    /// Uncompressed logical block bytes (header, tables, streams, CRC),
    /// per `spec.md` §4.G — not yet passed through the coder adapter.
    pub serialized: Vec<u8>,
    /// Number of rows actually sealed into this block.
    pub row_count: u64,
    /// Rows from the candidate set that did not fit (registry overflow);
    /// the caller must return these to the `RowFeed` for the next block.
    pub leftover_rows: Vec<Vec<u8>>,
}

fn sample_rows_from<'a>(arena: &'a [u8], cap: usize) -> Vec<&'a [u8]> {
    iter_rows(arena).filter(|row| row.ends_with(b"\n")).take(cap).collect()
}

/// Builds one block from `rows` (a non-empty candidate row set already cut
/// to size by the chunker). `indexed` controls whether the block header's
/// `INDEXED` flag is set.
pub fn build_block(mut rows: Vec<Vec<u8>>, config: &CastConfig, indexed: bool) -> BuiltBlock {
    debug_assert!(!rows.is_empty(), "the chunker never hands the pipeline an empty candidate");

    let total_bytes: usize = rows.iter().map(|r| r.len()).sum();
    let mut arena = Vec::with_capacity(total_bytes);
    for r in &rows {
        arena.extend_from_slice(r);
    }

    let sample = sample_rows_from(&arena, config.sample_rows);
    let colsep = config.colsep.to_colsep();

    match choose_strategy(&sample) {
        SampleVerdict::Opaque => {
            let serialized = serialize_block(BlockPayload::Opaque(&arena), colsep, indexed);
            let row_count = rows.len() as u64;
            BuiltBlock { serialized, row_count, leftover_rows: Vec::new() }
        }
        SampleVerdict::Chosen(strategy) => {
            let registry = TemplateRegistry::with_cap(config.max_templates);
            let mut assembler = BlockAssembler::with_registry(&arena, strategy, registry);

            let mut consumed = 0usize;
            for row in iter_rows(&arena) {
                match assembler.push_row(row) {
                    PushOutcome::Appended => consumed += 1,
                    PushOutcome::RegistryFull => break,
                }
            }

            let leftover_rows = rows.split_off(consumed);
            let block = assembler.seal();
            let row_count = block.row_count();
            let serialized = serialize_block(BlockPayload::Structured(block), colsep, indexed);
            BuiltBlock { serialized, row_count, leftover_rows }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_block::decode_block;

    fn rows_of(text: &str) -> Vec<Vec<u8>> {
        text.split_inclusive('\n').map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn trivial_csv_builds_one_structured_block() {
        let config = CastConfig::default();
        let built = build_block(rows_of("a,b,c\nd,e,f\n"), &config, false);
        assert_eq!(built.row_count, 2);
        assert!(built.leftover_rows.is_empty());
        let decoded = decode_block(&built.serialized, 0).unwrap();
        assert_eq!(decoded, b"a,b,c\nd,e,f\n");
    }

    #[test]
    fn registry_overflow_leaves_leftover_rows() {
        let mut config = CastConfig::default();
        config.max_templates = 1;
        // Same arity (so the comma delimiter's coefficient of variation is
        // zero and it wins the sampler's vote cleanly) but a different
        // terminator, so the two rows still instantiate distinct templates:
        // the second cannot fit once the one-template cap is already spent.
        let built = build_block(vec![b"a,b\n".to_vec(), b"a,b\r\n".to_vec()], &config, false);
        assert_eq!(built.row_count, 1);
        assert_eq!(built.leftover_rows, vec![b"a,b\r\n".to_vec()]);
        let decoded = decode_block(&built.serialized, 0).unwrap();
        assert_eq!(decoded, b"a,b\n");
    }

    #[test]
    fn single_row_candidate_still_structures() {
        // A one-row sample is trivially stable (modal frequency 1.0), so a
        // single-row block still picks a strategy rather than falling
        // back to OPAQUE.
        let config = CastConfig::default();
        let built = build_block(vec![b"a,b,c\n".to_vec()], &config, false);
        assert_eq!(built.row_count, 1);
    }
}
