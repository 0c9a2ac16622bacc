//! Binary Guard: a cheap heuristic over the input head that decides whether
//! a byte stream is worth structurally decomposing at all. See `spec.md`
//! §4.B.

use cast_bytes::iter_rows;

/// Upper bound on how much of the input head the guard inspects.
pub const SAMPLE_CAP: usize = 8 * 1024;

/// Fraction of non-printable bytes above which input is rejected.
pub const MAX_NON_PRINTABLE_FRACTION: f64 = 0.15;

/// More than this many NUL bytes in the sample forces OPAQUE.
pub const MAX_NUL_BYTES: usize = 1;

/// Fewer than this many LF-terminated rows in the sample forces OPAQUE.
pub const MIN_LF_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Structurable,
    Opaque,
}

fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0x80..=0xFF)
}

/// Classifies `input` as `Structurable` or `Opaque` by inspecting at most
/// `SAMPLE_CAP` bytes of its head.
pub fn classify(input: &[u8]) -> Verdict {
    let sample_len = input.len().min(SAMPLE_CAP);
    let sample = &input[..sample_len];

    if sample.is_empty() {
        // Nothing to structure; treat as opaque so the container still
        // round-trips trivially.
        return Verdict::Opaque;
    }

    let non_printable = sample.iter().filter(|&&b| !is_printable(b)).count();
    let nul_count = sample.iter().filter(|&&b| b == 0x00).count();

    if non_printable as f64 / sample_len as f64 > MAX_NON_PRINTABLE_FRACTION {
        tracing::debug!(non_printable, sample_len, "binary guard: non-printable fraction exceeded");
        return Verdict::Opaque;
    }
    if nul_count > MAX_NUL_BYTES {
        tracing::debug!(nul_count, "binary guard: too many NUL bytes");
        return Verdict::Opaque;
    }

    let lf_rows = iter_rows(sample).filter(|row| row.ends_with(b"\n")).count();
    if lf_rows < MIN_LF_ROWS {
        tracing::debug!(lf_rows, "binary guard: too few LF-terminated rows");
        return Verdict::Opaque;
    }

    Verdict::Structurable
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trivial_csv_is_structurable() {
        assert_eq!(classify(b"a,b,c\nd,e,f\n"), Verdict::Structurable);
    }

    #[test]
    fn single_row_is_opaque() {
        assert_eq!(classify(b"a,b,c\n"), Verdict::Opaque);
    }

    #[test]
    fn random_binary_with_nuls_is_opaque() {
        let mut data = vec![0u8; 4096];
        for (i, b) in data.iter_mut().enumerate() {
            *b = ((i * 2654435761u64 as usize) % 256) as u8;
        }
        assert_eq!(classify(&data), Verdict::Opaque);
    }

    #[test]
    fn empty_input_is_opaque() {
        assert_eq!(classify(b""), Verdict::Opaque);
    }

    #[test]
    fn two_nul_bytes_forces_opaque_even_with_rows() {
        let input = b"a,b\x00\nc,d\x00\n".to_vec();
        assert_eq!(classify(&input), Verdict::Opaque);
    }

    #[test]
    fn sample_is_capped_at_8_kib() {
        // Build input whose head looks structurable but whose tail is
        // irrelevant to the guard's decision.
        let mut input = Vec::new();
        for i in 0..300 {
            input.extend_from_slice(format!("row {}\n", i).as_bytes());
        }
        assert!(input.len() > SAMPLE_CAP);
        assert_eq!(classify(&input), Verdict::Structurable);
    }
}
