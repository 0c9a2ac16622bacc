use cast_bytes::{find_byte, ByteSpan};
use smallvec::SmallVec;

use crate::strategy::Strategy;
use crate::template::Template;

/// Variable spans of a tokenized row, inline for the common case (most
/// templates have a handful of fields) and spilling to the heap otherwise.
pub type VarSpans = SmallVec<[ByteSpan; 8]>;

/// A row split into its template and the byte spans (into the original row
/// slice) of its variable fields, in order.
#[derive(Debug, Clone)]
pub struct TokenizedRow {
    pub template: Template,
    pub variables: VarSpans,
}

/// Splits off the row terminator (LF, or CRLF) from the end of `row`,
/// returning `(content, terminator)`. A lone trailing CR with no following
/// LF is not a terminator and stays in `content`.
fn split_terminator(row: &[u8]) -> (&[u8], &[u8]) {
    match row.last() {
        Some(b'\n') => {
            if row.len() >= 2 && row[row.len() - 2] == b'\r' {
                (&row[..row.len() - 2], &row[row.len() - 2..])
            } else {
                (&row[..row.len() - 1], &row[row.len() - 1..])
            }
        }
        _ => (row, &[]),
    }
}

/// Tokenizes a single row under `strategy`. `row` should include its
/// terminator (as produced by `cast_bytes::iter_rows`) if one is present.
pub fn tokenize_row(row: &[u8], strategy: Strategy) -> TokenizedRow {
    let (content, terminator) = split_terminator(row);
    let (mut literals, var_ranges) = match strategy {
        Strategy::Strict { delim } => tokenize_strict(content, delim),
        Strategy::Aggressive => tokenize_aggressive(content),
    };

    // The terminator is always part of the final trailing literal.
    literals.last_mut().unwrap().extend_from_slice(terminator);

    let variables = var_ranges
        .into_iter()
        .map(|r| ByteSpan::new(r.start as u32, (r.end - r.start) as u32))
        .collect();

    TokenizedRow { template: Template::from_literals(literals), variables }
}

/// Scans forward from `start` for the end of a Strict-mode quoted field:
/// `"` opens, `""` is an embedded quote, the first unescaped `"` closes.
/// Returns the index immediately after the closing quote (or `content.len()`
/// if the quote is never closed).
fn scan_quoted_field_end(content: &[u8], start: usize) -> usize {
    let mut i = start;
    loop {
        match find_byte(content, i, b'"') {
            None => return content.len(),
            Some(q) => {
                if q + 1 < content.len() && content[q + 1] == b'"' {
                    i = q + 2;
                } else {
                    return q + 1;
                }
            }
        }
    }
}

fn tokenize_strict(content: &[u8], delim: u8) -> (Vec<Vec<u8>>, Vec<std::ops::Range<usize>>) {
    let mut literals = Vec::new();
    let mut var_ranges = Vec::new();

    let mut lit_start = 0usize;
    let mut idx = 0usize;
    let mut pending_field = true;

    loop {
        if !pending_field {
            literals.push(content[lit_start..].to_vec());
            break;
        }

        let var_start = idx;
        let var_end = if var_start < content.len() && content[var_start] == b'"' {
            scan_quoted_field_end(content, var_start + 1)
        } else {
            find_byte(content, var_start, delim).unwrap_or(content.len())
        };

        literals.push(content[lit_start..var_start].to_vec());
        var_ranges.push(var_start..var_end);

        if var_end < content.len() && content[var_end] == delim {
            lit_start = var_end;
            idx = var_end + 1;
            pending_field = true;
        } else {
            lit_start = var_end;
            pending_field = false;
        }
    }

    (literals, var_ranges)
}

fn is_value_byte(b: u8) -> bool {
    b.is_ascii_digit() || b.is_ascii_alphabetic() || matches!(b, b'.' | b'-' | b':' | b'/' | b'_' | b'+')
}

fn tokenize_aggressive(content: &[u8]) -> (Vec<Vec<u8>>, Vec<std::ops::Range<usize>>) {
    if content.is_empty() {
        return (vec![Vec::new()], Vec::new());
    }

    // Run-length encode the value/structure classification.
    let mut runs: Vec<(bool, std::ops::Range<usize>)> = Vec::new();
    let mut start = 0usize;
    let mut cur = is_value_byte(content[0]);
    for i in 1..content.len() {
        let v = is_value_byte(content[i]);
        if v != cur {
            runs.push((cur, start..i));
            start = i;
            cur = v;
        }
    }
    runs.push((cur, start..content.len()));

    let mut literals = Vec::new();
    let mut var_ranges = Vec::new();
    let mut pending_literal: Vec<u8> = Vec::new();

    for (is_value, range) in runs {
        if is_value {
            literals.push(std::mem::take(&mut pending_literal));
            var_ranges.push(range);
        } else {
            pending_literal.extend_from_slice(&content[range]);
        }
    }
    literals.push(pending_literal);

    (literals, var_ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars<'a>(row: &'a [u8], t: &TokenizedRow) -> Vec<&'a [u8]> {
        t.variables.iter().map(|s| s.resolve(row)).collect()
    }

    #[test]
    fn trivial_csv_strict() {
        let row = b"a,b,c\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        assert_eq!(t.template.arity(), 3);
        assert_eq!(vars(row, &t), vec![b"a".as_slice(), b"b", b"c"]);
        assert_eq!(t.template.key_bytes(), b"\x00,\x00,\x00\n".to_vec());
    }

    #[test]
    fn quoted_field_strict() {
        let row = b"\"a,b\",c\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        assert_eq!(t.template.arity(), 2);
        assert_eq!(vars(row, &t), vec![b"\"a,b\"".as_slice(), b"c"]);
        let reconstructed = t.template.reconstruct(&vars(row, &t));
        assert_eq!(reconstructed, row);
    }

    #[test]
    fn embedded_escaped_quote() {
        let row = b"\"d\"\"e\",f\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        assert_eq!(vars(row, &t), vec![b"\"d\"\"e\"".as_slice(), b"f"]);
        assert_eq!(t.template.reconstruct(&vars(row, &t)), row);
    }

    #[test]
    fn trailing_empty_field() {
        let row = b"a,b,\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        assert_eq!(t.template.arity(), 3);
        assert_eq!(vars(row, &t), vec![b"a".as_slice(), b"b", b""]);
    }

    #[test]
    fn adjacent_delimiters_empty_field() {
        let row = b"a,,c\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        assert_eq!(vars(row, &t), vec![b"a".as_slice(), b"", b"c"]);
    }

    #[test]
    fn aggressive_mixed_arity() {
        // `=` is not in the value-like byte class, so each `key=value`
        // pair splits into two variables (key, value) joined by a literal
        // `=`, not one: row1 yields x,1,y,2 (arity 4), row2 x,10,y,20,z,30
        // (arity 6).
        let row1 = b"x=1;y=2\n";
        let t1 = tokenize_row(row1, Strategy::Aggressive);
        assert_eq!(t1.template.arity(), 4);
        assert_eq!(vars(row1, &t1), vec![b"x".as_slice(), b"1", b"y", b"2"]);
        assert_eq!(t1.template.reconstruct(&vars(row1, &t1)), row1);

        let row2 = b"x=10;y=20;z=30\n";
        let t2 = tokenize_row(row2, Strategy::Aggressive);
        assert_eq!(t2.template.arity(), 6);
        assert_eq!(vars(row2, &t2), vec![b"x".as_slice(), b"10", b"y", b"20", b"z", b"30"]);
        assert_ne!(t1.template, t2.template);
    }

    #[test]
    fn aggressive_all_structure_row() {
        let row = b"====\n";
        let t = tokenize_row(row, Strategy::Aggressive);
        assert_eq!(t.template.arity(), 0);
        assert_eq!(t.template.reconstruct(&[]), row);
    }

    #[test]
    fn crlf_terminator_retained() {
        let row = b"a,b\r\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        let r = t.template.reconstruct(&vars(row, &t));
        assert_eq!(r, row);
    }

    #[test]
    fn lone_cr_is_not_a_terminator() {
        let row = b"a\rb\n";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        // Only one field (no comma), CR stays embedded in content.
        assert_eq!(t.template.arity(), 1);
        assert_eq!(vars(row, &t), vec![b"a\rb".as_slice()]);
    }

    #[test]
    fn unterminated_final_row_has_no_terminator_literal_growth() {
        let row = b"a,b";
        let t = tokenize_row(row, Strategy::Strict { delim: b',' });
        assert_eq!(t.template.reconstruct(&vars(row, &t)), row);
    }
}
