//! Row tokenizer (`spec.md` §4.D) and the `Template`/`Strategy` types it
//! produces and consumes.

mod strategy;
mod template;
mod tokenizer;

pub use strategy::{Strategy, STRICT_DELIMITERS};
pub use template::Template;
pub use tokenizer::{tokenize_row, TokenizedRow, VarSpans};
