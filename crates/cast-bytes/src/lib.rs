//! Byte-level building blocks shared by every CAST crate: CRC32, LEB128
//! varints, non-owning byte spans, and the structured error taxonomy.

mod crc32;
mod error;
mod varint;
mod view;

pub use crc32::{crc32, Crc32};
pub use error::{CastError, Result};
pub use varint::{read_varint, varint_len, write_varint, VarintReader};
pub use view::{find_byte, iter_rows, ByteSpan, RowIter};
