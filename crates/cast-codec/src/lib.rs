//! Coder adapter (`spec.md` §4.I): the only place that knows about a
//! specific entropy-coding back-end. Every other crate in the workspace
//! sees opaque byte buffers in and out.

mod external;
mod native;

pub use external::ExternalProcess7z;
pub use native::NativeLzma2;

use thiserror::Error;

/// Reference dictionary size (`spec.md` §4.I): 128 MiB.
pub const DEFAULT_DICT_SIZE: u32 = 128 * 1024 * 1024;

/// Reference thread count for a single solid block.
pub const DEFAULT_THREADS: u32 = 1;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// A capability interface over LZMA2 encode/decode. Concrete backends are
/// tagged alternatives selected by configuration, not a type hierarchy
/// (`spec.md` §9).
pub trait Coder: Send + Sync {
    fn encode(&self, bytes: &[u8], dict_size: u32, threads: u32) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Which concrete `Coder` to use. `Auto` is resolved by the container
/// driver (native unless `SEVEN_ZIP_PATH` demands the external backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderKind {
    Native,
    External7z,
}

pub fn coder_for(kind: CoderKind) -> Box<dyn Coder> {
    match kind {
        CoderKind::Native => Box::new(NativeLzma2),
        CoderKind::External7z => Box::new(ExternalProcess7z::new()),
    }
}
