use thiserror::Error;

/// The full error taxonomy produced by the CAST structural engine.
///
/// `TemplateOverflow` is recovered locally by `cast-block` (the current
/// block is sealed early) and is never actually constructed as a
/// propagating error; it is kept here so the taxonomy matches the
/// specification one-to-one and so tests can assert it is unreachable.
#[derive(Debug, Error)]
pub enum CastError {
    #[error("input could not be tokenized under either strategy")]
    InputMalformed,

    #[error("template registry overflow (unreachable outside cast-block internals)")]
    TemplateOverflow,

    #[error("block {block}: codec encode failed: {reason}")]
    CodecEncodeFail { block: usize, reason: String },

    #[error("block {block}: codec decode failed: {reason}")]
    CodecDecodeFail { block: usize, reason: String },

    #[error("block {block}: integrity check failed at byte offset {offset}")]
    IntegrityFail { block: usize, offset: u64 },

    #[error("container malformed: {reason}")]
    ContainerMalformed { reason: String },

    #[error("row range {lo}..={hi} exceeds total row count {total}")]
    RangeOutOfBounds { lo: u64, hi: u64, total: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CastError {
    /// Maps an error to the process exit code defined by the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            CastError::InputMalformed => 4,
            CastError::TemplateOverflow => 4,
            CastError::CodecEncodeFail { .. } | CastError::CodecDecodeFail { .. } => 5,
            CastError::IntegrityFail { .. } => 4,
            CastError::ContainerMalformed { .. } => 4,
            CastError::RangeOutOfBounds { .. } => 2,
            CastError::Cancelled => 6,
            CastError::Io(_) => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, CastError>;
