//! The `native` coder adapter: LZMA2 via liblzma, in-process, through the
//! `xz2` bindings. No subprocess, no temp files.

use std::io::Write;

use xz2::stream::{LzmaOptions, Stream};
use xz2::write::{XzDecoder, XzEncoder};

use crate::{CodecError, Coder};

/// LZMA2 at preset level 9 extreme (`spec.md` §4.I).
const PRESET: u32 = 9 | xz2::stream::PRESET_EXTREME;

pub struct NativeLzma2;

impl Coder for NativeLzma2 {
    fn encode(&self, bytes: &[u8], dict_size: u32, _threads: u32) -> Result<Vec<u8>, CodecError> {
        let mut options =
            LzmaOptions::new_preset(PRESET).map_err(|e| CodecError(format!("lzma preset: {e}")))?;
        options.dict_size(dict_size);
        let stream = Stream::new_lzma_encoder(&options)
            .map_err(|e| CodecError(format!("lzma encoder init: {e}")))?;

        let mut encoder = XzEncoder::new_stream(Vec::with_capacity(bytes.len() / 2), stream);
        encoder.write_all(bytes).map_err(|e| CodecError(format!("lzma encode: {e}")))?;
        encoder.finish().map_err(|e| CodecError(format!("lzma encode finish: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let stream = Stream::new_lzma_decoder(u64::MAX)
            .map_err(|e| CodecError(format!("lzma decoder init: {e}")))?;

        let mut decoder = XzDecoder::new_stream(Vec::with_capacity(bytes.len() * 2), stream);
        decoder.write_all(bytes).map_err(|e| CodecError(format!("lzma decode: {e}")))?;
        decoder.finish().map_err(|e| CodecError(format!("lzma decode finish: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_DICT_SIZE;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_round_trips() {
        let coder = NativeLzma2;
        let encoded = coder.encode(b"", DEFAULT_DICT_SIZE, 1).unwrap();
        assert_eq!(coder.decode(&encoded).unwrap(), b"");
    }

    #[test]
    fn repetitive_text_round_trips() {
        let coder = NativeLzma2;
        let input = "the quick brown fox\n".repeat(500);
        let encoded = coder.encode(input.as_bytes(), DEFAULT_DICT_SIZE, 1).unwrap();
        assert!(encoded.len() < input.len());
        assert_eq!(coder.decode(&encoded).unwrap(), input.as_bytes());
    }
}
