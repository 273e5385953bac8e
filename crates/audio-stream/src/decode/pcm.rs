use crate::config::{Codec, PcmFormat, StreamConfig};
use crate::error::StreamError;
use crate::pcm::{bytes_per_sample, unpack_s24le_to_s32le};

use super::Decoder;

/// Raw PCM: 16/32-bit pass through, 24-bit is widened to left-justified 32-bit.
///
/// Input must be whole samples; the session aligns reads before calling in.
#[derive(Debug)]
pub struct PcmDecoder {
    bit_depth: u16,
    format: PcmFormat,
}

impl PcmDecoder {
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        if bytes_per_sample(config.bit_depth).is_none() {
            return Err(StreamError::UnsupportedBitDepth {
                codec: Codec::Pcm,
                bit_depth: config.bit_depth,
            });
        }
        Ok(Self {
            bit_depth: config.bit_depth,
            format: config.output_format(),
        })
    }
}

impl Decoder for PcmDecoder {
    fn decode_into(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize, StreamError> {
        match self.bit_depth {
            24 => unpack_s24le_to_s32le(input, out),
            _ => {
                out.extend_from_slice(input);
                Ok(input.len())
            }
        }
    }

    fn passthrough(&self) -> bool {
        self.bit_depth != 24
    }

    fn output_format(&self) -> PcmFormat {
        self.format
    }
}
