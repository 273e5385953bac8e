//! Codec decoders: stateful transforms from wire bytes to normalized PCM.
//!
//! A decoder is built once per [`StreamConfig`] by a [`DecoderFactory`] and is only ever
//! driven from the session's single pull path. It may hold input back until it has enough
//! to produce output, so an empty result means "need more data", not failure.

mod feed;
mod flac;
mod opus;
mod pcm;

pub use self::feed::{ContainerDecoder, Converter, InputFeed};
pub use self::flac::FlacConverter;
pub use self::opus::OpusConverter;
pub use self::pcm::PcmDecoder;

use crate::config::{Codec, PcmFormat, StreamConfig};
use crate::error::StreamError;

/// Incremental decoder contract shared by every codec.
pub trait Decoder: Send {
    /// Decode `input`, appending PCM to `out`. Returns the number of bytes appended.
    fn decode_into(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize, StreamError>;

    /// Decode `input` into a fresh buffer.
    fn decode(&mut self, input: &[u8]) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::new();
        self.decode_into(input, &mut out)?;
        Ok(out)
    }

    /// Emit whatever the decoder was holding back once no more input will arrive.
    fn flush(&mut self, _out: &mut Vec<u8>) -> Result<usize, StreamError> {
        Ok(0)
    }

    /// `true` when output is byte-identical to input, letting callers skip the copy.
    fn passthrough(&self) -> bool {
        false
    }

    /// Layout of the PCM this decoder emits.
    fn output_format(&self) -> PcmFormat;
}

/// Builds the decoder for a stream configuration.
pub trait DecoderFactory: Send + Sync {
    fn make(&self, config: &StreamConfig) -> Result<Box<dyn Decoder>, StreamError>;
}

/// Codec-keyed factory covering PCM, FLAC and Opus.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDecoderFactory;

impl DecoderFactory for DefaultDecoderFactory {
    fn make(&self, config: &StreamConfig) -> Result<Box<dyn Decoder>, StreamError> {
        config.validate()?;
        let decoder: Box<dyn Decoder> = match config.codec {
            Codec::Pcm => Box::new(PcmDecoder::new(config)?),
            Codec::Flac => Box::new(ContainerDecoder::new(FlacConverter::new(config)?)),
            Codec::Opus => Box::new(ContainerDecoder::new(OpusConverter::new(config)?)),
        };
        tracing::debug!(
            codec = %config.codec,
            sample_rate = config.sample_rate,
            channels = config.channels,
            bit_depth = config.bit_depth,
            "decoder created"
        );
        Ok(decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_passthrough_for_16_bit_pcm() {
        let cfg = StreamConfig::new(Codec::Pcm, 44_100, 2, 16);
        let mut decoder = DefaultDecoderFactory.make(&cfg).unwrap();
        assert!(decoder.passthrough());
        assert_eq!(decoder.decode(&[1, 2, 3, 4]).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn factory_rejects_invalid_configs_up_front() {
        let cfg = StreamConfig::new(Codec::Flac, 0, 2, 16);
        let err = DefaultDecoderFactory.make(&cfg).err().unwrap();
        assert!(matches!(err, StreamError::InvalidConfig(_)));

        let cfg = StreamConfig::new(Codec::Pcm, 48_000, 2, 20);
        let err = DefaultDecoderFactory.make(&cfg).err().unwrap();
        assert!(matches!(err, StreamError::UnsupportedBitDepth { .. }));
    }

    #[test]
    fn factory_reports_converter_failures() {
        let cfg = StreamConfig::new(Codec::Opus, 44_100, 2, 16);
        let err = DefaultDecoderFactory.make(&cfg).err().unwrap();
        assert!(matches!(err, StreamError::ConverterInit { codec: Codec::Opus, .. }));
    }
}
