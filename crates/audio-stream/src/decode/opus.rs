//! Opus converter.
//!
//! Packet boundaries do not survive the byte ring, so each packet travels with a `u16` LE
//! length prefix. Packets are decoded with libopus into interleaved s16le.

use crate::config::{Codec, PcmFormat, StreamConfig};
use crate::error::StreamError;
use crate::pcm::extend_i16_le;

use super::feed::{Converter, InputFeed};

const LEN_PREFIX: usize = 2;
const OPUS_HEAD: &[u8; 8] = b"OpusHead";
const OPUS_HEAD_MIN_LEN: usize = 19;
const SUPPORTED_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];
/// Longest Opus packet duration.
const MAX_PACKET_MS: usize = 120;

/// Fields of an `OpusHead` identification header that affect decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpusHead {
    channels: u16,
    /// Samples (at 48 kHz) to discard from the start of the stream.
    pre_skip: u16,
}

pub struct OpusConverter {
    decoder: ::opus::Decoder,
    format: PcmFormat,
    scratch: Vec<i16>,
    skip_frames: usize,
}

impl OpusConverter {
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let reject = |reason: String| StreamError::ConverterInit {
            codec: Codec::Opus,
            reason,
        };

        let channels = match config.channels {
            1 => ::opus::Channels::Mono,
            2 => ::opus::Channels::Stereo,
            n => return Err(reject(format!("{n} channels unsupported (1 or 2)"))),
        };
        if !SUPPORTED_RATES.contains(&config.sample_rate) {
            return Err(reject(format!(
                "sample rate {} unsupported",
                config.sample_rate
            )));
        }

        let pre_skip = match config.codec_header.as_deref() {
            Some(header) => {
                let head = parse_opus_head(header)?;
                if head.channels != config.channels {
                    return Err(StreamError::InvalidConfig(format!(
                        "OpusHead declares {} channels, stream config {}",
                        head.channels, config.channels
                    )));
                }
                head.pre_skip
            }
            None => 0,
        };

        let decoder = ::opus::Decoder::new(config.sample_rate, channels)
            .map_err(|e| reject(e.to_string()))?;

        let max_frames = config.sample_rate as usize * MAX_PACKET_MS / 1000;
        Ok(Self {
            decoder,
            format: config.output_format(),
            scratch: vec![0i16; max_frames * usize::from(config.channels)],
            skip_frames: usize::from(pre_skip) * config.sample_rate as usize / 48_000,
        })
    }
}

impl Converter for OpusConverter {
    fn codec(&self) -> Codec {
        Codec::Opus
    }

    fn output_format(&self) -> PcmFormat {
        self.format
    }

    fn convert(
        &mut self,
        feed: &mut InputFeed<'_>,
        out: &mut Vec<u8>,
    ) -> Result<usize, StreamError> {
        let Some(input) = feed.pull() else {
            return Ok(0);
        };
        let channels = usize::from(self.format.channels);
        let mut pos = 0usize;
        let mut produced = 0usize;

        while input.len() - pos >= LEN_PREFIX {
            let len = usize::from(u16::from_le_bytes([input[pos], input[pos + 1]]));
            if input.len() - pos - LEN_PREFIX < len {
                break;
            }
            let packet = &input[pos + LEN_PREFIX..pos + LEN_PREFIX + len];
            pos += LEN_PREFIX + len;
            if packet.is_empty() {
                continue;
            }

            let frames = match self.decoder.decode(packet, &mut self.scratch, false) {
                Ok(frames) => frames,
                Err(e) => {
                    feed.consume(pos);
                    return Err(StreamError::Decode {
                        codec: Codec::Opus,
                        reason: e.to_string(),
                    });
                }
            };

            let skip = self.skip_frames.min(frames);
            self.skip_frames -= skip;
            let samples = &self.scratch[skip * channels..frames * channels];
            extend_i16_le(out, samples);
            produced += samples.len() * 2;
        }

        feed.consume(pos);
        Ok(produced)
    }
}

fn parse_opus_head(header: &[u8]) -> Result<OpusHead, StreamError> {
    let invalid = |reason: &str| StreamError::InvalidConfig(format!("OpusHead: {reason}"));

    if header.len() < OPUS_HEAD_MIN_LEN || &header[..OPUS_HEAD.len()] != OPUS_HEAD {
        return Err(invalid("missing identification header"));
    }
    if header[8] >> 4 != 0 {
        return Err(invalid("unsupported version"));
    }
    if header[18] != 0 {
        return Err(invalid("only channel mapping family 0 is supported"));
    }
    Ok(OpusHead {
        channels: u16::from(header[9]),
        pre_skip: u16::from_le_bytes([header[10], header[11]]),
    })
}
