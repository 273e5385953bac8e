//! Stream and buffer configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StreamError;

/// Codecs the session can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Interleaved little-endian signed PCM.
    Pcm,
    Flac,
    /// Opus packets, each prefixed with a `u16` LE byte length.
    Opus,
}

impl Codec {
    /// Stable identifier used on the wire.
    pub fn wire_id(self) -> u8 {
        match self {
            Codec::Pcm => 0,
            Codec::Flac => 1,
            Codec::Opus => 2,
        }
    }

    /// Inverse of [`Codec::wire_id`].
    pub fn from_wire_id(id: u8) -> Result<Self, StreamError> {
        match id {
            0 => Ok(Codec::Pcm),
            1 => Ok(Codec::Flac),
            2 => Ok(Codec::Opus),
            other => Err(StreamError::UnsupportedCodec(format!("wire id {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Pcm => "pcm",
            Codec::Flac => "flac",
            Codec::Opus => "opus",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcm" => Ok(Codec::Pcm),
            "flac" => Ok(Codec::Flac),
            "opus" => Ok(Codec::Opus),
            other => Err(StreamError::UnsupportedCodec(other.to_string())),
        }
    }
}

/// Parameters of one stream, fixed from `prepare` until the next `prepare`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: u16,
    /// Source bit depth (for Opus this is informational; output is always 16-bit).
    pub bit_depth: u16,
    /// Out-of-band codec initialization data (FLAC STREAMINFO, `OpusHead`).
    pub codec_header: Option<Vec<u8>>,
}

impl StreamConfig {
    pub fn new(codec: Codec, sample_rate: u32, channels: u16, bit_depth: u16) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            bit_depth,
            codec_header: None,
        }
    }

    pub fn with_codec_header(mut self, header: Vec<u8>) -> Self {
        self.codec_header = Some(header);
        self
    }

    /// Reject parameters that no decoder could accept.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.sample_rate == 0 {
            return Err(StreamError::InvalidConfig("sample rate is zero".to_string()));
        }
        if self.channels == 0 {
            return Err(StreamError::InvalidConfig("channel count is zero".to_string()));
        }
        Ok(())
    }

    /// Normalized PCM layout produced by the decoder for this stream.
    ///
    /// 24-bit sources are carried in 32-bit containers; Opus always decodes to 16-bit.
    pub fn output_format(&self) -> PcmFormat {
        let bits = match self.codec {
            Codec::Opus => 16,
            Codec::Pcm | Codec::Flac if self.bit_depth <= 16 => 16,
            Codec::Pcm | Codec::Flac => 32,
        };
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits,
        }
    }
}

/// Interleaved little-endian signed PCM layout handed to the audio engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Container width: 16 or 32.
    pub bits: u16,
}

impl PcmFormat {
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits / 8)
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Bytes per second of audio in this layout.
    pub fn byte_rate(&self) -> usize {
        self.bytes_per_frame()
            .saturating_mul(self.sample_rate as usize)
    }
}

/// Tuning for the ring buffer and the pull path.
#[derive(Clone, Debug)]
pub struct BufferConfig {
    /// Ring capacity in bytes, used when `seconds` is `None`.
    pub capacity_bytes: usize,
    /// Size the ring for this much of each stream's normalized output instead.
    pub seconds: Option<f32>,
    /// Bounded wait between re-checks while a reader is blocked on an empty ring.
    pub read_wait: Duration,
    /// Minimum number of compressed bytes requested from the ring per pull.
    pub min_read_bytes: usize,
}

const DEFAULT_SECONDS: f32 = 2.0;
const MIN_CAPACITY_BYTES: usize = 64 * 1024;

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 1024 * 1024,
            seconds: Some(DEFAULT_SECONDS),
            read_wait: Duration::from_millis(20),
            min_read_bytes: 4096,
        }
    }
}

impl BufferConfig {
    /// Ring capacity for a stream producing `format`.
    ///
    /// Non-finite or non-positive durations fall back to two seconds.
    pub fn capacity_for(&self, format: PcmFormat) -> usize {
        match self.seconds {
            Some(seconds) => duration_bytes(format, seconds),
            None => self.capacity_bytes.max(1),
        }
    }
}

fn duration_bytes(format: PcmFormat, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        DEFAULT_SECONDS
    };
    let bytes = (format.byte_rate() as f64 * f64::from(secs)).ceil() as usize;
    bytes.max(MIN_CAPACITY_BYTES)
}
