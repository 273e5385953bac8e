use thiserror::Error;

use crate::config::Codec;

/// Errors surfaced by stream preparation, decoding and the engine boundary.
///
/// Overruns and starvation are not errors; they are counted on the ring buffer.
#[derive(Error, Debug)]
pub enum StreamError {
    /// No decoder is registered for the codec.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The codec cannot carry samples of this width.
    #[error("unsupported bit depth {bit_depth} for {codec}")]
    UnsupportedBitDepth { codec: Codec, bit_depth: u16 },

    /// Packed sample data whose length is not a whole number of samples.
    #[error("misaligned input: {len} bytes is not a multiple of {align}")]
    MisalignedInput { len: usize, align: usize },

    /// Stream parameters that can never describe a playable stream.
    #[error("invalid stream config: {0}")]
    InvalidConfig(String),

    /// The underlying converter rejected the declared parameters.
    #[error("failed to create {codec} converter: {reason}")]
    ConverterInit { codec: Codec, reason: String },

    /// Compressed input that the converter could not decode.
    #[error("{codec} decode failed: {reason}")]
    Decode { codec: Codec, reason: String },

    /// Operation requires a prepared stream.
    #[error("no stream prepared")]
    NotPrepared,

    /// Raw PCM was written to a stream declared with another codec.
    #[error("stream is {actual}, expected {expected}")]
    CodecMismatch { expected: Codec, actual: Codec },

    /// The host audio engine refused to open or run the stream.
    #[error("audio engine failure: {0:#}")]
    Engine(anyhow::Error),
}
