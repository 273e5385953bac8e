//! Streaming audio core: moves bytes arriving from a network producer into a form a
//! pull-based audio engine can consume.
//!
//! ## Pipeline
//! 1. **Push**: the network layer hands byte chunks to [`session::StreamSession`], which
//!    writes them into a fixed-capacity [`ring::RingBuffer`].
//! 2. **Pull**: the audio engine's I/O thread calls back through a [`engine::StreamSource`];
//!    the session reads the ring (bounded blocking wait) and runs the active decoder.
//! 3. **Normalize**: decoders emit interleaved little-endian PCM (16-bit, or left-justified
//!    32-bit for deeper sources) via the [`pcm`] helpers.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod pcm;
pub mod ring;
pub mod session;

pub use config::{BufferConfig, Codec, PcmFormat, StreamConfig};
pub use engine::{AudioEngine, PullSource, StreamSource};
pub use error::StreamError;
pub use ring::RingBuffer;
pub use session::{SessionState, SessionStats, StreamSession};
