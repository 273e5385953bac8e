//! Boundary with the host audio engine.
//!
//! The engine owns device output and its own pull thread. It is handed a [`StreamSource`]
//! when the first bytes of a stream arrive and pulls normalized PCM from it until
//! [`StreamSource::is_end_of_stream`] or until [`AudioEngine::stop`] is called.

use std::fmt;
use std::sync::Arc;

use crate::config::PcmFormat;
use crate::error::StreamError;

/// Consumer-side capability: fill `out` with normalized PCM.
pub trait PullSource: Send + Sync {
    /// Fill up to `out.len()` bytes. Blocks while the stream is open and starved.
    ///
    /// Returns `Ok(0)` only at end of stream.
    fn read(&self, out: &mut [u8]) -> Result<usize, StreamError>;

    /// The producer side has finished or the stream was stopped.
    fn is_closed(&self) -> bool;
}

/// Cloneable handle the engine pulls from.
#[derive(Clone)]
pub struct StreamSource {
    inner: Arc<dyn PullSource>,
    format: PcmFormat,
}

impl StreamSource {
    pub fn new(inner: Arc<dyn PullSource>, format: PcmFormat) -> Self {
        Self { inner, format }
    }

    pub fn read(&self, out: &mut [u8]) -> Result<usize, StreamError> {
        self.inner.read(out)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Layout of every byte returned by [`StreamSource::read`].
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Whether a read that returned `n` bytes marks the end of the stream.
    pub fn is_end_of_stream(&self, n: usize) -> bool {
        n == 0 && self.inner.is_closed()
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("format", &self.format)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Host audio engine driven by the session.
#[cfg_attr(test, mockall::automock)]
pub trait AudioEngine: Send + Sync {
    /// Load `source` and start pulling from it.
    fn open(&self, source: StreamSource) -> Result<(), StreamError>;

    /// Stop pulling and release the current source. Returns once the pull side is idle.
    fn stop(&self);
}
