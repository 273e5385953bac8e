//! Shared accumulator + pull-callback plumbing for container codecs (FLAC, Opus).

use crate::config::{Codec, PcmFormat};
use crate::error::StreamError;

use super::Decoder;

/// The converter's view of buffered compressed input.
///
/// [`InputFeed::pull`] hands over everything buffered in one shot and then reports that
/// nothing more is available right now. Converters mark what they used with
/// [`InputFeed::consume`]; the rest stays buffered for the next call.
pub struct InputFeed<'a> {
    pending: &'a [u8],
    handed_over: bool,
    consumed: usize,
    end_of_stream: bool,
}

impl<'a> InputFeed<'a> {
    pub fn new(pending: &'a [u8], end_of_stream: bool) -> Self {
        Self {
            pending,
            handed_over: false,
            consumed: 0,
            end_of_stream,
        }
    }

    /// All unconsumed input, or `None` once it has been handed over (or is empty).
    pub fn pull(&mut self) -> Option<&'a [u8]> {
        if self.handed_over || self.consumed >= self.pending.len() {
            return None;
        }
        self.handed_over = true;
        Some(&self.pending[self.consumed..])
    }

    /// Mark `n` more bytes, counted from the front of the unconsumed input, as used.
    pub fn consume(&mut self, n: usize) {
        self.consumed = (self.consumed + n).min(self.pending.len());
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// No more input will ever follow what is currently buffered.
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }
}

/// Codec-specific half of a [`ContainerDecoder`].
pub trait Converter: Send {
    fn codec(&self) -> Codec;

    fn output_format(&self) -> PcmFormat;

    /// Pull input from `feed`, append decoded PCM to `out` and return the bytes appended.
    ///
    /// Running out of input is not an error: return what was produced so far.
    fn convert(&mut self, feed: &mut InputFeed<'_>, out: &mut Vec<u8>)
    -> Result<usize, StreamError>;
}

/// Accumulates compressed bytes across calls and drives a [`Converter`] over them.
pub struct ContainerDecoder<C> {
    converter: C,
    pending: Vec<u8>,
}

impl<C: Converter> ContainerDecoder<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            pending: Vec::with_capacity(64 * 1024),
        }
    }

    /// Compressed bytes received but not yet consumed by the converter.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn run(&mut self, end_of_stream: bool, out: &mut Vec<u8>) -> Result<usize, StreamError> {
        let mut feed = InputFeed::new(&self.pending, end_of_stream);
        let result = self.converter.convert(&mut feed, out);
        let consumed = feed.consumed();
        self.pending.drain(..consumed);
        result
    }
}

impl<C: Converter> Decoder for ContainerDecoder<C> {
    fn decode_into(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize, StreamError> {
        self.pending.extend_from_slice(input);
        if self.pending.is_empty() {
            return Ok(0);
        }
        self.run(false, out)
    }

    fn flush(&mut self, out: &mut Vec<u8>) -> Result<usize, StreamError> {
        let produced = self.run(true, out)?;
        if !self.pending.is_empty() {
            tracing::debug!(
                codec = %self.converter.codec(),
                bytes = self.pending.len(),
                "discarding undecodable tail"
            );
            self.pending.clear();
        }
        Ok(produced)
    }

    fn output_format(&self) -> PcmFormat {
        self.converter.output_format()
    }
}
