//! Stream session controller.
//!
//! Sequences `prepare -> first data -> start -> stop` over one ring buffer and one decoder,
//! and exposes the pull path the audio engine reads from. The engine and the decoder
//! factory are injected; nothing here is global.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{BufferConfig, Codec, PcmFormat, StreamConfig};
use crate::decode::{Decoder, DecoderFactory, DefaultDecoderFactory};
use crate::engine::{AudioEngine, PullSource, StreamSource};
use crate::error::StreamError;
use crate::pcm::bytes_per_sample;
use crate::ring::{RingBuffer, RingStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing prepared yet.
    Idle,
    /// Decoder built and ring cleared; the engine has not been opened.
    Prepared,
    /// The engine is pulling.
    Started,
    /// Stopped until the next `prepare`.
    Stopped,
}

/// Snapshot of session and ring counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStats {
    pub state: SessionState,
    pub buffered_bytes: usize,
    pub capacity_bytes: usize,
    pub ring: RingStats,
}

pub struct StreamSession {
    core: Arc<SessionCore>,
    engine: Arc<dyn AudioEngine>,
    factory: Arc<dyn DecoderFactory>,
    buffers: BufferConfig,
    control: Mutex<Control>,
}

struct Control {
    state: SessionState,
    config: Option<StreamConfig>,
    format: Option<PcmFormat>,
}

impl StreamSession {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        factory: Arc<dyn DecoderFactory>,
        buffers: BufferConfig,
    ) -> Self {
        let core = SessionCore {
            ring: RingBuffer::new(buffers.capacity_bytes, buffers.read_wait),
            consumer: Mutex::new(None),
            failure: Mutex::new(None),
        };
        Self {
            core: Arc::new(core),
            engine,
            factory,
            buffers,
            control: Mutex::new(Control {
                state: SessionState::Idle,
                config: None,
                format: None,
            }),
        }
    }

    /// Session using the built-in PCM/FLAC/Opus decoders.
    pub fn with_default_decoders(engine: Arc<dyn AudioEngine>, buffers: BufferConfig) -> Self {
        Self::new(engine, Arc::new(DefaultDecoderFactory), buffers)
    }

    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock_control().state
    }

    /// Config of the current (or last stopped) stream.
    pub fn config(&self) -> Option<StreamConfig> {
        self.lock_control().config.clone()
    }

    pub fn stats(&self) -> SessionStats {
        let state = self.state();
        SessionStats {
            state,
            buffered_bytes: self.core.ring.available(),
            capacity_bytes: self.core.ring.capacity(),
            ring: self.core.ring.stats(),
        }
    }

    /// Get ready for a new stream described by `config`.
    ///
    /// A running stream is stopped first. The engine is not opened until data arrives.
    /// On failure the session is left idle.
    pub fn prepare(&self, config: StreamConfig) -> Result<(), StreamError> {
        let mut control = self.lock_control();
        if control.state == SessionState::Started {
            self.halt(&mut control);
        }
        self.core.ring.close();
        *self.core.lock_consumer() = None;
        *self.core.lock_failure() = None;
        control.config = None;
        control.format = None;

        let decoder = match self.factory.make(&config) {
            Ok(decoder) => decoder,
            Err(e) => {
                control.state = SessionState::Idle;
                tracing::warn!(codec = %config.codec, error = %e, "prepare failed");
                return Err(e);
            }
        };

        let format = decoder.output_format();
        let align = match config.codec {
            Codec::Pcm => {
                bytes_per_sample(config.bit_depth).unwrap_or(1) * usize::from(config.channels)
            }
            Codec::Flac | Codec::Opus => 1,
        };
        let capacity = self.buffers.capacity_for(format);
        *self.core.lock_consumer() = Some(Consumer::new(
            decoder,
            config.codec,
            align,
            self.buffers.min_read_bytes,
        ));
        self.core.ring.reset_with_capacity(capacity);

        tracing::info!(
            codec = %config.codec,
            sample_rate = config.sample_rate,
            channels = config.channels,
            bit_depth = config.bit_depth,
            output_bits = format.bits,
            ring_bytes = capacity,
            "stream prepared"
        );
        control.state = SessionState::Prepared;
        control.config = Some(config);
        control.format = Some(format);
        Ok(())
    }

    /// Queue compressed (or raw PCM) bytes for playback.
    ///
    /// The first non-empty push after `prepare` opens the engine. Returns the number of
    /// bytes the ring accepted; after `stop` chunks are dropped and `0` is returned.
    ///
    /// If the pull path has failed to decode the current track, the session is stopped and
    /// that decode error is returned once.
    pub fn push_compressed(&self, bytes: &[u8]) -> Result<usize, StreamError> {
        let mut control = self.lock_control();
        match control.state {
            SessionState::Idle => Err(StreamError::NotPrepared),
            SessionState::Stopped => {
                tracing::debug!(bytes = bytes.len(), "chunk after stop dropped");
                Ok(0)
            }
            SessionState::Started => {
                let failure = self.core.lock_failure().take();
                if let Some(failure) = failure {
                    self.halt(&mut control);
                    *self.core.lock_consumer() = None;
                    let err = failure.into_error();
                    tracing::warn!(error = %err, "track failed, stream stopped");
                    return Err(err);
                }
                Ok(self.core.ring.write(bytes))
            }
            SessionState::Prepared => {
                if bytes.is_empty() {
                    return Ok(0);
                }
                let Some(format) = control.format else {
                    return Err(StreamError::NotPrepared);
                };
                let accepted = self.core.ring.write(bytes);
                let pull: Arc<dyn PullSource> = self.core.clone();
                if let Err(e) = self.engine.open(StreamSource::new(pull, format)) {
                    tracing::warn!(error = %e, "audio engine failed to open stream");
                    self.core.ring.close();
                    self.core.ring.clear();
                    control.state = SessionState::Stopped;
                    return Err(e);
                }
                tracing::info!(buffered_bytes = accepted, "stream started");
                control.state = SessionState::Started;
                Ok(accepted)
            }
        }
    }

    /// Like [`StreamSession::push_compressed`], for streams prepared as raw PCM.
    pub fn write_raw_pcm(&self, bytes: &[u8]) -> Result<usize, StreamError> {
        match self.lock_control().config.as_ref().map(|c| c.codec) {
            None => return Err(StreamError::NotPrepared),
            Some(Codec::Pcm) => {}
            Some(actual) => {
                return Err(StreamError::CodecMismatch {
                    expected: Codec::Pcm,
                    actual,
                });
            }
        }
        self.push_compressed(bytes)
    }

    /// The producer has sent the whole track: let the consumer drain and then end.
    pub fn finish(&self) {
        let control = self.lock_control();
        match control.state {
            SessionState::Prepared | SessionState::Started => {
                self.core.ring.close();
                tracing::info!(
                    buffered_bytes = self.core.ring.available(),
                    "stream finished by producer"
                );
            }
            SessionState::Idle | SessionState::Stopped => {}
        }
    }

    /// Stop playback now and discard anything buffered.
    pub fn stop(&self) {
        let mut control = self.lock_control();
        match control.state {
            SessionState::Started => self.halt(&mut control),
            SessionState::Prepared => {
                self.core.ring.close();
                self.core.ring.clear();
                control.state = SessionState::Stopped;
            }
            SessionState::Idle | SessionState::Stopped => return,
        }
        *self.core.lock_consumer() = None;
        tracing::info!("stream stopped");
    }

    fn halt(&self, control: &mut Control) {
        self.core.ring.close();
        self.engine.stop();
        self.core.ring.clear();
        control.state = SessionState::Stopped;
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared with the engine's pull thread.
///
/// `failure` is kept apart from `consumer`: the pull thread may hold the consumer lock
/// while it waits on the ring, and the producer must still be able to see the failure.
struct SessionCore {
    ring: RingBuffer,
    consumer: Mutex<Option<Consumer>>,
    failure: Mutex<Option<TrackFailure>>,
}

impl SessionCore {
    fn lock_consumer(&self) -> MutexGuard<'_, Option<Consumer>> {
        self.consumer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failure(&self) -> MutexGuard<'_, Option<TrackFailure>> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decode failure recorded by the pull path for the producer side.
struct TrackFailure {
    codec: Codec,
    reason: String,
}

impl TrackFailure {
    fn new(codec: Codec, err: &StreamError) -> Self {
        let reason = match err {
            StreamError::Decode { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Self { codec, reason }
    }

    fn into_error(self) -> StreamError {
        StreamError::Decode {
            codec: self.codec,
            reason: self.reason,
        }
    }
}

impl PullSource for SessionCore {
    fn read(&self, out: &mut [u8]) -> Result<usize, StreamError> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut consumer = self.lock_consumer();
        let Some(consumer) = consumer.as_mut() else {
            return Err(StreamError::NotPrepared);
        };
        let result = consumer.pull(&self.ring, out);
        if let Err(e) = &result {
            *self.lock_failure() = Some(TrackFailure::new(consumer.codec, e));
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.ring.is_closed()
    }
}

/// Decoder plus the buffers that sit between the ring and the engine.
struct Consumer {
    decoder: Box<dyn Decoder>,
    codec: Codec,
    /// Input bytes per frame for raw PCM, `1` for container codecs.
    align: usize,
    carry: Vec<u8>,
    scratch: Vec<u8>,
    pending: Vec<u8>,
    pending_pos: usize,
    finished: bool,
}

impl Consumer {
    fn new(decoder: Box<dyn Decoder>, codec: Codec, align: usize, read_bytes: usize) -> Self {
        let align = align.max(1);
        let read_bytes = read_bytes.max(align).div_ceil(align) * align;
        Self {
            decoder,
            codec,
            align,
            carry: Vec::with_capacity(align),
            scratch: vec![0u8; read_bytes],
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        }
    }

    fn pull(&mut self, ring: &RingBuffer, out: &mut [u8]) -> Result<usize, StreamError> {
        loop {
            if self.pending_pos < self.pending.len() {
                let n = out.len().min(self.pending.len() - self.pending_pos);
                out[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                if self.pending_pos == self.pending.len() {
                    self.pending.clear();
                    self.pending_pos = 0;
                }
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            if self.decoder.passthrough() && self.carry.is_empty() && out.len() >= self.align {
                let want = out.len() / self.align * self.align;
                let n = ring.read(&mut out[..want]);
                if n == 0 {
                    self.end_of_stream(ring)?;
                    continue;
                }
                let whole = n / self.align * self.align;
                self.carry.extend_from_slice(&out[whole..n]);
                if whole > 0 {
                    return Ok(whole);
                }
                continue;
            }

            let n = ring.read(&mut self.scratch);
            if n == 0 {
                self.end_of_stream(ring)?;
                continue;
            }
            let result = if self.align == 1 {
                self.decoder.decode_into(&self.scratch[..n], &mut self.pending)
            } else {
                self.carry.extend_from_slice(&self.scratch[..n]);
                let whole = self.carry.len() / self.align * self.align;
                if whole == 0 {
                    continue;
                }
                let result = self.decoder.decode_into(&self.carry[..whole], &mut self.pending);
                self.carry.drain(..whole);
                result
            };
            if let Err(e) = result {
                return Err(self.fail(ring, e));
            }
        }
    }

    /// Ring closed and drained: flush the decoder exactly once.
    fn end_of_stream(&mut self, ring: &RingBuffer) -> Result<(), StreamError> {
        self.finished = true;
        if !self.carry.is_empty() {
            tracing::debug!(bytes = self.carry.len(), "partial frame dropped at end of stream");
            self.carry.clear();
        }
        match self.decoder.flush(&mut self.pending) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(ring, e)),
        }
    }

    fn fail(&mut self, ring: &RingBuffer, err: StreamError) -> StreamError {
        tracing::warn!(error = %err, "decode failed, ending stream");
        ring.close();
        self.finished = true;
        self.carry.clear();
        self.pending.clear();
        self.pending_pos = 0;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockAudioEngine;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::mpsc;
    use std::thread::JoinHandle;
    use std::time::Duration;

    type Slot = Arc<Mutex<Option<StreamSource>>>;

    fn pcm(bit_depth: u16, channels: u16) -> StreamConfig {
        StreamConfig::new(Codec::Pcm, 48_000, channels, bit_depth)
    }

    /// Mock engine that captures the opened source so the test can pull by hand.
    fn capturing_engine(opens: usize, stops: usize) -> (MockAudioEngine, Slot) {
        let slot: Slot = Arc::new(Mutex::new(None));
        let captured = slot.clone();
        let mut engine = MockAudioEngine::new();
        engine.expect_open().times(opens).returning(move |source| {
            *captured.lock().unwrap() = Some(source);
            Ok(())
        });
        engine.expect_stop().times(stops).return_const(());
        (engine, slot)
    }

    fn session(engine: MockAudioEngine) -> StreamSession {
        StreamSession::with_default_decoders(Arc::new(engine), BufferConfig::default())
    }

    fn source(slot: &Slot) -> StreamSource {
        slot.lock().unwrap().clone().expect("engine was opened")
    }

    fn drain(source: &StreamSource, chunk: usize) -> Vec<u8> {
        let mut all = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = source.read(&mut buf).unwrap();
            if source.is_end_of_stream(n) {
                return all;
            }
            all.extend_from_slice(&buf[..n]);
        }
    }

    /// Engine that pulls on its own thread until end of stream, like a real device.
    struct CollectingEngine {
        tx: mpsc::Sender<Vec<u8>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    }

    impl AudioEngine for CollectingEngine {
        fn open(&self, source: StreamSource) -> Result<(), StreamError> {
            let tx = self.tx.clone();
            let handle = std::thread::spawn(move || {
                let mut all = Vec::new();
                let mut buf = [0u8; 333];
                loop {
                    match source.read(&mut buf) {
                        Ok(n) if source.is_end_of_stream(n) => break,
                        Ok(n) => all.extend_from_slice(&buf[..n]),
                        Err(_) => break,
                    }
                }
                let _ = tx.send(all);
            });
            *self.worker.lock().unwrap() = Some(handle);
            Ok(())
        }

        fn stop(&self) {
            if let Some(handle) = self.worker.lock().unwrap().take() {
                let _ = handle.join();
            }
        }
    }

    #[test]
    fn push_and_read_before_prepare_are_rejected() {
        let (engine, _) = capturing_engine(0, 0);
        let s = session(engine);
        assert!(matches!(s.push_compressed(&[1, 2]), Err(StreamError::NotPrepared)));
        assert!(matches!(s.write_raw_pcm(&[1, 2]), Err(StreamError::NotPrepared)));
        let mut out = [0u8; 4];
        assert!(matches!(s.core.read(&mut out), Err(StreamError::NotPrepared)));
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn engine_opens_on_first_push_only() {
        let (engine, slot) = capturing_engine(1, 1);
        let s = session(engine);
        s.prepare(pcm(16, 2)).unwrap();
        assert_eq!(s.state(), SessionState::Prepared);
        assert!(slot.lock().unwrap().is_none());

        assert_eq!(s.push_compressed(&[]).unwrap(), 0);
        assert_eq!(s.state(), SessionState::Prepared);

        assert_eq!(s.push_compressed(&[1, 2, 3, 4]).unwrap(), 4);
        assert_eq!(s.state(), SessionState::Started);
        assert_eq!(s.push_compressed(&[5, 6, 7, 8]).unwrap(), 4);

        let src = source(&slot);
        assert_eq!(src.format().bits, 16);
        assert_eq!(s.stats().buffered_bytes, 8);

        s.stop();
        assert_eq!(s.state(), SessionState::Stopped);
        assert_eq!(s.stats().buffered_bytes, 0);
    }

    #[test]
    fn engine_open_failure_stops_the_session() {
        let mut engine = MockAudioEngine::new();
        engine
            .expect_open()
            .times(1)
            .returning(|_| Err(StreamError::Engine(anyhow::anyhow!("no device"))));
        engine.expect_stop().times(0);
        let s = session(engine);
        s.prepare(pcm(16, 2)).unwrap();
        assert!(matches!(
            s.push_compressed(&[0; 4]),
            Err(StreamError::Engine(_))
        ));
        assert_eq!(s.state(), SessionState::Stopped);
    }

    #[test]
    fn stop_before_first_push_does_not_touch_engine() {
        let (engine, _) = capturing_engine(0, 0);
        let s = session(engine);
        s.prepare(pcm(16, 2)).unwrap();
        s.stop();
        assert_eq!(s.state(), SessionState::Stopped);
    }

    #[test]
    fn chunks_after_stop_are_dropped_until_next_prepare() {
        let (engine, _) = capturing_engine(2, 2);
        let s = session(engine);
        s.prepare(pcm(16, 2)).unwrap();
        s.push_compressed(&[0; 8]).unwrap();
        s.stop();
        assert_eq!(s.push_compressed(&[0; 8]).unwrap(), 0);
        assert_eq!(s.stats().buffered_bytes, 0);

        s.prepare(pcm(16, 2)).unwrap();
        assert_eq!(s.push_compressed(&[0; 8]).unwrap(), 8);
        s.stop();
    }

    #[test]
    fn reprepare_while_started_stops_then_prepares() {
        let (engine, slot) = capturing_engine(2, 2);
        let s = session(engine);
        s.prepare(pcm(16, 2)).unwrap();
        s.push_compressed(&[9; 16]).unwrap();

        s.prepare(pcm(24, 1)).unwrap();
        assert_eq!(s.state(), SessionState::Prepared);
        assert_eq!(s.stats().buffered_bytes, 0);
        assert_eq!(s.config().unwrap().bit_depth, 24);

        s.push_compressed(&[0, 0, 0x80]).unwrap();
        s.finish();
        let src = source(&slot);
        assert_eq!(src.format().bits, 32);
        assert_eq!(drain(&src, 64), vec![0x00, 0x00, 0x00, 0x80]);
        s.stop();
    }

    #[test]
    fn failed_prepare_leaves_session_idle() {
        let (engine, _) = capturing_engine(0, 0);
        let s = session(engine);
        assert!(matches!(
            s.prepare(pcm(20, 2)),
            Err(StreamError::UnsupportedBitDepth { bit_depth: 20, .. })
        ));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.config().is_none());
        assert!(matches!(s.push_compressed(&[0; 4]), Err(StreamError::NotPrepared)));
    }

    #[test]
    fn raw_pcm_requires_a_pcm_stream() {
        let (engine, _) = capturing_engine(0, 0);
        let s = session(engine);
        s.prepare(StreamConfig::new(Codec::Flac, 44_100, 2, 16)).unwrap();
        assert!(matches!(
            s.write_raw_pcm(&[0; 4]),
            Err(StreamError::CodecMismatch {
                expected: Codec::Pcm,
                actual: Codec::Flac
            })
        ));
    }

    #[test]
    fn split_24_bit_samples_are_carried_between_pulls() {
        let (engine, slot) = capturing_engine(1, 1);
        let s = session(engine);
        s.prepare(pcm(24, 1)).unwrap();
        s.write_raw_pcm(&[0x00, 0x00, 0x80, 0xFF]).unwrap();
        let src = source(&slot);

        let mut out = [0u8; 16];
        assert_eq!(src.read(&mut out).unwrap(), 4);
        assert_eq!(&out[..4], &[0x00, 0x00, 0x00, 0x80]);

        s.write_raw_pcm(&[0xFF, 0x7F]).unwrap();
        s.finish();
        assert_eq!(src.read(&mut out).unwrap(), 4);
        assert_eq!(&out[..4], &[0x00, 0xFF, 0xFF, 0x7F]);
        let n = src.read(&mut out).unwrap();
        assert_eq!(n, 0);
        assert!(src.is_end_of_stream(n));
        s.stop();
    }

    #[test]
    fn decoded_output_larger_than_caller_buffer_is_kept() {
        let (engine, slot) = capturing_engine(1, 1);
        let s = session(engine);
        s.prepare(pcm(24, 1)).unwrap();
        s.push_compressed(&[0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F]).unwrap();
        s.finish();

        let src = source(&slot);
        assert_eq!(
            drain(&src, 3),
            vec![0x00, 0x00, 0x00, 0x80, 0x00, 0xFF, 0xFF, 0x7F]
        );
        s.stop();
    }

    #[test]
    fn passthrough_drops_trailing_partial_frame_at_end() {
        let (engine, slot) = capturing_engine(1, 1);
        let s = session(engine);
        s.prepare(pcm(16, 2)).unwrap();
        s.push_compressed(&[1, 2, 3, 4, 5]).unwrap();
        s.finish();
        assert_eq!(drain(&source(&slot), 64), vec![1, 2, 3, 4]);
        s.stop();
    }

    #[test]
    fn decode_error_ends_the_track() {
        let (engine, slot) = capturing_engine(1, 1);
        let s = session(engine);
        s.prepare(StreamConfig::new(Codec::Opus, 48_000, 2, 16)).unwrap();
        s.push_compressed(&[1, 0, 0x03]).unwrap();

        let src = source(&slot);
        let mut out = [0u8; 64];
        assert!(matches!(
            src.read(&mut out),
            Err(StreamError::Decode { codec: Codec::Opus, .. })
        ));
        let n = src.read(&mut out).unwrap();
        assert!(src.is_end_of_stream(n));

        assert!(matches!(
            s.push_compressed(&[0; 4]),
            Err(StreamError::Decode { codec: Codec::Opus, .. })
        ));
        assert_eq!(s.state(), SessionState::Stopped);
        assert_eq!(s.push_compressed(&[0; 4]).unwrap(), 0);
        s.stop();
    }

    #[test]
    fn reprepare_clears_a_recorded_failure() {
        let (engine, slot) = capturing_engine(2, 2);
        let s = session(engine);
        s.prepare(StreamConfig::new(Codec::Opus, 48_000, 2, 16)).unwrap();
        s.push_compressed(&[1, 0, 0x03]).unwrap();
        let mut out = [0u8; 64];
        assert!(source(&slot).read(&mut out).is_err());

        s.prepare(pcm(16, 2)).unwrap();
        assert_eq!(s.push_compressed(&[1, 2, 3, 4]).unwrap(), 4);
        assert_eq!(s.push_compressed(&[5, 6, 7, 8]).unwrap(), 4);
        assert_eq!(s.state(), SessionState::Started);
        s.stop();
    }

    #[test]
    fn threaded_engine_receives_every_byte_in_order() {
        let (tx, rx) = mpsc::channel();
        let engine = Arc::new(CollectingEngine {
            tx,
            worker: Mutex::new(None),
        });
        let s = StreamSession::with_default_decoders(engine, BufferConfig::default());
        s.prepare(pcm(16, 2)).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let input: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        let mut pos = 0;
        while pos < input.len() {
            let len = rng.gen_range(1..=700).min(input.len() - pos);
            assert_eq!(s.push_compressed(&input[pos..pos + len]).unwrap(), len);
            pos += len;
        }
        s.finish();

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, input);
        s.stop();
        assert_eq!(s.stats().ring.bytes_read, input.len() as u64);
    }
}
