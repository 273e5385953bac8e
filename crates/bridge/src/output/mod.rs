//! CPAL-backed [`AudioEngine`].
//!
//! `open` starts two threads:
//! - the output thread builds and plays the CPAL stream (streams are not `Send` on every
//!   platform, so they live and die on the thread that built them);
//! - the pull thread reads normalized PCM from the [`StreamSource`], converts it to `f32`
//!   and feeds the bounded [`SampleQueue`] the device callback drains.
//!
//! The device must run at the stream's sample rate; there is no resampling stage.

pub mod device;
pub mod playback;
pub mod queue;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use audio_stream::{AudioEngine, PcmFormat, StreamError, StreamSource, pcm};
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{Sender, bounded};

use crate::config::OutputConfig;
use playback::PlaybackCounters;
use queue::{SampleQueue, calc_max_buffered_samples};

const PULL_CHUNK_BYTES: usize = 4096;
/// Lets the device play out its own buffer before the stream is dropped.
const DRAIN_TAIL: Duration = Duration::from_millis(100);

pub struct CpalEngine {
    config: OutputConfig,
    active: Mutex<Option<ActiveStream>>,
}

struct ActiveStream {
    queue: Arc<SampleQueue>,
    cancel: Arc<AtomicBool>,
    pull: JoinHandle<()>,
    output: JoinHandle<()>,
}

impl CpalEngine {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveStream>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, source: StreamSource) -> Result<ActiveStream> {
        let format = source.format();
        let channels = usize::from(format.channels);
        let queue = Arc::new(SampleQueue::new(
            channels,
            calc_max_buffered_samples(format.sample_rate, channels, self.config.queue_seconds),
        ));
        let cancel = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let output = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let config = self.config.clone();
            thread::Builder::new()
                .name("bridge-output".to_string())
                .spawn(move || output_thread_main(config, format, queue, cancel, ready_tx))
                .context("spawn output thread")?
        };
        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(anyhow!("output thread exited before starting")));
        if let Err(e) = ready {
            let _ = output.join();
            return Err(e);
        }

        let pull = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("bridge-pull".to_string())
                .spawn(move || pull_thread_main(source, queue, cancel))
        };
        let pull = match pull {
            Ok(handle) => handle,
            Err(e) => {
                cancel.store(true, Ordering::Relaxed);
                queue.close();
                let _ = output.join();
                return Err(e).context("spawn pull thread");
            }
        };

        Ok(ActiveStream {
            queue,
            cancel,
            pull,
            output,
        })
    }
}

impl AudioEngine for CpalEngine {
    fn open(&self, source: StreamSource) -> Result<(), StreamError> {
        self.stop();
        let format = source.format();
        let active = self.start(source).map_err(StreamError::Engine)?;
        *self.lock_active() = Some(active);
        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits,
            "output engine started"
        );
        Ok(())
    }

    fn stop(&self) {
        let Some(active) = self.lock_active().take() else {
            return;
        };
        active.cancel.store(true, Ordering::Relaxed);
        active.queue.close();
        if active.pull.join().is_err() {
            tracing::warn!("pull thread panicked");
        }
        if active.output.join().is_err() {
            tracing::warn!("output thread panicked");
        }
        tracing::info!("output engine stopped");
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build the CPAL stream, report readiness, then keep it alive until the queue drains or
/// the engine is stopped.
fn output_thread_main(
    config: OutputConfig,
    format: PcmFormat,
    queue: Arc<SampleQueue>,
    cancel: Arc<AtomicBool>,
    ready: Sender<Result<()>>,
) {
    let counters = Arc::new(PlaybackCounters::default());
    let stream = match open_stream(&config, format, &queue, counters.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let drained = queue.wait_until_drained_or_cancel(&cancel);
    if drained {
        thread::sleep(DRAIN_TAIL);
    }
    drop(stream);
    tracing::info!(
        drained,
        played_frames = counters.played_frames.load(Ordering::Relaxed),
        underrun_events = counters.underrun_events.load(Ordering::Relaxed),
        underrun_frames = counters.underrun_frames.load(Ordering::Relaxed),
        "output stream closed"
    );
}

fn open_stream(
    config: &OutputConfig,
    format: PcmFormat,
    queue: &Arc<SampleQueue>,
    counters: Arc<PlaybackCounters>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, config.device.as_deref())?;
    let supported = device::pick_output_config(&device, format.sample_rate, format.channels)?;
    let mut stream_config: cpal::StreamConfig = supported.clone().into();
    if let Some(buf) = device::pick_buffer_size(&supported) {
        stream_config.buffer_size = buf;
    }
    tracing::info!(
        device = %device.description()?,
        rate_hz = stream_config.sample_rate,
        channels = stream_config.channels,
        sample_format = ?supported.sample_format(),
        buffer_size = ?stream_config.buffer_size,
        "device output config"
    );

    let stream = playback::build_output_stream(
        &device,
        &stream_config,
        supported.sample_format(),
        queue,
        config.refill_max_frames,
        counters,
    )?;
    stream.play().context("start output stream")?;
    Ok(stream)
}

/// Move PCM from `source` into `queue` until end of stream, a decode error or cancel.
fn pull_thread_main(source: StreamSource, queue: Arc<SampleQueue>, cancel: Arc<AtomicBool>) {
    let bits = source.format().bits;
    let mut buf = vec![0u8; PULL_CHUNK_BYTES];
    let mut carry: Vec<u8> = Vec::with_capacity(PULL_CHUNK_BYTES + 4);
    let mut samples: Vec<f32> = Vec::with_capacity(PULL_CHUNK_BYTES / 2);

    while !cancel.load(Ordering::Relaxed) {
        let n = match source.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "stream read failed");
                break;
            }
        };
        if source.is_end_of_stream(n) {
            tracing::debug!("end of stream");
            break;
        }
        if n == 0 {
            tracing::debug!("source starved");
            continue;
        }

        carry.extend_from_slice(&buf[..n]);
        samples.clear();
        let used = pcm::to_f32(&carry, bits, &mut samples);
        carry.drain(..used);
        if !queue.push_blocking(&samples) {
            break;
        }
    }
    queue.close();
}
