//! CPAL output stream and its real-time callback.
//!
//! The callback refills a local buffer from the [`SampleQueue`] without blocking, maps
//! channels (mono↔stereo, clamp otherwise) and converts `f32` to the device sample format.
//! Underruns are filled with silence and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use super::queue::SampleQueue;

/// Counters updated from the audio callback.
#[derive(Debug, Default)]
pub struct PlaybackCounters {
    pub played_frames: AtomicU64,
    pub underrun_frames: AtomicU64,
    pub underrun_events: AtomicU64,
}

pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    refill_max_frames: usize,
    counters: Arc<PlaybackCounters>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(device, config, queue, refill_max_frames, counters)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(device, config, queue, refill_max_frames, counters)
        }
        cpal::SampleFormat::I32 => {
            build_stream::<i32>(device, config, queue, refill_max_frames, counters)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(device, config, queue, refill_max_frames, counters)
        }
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    refill_max_frames: usize,
    counters: Arc<PlaybackCounters>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels_out = usize::from(config.channels).max(1);
    let refill_max_frames = refill_max_frames.max(1);
    let queue_cb = queue.clone();
    let mut state = PlaybackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    };
    let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let frames = data.len() / channels_out;
            let mut filled_frames = 0usize;

            for frame in 0..frames {
                if state.pos >= state.src.len() {
                    state.pos = 0;
                    state.src.clear();
                    match queue_cb.pop_nonblocking(refill_max_frames) {
                        Some(v) => state.src = v,
                        None => {
                            counters.underrun_events.fetch_add(1, Ordering::Relaxed);
                            counters
                                .underrun_frames
                                .fetch_add((frames - frame) as u64, Ordering::Relaxed);
                            data[frame * channels_out..].fill(silence);
                            break;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = next_sample_mapped(&mut state, channels_out, ch);
                    data[frame * channels_out + ch] = <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                filled_frames += 1;
            }

            if filled_frames > 0 {
                counters
                    .played_frames
                    .fetch_add(filled_frames as u64, Ordering::Relaxed);
            }
        },
        |err| tracing::warn!(error = %err, "output stream error"),
        None,
    )?;

    Ok(stream)
}

/// Interleaved samples fetched from the queue, consumed one destination frame at a time.
struct PlaybackState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// Read one output sample for `dst_ch`.
///
/// `st.pos` advances once per destination frame (after the last channel).
fn next_sample_mapped(st: &mut PlaybackState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }

    let frame_start = st.pos;
    let get_src = |ch: usize, st: &PlaybackState| -> f32 {
        if ch < st.src_channels && frame_start + ch < st.src.len() {
            st.src[frame_start + ch]
        } else {
            0.0
        }
    };

    let out = match (st.src_channels, dst_channels) {
        (1, _) => get_src(0, st),
        (2, 1) => 0.5 * (get_src(0, st) + get_src(1, st)),
        _ => get_src(dst_ch.min(st.src_channels.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}
