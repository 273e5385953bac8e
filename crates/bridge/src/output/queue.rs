//! Bounded queue of interleaved `f32` samples between the pull thread and the CPAL callback.
//!
//! The pull thread pushes (blocking while full), the callback pops without ever waiting.
//! `close()` is both end-of-stream and cancellation: blocked pushes return, and the queue
//! drains what it already holds.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const WAIT_SLICE: Duration = Duration::from_millis(50);

pub struct SampleQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_samples: usize,
}

struct QueueInner {
    queue: VecDeque<f32>,
    done: bool,
}

/// Queue capacity in **samples** for `seconds` of audio; non-positive or non-finite
/// durations fall back to half a second.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.5
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.max(1).saturating_mul(channels.max(1))
}

impl SampleQueue {
    pub fn new(channels: usize, max_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            inner: Mutex::new(QueueInner {
                queue: VecDeque::with_capacity(max_samples),
                done: false,
            }),
            cv: Condvar::new(),
            max_samples: max_samples.max(channels),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len_frames(&self) -> usize {
        self.lock().queue.len() / self.channels
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Mark the queue finished and wake all waiters. Idempotent.
    pub fn close(&self) {
        self.lock().done = true;
        self.cv.notify_all();
    }

    /// Push samples, waiting for space while the queue is full.
    ///
    /// Returns `false` if the queue was closed before every sample was accepted.
    pub fn push_blocking(&self, samples: &[f32]) -> bool {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.lock();
            while g.queue.len() >= self.max_samples && !g.done {
                let (ng, _timeout) = self
                    .cv
                    .wait_timeout(g, WAIT_SLICE)
                    .unwrap_or_else(PoisonError::into_inner);
                g = ng;
            }
            if g.done {
                return false;
            }
            let room = self.max_samples - g.queue.len();
            let take = room.min(samples.len() - offset);
            g.queue.extend(&samples[offset..offset + take]);
            offset += take;
            drop(g);
            self.cv.notify_all();
        }
        true
    }

    /// Pop up to `max_frames` whole frames without waiting; `None` when none are buffered.
    pub fn pop_nonblocking(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.lock();
        let frames = (g.queue.len() / self.channels).min(max_frames);
        if frames == 0 {
            return None;
        }
        let out: Vec<f32> = g.queue.drain(..frames * self.channels).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until the queue is closed with fewer than one frame left, or `cancel` is set.
    ///
    /// Returns `true` if the queue drained normally.
    pub fn wait_until_drained_or_cancel(&self, cancel: &AtomicBool) -> bool {
        let mut g = self.lock();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if g.done && g.queue.len() < self.channels {
                return true;
            }
            let (ng, _timeout) = self
                .cv
                .wait_timeout(g, WAIT_SLICE)
                .unwrap_or_else(PoisonError::into_inner);
            g = ng;
        }
    }
}
