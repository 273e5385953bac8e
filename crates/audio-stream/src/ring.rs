//! Fixed-capacity byte ring between the network producer and the audio pull thread.
//!
//! - `write` never waits for space: bytes that do not fit are dropped from the tail of the
//!   incoming chunk (already-buffered audio wins over the newest bytes).
//! - `read` blocks while the ring is empty and open, re-checking every `read_wait` so a
//!   missed wake-up can never wedge the audio thread.
//! - `close` is the end-of-stream and cancellation signal; readers drain what is left and
//!   then get `0`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Bounded FIFO byte store with wrap-around indices.
///
/// A single mutex guards indices, fill level and the `closed` flag; one condition variable
/// signals "state changed" to readers.
pub struct RingBuffer {
    inner: Mutex<RingInner>,
    cv: Condvar,
    read_wait: Duration,
    overrun_events: AtomicU64,
    dropped_bytes: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    overrun_logged_ms: AtomicU64,
}

struct RingInner {
    data: Box<[u8]>,
    write_index: usize,
    read_index: usize,
    available: usize,
    closed: bool,
}

/// Counters accumulated since the ring was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RingStats {
    /// Writes that had to drop part of their chunk.
    pub overrun_events: u64,
    /// Total bytes dropped by overruns.
    pub dropped_bytes: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

impl RingBuffer {
    /// Create an empty, open ring.
    ///
    /// A zero `capacity` is bumped to one byte so index arithmetic stays defined.
    pub fn new(capacity: usize, read_wait: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(RingInner {
                data: vec![0u8; capacity].into_boxed_slice(),
                write_index: 0,
                read_index: 0,
                available: 0,
                closed: false,
            }),
            cv: Condvar::new(),
            read_wait: read_wait.max(Duration::from_millis(1)),
            overrun_events: AtomicU64::new(0),
            dropped_bytes: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            overrun_logged_ms: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().data.len()
    }

    /// Bytes currently buffered (snapshot).
    pub fn available(&self) -> usize {
        self.lock().available
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Copy as much of `bytes` as fits and wake any blocked reader.
    ///
    /// Returns the number of bytes accepted. The unaccepted suffix is dropped and counted
    /// as an overrun. Writes into a closed ring are discarded.
    pub fn write(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }

        let mut g = self.lock();
        if g.closed {
            drop(g);
            tracing::debug!(bytes = bytes.len(), "write after close dropped");
            return 0;
        }

        let capacity = g.data.len();
        let writable = bytes.len().min(capacity - g.available);
        let start = g.write_index;
        let first = writable.min(capacity - start);
        g.data[start..start + first].copy_from_slice(&bytes[..first]);
        let rest = writable - first;
        if rest > 0 {
            g.data[..rest].copy_from_slice(&bytes[first..writable]);
        }
        g.write_index = (start + writable) % capacity;
        g.available += writable;
        let buffered = g.available;
        drop(g);

        if writable > 0 {
            self.cv.notify_all();
        }
        self.bytes_written
            .fetch_add(writable as u64, Ordering::Relaxed);

        let dropped = bytes.len() - writable;
        if dropped > 0 {
            self.overrun_events.fetch_add(1, Ordering::Relaxed);
            self.dropped_bytes
                .fetch_add(dropped as u64, Ordering::Relaxed);
            self.log_overrun(dropped, buffered, capacity);
        }
        writable
    }

    /// Read up to `out.len()` bytes, blocking while the ring is empty and open.
    ///
    /// Returns `0` only when the ring is closed and fully drained (or `out` is empty).
    pub fn read(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }

        let mut g = self.lock();
        while g.available == 0 && !g.closed {
            let (ng, _timeout) = self
                .cv
                .wait_timeout(g, self.read_wait)
                .unwrap_or_else(PoisonError::into_inner);
            g = ng;
        }
        self.take(&mut g, out)
    }

    fn take(&self, g: &mut RingInner, out: &mut [u8]) -> usize {
        let to_read = out.len().min(g.available);
        if to_read == 0 {
            return 0;
        }
        let capacity = g.data.len();
        let start = g.read_index;
        let first = to_read.min(capacity - start);
        out[..first].copy_from_slice(&g.data[start..start + first]);
        let rest = to_read - first;
        if rest > 0 {
            out[first..to_read].copy_from_slice(&g.data[..rest]);
        }
        g.read_index = (start + to_read) % capacity;
        g.available -= to_read;
        self.bytes_read.fetch_add(to_read as u64, Ordering::Relaxed);
        to_read
    }

    /// Mark the current stream finished and wake every blocked reader.
    ///
    /// Idempotent. Buffered bytes stay readable until drained.
    pub fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Discard buffered bytes. Leaves the `closed` flag untouched.
    pub fn clear(&self) {
        let mut g = self.lock();
        g.write_index = 0;
        g.read_index = 0;
        g.available = 0;
        drop(g);
        self.cv.notify_all();
    }

    /// Discard buffered bytes and reopen the ring for a new stream.
    pub fn reset(&self) {
        let mut g = self.lock();
        g.write_index = 0;
        g.read_index = 0;
        g.available = 0;
        g.closed = false;
        drop(g);
        self.cv.notify_all();
    }

    /// Like [`RingBuffer::reset`], but also resizes the backing store to `capacity`.
    pub fn reset_with_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity() {
            self.reset();
            return;
        }
        let data = vec![0u8; capacity].into_boxed_slice();
        let mut g = self.lock();
        let old = std::mem::replace(&mut g.data, data);
        g.write_index = 0;
        g.read_index = 0;
        g.available = 0;
        g.closed = false;
        drop(g);
        drop(old);
        self.cv.notify_all();
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            overrun_events: self.overrun_events.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }

    fn log_overrun(&self, dropped: usize, buffered: usize, capacity: usize) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_millis(0))
            .as_millis() as u64;
        let last = self.overrun_logged_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) > 1000 {
            self.overrun_logged_ms.store(now, Ordering::Relaxed);
            tracing::warn!(
                dropped_bytes = dropped,
                buffered_bytes = buffered,
                capacity_bytes = capacity,
                total_overruns = self.overrun_events.load(Ordering::Relaxed),
                "ring buffer overrun"
            );
        }
    }
}
