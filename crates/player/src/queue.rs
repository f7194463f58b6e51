//! Bounded handoff queue for interleaved `f32` samples.
//!
//! Every stage boundary in the hardware pipeline is one of these queues:
//! decode thread → converter thread → output callback. Producers block when
//! the queue is full; the output callback only ever uses the non-blocking
//! pop. `close()` makes shutdown deterministic: blocked producers return
//! early and consumers drain whatever is left.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Queue capacity in samples for a buffering target in seconds.
///
/// Non-finite or non-positive targets fall back to two seconds.
pub fn capacity_for(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

/// Bounded queue of interleaved samples with a fixed channel count.
///
/// Samples are stored frame-interleaved: `f0c0, f0c1, f1c0, f1c1, ...`.
/// A single condvar signals both "space available" and "data available".
pub struct SampleQueue {
    channels: usize,
    capacity_samples: usize,
    state: Mutex<State>,
    signal: Condvar,
}

struct State {
    samples: VecDeque<f32>,
    closed: bool,
}

impl SampleQueue {
    pub fn new(channels: usize, capacity_samples: usize) -> Self {
        Self {
            channels: channels.max(1),
            capacity_samples: capacity_samples.max(1),
            state: Mutex::new(State {
                samples: VecDeque::new(),
                closed: false,
            }),
            signal: Condvar::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Mark the queue closed and wake every waiter. Idempotent.
    ///
    /// After closing, producers stop accepting data and consumers see `None`
    /// once the remaining samples are drained.
    pub fn close(&self) {
        let mut st = self.state.lock().unwrap();
        st.closed = true;
        drop(st);
        self.signal.notify_all();
    }

    /// Whether the producer is gone and every sample has been consumed.
    pub fn is_finished(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.closed && st.samples.is_empty()
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns early (dropping the rest of the slice) if the queue is closed
    /// while waiting.
    pub fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut st = self.state.lock().unwrap();
            while st.samples.len() >= self.capacity_samples && !st.closed {
                st = self.signal.wait(st).unwrap();
            }
            if st.closed {
                return;
            }

            while offset < samples.len() && st.samples.len() < self.capacity_samples {
                st.samples.push_back(samples[offset]);
                offset += 1;
            }
            drop(st);
            self.signal.notify_all();
        }
    }

    /// Block until exactly `frames` whole frames are available and pop them.
    ///
    /// Returns `None` if the queue closes before enough data accumulates.
    pub fn pop_exact(&self, frames: usize) -> Option<Vec<f32>> {
        let want = frames * self.channels;
        let mut st = self.state.lock().unwrap();
        while st.samples.len() < want && !st.closed {
            st = self.signal.wait(st).unwrap();
        }
        if st.samples.len() < want {
            return None;
        }
        let out: Vec<f32> = st.samples.drain(..want).collect();
        drop(st);
        self.signal.notify_all();
        Some(out)
    }

    /// Block until at least one frame is available, then pop up to
    /// `max_frames`. Returns `None` once the queue is closed and empty.
    pub fn pop_up_to(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut st = self.state.lock().unwrap();
        while st.samples.len() < self.channels && !st.closed {
            st = self.signal.wait(st).unwrap();
        }
        let take = self.whole_frames(st.samples.len()).min(max_frames) * self.channels;
        if take == 0 {
            return None;
        }
        let out: Vec<f32> = st.samples.drain(..take).collect();
        drop(st);
        self.signal.notify_all();
        Some(out)
    }

    /// Pop up to `max_frames` without blocking. Returns `None` when no whole
    /// frame is currently buffered. Safe to call from the output callback.
    pub fn try_pop(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut st = self.state.lock().unwrap();
        let take = self.whole_frames(st.samples.len()).min(max_frames) * self.channels;
        if take == 0 {
            return None;
        }
        let out: Vec<f32> = st.samples.drain(..take).collect();
        drop(st);
        self.signal.notify_all();
        Some(out)
    }

    fn whole_frames(&self, buffered_samples: usize) -> usize {
        buffered_samples / self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_for_applies_fallback() {
        assert_eq!(capacity_for(48_000, 2, 2.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, 0.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::NAN), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::INFINITY), 192_000);
    }

    #[test]
    fn try_pop_on_empty_queue_is_none() {
        let q = SampleQueue::new(2, 16);
        assert!(q.try_pop(4).is_none());
    }

    #[test]
    fn try_pop_returns_whole_frames_only() {
        let q = SampleQueue::new(2, 16);
        q.push_blocking(&[1.0, 2.0, 3.0]);
        let out = q.try_pop(4).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn pop_exact_waits_for_enough_frames() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let producer = q.clone();
        let handle = thread::spawn(move || {
            producer.push_blocking(&[0.1, 0.2, 0.3, 0.4]);
            producer.push_blocking(&[0.5, 0.6]);
        });
        let out = q.pop_exact(3).unwrap();
        assert_eq!(out.len(), 6);
        handle.join().unwrap();
    }

    #[test]
    fn pop_exact_returns_none_when_closed_short() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.pop_exact(2).is_none());
    }

    #[test]
    fn pop_up_to_drains_tail_then_returns_none() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        q.close();
        let out = q.pop_up_to(8).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(q.pop_up_to(8).is_none());
    }

    #[test]
    fn push_blocking_returns_early_when_closed() {
        let q = Arc::new(SampleQueue::new(1, 2));
        q.push_blocking(&[1.0, 2.0]);

        let producer = q.clone();
        let handle = thread::spawn(move || {
            // Queue is full; this blocks until close() wakes it.
            producer.push_blocking(&[3.0, 4.0]);
        });
        q.close();
        handle.join().unwrap();

        let out = q.try_pop(2).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
        assert!(q.is_finished());
    }

    #[test]
    fn is_finished_requires_close_and_drain() {
        let q = SampleQueue::new(1, 8);
        q.push_blocking(&[1.0]);
        assert!(!q.is_finished());
        q.close();
        assert!(!q.is_finished());
        q.try_pop(1);
        assert!(q.is_finished());
    }
}
