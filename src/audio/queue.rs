//! Bounded FIFO of compressed frames awaiting playback.
//!
//! The queue is the only state shared between the network-receive context
//! (producer) and the playback context (consumer), so all operations go
//! through one mutex. Overflow evicts the single oldest frame: the producer
//! never blocks, the newest audio always wins, memory stays bounded.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::audio::frame::EncodedFrame;

/// Queue diagnostics for the caller's backpressure decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub current_size: usize,
    pub max_size: usize,
    pub is_empty: bool,
}

pub struct PlaybackQueue {
    frames: Mutex<VecDeque<EncodedFrame>>,
    capacity: usize,
}

impl PlaybackQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<EncodedFrame>> {
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a frame, evicting the oldest one first when at capacity.
    /// Never blocks the producer.
    pub fn enqueue(&self, frame: EncodedFrame) {
        let mut frames = self.lock();
        if frames.len() >= self.capacity {
            frames.pop_front();
            log::warn!("playback queue full, dropping oldest frame");
        }
        frames.push_back(frame);
    }

    pub fn try_dequeue(&self) -> Option<EncodedFrame> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every queued frame and return how many were dropped. Used at
    /// shutdown and for barge-in interruption.
    pub fn clear(&self) -> usize {
        let mut frames = self.lock();
        let cleared = frames.len();
        frames.clear();
        cleared
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn status(&self) -> QueueStatus {
        let frames = self.lock();
        QueueStatus {
            current_size: frames.len(),
            max_size: self.capacity,
            is_empty: frames.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: u16) -> EncodedFrame {
        EncodedFrame::from(n.to_be_bytes().to_vec())
    }

    #[test]
    fn fifo_order_below_capacity() {
        let queue = PlaybackQueue::with_capacity(8);
        for n in 0..5u16 {
            queue.enqueue(numbered(n));
        }
        assert_eq!(queue.len(), 5);
        for n in 0..5u16 {
            assert_eq!(queue.try_dequeue().unwrap(), numbered(n));
        }
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn overflow_evicts_only_the_oldest() {
        // 10 s of 20 ms frames
        let queue = PlaybackQueue::with_capacity(500);
        for n in 1..=501u16 {
            queue.enqueue(numbered(n));
            assert!(queue.len() <= 500);
        }
        assert_eq!(queue.len(), 500);
        // frame 1 was evicted; 2..=501 remain in original order
        for n in 2..=501u16 {
            assert_eq!(queue.try_dequeue().unwrap(), numbered(n));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn never_exceeds_capacity_under_sustained_overflow() {
        let queue = PlaybackQueue::with_capacity(4);
        for n in 0..100u16 {
            queue.enqueue(numbered(n));
            assert!(queue.len() <= 4);
        }
        for n in 96..100u16 {
            assert_eq!(queue.try_dequeue().unwrap(), numbered(n));
        }
    }

    #[test]
    fn clear_reports_dropped_count() {
        let queue = PlaybackQueue::with_capacity(16);
        for n in 0..7u16 {
            queue.enqueue(numbered(n));
        }
        assert_eq!(queue.clear(), 7);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn status_tracks_contents() {
        let queue = PlaybackQueue::with_capacity(3);
        assert_eq!(
            queue.status(),
            QueueStatus { current_size: 0, max_size: 3, is_empty: true }
        );
        queue.enqueue(numbered(1));
        let status = queue.status();
        assert_eq!(status.current_size, 1);
        assert!(!status.is_empty);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;

        let queue = Arc::new(PlaybackQueue::with_capacity(64));
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for n in 0..200u16 {
                    queue.enqueue(numbered(n));
                }
            })
        };
        let mut received = 0usize;
        while received < 50 {
            if queue.try_dequeue().is_some() {
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert!(queue.len() <= 64);
    }
}
