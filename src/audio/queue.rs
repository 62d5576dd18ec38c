//! Bounded frame queue with drop-oldest overflow policy.
//!
//! Sits between the capture thread and the recognition worker. The capture
//! side must never block (blocking the capture callback causes audible
//! glitches upstream), so on overflow the oldest queued frame is evicted to
//! admit the new one. This is deliberately the opposite of the announcement
//! queue's reject-on-full policy.

use crate::audio::frame::AudioFrame;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bounded single-producer/single-consumer frame queue.
///
/// Holds both channel endpoints so the producer can evict the oldest entry
/// when the queue is full.
pub struct FrameQueue {
    tx: Sender<AudioFrame>,
    rx: Receiver<AudioFrame>,
    capacity: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    /// Creates a queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues a frame without ever blocking.
    ///
    /// On overflow the oldest queued frame is discarded to make room.
    pub fn push(&self, frame: AudioFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                // Evict the oldest frame, then retry once. A concurrent pop
                // may have already made room, in which case the eviction is
                // simply a no-op.
                if self.rx.try_recv().is_ok() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                if self.tx.try_send(frame).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Dequeues the next frame, waiting up to `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioFrame> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Dequeues the next frame without waiting.
    pub fn try_pop(&self) -> Option<AudioFrame> {
        self.rx.try_recv().ok()
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frames discarded due to overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discards all queued frames.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}
