//! Frame capture pump.
//!
//! Polls an [`AudioSource`] on a dedicated thread, wraps samples into
//! sequence-numbered frames, and pushes them into the drop-oldest
//! [`FrameQueue`]. Device errors are fatal: the pump stops and parks the
//! error for the coordinator to surface.

use crate::audio::frame::AudioFrame;
use crate::audio::queue::FrameQueue;
use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, VoxcastError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the capture pump.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Samples per emitted frame.
    pub frame_size: usize,
    /// Polling interval when no samples are available (ms).
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_size: defaults::FRAME_SIZE,
            poll_interval_ms: defaults::CAPTURE_POLL_INTERVAL_MS,
        }
    }
}

/// Capture pump feeding a frame queue from a shared audio source.
///
/// The source is shared behind a mutex so the coordinator can stop and
/// restart capture sessions against the same device.
pub struct FrameCapture {
    source: Arc<Mutex<Box<dyn AudioSource>>>,
    config: CaptureConfig,
    sequence: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    error: Arc<Mutex<Option<VoxcastError>>>,
    thread: Option<JoinHandle<()>>,
}

impl FrameCapture {
    /// Creates a capture pump over the given shared source.
    pub fn new(source: Arc<Mutex<Box<dyn AudioSource>>>) -> Self {
        Self::with_config(source, CaptureConfig::default())
    }

    /// Creates a capture pump with custom configuration.
    pub fn with_config(source: Arc<Mutex<Box<dyn AudioSource>>>, config: CaptureConfig) -> Self {
        Self {
            source,
            config,
            sequence: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
            thread: None,
        }
    }

    /// Opens the device and starts the capture thread.
    ///
    /// Device open failures propagate immediately; nothing is retried here.
    pub fn start(&mut self, queue: Arc<FrameQueue>) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        {
            let mut source = lock_source(&self.source);
            source.start()?;
        }
        self.running.store(true, Ordering::SeqCst);

        let source = self.source.clone();
        let running = self.running.clone();
        let sequence = self.sequence.clone();
        let error = self.error.clone();
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let frame_size = self.config.frame_size.max(1);

        self.thread = Some(thread::spawn(move || {
            // Carries samples that don't yet fill a whole frame
            let mut pending: Vec<i16> = Vec::with_capacity(frame_size * 2);

            while running.load(Ordering::SeqCst) {
                let samples = {
                    let mut source = lock_source(&source);
                    source.read_samples()
                };

                match samples {
                    Ok(samples) if !samples.is_empty() => {
                        pending.extend_from_slice(&samples);
                        while pending.len() >= frame_size {
                            let chunk: Vec<i16> = pending.drain(..frame_size).collect();
                            let seq = sequence.fetch_add(1, Ordering::SeqCst);
                            queue.push(AudioFrame::new(seq, chunk));
                        }
                    }
                    Ok(_) => {
                        // No samples yet, wait briefly
                        thread::sleep(poll_interval);
                    }
                    Err(e) => {
                        // Device failure is fatal for this session
                        if let Ok(mut slot) = error.lock() {
                            *slot = Some(e);
                        }
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }

            // A trailing partial frame is dropped with the session; it is
            // less than one frame of audio
            let mut source = lock_source(&source);
            if let Err(e) = source.stop() {
                eprintln!("voxcast: failed to stop audio source: {e}");
            }
        }));

        Ok(())
    }

    /// Stops the capture thread and closes the device. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                eprintln!("voxcast: capture thread panicked");
            }
        }
    }

    /// Returns true while the capture thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Takes a parked device error, if the capture thread died on one.
    pub fn take_error(&self) -> Option<VoxcastError> {
        self.error.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Total frames produced since construction.
    pub fn frames_produced(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Drop for FrameCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_source(
    source: &Arc<Mutex<Box<dyn AudioSource>>>,
) -> std::sync::MutexGuard<'_, Box<dyn AudioSource>> {
    match source.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MockAudioSource;

    fn shared(source: MockAudioSource) -> Arc<Mutex<Box<dyn AudioSource>>> {
        let boxed: Box<dyn AudioSource> = Box::new(source);
        Arc::new(Mutex::new(boxed))
    }

    fn small_frames(source: MockAudioSource) -> FrameCapture {
        FrameCapture::with_config(
            shared(source),
            CaptureConfig {
                frame_size: 160,
                ..CaptureConfig::default()
            },
        )
    }

    #[test]
    fn test_capture_produces_frames() {
        let mut capture = small_frames(MockAudioSource::new().with_samples(vec![100i16; 160]));
        let queue = Arc::new(FrameQueue::new(100));

        capture.start(queue.clone()).unwrap();
        assert!(capture.is_running());

        let frame = queue
            .pop_timeout(Duration::from_millis(500))
            .expect("no frame captured");
        assert_eq!(frame.samples.len(), 160);

        capture.stop();
        assert!(!capture.is_running());
    }

    #[test]
    fn test_capture_chunks_reads_into_fixed_frames() {
        // Device delivers 100 samples per read; frames must still be 160
        let mut capture = small_frames(MockAudioSource::new().with_samples(vec![7i16; 100]));
        let queue = Arc::new(FrameQueue::new(100));

        capture.start(queue.clone()).unwrap();

        for _ in 0..3 {
            let frame = queue
                .pop_timeout(Duration::from_millis(500))
                .expect("no frame captured");
            assert_eq!(frame.samples.len(), 160);
        }
        capture.stop();
    }

    #[test]
    fn test_capture_sequence_numbers_increase() {
        let source = shared(MockAudioSource::new().with_samples(vec![100i16; 160]));
        let mut capture = FrameCapture::new(source);
        let queue = Arc::new(FrameQueue::new(100));

        capture.start(queue.clone()).unwrap();

        let mut sequences = Vec::new();
        for _ in 0..3 {
            if let Some(frame) = queue.pop_timeout(Duration::from_millis(200)) {
                sequences.push(frame.sequence);
            }
        }
        capture.stop();

        for pair in sequences.windows(2) {
            assert!(pair[1] > pair[0], "sequences should increase: {sequences:?}");
        }
    }

    #[test]
    fn test_capture_start_failure_propagates() {
        let source = shared(MockAudioSource::new().with_start_failure());
        let mut capture = FrameCapture::new(source);
        let queue = Arc::new(FrameQueue::new(10));

        assert!(capture.start(queue).is_err());
        assert!(!capture.is_running());
    }

    #[test]
    fn test_capture_read_error_parks_error_and_stops() {
        let source = shared(
            MockAudioSource::new()
                .with_read_failure()
                .with_error_message("mic unplugged"),
        );
        let mut capture = FrameCapture::new(source);
        let queue = Arc::new(FrameQueue::new(10));

        capture.start(queue).unwrap();

        // Capture thread should die on the first read and park the error
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while capture.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!capture.is_running());

        match capture.take_error() {
            Some(VoxcastError::AudioDevice { message }) => {
                assert_eq!(message, "mic unplugged");
            }
            other => panic!("Expected parked AudioDevice error, got {:?}", other),
        }
        // Error is consumed on take
        assert!(capture.take_error().is_none());
    }

    #[test]
    fn test_capture_stop_is_idempotent() {
        let source = shared(MockAudioSource::new());
        let mut capture = FrameCapture::new(source);
        let queue = Arc::new(FrameQueue::new(10));

        // Stop before start is a no-op
        capture.stop();

        capture.start(queue).unwrap();
        capture.stop();
        capture.stop();
        assert!(!capture.is_running());
    }

    #[test]
    fn test_capture_restart_reuses_source() {
        let source = shared(MockAudioSource::new().with_samples(vec![1i16; 160]));
        let mut capture = FrameCapture::new(source);

        for _ in 0..2 {
            let queue = Arc::new(FrameQueue::new(10));
            capture.start(queue.clone()).unwrap();
            assert!(
                queue.pop_timeout(Duration::from_millis(500)).is_some(),
                "restarted capture should produce frames"
            );
            capture.stop();
        }
    }
}
