//! Transcription streaming coordinator.
//!
//! Owns one live recognition session at a time:
//!
//! ```text
//! ┌────────────┐    ┌─────────────┐    ┌───────────────────────┐
//! │ AudioSource│───▶│ FrameQueue  │───▶│ recognition worker    │──▶ mpsc::Receiver
//! │ (capture)  │    │ drop-oldest │    │ send / poll / dedup / │    <TranscriptEvent>
//! └────────────┘    └─────────────┘    │ debounce / heartbeat  │
//!                                      └───────────────────────┘
//! ```
//!
//! The worker feeds frames to the abstract recognizer, filters its responses
//! through the deduper and debounce gate, emits heartbeats on silence, and
//! re-establishes the stream on transient failures. The consumer cancels by
//! dropping the receiver; `stop_streaming` cancels cooperatively.

use crate::audio::capture::{CaptureConfig, FrameCapture};
use crate::audio::queue::FrameQueue;
use crate::audio::source::AudioSource;
use crate::clock::{Clock, SystemClock};
use crate::config::{AudioConfig, StreamingConfig};
use crate::defaults;
use crate::error::{Result, VoxcastError};
use crate::streaming::debounce::DebounceGate;
use crate::streaming::dedup::TranscriptDeduper;
use crate::streaming::event::{Transcript, TranscriptEvent};
use crate::stt::backend::{RecognitionConfig, RecognitionStream, SpeechRecognitionBackend};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Poll interval for the frame pump; doubles as the worker loop tick.
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No session active.
    Idle,
    /// A session is live and emitting events.
    Streaming,
    /// A stop has been requested; the worker is winding down.
    Stopping,
}

/// Aggregate session statistics, recomputed on demand.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamStats {
    pub is_streaming: bool,
    pub processed_frames: u64,
    pub total_transcripts: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub average_confidence: f32,
    pub uptime_seconds: f64,
    pub frames_per_second: f64,
}

#[derive(Default)]
struct StatsInner {
    processed_frames: AtomicU64,
    total_transcripts: AtomicU64,
    error_count: AtomicU64,
    // f32 confidence accumulated in micro-units so the counter stays atomic
    confidence_sum_micros: AtomicU64,
    last_error: Mutex<Option<String>>,
    started_at: Mutex<Option<Instant>>,
}

impl StatsInner {
    fn record_error(&self, message: &str) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message.to_string());
        }
    }

    fn record_transcript(&self, confidence: f32) {
        self.total_transcripts.fetch_add(1, Ordering::Relaxed);
        let micros = (confidence.clamp(0.0, 1.0) * 1_000_000.0) as u64;
        self.confidence_sum_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

/// Coordinates one live transcription session over an abstract recognizer.
pub struct TranscriptionStreamCoordinator {
    backend: Arc<dyn SpeechRecognitionBackend>,
    source: Arc<Mutex<Box<dyn AudioSource>>>,
    config: StreamingConfig,
    capture_config: CaptureConfig,
    frame_queue_capacity: usize,
    sample_rate: u32,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<StreamState>>,
    running: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TranscriptionStreamCoordinator {
    /// Creates a coordinator over the given recognizer and audio source.
    pub fn new(
        backend: Arc<dyn SpeechRecognitionBackend>,
        source: Box<dyn AudioSource>,
        config: StreamingConfig,
    ) -> Self {
        Self {
            backend,
            source: Arc::new(Mutex::new(source)),
            config,
            capture_config: CaptureConfig::default(),
            frame_queue_capacity: defaults::FRAME_QUEUE_CAPACITY,
            sample_rate: defaults::SAMPLE_RATE,
            clock: Arc::new(SystemClock),
            state: Arc::new(Mutex::new(StreamState::Idle)),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatsInner::default()),
            worker: Mutex::new(None),
        }
    }

    /// Sets the frame queue capacity.
    pub fn with_frame_queue_capacity(mut self, capacity: usize) -> Self {
        self.frame_queue_capacity = capacity;
        self
    }

    /// Applies capture settings from the app-level audio configuration.
    pub fn with_audio_config(mut self, audio: &AudioConfig) -> Self {
        self.frame_queue_capacity = audio.frame_queue_capacity;
        self.capture_config.frame_size = audio.frame_size;
        self.sample_rate = audio.sample_rate;
        self
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current session state.
    pub fn state(&self) -> StreamState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Starts a streaming session and returns the event receiver.
    ///
    /// The receiver is single-consumer; dropping it cancels the session.
    /// `language` overrides the configured default for this session.
    ///
    /// # Errors
    /// `AudioDevice` errors from opening the capture device propagate
    /// immediately and are not retried. Starting while a session is active
    /// is an error; use [`restart_streaming`](Self::restart_streaming).
    pub fn start_streaming(
        &self,
        language: Option<&str>,
    ) -> Result<mpsc::Receiver<TranscriptEvent>> {
        {
            let mut state = lock_state(&self.state);
            if *state != StreamState::Idle {
                return Err(VoxcastError::Other(
                    "streaming session already active".to_string(),
                ));
            }
            *state = StreamState::Streaming;
        }

        let queue = Arc::new(FrameQueue::new(self.frame_queue_capacity));
        let mut capture =
            FrameCapture::with_config(self.source.clone(), self.capture_config.clone());
        if let Err(e) = capture.start(queue.clone()) {
            *lock_state(&self.state) = StreamState::Idle;
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        if let Ok(mut started) = self.stats.started_at.lock() {
            *started = Some(self.clock.now());
        }

        let (event_tx, event_rx) = mpsc::channel(self.config.event_channel_capacity);

        let language = language.unwrap_or(&self.config.language).to_string();
        let worker = SessionWorker {
            backend: self.backend.clone(),
            capture,
            queue,
            event_tx,
            language,
            sample_rate: self.sample_rate,
            config: self.config.clone(),
            clock: self.clock.clone(),
            running: self.running.clone(),
            state: self.state.clone(),
            stats: self.stats.clone(),
        };

        let handle = thread::spawn(move || worker.run());
        if let Ok(mut slot) = self.worker.lock() {
            *slot = Some(handle);
        }

        Ok(event_rx)
    }

    /// Stops the active session cooperatively.
    ///
    /// Sets the stop flag and waits a bounded time for the worker to exit.
    /// Safe to call when no session is active or the worker already exited.
    pub fn stop_streaming(&self) {
        {
            let mut state = lock_state(&self.state);
            if *state == StreamState::Idle {
                return;
            }
            *state = StreamState::Stopping;
        }
        self.running.store(false, Ordering::SeqCst);

        let handle = self.worker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let deadline =
                Instant::now() + Duration::from_millis(defaults::SHUTDOWN_JOIN_TIMEOUT_MS);
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    eprintln!("voxcast: streaming worker panicked");
                }
            } else {
                eprintln!("voxcast: streaming worker did not stop in time, detaching");
            }
        }

        *lock_state(&self.state) = StreamState::Idle;
    }

    /// Stops any active session and starts a fresh one.
    ///
    /// Queues are discarded and dedup/debounce state is reset; this is the recovery
    /// path for a wedged stream.
    pub fn restart_streaming(
        &self,
        language: Option<&str>,
    ) -> Result<mpsc::Receiver<TranscriptEvent>> {
        self.stop_streaming();
        self.start_streaming(language)
    }

    /// Aggregate statistics for the current or most recent session.
    pub fn statistics(&self) -> StreamStats {
        let processed_frames = self.stats.processed_frames.load(Ordering::Relaxed);
        let total_transcripts = self.stats.total_transcripts.load(Ordering::Relaxed);
        let confidence_sum =
            self.stats.confidence_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;

        let uptime_seconds = self
            .stats
            .started_at
            .lock()
            .ok()
            .and_then(|started| *started)
            .map(|started| self.clock.now().duration_since(started).as_secs_f64())
            .unwrap_or(0.0);

        StreamStats {
            is_streaming: self.state() == StreamState::Streaming,
            processed_frames,
            total_transcripts,
            error_count: self.stats.error_count.load(Ordering::Relaxed),
            last_error: self
                .stats
                .last_error
                .lock()
                .ok()
                .and_then(|last| last.clone()),
            average_confidence: if total_transcripts > 0 {
                (confidence_sum / total_transcripts as f64) as f32
            } else {
                0.0
            },
            uptime_seconds,
            frames_per_second: if uptime_seconds > 0.0 {
                processed_frames as f64 / uptime_seconds
            } else {
                0.0
            },
        }
    }

    /// Resets all counters.
    pub fn reset_statistics(&self) {
        self.stats.processed_frames.store(0, Ordering::Relaxed);
        self.stats.total_transcripts.store(0, Ordering::Relaxed);
        self.stats.error_count.store(0, Ordering::Relaxed);
        self.stats.confidence_sum_micros.store(0, Ordering::Relaxed);
        if let Ok(mut last) = self.stats.last_error.lock() {
            *last = None;
        }
        if let Ok(mut started) = self.stats.started_at.lock() {
            *started = None;
        }
    }
}

impl Drop for TranscriptionStreamCoordinator {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

fn lock_state(state: &Arc<Mutex<StreamState>>) -> std::sync::MutexGuard<'_, StreamState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// State moved into the recognition worker thread.
struct SessionWorker {
    backend: Arc<dyn SpeechRecognitionBackend>,
    capture: FrameCapture,
    queue: Arc<FrameQueue>,
    event_tx: mpsc::Sender<TranscriptEvent>,
    language: String,
    sample_rate: u32,
    config: StreamingConfig,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<StreamState>>,
    stats: Arc<StatsInner>,
}

impl SessionWorker {
    fn run(self) {
        let recog_config =
            RecognitionConfig::new(&self.language).with_sample_rate(self.sample_rate);
        let mut deduper = TranscriptDeduper::new();
        let mut gate = DebounceGate::new(self.clock.clone(), self.config.debounce_interval());
        let heartbeat_interval = self.config.heartbeat_interval();
        let mut last_event_at = self.clock.now();
        let mut consecutive_failures: u32 = 0;
        let mut stream: Option<Box<dyn RecognitionStream>> = None;

        while self.is_active() {
            // Device failures surface immediately, no retry
            if let Some(e) = self.capture.take_error() {
                self.stats.record_error(&e.to_string());
                self.emit(TranscriptEvent::error(e.to_string()), &mut last_event_at);
                break;
            }

            // (Re)establish the recognition stream
            if stream.is_none() {
                match self.backend.open_stream(&recog_config) {
                    Ok(s) => stream = Some(s),
                    Err(e) => {
                        self.stats.record_error(&e.to_string());
                        consecutive_failures += 1;
                        if consecutive_failures > self.config.max_retries {
                            self.emit(TranscriptEvent::error(e.to_string()), &mut last_event_at);
                            break;
                        }
                        if !self.backoff() {
                            break;
                        }
                        continue;
                    }
                }
            }

            let mut stream_error: Option<VoxcastError> = None;
            if let Some(s) = stream.as_mut() {
                // Pump one frame; the bounded wait is the loop tick
                if let Some(frame) = self.queue.pop_timeout(FRAME_POLL_INTERVAL) {
                    match s.send(&frame) {
                        Ok(()) => {
                            self.stats.processed_frames.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => stream_error = Some(e),
                    }
                }

                // Drain whatever responses are ready
                while stream_error.is_none() {
                    match s.try_next() {
                        Ok(Some(response)) => {
                            consecutive_failures = 0;
                            if let Some(event) =
                                self.filter_response(response, &mut deduper, &mut gate)
                            {
                                if !self.emit(event, &mut last_event_at) {
                                    return self.finish();
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => stream_error = Some(e),
                    }
                }
            }

            if let Some(e) = stream_error {
                self.stats.record_error(&e.to_string());
                stream = None;
                consecutive_failures += 1;
                if consecutive_failures > self.config.max_retries {
                    self.emit(TranscriptEvent::error(e.to_string()), &mut last_event_at);
                    break;
                }
                if !self.backoff() {
                    break;
                }
                continue;
            }

            // Liveness signal for silent streams
            if self.clock.now().duration_since(last_event_at) >= heartbeat_interval {
                let heartbeat = TranscriptEvent::heartbeat(
                    self.stats.processed_frames.load(Ordering::Relaxed),
                    self.queue.len(),
                );
                if !self.emit(heartbeat, &mut last_event_at) {
                    return self.finish();
                }
            }
        }

        self.finish()
    }

    /// Applies trim, dedup, and debounce to one recognizer response.
    fn filter_response(
        &self,
        response: crate::stt::backend::RecognitionResponse,
        deduper: &mut TranscriptDeduper,
        gate: &mut DebounceGate,
    ) -> Option<TranscriptEvent> {
        let text = response.text.trim();
        if text.is_empty() {
            return None;
        }

        if response.is_final {
            if !deduper.observe_final(text) {
                return None;
            }
            // A final suppressed here is not re-tried later
            if !gate.admit() {
                return None;
            }
            self.stats.record_transcript(response.confidence);
            Some(TranscriptEvent::Final(Transcript::new(
                text.to_string(),
                response.confidence,
                &self.language,
            )))
        } else {
            if !deduper.observe_interim(text) {
                return None;
            }
            if !gate.admit() {
                return None;
            }
            Some(TranscriptEvent::Interim(Transcript::new(
                text.to_string(),
                response.confidence,
                &self.language,
            )))
        }
    }

    /// Sends an event to the consumer; false means the consumer is gone.
    fn emit(&self, event: TranscriptEvent, last_event_at: &mut Instant) -> bool {
        if self.event_tx.blocking_send(event).is_err() {
            return false;
        }
        *last_event_at = self.clock.now();
        true
    }

    /// Fixed retry backoff, ticking so the stop flag is observed.
    /// Returns false when the session should end instead of retrying.
    fn backoff(&self) -> bool {
        let deadline = Instant::now() + self.config.retry_backoff();
        while Instant::now() < deadline {
            if !self.is_active() {
                return false;
            }
            thread::sleep(Duration::from_millis(defaults::WORKER_POLL_INTERVAL_MS.min(20)));
        }
        self.is_active()
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.event_tx.is_closed()
    }

    fn finish(mut self) {
        self.capture.stop();
        self.running.store(false, Ordering::SeqCst);
        *lock_state(&self.state) = StreamState::Idle;
    }
}
