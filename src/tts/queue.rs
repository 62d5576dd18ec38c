//! Sequential announcement playback queue.
//!
//! A bounded FIFO of announcement jobs drained by exactly one worker.
//! Each job is synthesized, played on both sinks, and waited on before the
//! next job is dequeued. That wait is what guarantees only one announcement
//! is ever audible. Failures are retried by re-enqueueing at the back of the
//! queue, so a poison job cannot block unrelated announcements.

use crate::config::PlaybackConfig;
use crate::defaults;
use crate::error::{Result, VoxcastError};
use crate::playback::controller::DualSinkPlaybackController;
use crate::tts::backend::SpeechSynthesisBackend;
use crate::tts::job::{JobStatus, SinkConfig, TtsJob};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Snapshot of a job that finished processing (completed or failed).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinishedJob {
    pub id: String,
    pub status: JobStatus,
    pub retry_count: u32,
}

/// Aggregate queue statistics, recomputed on demand.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueueStats {
    /// Jobs accepted by `add_request` since startup.
    pub total: u64,
    /// Jobs that completed playback.
    pub completed: u64,
    /// Jobs that exhausted their retries.
    pub failed: u64,
    /// Jobs currently waiting in the queue.
    pub queue_size: usize,
    /// Id of the job being played right now, if any.
    pub currently_playing: Option<String>,
    /// The most recently finished job.
    pub last_finished: Option<FinishedJob>,
}

#[derive(Default)]
struct QueueCounters {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    currently_playing: Mutex<Option<String>>,
    last_finished: Mutex<Option<FinishedJob>>,
    last_error: Mutex<Option<String>>,
}

impl QueueCounters {
    fn set_playing(&self, id: Option<String>) {
        if let Ok(mut playing) = self.currently_playing.lock() {
            *playing = id;
        }
    }

    fn record_finished(&self, job: &TtsJob) {
        if let Ok(mut finished) = self.last_finished.lock() {
            *finished = Some(FinishedJob {
                id: job.id.clone(),
                status: job.status,
                retry_count: job.retry_count,
            });
        }
    }
}

/// Bounded FIFO announcement queue with a single playback worker.
pub struct SequentialPlaybackQueue {
    synthesis: Arc<dyn SpeechSynthesisBackend>,
    controller: Arc<DualSinkPlaybackController>,
    config: PlaybackConfig,
    tx: Sender<TtsJob>,
    rx: Receiver<TtsJob>,
    next_id: AtomicU64,
    counters: Arc<QueueCounters>,
    running: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SequentialPlaybackQueue {
    /// Creates a queue over the given synthesis backend and playback
    /// controller. Call [`start_processing`](Self::start_processing) to
    /// begin draining it.
    pub fn new(
        synthesis: Arc<dyn SpeechSynthesisBackend>,
        controller: Arc<DualSinkPlaybackController>,
        config: PlaybackConfig,
    ) -> Self {
        let (tx, rx) = bounded(config.queue_capacity);
        Self {
            synthesis,
            controller,
            config,
            tx,
            rx,
            next_id: AtomicU64::new(0),
            counters: Arc::new(QueueCounters::default()),
            running: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Submits an announcement.
    ///
    /// Returns the job id, or `QueueFull` when the queue is at capacity;
    /// overload is a caller-visible condition, never a silent drop.
    pub fn add_request(
        &self,
        text: &str,
        language: &str,
        sink1: SinkConfig,
        sink2: SinkConfig,
    ) -> Result<String> {
        let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let job = TtsJob::new(
            id.clone(),
            text.to_string(),
            language.to_string(),
            sink1,
            sink2,
            self.config.max_retries,
        );

        match self.tx.try_send(job) {
            Ok(()) => {
                self.counters.total.fetch_add(1, Ordering::Relaxed);
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(VoxcastError::QueueFull {
                capacity: self.config.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => {
                Err(VoxcastError::Other("announcement queue closed".to_string()))
            }
        }
    }

    /// Starts the single worker thread. Idempotent.
    pub fn start_processing(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stopping.store(false, Ordering::SeqCst);

        let worker = QueueWorker {
            synthesis: self.synthesis.clone(),
            controller: self.controller.clone(),
            rx: self.rx.clone(),
            retry_tx: self.tx.clone(),
            counters: self.counters.clone(),
            running: self.running.clone(),
            stopping: self.stopping.clone(),
        };

        let handle = thread::spawn(move || worker.run());
        if let Ok(mut slot) = self.worker.lock() {
            *slot = Some(handle);
        }
    }

    /// Stops the worker cooperatively.
    ///
    /// Sets the stop flag and waits a bounded time for the worker to exit;
    /// safe to call when the worker is not running or already exited. A
    /// playback already in progress keeps playing to its natural end.
    pub fn stop_processing(&self) {
        self.stopping.store(true, Ordering::SeqCst);
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
                    eprintln!("voxcast: playback worker panicked");
                }
            } else {
                eprintln!("voxcast: playback worker did not stop in time, detaching");
            }
        }
    }

    /// Discards all jobs not yet picked up by the worker.
    ///
    /// Returns the number of jobs removed. The job currently being played,
    /// if any, is unaffected.
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        while self.rx.try_recv().is_ok() {
            cleared += 1;
        }
        cleared
    }

    /// Aggregate statistics.
    pub fn statistics(&self) -> QueueStats {
        QueueStats {
            total: self.counters.total.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            queue_size: self.rx.len(),
            currently_playing: self
                .counters
                .currently_playing
                .lock()
                .ok()
                .and_then(|playing| playing.clone()),
            last_finished: self
                .counters
                .last_finished
                .lock()
                .ok()
                .and_then(|finished| finished.clone()),
        }
    }

    /// Message of the most recent job failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.counters
            .last_error
            .lock()
            .ok()
            .and_then(|last| last.clone())
    }
}

impl Drop for SequentialPlaybackQueue {
    fn drop(&mut self) {
        self.stop_processing();
    }
}

/// State moved into the queue worker thread.
struct QueueWorker {
    synthesis: Arc<dyn SpeechSynthesisBackend>,
    controller: Arc<DualSinkPlaybackController>,
    rx: Receiver<TtsJob>,
    retry_tx: Sender<TtsJob>,
    counters: Arc<QueueCounters>,
    running: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
}

impl QueueWorker {
    fn run(self) {
        let poll = Duration::from_millis(defaults::WORKER_POLL_INTERVAL_MS);

        while self.running.load(Ordering::SeqCst) {
            match self.rx.recv_timeout(poll) {
                Ok(job) => self.process(job),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process(&self, mut job: TtsJob) {
        match self.attempt(&mut job) {
            Ok(()) => {
                job.status = JobStatus::Completed;
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.counters.record_finished(&job);
            }
            Err(e) => {
                if let Ok(mut last) = self.counters.last_error.lock() {
                    *last = Some(e.to_string());
                }
                self.retry_or_fail(job);
            }
        }
    }

    /// One full attempt: synthesize, play on both sinks, wait out the
    /// playback window.
    fn attempt(&self, job: &mut TtsJob) -> Result<()> {
        job.status = JobStatus::Generating;
        let asset = self.synthesis.synthesize(&job.text, &job.language)?;

        job.status = JobStatus::Playing;
        self.counters.set_playing(Some(job.id.clone()));

        let played = self.controller.play(&asset, &job.sink1, &job.sink2);
        if let Err(e) = played {
            self.counters.set_playing(None);
            asset.remove();
            return Err(e);
        }

        // Holding the worker here is the sequencing mechanism: the next job
        // is not dequeued until this playback window has elapsed. A stop
        // request ends the wait early; the audio itself is left to finish.
        self.controller
            .wait_for_completion_cancellable(&asset, &self.stopping);

        self.counters.set_playing(None);
        asset.remove();
        Ok(())
    }

    /// Re-enqueues a failed job at the back, or marks it failed once the
    /// retry budget is spent.
    fn retry_or_fail(&self, mut job: TtsJob) {
        if job.can_retry() {
            job.retry_count += 1;
            job.status = JobStatus::Queued;
            // Re-enqueue must not block the worker; if the queue is full the
            // job fails now rather than jumping the line
            if let Err(send_error) = self.retry_tx.try_send(job) {
                let mut job = match send_error {
                    TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
                };
                job.status = JobStatus::Failed;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.counters.record_finished(&job);
            }
        } else {
            job.status = JobStatus::Failed;
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            self.counters.record_finished(&job);
        }
    }
}
