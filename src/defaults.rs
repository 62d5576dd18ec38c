//! Default configuration constants for voxcast.
//!
//! Shared constants used across the configuration types to keep the
//! subsystem defaults consistent in one place.

/// Default audio sample rate in Hz.
///
/// 16kHz mono is the standard input format for cloud streaming recognizers
/// and keeps frame sizes small enough for low-latency streaming.
pub const SAMPLE_RATE: u32 = 16_000;

/// Default capture frame size in samples (64ms at 16kHz).
pub const FRAME_SIZE: usize = 1024;

/// Capacity of the bounded microphone frame queue.
///
/// When the recognition worker stalls, the queue keeps the most recent
/// frames: the oldest queued frame is evicted to admit a new one. The
/// capture callback never blocks.
pub const FRAME_QUEUE_CAPACITY: usize = 100;

/// Polling interval for the capture thread when no samples are available (ms).
pub const CAPTURE_POLL_INTERVAL_MS: u64 = 10;

/// Minimum spacing between emitted transcript events (ms).
///
/// Events arriving faster than this are suppressed, not deferred. Throttles
/// recognizer chattiness at the cost of dropping a rare fast-following final.
pub const DEBOUNCE_INTERVAL_MS: u64 = 100;

/// Idle interval after which a synthetic heartbeat event is emitted (ms).
///
/// Keeps a downstream consumer (typically a network connection) from judging
/// a silent stream dead.
pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Maximum consecutive recognition-stream establishment retries.
pub const STREAM_MAX_RETRIES: u32 = 3;

/// Fixed backoff between recognition-stream retries (ms).
pub const STREAM_RETRY_BACKOFF_MS: u64 = 1_000;

/// Buffer size of the transcript event channel handed to the consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 50;

/// Capacity of the bounded announcement job queue.
///
/// Unlike the frame queue, a full job queue rejects the submission: callers
/// must see the overload, announcements are never silently dropped.
pub const JOB_QUEUE_CAPACITY: usize = 20;

/// Maximum retries for a failed announcement job.
///
/// A job is attempted at most `JOB_MAX_RETRIES + 1` times in total.
pub const JOB_MAX_RETRIES: u32 = 2;

/// Grace period between SIGTERM and SIGKILL when stopping playback (ms).
pub const PLAYBACK_GRACE_TIMEOUT_MS: u64 = 2_000;

/// Safety margin added to the probed asset duration when waiting for
/// playback completion (ms).
pub const COMPLETION_SAFETY_BUFFER_MS: u64 = 500;

/// Fixed completion wait used when the asset duration cannot be probed (ms).
pub const COMPLETION_FALLBACK_WAIT_MS: u64 = 3_000;

/// Polling tick for cooperative worker loops (ms).
///
/// All blocking points (queue pops, completion waits, retry backoffs) wake
/// at least this often to observe the stop flag.
pub const WORKER_POLL_INTERVAL_MS: u64 = 100;

/// Deadline for joining a worker thread during cooperative shutdown (ms).
pub const SHUTDOWN_JOIN_TIMEOUT_MS: u64 = 2_000;

/// Default language code for recognition and synthesis.
pub const DEFAULT_LANGUAGE: &str = "en-US";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_shorter_than_heartbeat() {
        assert!(DEBOUNCE_INTERVAL_MS < HEARTBEAT_INTERVAL_MS);
    }

    #[test]
    fn worker_poll_bounds_shutdown_latency() {
        assert!(WORKER_POLL_INTERVAL_MS <= SHUTDOWN_JOIN_TIMEOUT_MS);
    }
}
