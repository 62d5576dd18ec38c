//! Announcement job types.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Address of one physical output sink, ALSA card/device style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub card: u32,
    pub device: u32,
}

impl SinkConfig {
    /// Creates a sink address.
    pub fn new(card: u32, device: u32) -> Self {
        Self { card, device }
    }

    /// ALSA device string as passed to the player, e.g. `hw:1,0`.
    pub fn alsa_device(&self) -> String {
        format!("hw:{},{}", self.card, self.device)
    }
}

/// Lifecycle state of an announcement job.
///
/// Legal transitions: Queued → Generating → Playing → Completed, or from
/// Generating/Playing back to Queued (retry) until retries are exhausted,
/// then Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Generating,
    Playing,
    Completed,
    Failed,
}

/// One announcement request moving through the playback queue.
#[derive(Debug, Clone)]
pub struct TtsJob {
    /// Unique id, handed back to the submitter.
    pub id: String,
    /// Text to speak.
    pub text: String,
    /// Language for synthesis.
    pub language: String,
    /// First output sink.
    pub sink1: SinkConfig,
    /// Second output sink.
    pub sink2: SinkConfig,
    /// Current lifecycle state. Only the queue worker writes this.
    pub status: JobStatus,
    /// Failed attempts so far; never exceeds `max_retries`.
    pub retry_count: u32,
    /// Retry budget for this job.
    pub max_retries: u32,
    /// Submission time.
    pub created_at: Instant,
}

impl TtsJob {
    /// Creates a queued job.
    pub fn new(
        id: String,
        text: String,
        language: String,
        sink1: SinkConfig,
        sink2: SinkConfig,
        max_retries: u32,
    ) -> Self {
        Self {
            id,
            text,
            language,
            sink1,
            sink2,
            status: JobStatus::Queued,
            retry_count: 0,
            max_retries,
            created_at: Instant::now(),
        }
    }

    /// Whether another retry is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
