//! Announcement synthesis and the sequential playback queue.

pub mod backend;
pub mod job;
pub mod queue;

pub use backend::{AudioAsset, MockSynthesisBackend, SpeechSynthesisBackend};
pub use job::{JobStatus, SinkConfig, TtsJob};
pub use queue::{FinishedJob, QueueStats, SequentialPlaybackQueue};
