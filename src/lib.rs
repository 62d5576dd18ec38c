//! voxcast - Streaming core for live broadcast translation.
//!
//! Turns a live microphone feed into a deduplicated, debounced stream of
//! transcript events, and speaks announcement text through two loudspeakers
//! via a strictly sequential, bounded, retrying job queue. The enclosing
//! service owns the HTTP/WebSocket surface, device discovery, credentials,
//! and the translation step between the two halves.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod error;
pub mod playback;
pub mod streaming;
pub mod stt;
pub mod tts;

// Core capability seams (swap real SDK adapters for mocks in tests)
pub use audio::source::{AudioSource, MockAudioSource};
pub use playback::sink::{AudioSinkBackend, SinkPlayback};
pub use stt::backend::{RecognitionStream, SpeechRecognitionBackend};
pub use tts::backend::SpeechSynthesisBackend;

// Streaming side
pub use streaming::coordinator::{StreamState, StreamStats, TranscriptionStreamCoordinator};
pub use streaming::event::{Transcript, TranscriptEvent};

// Playback side
pub use playback::controller::DualSinkPlaybackController;
pub use tts::job::{JobStatus, SinkConfig, TtsJob};
pub use tts::queue::{QueueStats, SequentialPlaybackQueue};

// Error handling
pub use error::{Result, VoxcastError};

// Config
pub use config::{AudioConfig, Config, PlaybackConfig, StreamingConfig};

/// Build version string from the crate manifest.
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_matches_cargo_version() {
        assert_eq!(version_string(), env!("CARGO_PKG_VERSION"));
    }
}
