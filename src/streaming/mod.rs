//! Real-time transcription streaming.
//!
//! ```text
//! ┌────────────┐    ┌─────────────┐    ┌────────────┐    ┌──────────┐
//! │ Microphone │───▶│ Frame Queue │───▶│ Recognizer │───▶│ Dedup +  │───▶ events
//! │  capture   │    │ drop-oldest │    │  session   │    │ Debounce │
//! └────────────┘    └─────────────┘    └────────────┘    └──────────┘
//! ```

pub mod coordinator;
pub mod debounce;
pub mod dedup;
pub mod event;

pub use coordinator::{StreamState, StreamStats, TranscriptionStreamCoordinator};
pub use debounce::DebounceGate;
pub use dedup::TranscriptDeduper;
pub use event::{Transcript, TranscriptEvent};
