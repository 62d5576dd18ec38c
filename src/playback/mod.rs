//! Dual-sink audio output: per-sink native playback and the controller that
//! keeps both speakers in lockstep.

pub mod controller;
pub mod sink;

pub use controller::DualSinkPlaybackController;
pub use sink::{AlsaSinkBackend, AudioSinkBackend, MockSinkBackend, PlayRecord, SinkPlayback};
