//! Microphone-side audio plumbing: frames, the drop-oldest frame queue, and
//! capture sources.

pub mod capture;
#[cfg(feature = "cpal-audio")]
pub mod cpal_source;
pub mod frame;
pub mod queue;
pub mod source;

pub use capture::{CaptureConfig, FrameCapture};
#[cfg(feature = "cpal-audio")]
pub use cpal_source::CpalAudioSource;
pub use frame::AudioFrame;
pub use queue::FrameQueue;
pub use source::{AudioSource, MockAudioSource};
