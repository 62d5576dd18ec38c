//! Error types for voxcast.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxcastError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors: fatal, never retried
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio device failed: {message}")]
    AudioDevice { message: String },

    // Streaming recognition errors: retried with backoff, then terminal
    #[error("Recognition stream failed: {message}")]
    RecognitionStream { message: String },

    // Announcement queue errors
    #[error("Announcement queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Playback failed: {message}")]
    Playback { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxcastError>;
