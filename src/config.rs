use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub streaming: StreamingConfig,
    pub playback: PlaybackConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_size: usize,
    pub frame_queue_capacity: usize,
}

/// Transcription streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    pub language: String,
    pub debounce_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub event_channel_capacity: usize,
}

/// Announcement playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub grace_timeout_ms: u64,
    pub completion_safety_buffer_ms: u64,
    pub completion_fallback_wait_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_size: defaults::FRAME_SIZE,
            frame_queue_capacity: defaults::FRAME_QUEUE_CAPACITY,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            debounce_interval_ms: defaults::DEBOUNCE_INTERVAL_MS,
            heartbeat_interval_ms: defaults::HEARTBEAT_INTERVAL_MS,
            max_retries: defaults::STREAM_MAX_RETRIES,
            retry_backoff_ms: defaults::STREAM_RETRY_BACKOFF_MS,
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
            max_retries: defaults::JOB_MAX_RETRIES,
            grace_timeout_ms: defaults::PLAYBACK_GRACE_TIMEOUT_MS,
            completion_safety_buffer_ms: defaults::COMPLETION_SAFETY_BUFFER_MS,
            completion_fallback_wait_ms: defaults::COMPLETION_FALLBACK_WAIT_MS,
        }
    }
}

impl StreamingConfig {
    /// Debounce interval as a `Duration`.
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Retry backoff as a `Duration`.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl PlaybackConfig {
    /// SIGTERM-to-SIGKILL grace period as a `Duration`.
    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    /// Completion-wait safety buffer as a `Duration`.
    pub fn completion_safety_buffer(&self) -> Duration {
        Duration::from_millis(self.completion_safety_buffer_ms)
    }

    /// Completion-wait fallback as a `Duration`.
    pub fn completion_fallback_wait(&self) -> Duration {
        Duration::from_millis(self.completion_fallback_wait_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file is missing
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                let not_found = e
                    .downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false);
                if not_found { Ok(Self::default()) } else { Err(e) }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXCAST_LANGUAGE → streaming.language
    /// - VOXCAST_AUDIO_DEVICE → audio.device
    /// - VOXCAST_QUEUE_CAPACITY → playback.queue_capacity
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("VOXCAST_LANGUAGE") {
            if !language.is_empty() {
                self.streaming.language = language;
            }
        }
        if let Ok(device) = std::env::var("VOXCAST_AUDIO_DEVICE") {
            if !device.is_empty() {
                self.audio.device = Some(device);
            }
        }
        if let Ok(capacity) = std::env::var("VOXCAST_QUEUE_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                self.playback.queue_capacity = capacity;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.frame_queue_capacity, 100);
        assert_eq!(config.streaming.language, "en-US");
        assert_eq!(config.streaming.debounce_interval_ms, 100);
        assert_eq!(config.streaming.heartbeat_interval_ms, 5_000);
        assert_eq!(config.streaming.max_retries, 3);
        assert_eq!(config.playback.queue_capacity, 20);
        assert_eq!(config.playback.max_retries, 2);
    }

    #[test]
    fn test_config_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[streaming]\nlanguage = \"ko-KR\"\nmax_retries = 5\n\n[playback]\nqueue_capacity = 8"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.streaming.language, "ko-KR");
        assert_eq!(config.streaming.max_retries, 5);
        assert_eq!(config.playback.queue_capacity, 8);
        // Unspecified sections keep defaults
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.streaming.debounce_interval_ms, 100);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid = toml =").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_config_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/voxcast.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_load_or_default_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[broken").unwrap();

        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::default();
        assert_eq!(
            config.streaming.debounce_interval(),
            Duration::from_millis(100)
        );
        assert_eq!(
            config.streaming.heartbeat_interval(),
            Duration::from_secs(5)
        );
        assert_eq!(config.playback.grace_timeout(), Duration::from_secs(2));
        assert_eq!(
            config.playback.completion_safety_buffer(),
            Duration::from_millis(500)
        );
        assert_eq!(
            config.playback.completion_fallback_wait(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
