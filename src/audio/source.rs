use crate::error::{Result, VoxcastError};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real microphone vs mock).
/// A source is reusable: `start` and `stop` may be called repeatedly across
/// streaming sessions.
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    ///
    /// Must be safe to call when not started.
    fn stop(&mut self) -> Result<()>;

    /// Read any audio samples captured since the last call.
    ///
    /// Returns an empty vector when no samples are available yet.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    samples: Vec<i16>,
    remaining_reads: Option<u32>,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            samples: vec![0i16; 160],
            remaining_reads: None,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to return specific samples
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    /// Configure the mock to return samples for only the first `n` reads,
    /// then empty reads.
    pub fn with_read_limit(mut self, n: u32) -> Self {
        self.remaining_reads = Some(n);
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxcastError::AudioDevice {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(VoxcastError::AudioDevice {
                message: self.error_message.clone(),
            });
        }
        if let Some(ref mut remaining) = self.remaining_reads {
            if *remaining == 0 {
                return Ok(Vec::new());
            }
            *remaining -= 1;
        }
        Ok(self.samples.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_returns_configured_samples() {
        let test_samples = vec![100i16, 200, 300, 400, 500];
        let mut source = MockAudioSource::new().with_samples(test_samples.clone());

        assert_eq!(source.read_samples().unwrap(), test_samples);
    }

    #[test]
    fn test_mock_start_stop_state() {
        let mut source = MockAudioSource::new();
        assert!(!source.is_started());

        source.start().unwrap();
        assert!(source.is_started());

        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_start_stop_multiple_times() {
        // Sources are reusable across streaming sessions
        let mut source = MockAudioSource::new();
        for _ in 0..3 {
            assert!(source.start().is_ok());
            assert!(source.is_started());
            assert!(source.stop().is_ok());
            assert!(!source.is_started());
        }
    }

    #[test]
    fn test_mock_stop_without_start() {
        let mut source = MockAudioSource::new();
        assert!(source.stop().is_ok());
    }

    #[test]
    fn test_mock_start_failure() {
        let mut source = MockAudioSource::new()
            .with_start_failure()
            .with_error_message("device not found");

        match source.start() {
            Err(VoxcastError::AudioDevice { message }) => {
                assert_eq!(message, "device not found");
            }
            other => panic!("Expected AudioDevice error, got {:?}", other.is_ok()),
        }
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_read_failure() {
        let mut source = MockAudioSource::new().with_read_failure();

        match source.read_samples() {
            Err(VoxcastError::AudioDevice { message }) => {
                assert_eq!(message, "mock audio error");
            }
            other => panic!("Expected AudioDevice error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_mock_read_limit() {
        let mut source = MockAudioSource::new()
            .with_samples(vec![1i16; 160])
            .with_read_limit(2);

        assert_eq!(source.read_samples().unwrap().len(), 160);
        assert_eq!(source.read_samples().unwrap().len(), 160);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_samples(vec![1i16, 2, 3]));

        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![1i16, 2, 3]);
        source.stop().unwrap();
    }
}
