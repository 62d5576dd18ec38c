//! Streaming speech-recognition capability.
//!
//! The production system satisfies these traits with a cloud speech SDK; the
//! core only depends on the seam. `MockRecognitionBackend` scripts responses
//! and failures for tests.

use crate::audio::frame::AudioFrame;
use crate::error::{Result, VoxcastError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Per-session recognition parameters.
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// BCP-47 language code, e.g. "en-US".
    pub language: String,
    /// Sample rate of the PCM frames that will be sent.
    pub sample_rate: u32,
}

impl RecognitionConfig {
    /// Creates a config for the given language at 16kHz.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            sample_rate: crate::defaults::SAMPLE_RATE,
        }
    }

    /// Overrides the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

/// A single recognizer response.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResponse {
    /// True when the recognizer will not revise this text further.
    pub is_final: bool,
    /// Raw transcript text (may carry surrounding whitespace).
    pub text: String,
    /// Recognizer confidence in [0, 1].
    pub confidence: f32,
}

impl RecognitionResponse {
    /// Creates an interim response.
    pub fn interim(text: &str, confidence: f32) -> Self {
        Self {
            is_final: false,
            text: text.to_string(),
            confidence,
        }
    }

    /// Creates a final response.
    pub fn final_result(text: &str, confidence: f32) -> Self {
        Self {
            is_final: true,
            text: text.to_string(),
            confidence,
        }
    }
}

/// An open bidirectional recognition stream.
pub trait RecognitionStream: Send {
    /// Sends one audio frame to the recognizer.
    fn send(&mut self, frame: &AudioFrame) -> Result<()>;

    /// Polls for the next recognizer response without blocking.
    ///
    /// Returns `Ok(None)` when no response is ready yet. Errors are
    /// stream-level failures; the caller re-establishes the stream.
    fn try_next(&mut self) -> Result<Option<RecognitionResponse>>;
}

/// Streaming speech-recognition backend.
pub trait SpeechRecognitionBackend: Send + Sync {
    /// Opens a new streaming recognition session.
    fn open_stream(&self, config: &RecognitionConfig) -> Result<Box<dyn RecognitionStream>>;

    /// Recognizes a complete buffered utterance in one shot.
    fn recognize(
        &self,
        config: &RecognitionConfig,
        samples: &[i16],
    ) -> Result<RecognitionResponse>;
}

/// Scripted step for the mock stream.
#[derive(Debug, Clone)]
enum ScriptStep {
    Respond(RecognitionResponse),
    Fail(String),
}

/// Mock recognition backend for testing.
///
/// Responses are scripted per stream: each opened stream pops from the
/// shared script in order. Open failures can be scheduled for the first N
/// open attempts to exercise retry paths.
#[derive(Clone)]
pub struct MockRecognitionBackend {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    open_failures: Arc<AtomicU32>,
    opened: Arc<AtomicU32>,
    frames_received: Arc<AtomicU32>,
    one_shot_response: Option<RecognitionResponse>,
}

impl MockRecognitionBackend {
    /// Creates a mock with an empty script (streams yield no responses).
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            open_failures: Arc::new(AtomicU32::new(0)),
            opened: Arc::new(AtomicU32::new(0)),
            frames_received: Arc::new(AtomicU32::new(0)),
            one_shot_response: None,
        }
    }

    /// Appends an interim response to the script.
    pub fn with_interim(self, text: &str, confidence: f32) -> Self {
        self.push_interim(text, confidence);
        self
    }

    /// Appends a final response to the script.
    pub fn with_final(self, text: &str, confidence: f32) -> Self {
        self.push_final(text, confidence);
        self
    }

    /// Appends a mid-stream failure to the script.
    pub fn with_stream_error(self, message: &str) -> Self {
        self.push(ScriptStep::Fail(message.to_string()));
        self
    }

    /// Appends an interim response while streams may already be open.
    pub fn push_interim(&self, text: &str, confidence: f32) {
        self.push(ScriptStep::Respond(RecognitionResponse::interim(
            text, confidence,
        )));
    }

    /// Appends a final response while streams may already be open.
    pub fn push_final(&self, text: &str, confidence: f32) {
        self.push(ScriptStep::Respond(RecognitionResponse::final_result(
            text, confidence,
        )));
    }

    /// Makes the first `n` open attempts fail.
    pub fn with_open_failures(self, n: u32) -> Self {
        self.open_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Sets the response returned by the one-shot `recognize` path.
    pub fn with_one_shot(mut self, response: RecognitionResponse) -> Self {
        self.one_shot_response = Some(response);
        self
    }

    /// Number of streams successfully opened.
    pub fn streams_opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of frames received across all streams.
    pub fn frames_received(&self) -> u32 {
        self.frames_received.load(Ordering::SeqCst)
    }

    fn push(&self, step: ScriptStep) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }
}

impl Default for MockRecognitionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechRecognitionBackend for MockRecognitionBackend {
    fn open_stream(&self, _config: &RecognitionConfig) -> Result<Box<dyn RecognitionStream>> {
        let failures = self.open_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.open_failures.store(failures - 1, Ordering::SeqCst);
            return Err(VoxcastError::RecognitionStream {
                message: "mock open failure".to_string(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRecognitionStream {
            script: self.script.clone(),
            frames_received: self.frames_received.clone(),
        }))
    }

    fn recognize(
        &self,
        _config: &RecognitionConfig,
        _samples: &[i16],
    ) -> Result<RecognitionResponse> {
        self.one_shot_response
            .clone()
            .ok_or_else(|| VoxcastError::RecognitionStream {
                message: "mock has no one-shot response".to_string(),
            })
    }
}

struct MockRecognitionStream {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    frames_received: Arc<AtomicU32>,
}

impl RecognitionStream for MockRecognitionStream {
    fn send(&mut self, _frame: &AudioFrame) -> Result<()> {
        self.frames_received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn try_next(&mut self) -> Result<Option<RecognitionResponse>> {
        let step = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(_) => None,
        };
        match step {
            Some(ScriptStep::Respond(response)) => Ok(Some(response)),
            Some(ScriptStep::Fail(message)) => Err(VoxcastError::RecognitionStream { message }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_stream_yields_scripted_responses() {
        let backend = MockRecognitionBackend::new()
            .with_interim("hel", 0.4)
            .with_final("hello", 0.9);

        let config = RecognitionConfig::new("en-US");
        let mut stream = backend.open_stream(&config).unwrap();

        let first = stream.try_next().unwrap().unwrap();
        assert!(!first.is_final);
        assert_eq!(first.text, "hel");

        let second = stream.try_next().unwrap().unwrap();
        assert!(second.is_final);
        assert_eq!(second.text, "hello");
        assert_eq!(second.confidence, 0.9);

        assert!(stream.try_next().unwrap().is_none());
    }

    #[test]
    fn test_mock_stream_error_step() {
        let backend = MockRecognitionBackend::new()
            .with_final("ok", 1.0)
            .with_stream_error("connection reset");

        let config = RecognitionConfig::new("en-US");
        let mut stream = backend.open_stream(&config).unwrap();

        assert!(stream.try_next().unwrap().is_some());
        match stream.try_next() {
            Err(VoxcastError::RecognitionStream { message }) => {
                assert_eq!(message, "connection reset");
            }
            other => panic!("Expected stream error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_mock_open_failures_then_success() {
        let backend = MockRecognitionBackend::new().with_open_failures(2);
        let config = RecognitionConfig::new("en-US");

        assert!(backend.open_stream(&config).is_err());
        assert!(backend.open_stream(&config).is_err());
        assert!(backend.open_stream(&config).is_ok());
        assert_eq!(backend.streams_opened(), 1);
    }

    #[test]
    fn test_mock_counts_frames() {
        let backend = MockRecognitionBackend::new();
        let config = RecognitionConfig::new("en-US");
        let mut stream = backend.open_stream(&config).unwrap();

        for i in 0..3 {
            stream.send(&AudioFrame::new(i, vec![0i16; 160])).unwrap();
        }
        assert_eq!(backend.frames_received(), 3);
    }

    #[test]
    fn test_mock_one_shot_recognize() {
        let backend = MockRecognitionBackend::new()
            .with_one_shot(RecognitionResponse::final_result("full utterance", 0.8));
        let config = RecognitionConfig::new("en-US");

        let response = backend.recognize(&config, &[0i16; 16000]).unwrap();
        assert_eq!(response.text, "full utterance");

        let bare = MockRecognitionBackend::new();
        assert!(bare.recognize(&config, &[]).is_err());
    }

    #[test]
    fn test_recognition_config_defaults() {
        let config = RecognitionConfig::new("ko-KR");
        assert_eq!(config.language, "ko-KR");
        assert_eq!(config.sample_rate, 16_000);

        let config = config.with_sample_rate(8_000);
        assert_eq!(config.sample_rate, 8_000);
    }
}
