//! Speech-synthesis capability.
//!
//! The production system satisfies this with a cloud TTS SDK that writes the
//! synthesized audio to a temp file; the core only depends on the seam.

use crate::error::{Result, VoxcastError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Reference to a synthesized audio file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    path: PathBuf,
}

impl AudioAsset {
    /// Wraps an existing audio file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the audio file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the backing file, best-effort.
    ///
    /// Synthesized announcements are throwaway temp files; a failed removal
    /// is logged, not propagated.
    pub fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                eprintln!(
                    "voxcast: could not remove audio asset {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Text-to-speech synthesis backend.
pub trait SpeechSynthesisBackend: Send + Sync {
    /// Synthesizes `text` in `language` into an audio file.
    fn synthesize(&self, text: &str, language: &str) -> Result<AudioAsset>;
}

/// Mock synthesis backend for testing.
///
/// Records every request and can be scripted to fail the first N calls,
/// the shape needed to exercise job retry paths.
#[derive(Clone)]
pub struct MockSynthesisBackend {
    requests: Arc<Mutex<Vec<(String, String)>>>,
    failures_remaining: Arc<AtomicU32>,
    asset_path: Arc<Mutex<PathBuf>>,
}

impl MockSynthesisBackend {
    /// Creates a mock that always succeeds, producing a placeholder asset.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            failures_remaining: Arc::new(AtomicU32::new(0)),
            asset_path: Arc::new(Mutex::new(PathBuf::from("/tmp/voxcast-mock.wav"))),
        }
    }

    /// Makes the first `n` synthesize calls fail.
    pub fn with_failures(self, n: u32) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Sets the asset path returned on success.
    pub fn with_asset_path(self, path: impl Into<PathBuf>) -> Self {
        if let Ok(mut asset) = self.asset_path.lock() {
            *asset = path.into();
        }
        self
    }

    /// All `(text, language)` requests seen so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of synthesize calls seen so far.
    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

impl Default for MockSynthesisBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesisBackend for MockSynthesisBackend {
    fn synthesize(&self, text: &str, language: &str) -> Result<AudioAsset> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((text.to_string(), language.to_string()));
        }

        let failures = self.failures_remaining.load(Ordering::SeqCst);
        if failures > 0 {
            self.failures_remaining.store(failures - 1, Ordering::SeqCst);
            return Err(VoxcastError::Synthesis {
                message: format!("mock synthesis failure for '{}'", text),
            });
        }

        let path = self
            .asset_path
            .lock()
            .map(|asset| asset.clone())
            .unwrap_or_else(|_| PathBuf::from("/tmp/voxcast-mock.wav"));
        Ok(AudioAsset::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_requests() {
        let mock = MockSynthesisBackend::new();
        mock.synthesize("hello", "en-US").unwrap();
        mock.synthesize("annyeong", "ko-KR").unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], ("hello".to_string(), "en-US".to_string()));
        assert_eq!(requests[1], ("annyeong".to_string(), "ko-KR".to_string()));
    }

    #[test]
    fn test_mock_fails_then_succeeds() {
        let mock = MockSynthesisBackend::new().with_failures(2);

        assert!(mock.synthesize("a", "en-US").is_err());
        assert!(mock.synthesize("a", "en-US").is_err());
        assert!(mock.synthesize("a", "en-US").is_ok());
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn test_mock_asset_path() {
        let mock = MockSynthesisBackend::new().with_asset_path("/tmp/specific.wav");
        let asset = mock.synthesize("x", "en-US").unwrap();
        assert_eq!(asset.path(), Path::new("/tmp/specific.wav"));
    }

    #[test]
    fn test_asset_remove_missing_file_is_quiet() {
        let asset = AudioAsset::new("/nonexistent/voxcast-test.wav");
        asset.remove(); // must not panic
    }

    #[test]
    fn test_asset_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("announcement.wav");
        std::fs::write(&path, b"fake audio").unwrap();

        let asset = AudioAsset::new(&path);
        asset.remove();
        assert!(!path.exists());
    }
}
