//! Transcript events emitted to the stream consumer.
//!
//! Events cross the process boundary (the enclosing service forwards them
//! over a WebSocket), so they carry wall-clock timestamps and serialize to
//! tagged JSON.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A recognized piece of speech.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    /// Trimmed transcript text, never empty.
    #[serde(rename = "transcript")]
    pub text: String,
    /// Recognizer confidence in [0, 1].
    pub confidence: f32,
    /// Language the session was started with.
    pub language: String,
    /// Wall-clock emission time.
    pub timestamp: SystemTime,
}

impl Transcript {
    /// Creates a transcript stamped with the current wall-clock time.
    pub fn new(text: String, confidence: f32, language: &str) -> Self {
        Self {
            text,
            confidence,
            language: language.to_string(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Event emitted by the transcription stream.
///
/// Consecutive `Final` events never carry identical text, and neither do
/// consecutive `Interim` events. A stream ends with at most one `Error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriptEvent {
    /// Provisional result the recognizer may still revise.
    Interim(Transcript),
    /// Result the recognizer will not revise further.
    Final(Transcript),
    /// Synthetic liveness signal emitted on a silent stream.
    Heartbeat {
        frames_processed: u64,
        queue_depth: usize,
        timestamp: SystemTime,
    },
    /// Terminal failure; the stream closes after this.
    Error {
        message: String,
        timestamp: SystemTime,
    },
}

impl TranscriptEvent {
    /// Creates a heartbeat stamped with the current wall-clock time.
    pub fn heartbeat(frames_processed: u64, queue_depth: usize) -> Self {
        Self::Heartbeat {
            frames_processed,
            queue_depth,
            timestamp: SystemTime::now(),
        }
    }

    /// Creates a terminal error event.
    pub fn error(message: String) -> Self {
        Self::Error {
            message,
            timestamp: SystemTime::now(),
        }
    }

    /// Returns true if this is an interim transcript.
    pub fn is_interim(&self) -> bool {
        matches!(self, TranscriptEvent::Interim(_))
    }

    /// Returns true if this is a final transcript.
    pub fn is_final(&self) -> bool {
        matches!(self, TranscriptEvent::Final(_))
    }

    /// Returns true if this is a heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, TranscriptEvent::Heartbeat { .. })
    }

    /// Returns true if this is a terminal error.
    pub fn is_error(&self) -> bool {
        matches!(self, TranscriptEvent::Error { .. })
    }

    /// The transcript text, if this event carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            TranscriptEvent::Interim(t) | TranscriptEvent::Final(t) => Some(&t.text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_helpers() {
        let interim = TranscriptEvent::Interim(Transcript::new("hel".into(), 0.3, "en-US"));
        assert!(interim.is_interim());
        assert!(!interim.is_final());
        assert_eq!(interim.text(), Some("hel"));

        let final_event = TranscriptEvent::Final(Transcript::new("hello".into(), 0.9, "en-US"));
        assert!(final_event.is_final());
        assert_eq!(final_event.text(), Some("hello"));

        let heartbeat = TranscriptEvent::heartbeat(120, 3);
        assert!(heartbeat.is_heartbeat());
        assert_eq!(heartbeat.text(), None);

        let error = TranscriptEvent::error("stream lost".into());
        assert!(error.is_error());
        assert_eq!(error.text(), None);
    }

    #[test]
    fn test_event_json_tagging() {
        let event = TranscriptEvent::Final(Transcript::new("hello".into(), 0.9, "en-US"));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "final");
        assert_eq!(json["transcript"], "hello");
        assert_eq!(json["language"], "en-US");

        let heartbeat = TranscriptEvent::heartbeat(42, 1);
        let json = serde_json::to_value(&heartbeat).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["frames_processed"], 42);
        assert_eq!(json["queue_depth"], 1);
    }

    #[test]
    fn test_event_json_roundtrip() {
        let events = vec![
            TranscriptEvent::Interim(Transcript::new("partial".into(), 0.2, "ko-KR")),
            TranscriptEvent::Final(Transcript::new("done".into(), 0.95, "ko-KR")),
            TranscriptEvent::heartbeat(7, 0),
            TranscriptEvent::error("gone".into()),
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: TranscriptEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event, back);
        }
    }
}
