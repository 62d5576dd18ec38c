//! Abstract speech-recognition capability consumed by the streaming
//! coordinator.

pub mod backend;

pub use backend::{
    MockRecognitionBackend, RecognitionConfig, RecognitionResponse, RecognitionStream,
    SpeechRecognitionBackend,
};
