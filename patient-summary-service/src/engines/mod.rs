pub mod generation;
pub mod transcription;

pub use generation::OpenRouterEngine;
pub use transcription::WhisperTranscription;
