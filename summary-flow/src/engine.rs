//! Seams to the external generation and transcription collaborators.
//!
//! Collaborators are explicit handles passed into the orchestration
//! functions and owned by the caller, not process-wide lazily-initialized
//! globals.

use async_trait::async_trait;

use crate::error::Result;

/// Which system prompt a generation call runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// First-pass summarization of the source text.
    Initial,
    /// Grounded follow-up answering within an existing session.
    Conversational,
}

/// External free-text (or vision-grounded) generation service.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Run one generation call. Fails with [`crate::FlowError::Generation`]
    /// when the collaborator cannot produce a response (missing image,
    /// inference fault).
    async fn generate(
        &self,
        kind: PromptKind,
        text: &str,
        image_path: Option<&str>,
    ) -> Result<String>;
}

/// External audio transcription service. Trouble never surfaces as `Err`;
/// the engine reports it as an in-band apology string, and an empty input
/// path yields an empty output.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(&self, audio_path: &str) -> String;
}
