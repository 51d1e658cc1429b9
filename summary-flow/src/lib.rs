pub mod engine;
pub mod error;
pub mod executor;
pub mod extract;
pub mod format;
pub mod orchestrator;
pub mod session;
pub mod summary;

// Re-export commonly used types
pub use engine::{GenerationEngine, PromptKind, TranscriptionEngine};
pub use error::{FlowError, Result};
pub use executor::TaskHandle;
pub use extract::{extract_json_object, extract_structured_summary};
pub use format::{escape_html, format_summary};
pub use orchestrator::{
    FOLLOW_UP_POLL_INTERVAL, FollowUpReply, ask, build_grounded_prompt, render_summary,
    start_summary_generation, strip_wrapper_tags,
};
pub use session::{
    InMemorySessionStore, MessageRole, QaTurn, SessionStore, SummarySession, TranscriptEntry,
    notes_html,
};
pub use summary::{Medication, StructuredSummary, TermDefinition};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raw_generation_output_becomes_a_stored_session() {
        let raw = "Working through the document...\n```json\n{\n  \"key_takeaways\": [\"Take lisinopril daily\",],\n  \"questions_for_provider\": [\"Do I need a refill?\"],\n}\n```";
        let display = render_summary(raw);
        assert!(display.contains("Key Takeaways"));
        assert!(display.contains("Questions for Provider"));

        let store = InMemorySessionStore::new();
        let session = SummarySession::new("original text".to_string(), None, display.clone());
        let id = session.id.clone();
        store.save(session).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.summary, display);
        assert_eq!(loaded.original_text, "original text");
        assert!(loaded.history.is_empty());
    }

    #[test]
    fn unparseable_output_falls_back_to_the_verbatim_input() {
        let raw = "No braces or fences anywhere in this response.";
        assert_eq!(render_summary(raw), raw);
    }
}
