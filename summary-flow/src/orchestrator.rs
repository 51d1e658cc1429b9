//! Orchestration of generation calls against sessions.
//!
//! Long external calls are offloaded through the task executor; the
//! foreground only polls for completion and mutates session state after an
//! outcome has been retrieved. Only one generation task is expected in
//! flight at a time by workflow convention.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::info;

use crate::engine::{GenerationEngine, PromptKind};
use crate::error::{FlowError, Result};
use crate::executor::{self, TaskHandle};
use crate::extract::extract_structured_summary;
use crate::format::format_summary;
use crate::session::{QaTurn, SessionStore, SummarySession, TranscriptEntry};

/// Interval between completion polls while a follow-up call runs. Paces
/// progress feedback only; the underlying call is never interrupted.
pub const FOLLOW_UP_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Reply to one follow-up turn: the cleaned answer plus the flattened
/// transcript after any append.
#[derive(Debug, Clone)]
pub struct FollowUpReply {
    pub answer: String,
    pub transcript: Vec<TranscriptEntry>,
}

/// Offload the initial generation call to a background task and return its
/// handle immediately. The caller observes completion by polling the
/// handle.
pub fn start_summary_generation(
    engine: Arc<dyn GenerationEngine>,
    text: String,
    image_path: Option<String>,
) -> TaskHandle<Result<String>> {
    executor::spawn(async move {
        engine
            .generate(PromptKind::Initial, &text, image_path.as_deref())
            .await
    })
}

/// Render raw generation output for display: the formatted structured
/// summary when one can be recovered, otherwise the raw text verbatim so
/// the user always sees something rather than an error screen.
pub fn render_summary(raw: &str) -> String {
    match extract_structured_summary(raw) {
        Some(summary) => format_summary(&summary),
        None => {
            info!("No structured data found in generation output, falling back to raw text");
            raw.to_string()
        }
    }
}

/// Build the grounded prompt for a follow-up question. Order is fixed: the
/// original source text, the prior summary, every prior turn as alternating
/// `User:`/`AI:` lines, the new question, and a directive to answer
/// directly.
pub fn build_grounded_prompt(session: &SummarySession, question: &str) -> String {
    let history = session
        .history
        .iter()
        .map(|turn| format!("User: {}\nAI: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<medical_text>\n{}\n</medical_text>\n\n\
         <summary_of_text>\n{}\n</summary_of_text>\n\n\
         <conversation_history>\n{}\n</conversation_history>\n\n\
         <user_question>\n{}\n</user_question>\n\n\
         Provide your answer directly.",
        session.original_text, session.summary, history, question
    )
}

/// Strip a single enclosing markup tag pair from a response.
///
/// Models sometimes wrap an answer in XML-style tags. This keeps the inner
/// content of the first `<tag>` whose literal `</tag>` closer appears later
/// in the text (case-sensitive, non-greedy: the first closer wins), trimmed
/// of surrounding whitespace. Text without such a pair passes through
/// trimmed but otherwise unchanged.
pub fn strip_wrapper_tags(text: &str) -> String {
    let trimmed = text.trim();
    let opening = Regex::new(r"<([A-Za-z][A-Za-z0-9_]*)>").expect("invalid tag regex");

    for caps in opening.captures_iter(trimmed) {
        let (Some(open), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let closer = format!("</{}>", name.as_str());
        if let Some(offset) = trimmed[open.end()..].find(&closer) {
            return trimmed[open.end()..open.end() + offset].trim().to_string();
        }
    }

    trimmed.to_string()
}

/// Run one follow-up turn against a session.
///
/// An empty or whitespace-only question short-circuits: no generation call
/// is made, no turn is appended, and the reply echoes the current
/// transcript with an empty answer. Otherwise the conversational call is
/// offloaded through the executor, polled at [`FOLLOW_UP_POLL_INTERVAL`],
/// its answer cleaned, and the turn appended through the store. A failed
/// generation call propagates as an error and leaves the history untouched.
pub async fn ask(
    engine: Arc<dyn GenerationEngine>,
    store: &dyn SessionStore,
    session_id: &str,
    question: &str,
) -> Result<FollowUpReply> {
    let session = store
        .get(session_id)
        .await?
        .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

    let question = question.trim();
    if question.is_empty() {
        return Ok(FollowUpReply {
            answer: String::new(),
            transcript: session.transcript(),
        });
    }

    let prompt = build_grounded_prompt(&session, question);
    let image_path = session.image_path.clone();
    let handle = executor::spawn(async move {
        engine
            .generate(PromptKind::Conversational, &prompt, image_path.as_deref())
            .await
    });

    let raw = handle.wait_for_outcome(FOLLOW_UP_POLL_INTERVAL).await??;
    let answer = strip_wrapper_tags(&raw);

    let updated = store
        .append_turn(
            session_id,
            QaTurn {
                question: question.to_string(),
                answer: answer.clone(),
            },
        )
        .await?;

    info!(
        "Follow-up turn appended to session {} ({} turns total)",
        updated.id,
        updated.history.len()
    );

    Ok(FollowUpReply {
        answer,
        transcript: updated.transcript(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedEngine {
        reply: std::result::Result<String, String>,
        calls: Mutex<Vec<(PromptKind, String, Option<String>)>>,
    }

    impl ScriptedEngine {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationEngine for ScriptedEngine {
        async fn generate(
            &self,
            kind: PromptKind,
            text: &str,
            image_path: Option<&str>,
        ) -> Result<String> {
            self.calls.lock().unwrap().push((
                kind,
                text.to_string(),
                image_path.map(String::from),
            ));
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(message) => Err(FlowError::Generation(message.clone())),
            }
        }
    }

    async fn stored_session(store: &InMemorySessionStore) -> String {
        let session = SummarySession::new(
            "Blood pressure was 150/95 at today's visit.".to_string(),
            None,
            "<h2>Medical Summary</h2>".to_string(),
        );
        let id = session.id.clone();
        store.save(session).await.unwrap();
        id
    }

    #[tokio::test]
    async fn empty_question_skips_the_engine_and_keeps_history() {
        let store = InMemorySessionStore::new();
        let id = stored_session(&store).await;
        let engine = Arc::new(ScriptedEngine::answering("never used"));

        let reply = ask(engine.clone(), &store, &id, "   ").await.unwrap();

        assert!(reply.answer.is_empty());
        assert!(reply.transcript.is_empty());
        assert_eq!(engine.call_count(), 0);
        assert!(store.get(&id).await.unwrap().unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn successful_turn_is_cleaned_and_appended() {
        let store = InMemorySessionStore::new();
        let id = stored_session(&store).await;
        let engine = Arc::new(ScriptedEngine::answering(
            "<answer>Yes, take it with food.</answer>",
        ));

        let reply = ask(engine, &store, &id, "With food?").await.unwrap();

        assert_eq!(reply.answer, "Yes, take it with food.");
        assert_eq!(reply.transcript.len(), 2);
        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].question, "With food?");
        assert_eq!(session.history[0].answer, "Yes, take it with food.");
    }

    #[tokio::test]
    async fn failed_generation_propagates_and_leaves_history_untouched() {
        let store = InMemorySessionStore::new();
        let id = stored_session(&store).await;
        let engine = Arc::new(ScriptedEngine::failing("inference fault"));

        let result = ask(engine, &store, &id, "Anything?").await;

        match result {
            Err(FlowError::Generation(message)) => assert_eq!(message, "inference fault"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(store.get(&id).await.unwrap().unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let store = InMemorySessionStore::new();
        let engine = Arc::new(ScriptedEngine::answering("unused"));

        let result = ask(engine, &store, "missing", "Hello?").await;
        assert!(matches!(result, Err(FlowError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn grounded_prompt_reaches_the_engine_with_context_in_order() {
        let store = InMemorySessionStore::new();
        let session = SummarySession::new(
            "Original medical text.".to_string(),
            Some("/tmp/scan.png".to_string()),
            "The summary.".to_string(),
        );
        let id = session.id.clone();
        store.save(session).await.unwrap();
        let engine = Arc::new(ScriptedEngine::answering("First answer"));

        ask(engine.clone(), &store, &id, "First question?")
            .await
            .unwrap();
        ask(engine.clone(), &store, &id, "Second question?")
            .await
            .unwrap();

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, PromptKind::Conversational);
        assert_eq!(calls[1].2.as_deref(), Some("/tmp/scan.png"));

        let prompt = &calls[1].1;
        let text_at = prompt.find("Original medical text.").unwrap();
        let summary_at = prompt.find("The summary.").unwrap();
        let history_at = prompt.find("User: First question?\nAI: First answer").unwrap();
        let question_at = prompt.find("Second question?").unwrap();
        let directive_at = prompt.find("Provide your answer directly.").unwrap();
        assert!(text_at < summary_at);
        assert!(summary_at < history_at);
        assert!(history_at < question_at);
        assert!(question_at < directive_at);
    }

    #[test]
    fn tag_wrapped_answer_is_unwrapped() {
        assert_eq!(strip_wrapper_tags("<answer>42</answer>"), "42");
        assert_eq!(
            strip_wrapper_tags("  <response>\n spaced \n</response>  "),
            "spaced"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            strip_wrapper_tags("plain text, no tags"),
            "plain text, no tags"
        );
    }

    #[test]
    fn mismatched_tags_pass_through() {
        assert_eq!(
            strip_wrapper_tags("<answer>almost</Answer>"),
            "<answer>almost</Answer>"
        );
    }

    #[test]
    fn an_unclosed_leading_tag_does_not_hide_a_later_pair() {
        assert_eq!(
            strip_wrapper_tags("<br> note <answer>42</answer>"),
            "42"
        );
    }

    #[test]
    fn render_summary_formats_structured_output() {
        let raw = "```json\n{\"key_takeaways\": [\"Rest\"]}\n```";
        let rendered = render_summary(raw);
        assert!(rendered.contains("Key Takeaways"));
        assert!(rendered.contains("<li>Rest</li>"));
    }

    #[test]
    fn render_summary_falls_back_to_raw_text() {
        let raw = "The model rambled and produced nothing structured.";
        assert_eq!(render_summary(raw), raw);
    }
}
