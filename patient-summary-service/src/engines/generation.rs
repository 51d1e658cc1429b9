//! OpenRouter-backed generation engine.
//!
//! Text-only calls go through a rig agent with the system prompt as its
//! preamble. Image-grounded calls use the chat-completions API directly so
//! the image can be attached as a base64 data URL content part.

use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openrouter;
use serde_json::{Value, json};
use summary_flow::{FlowError, GenerationEngine, PromptKind, Result};
use tracing::info;

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_TEXT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_VISION_MODEL: &str = "openai/gpt-4.1-mini";

/// System prompt for the first-pass summarization call. The extractor
/// tolerates narration and stray braces, but a single fenced object is the
/// shape it recovers most reliably.
const INITIAL_SYSTEM_PROMPT: &str = "\
You are a medical AI assistant helping patients understand their medical documents. \
Read the provided medical text (and image, when one is attached) and explain it in plain, \
patient-friendly language a layperson can follow.

Respond with a single JSON object inside a ```json code fence, using these fields:
- \"key_takeaways\": list of short plain-language points the patient should remember
- \"medications\": list of objects with \"name\", \"dosage\", \"administration\", and \"description\"
- \"medical_terms\": list of objects with \"term\" and \"definition\" explaining jargon from the text
- \"questions_for_provider\": list of questions the patient may want to ask their provider

Only include what the document supports; omit a field rather than inventing content for it. \
Do not add commentary outside the JSON fence.";

/// System prompt for grounded follow-up answering.
const CONVERSATIONAL_SYSTEM_PROMPT: &str = "\
You are a medical AI assistant answering a patient's follow-up questions about a document \
you previously summarized. Ground every answer in the provided medical text, summary, and \
conversation history. Answer directly, in plain language, without restating the question. \
If the material does not contain the answer, say so and suggest asking the provider.";

pub struct OpenRouterEngine {
    api_key: String,
    text_model: String,
    vision_model: String,
    http: Client,
}

impl OpenRouterEngine {
    /// Build the engine from `OPENROUTER_API_KEY`, with optional
    /// `OPENROUTER_MODEL` and `OPENROUTER_VISION_MODEL` overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow!("OPENROUTER_API_KEY not set"))?;
        Ok(Self {
            api_key,
            text_model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| DEFAULT_TEXT_MODEL.to_string()),
            vision_model: std::env::var("OPENROUTER_VISION_MODEL")
                .unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string()),
            http: Client::new(),
        })
    }

    fn system_prompt(kind: PromptKind) -> &'static str {
        match kind {
            PromptKind::Initial => INITIAL_SYSTEM_PROMPT,
            PromptKind::Conversational => CONVERSATIONAL_SYSTEM_PROMPT,
        }
    }

    async fn generate_text(&self, kind: PromptKind, text: &str) -> anyhow::Result<String> {
        let client = openrouter::Client::new(&self.api_key);
        let agent = client
            .agent(&self.text_model)
            .preamble(Self::system_prompt(kind))
            .build();
        let response = agent.prompt(text).await?;
        Ok(response)
    }

    async fn generate_with_image(
        &self,
        kind: PromptKind,
        text: &str,
        image_path: &str,
    ) -> anyhow::Result<String> {
        let image_url = encode_image_as_data_url(image_path).await?;
        let content = vec![
            json!({ "type": "text", "text": text }),
            json!({ "type": "image_url", "image_url": { "url": image_url } }),
        ];
        self.call_openrouter_api(kind, content, 2000).await
    }

    /// Chat-completions call with vision content parts.
    async fn call_openrouter_api(
        &self,
        kind: PromptKind,
        content: Vec<Value>,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.vision_model,
            "messages": [
                {
                    "role": "system",
                    "content": Self::system_prompt(kind)
                },
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": max_tokens
        });

        let response = self
            .http
            .post(OPENROUTER_CHAT_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM API request failed: {}", response.status()));
        }

        let response_json: Value = response.json().await?;
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid response format from LLM"))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl GenerationEngine for OpenRouterEngine {
    async fn generate(
        &self,
        kind: PromptKind,
        text: &str,
        image_path: Option<&str>,
    ) -> Result<String> {
        let result = match image_path {
            Some(path) => {
                info!("Running {:?} generation grounded in image {}", kind, path);
                self.generate_with_image(kind, text, path).await
            }
            None => self.generate_text(kind, text).await,
        };
        result.map_err(|e| FlowError::Generation(e.to_string()))
    }
}

/// Read an image file and wrap it as a base64 `data:` URL for the vision
/// API.
async fn encode_image_as_data_url(path: &str) -> anyhow::Result<String> {
    if !tokio::fs::try_exists(path).await? {
        return Err(anyhow!("Image file not found: {}", path));
    }
    let bytes = tokio::fs::read(path).await?;
    let mime = match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
}
