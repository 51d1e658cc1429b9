//! Whisper transcription over the Groq audio API.
//!
//! The transcription collaborator never raises observably: a missing key,
//! unreadable file, or failed request all come back as an in-band apology
//! string, and an empty input path yields an empty output.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart;
use serde_json::Value;
use summary_flow::TranscriptionEngine;
use tracing::{error, info};

const TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

pub struct WhisperTranscription {
    api_key: Option<String>,
    http: Client,
}

impl WhisperTranscription {
    /// Build the engine from `GROQ_API_KEY`; a missing key is tolerated and
    /// only degrades transcription to the apology path.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GROQ_API_KEY").ok(),
            http: Client::new(),
        }
    }

    async fn transcribe_file(&self, audio_path: &str) -> anyhow::Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("GROQ_API_KEY not set"))?;

        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .rsplit('/')
            .next()
            .unwrap_or("audio.wav")
            .to_string();
        let form = multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(TRANSCRIPTION_URL)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "transcription request failed: {}",
                response.status()
            ));
        }

        let body: Value = response.json().await?;
        let text = body["text"].as_str().unwrap_or_default();
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperTranscription {
    async fn transcribe(&self, audio_path: &str) -> String {
        if audio_path.trim().is_empty() {
            return String::new();
        }
        match self.transcribe_file(audio_path).await {
            Ok(text) => {
                info!(
                    "Transcribed {} characters from {}",
                    text.len(),
                    audio_path
                );
                text
            }
            Err(e) => {
                error!("Audio transcription failed: {}", e);
                format!("Sorry, an error occurred during transcription: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_path_yields_empty_output() {
        let engine = WhisperTranscription {
            api_key: None,
            http: Client::new(),
        };
        assert_eq!(engine.transcribe("").await, "");
        assert_eq!(engine.transcribe("   ").await, "");
    }

    #[tokio::test]
    async fn trouble_is_reported_in_band_never_raised() {
        let engine = WhisperTranscription {
            api_key: None,
            http: Client::new(),
        };
        let text = engine.transcribe("/tmp/recording.wav").await;
        assert!(text.starts_with("Sorry, an error occurred during transcription"));
    }
}
