use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use summary_flow::TranscriptEntry;

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeRequest {
    /// Free-form medical text to summarize.
    pub text: String,
    /// Optional image to ground the generation in (lab report photo, scan).
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub audio_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStartedResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

/// Poll result for a summary generation job. `session_id` and `summary`
/// are present once the job completed; `message` carries the apology when
/// it failed.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub session_id: Option<String>,
    pub summary: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub summary: String,
    pub transcript: Vec<TranscriptEntry>,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowUpResponse {
    pub session_id: String,
    pub answer: String,
    pub transcript: Vec<TranscriptEntry>,
}
