use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use summary_flow::{
    FlowError, GenerationEngine, InMemorySessionStore, SessionStore, SummarySession,
    TranscriptEntry, TranscriptionEngine, ask, notes_html, render_summary,
    start_summary_generation,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::engines::{OpenRouterEngine, WhisperTranscription};
use crate::jobs::JobRegistry;
use crate::models::{
    FollowUpResponse, JobStartedResponse, JobStatusResponse, QuestionRequest, SessionResponse,
    SummarizeRequest, TranscribeRequest, TranscribeResponse,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

/// Fixed user-facing message when a generation call fails.
pub const GENERATION_APOLOGY: &str =
    "Sorry, the AI engine could not complete this request. Please adjust your information and try again.";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn GenerationEngine>,
    pub transcriber: Arc<dyn TranscriptionEngine>,
    pub sessions: Arc<dyn SessionStore>,
    pub jobs: JobRegistry,
}

pub fn create_app() -> anyhow::Result<Router> {
    let state = AppState {
        engine: Arc::new(OpenRouterEngine::from_env()?),
        transcriber: Arc::new(WhisperTranscription::from_env()),
        sessions: Arc::new(InMemorySessionStore::new()),
        jobs: JobRegistry::new(),
    };
    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/summaries", post(start_summary))
        .route("/summaries/jobs/{job_id}", get(poll_summary_job))
        .route(
            "/sessions/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route("/sessions/{session_id}/questions", post(ask_question))
        .route("/sessions/{session_id}/notes", get(export_notes))
        .route("/transcriptions", post(transcribe_audio))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Patient Summary Service",
        "version": "1.0.0",
        "description": "AI-powered patient-readable summaries of medical text with grounded follow-up questions",
        "endpoints": {
            "POST /summaries": "Start summary generation for medical text (optionally image-grounded)",
            "GET /summaries/jobs/{job_id}": "Poll a generation job; the first poll after completion consumes its outcome",
            "GET /sessions/{session_id}": "Get a session's summary and conversation transcript",
            "POST /sessions/{session_id}/questions": "Ask a grounded follow-up question",
            "GET /sessions/{session_id}/notes": "Export the session as rich-text editor HTML",
            "DELETE /sessions/{session_id}": "Delete a session",
            "POST /transcriptions": "Transcribe an audio file to text",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_summary(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<JobStartedResponse> {
    if request.text.trim().is_empty() {
        return Err(bad_request_error("Medical text is required"));
    }

    info!(
        "Starting summary generation ({} characters of source text)",
        request.text.len()
    );

    let handle = start_summary_generation(
        state.engine.clone(),
        request.text.clone(),
        request.image_path.clone(),
    );
    let job_id = state.jobs.insert(request.text, request.image_path, handle);

    info!("Summary job {} started", job_id);
    Ok(Json(JobStartedResponse {
        job_id,
        status: "started".to_string(),
        message: "Summary generation started".to_string(),
    }))
}

async fn poll_summary_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<JobStatusResponse> {
    match state.jobs.is_running(&job_id) {
        None => Err(not_found_error("Job not found", &job_id)),
        Some(true) => Ok(Json(JobStatusResponse {
            job_id,
            status: "running".to_string(),
            session_id: None,
            summary: None,
            message: None,
        })),
        Some(false) => {
            // Remove the job first so the outcome is consumed exactly once.
            let Some(mut job) = state.jobs.take(&job_id) else {
                return Err(not_found_error("Job not found", &job_id));
            };
            match job.handle.try_outcome() {
                Ok(Ok(raw)) => complete_summary_job(&state, &job_id, job.text, job.image_path, &raw).await,
                Ok(Err(e)) => {
                    error!("Summary generation failed for job {}: {}", job_id, e);
                    Ok(Json(JobStatusResponse {
                        job_id,
                        status: "failed".to_string(),
                        session_id: None,
                        summary: None,
                        message: Some(format!("{} ({})", GENERATION_APOLOGY, e)),
                    }))
                }
                Err(e) => Err(internal_error(
                    "Task outcome could not be retrieved",
                    &e.to_string(),
                )),
            }
        }
    }
}

async fn complete_summary_job(
    state: &AppState,
    job_id: &str,
    text: String,
    image_path: Option<String>,
    raw: &str,
) -> ApiResult<JobStatusResponse> {
    let summary = render_summary(raw);
    let session = SummarySession::new(text, image_path, summary.clone());
    let session_id = session.id.clone();

    state.sessions.save(session).await.map_err(|e| {
        error!("Failed to save session {}: {}", session_id, e);
        internal_error("Failed to save session", &e.to_string())
    })?;

    info!("Summary job {} completed, session {} created", job_id, session_id);
    Ok(Json(JobStatusResponse {
        job_id: job_id.to_string(),
        status: "completed".to_string(),
        session_id: Some(session_id),
        summary: Some(summary),
        message: None,
    }))
}

async fn ask_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<QuestionRequest>,
) -> ApiResult<FollowUpResponse> {
    match ask(
        state.engine.clone(),
        state.sessions.as_ref(),
        &session_id,
        &request.question,
    )
    .await
    {
        Ok(reply) => Ok(Json(FollowUpResponse {
            session_id,
            answer: reply.answer,
            transcript: reply.transcript,
        })),
        Err(FlowError::SessionNotFound(_)) => Err(not_found_error("Session not found", &session_id)),
        Err(FlowError::Generation(message)) => {
            error!(
                "Follow-up generation failed for session {}: {}",
                session_id, message
            );
            // History is left untouched; the apology stands in for the answer.
            let transcript = current_transcript(&state, &session_id).await?;
            Ok(Json(FollowUpResponse {
                session_id,
                answer: format!("{} ({})", GENERATION_APOLOGY, message),
                transcript,
            }))
        }
        Err(e) => Err(internal_error("Follow-up failed", &e.to_string())),
    }
}

async fn current_transcript(
    state: &AppState,
    session_id: &str,
) -> Result<Vec<TranscriptEntry>, ApiError> {
    match state.sessions.get(session_id).await {
        Ok(Some(session)) => Ok(session.transcript()),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => Err(internal_error("Failed to load session", &e.to_string())),
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    match state.sessions.get(&session_id).await {
        Ok(Some(session)) => Ok(Json(SessionResponse {
            session_id: session.id.clone(),
            summary: session.summary.clone(),
            transcript: session.transcript(),
            turns: session.history.len(),
            created_at: session.created_at,
        })),
        Ok(None) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn export_notes(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    match state.sessions.get(&session_id).await {
        Ok(Some(session)) => Ok(Html(notes_html(&session))),
        Ok(None) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => Err(internal_error("Failed to load session", &e.to_string())),
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.delete(&session_id).await.map_err(|e| {
        error!("Failed to delete session {}: {}", session_id, e);
        internal_error("Failed to delete session", &e.to_string())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transcribe_audio(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Json<TranscribeResponse> {
    let text = state.transcriber.transcribe(&request.audio_path).await;
    Json(TranscribeResponse { text })
}
