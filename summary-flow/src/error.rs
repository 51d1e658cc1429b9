use thiserror::Error;

/// Errors produced by the summary pipeline.
///
/// Extraction failure is deliberately absent: not finding structured data in
/// generation output is a legitimate outcome, modeled as `Option::None`.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The generation collaborator failed to produce a response. Fatal to
    /// the current operation; the caller renders an apology.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Misuse of a task handle: outcome queried while the task is running,
    /// queried twice, or the task died without delivering.
    #[error("Task state error: {0}")]
    TaskState(String),

    /// The session id does not resolve to a stored session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
