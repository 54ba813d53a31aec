pub mod openai;

pub use openai::{OpenAiBackend, OpenAiConfig};

use async_trait::async_trait;
use thiserror::Error;

/// One completion request, already validated by the caller.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Model to use; the backend substitutes its default when None.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub stop: Vec<String>,
}

/// A finished completion with the backend's own token accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// One model a backend can serve, as reported by the model listing.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub id: String,
    pub kind: String,
}

/// Backend trait for text-generation backends.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Provider name, recorded on usage rows and responses.
    fn name(&self) -> &str;

    /// Models this backend serves. Static; no upstream call.
    fn models(&self) -> Vec<ModelEntry>;

    /// Run one completion. No retries happen at this layer or above.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, InferenceError>;
}

/// Inference errors.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("backend unreachable: {0}")]
    Unavailable(String),

    #[error("backend request timed out")]
    Timeout,

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout
        } else if err.is_connect() {
            InferenceError::Unavailable(format!("connection failed: {err}"))
        } else {
            InferenceError::Unavailable(err.to_string())
        }
    }
}
