use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::backend::{CompletionRequest, InferenceBackend, InferenceError};
use crate::store::{Identity, Store, StoreError, UsageRecord};

const GENERATE_ENDPOINT: &str = "/api/v1/generate";

/// Generation parameters as requested by the caller, before validation.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub prompt: String,
    pub max_tokens: i64,
    pub temperature: f64,
    pub top_p: f64,
    pub model: Option<String>,
    pub stop_sequences: Vec<String>,
}

/// A completed generation, shaped for the caller.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
    pub response_time_ms: i64,
}

/// Generation errors.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates requests, runs them against the backend, and records usage.
///
/// Invalid parameters are rejected before the backend is ever called, and a
/// failed backend call is surfaced as-is; nothing here retries.
pub struct Generator {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn Store>,
    max_tokens_limit: i64,
    price_per_1k_tokens: f64,
}

impl Generator {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn Store>,
        max_tokens_limit: i64,
        price_per_1k_tokens: f64,
    ) -> Self {
        Self {
            backend,
            store,
            max_tokens_limit,
            price_per_1k_tokens,
        }
    }

    fn validate(&self, params: &GenerateParams) -> Result<(), GenerateError> {
        if params.prompt.is_empty() {
            return Err(GenerateError::Validation("prompt must not be empty".into()));
        }
        if params.max_tokens < 1 {
            return Err(GenerateError::Validation(
                "max_tokens must be positive".into(),
            ));
        }
        if params.max_tokens > self.max_tokens_limit {
            return Err(GenerateError::Validation(format!(
                "max_tokens must be at most {}",
                self.max_tokens_limit
            )));
        }
        if !(0.0..=2.0).contains(&params.temperature) {
            return Err(GenerateError::Validation(
                "temperature must be between 0 and 2".into(),
            ));
        }
        if !(params.top_p > 0.0 && params.top_p <= 1.0) {
            return Err(GenerateError::Validation(
                "top_p must be greater than 0 and at most 1".into(),
            ));
        }
        Ok(())
    }

    /// Run one generation for an authenticated identity.
    ///
    /// On success exactly one usage row is appended; validation failures and
    /// backend failures append nothing.
    pub async fn generate(
        &self,
        identity: &Identity,
        params: GenerateParams,
    ) -> Result<Generation, GenerateError> {
        self.validate(&params)?;

        let request = CompletionRequest {
            prompt: params.prompt,
            model: params.model,
            max_tokens: params.max_tokens as u32,
            temperature: params.temperature,
            top_p: params.top_p,
            stop: params.stop_sequences,
        };

        let started = Instant::now();
        let completion = self.backend.complete(request).await?;
        let response_time_ms = started.elapsed().as_millis() as i64;

        let total_tokens = completion.input_tokens + completion.output_tokens;
        let cost = total_tokens as f64 / 1000.0 * self.price_per_1k_tokens;
        let provider = self.backend.name().to_string();

        self.store
            .append_usage(UsageRecord {
                identity_id: identity.id,
                endpoint: GENERATE_ENDPOINT.into(),
                model: completion.model.clone(),
                provider: provider.clone(),
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                total_tokens,
                cost,
                response_time_ms,
            })
            .await?;

        info!(
            identity = %identity.id,
            model = %completion.model,
            total_tokens,
            response_time_ms,
            "generation complete"
        );

        Ok(Generation {
            text: completion.text,
            model: completion.model,
            provider,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            total_tokens,
            cost,
            response_time_ms,
        })
    }
}
