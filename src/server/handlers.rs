use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{keys, password, AuthError, AuthGate};
use crate::backend::{InferenceBackend, InferenceError};
use crate::generate::{GenerateError, GenerateParams, Generator};
use crate::protocol::{
    AuthResponse, ErrorResponse, GenerateRequest, GenerateResponse, GenerateUsage, HealthResponse,
    LoginRequest, ModelInfo, ModelsResponse, RegisterRequest,
};
use crate::server::middleware::AuthIdentity;
use crate::server::ratelimit::{Decision, RateLimiter};
use crate::store::{NewIdentity, Store, StoreError};

const USAGE_WINDOW_DAYS: i64 = 30;

/// Shared application state.
pub struct AppState {
    pub gate: AuthGate,
    pub generator: Generator,
    pub store: Arc<dyn Store>,
    pub backend: Arc<dyn InferenceBackend>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

/// Health check handler.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: Some(state.backend.name().to_string()),
    })
}

/// Registration: creates an identity and returns its first API key.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    if body.email.trim().is_empty()
        || body.username.trim().is_empty()
        || body.password.is_empty()
    {
        return write_error(
            StatusCode::BAD_REQUEST,
            "email, username and password are required",
        );
    }

    let password_hash = match password::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "failed to hash password");
            return write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    let (api_key, key_hash) = keys::generate_api_key();

    match state
        .store
        .create_identity(NewIdentity {
            email: body.email,
            username: body.username,
            full_name: body.full_name,
            password_hash,
            key_hash,
        })
        .await
    {
        Ok(identity) => {
            info!(
                identity = %identity.id,
                username = %identity.username,
                email = %identity.email,
                "identity registered"
            );
            Json(AuthResponse {
                message: "registered".to_string(),
                api_key,
            })
            .into_response()
        }
        Err(StoreError::Duplicate(what)) => {
            write_error(StatusCode::BAD_REQUEST, &format!("{what} already exists"))
        }
        Err(e) => {
            error!(error = %e, "failed to create identity");
            write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Login: verifies the password and rotates the API key. The previous key
/// stops working.
pub async fn login(State(state): State<Arc<AppState>>, Json(body): Json<LoginRequest>) -> Response {
    let identity = match state.gate.login(&body.email, &body.password).await {
        Ok(identity) => identity,
        Err(AuthError::InvalidCredentials) => {
            return write_error(StatusCode::UNAUTHORIZED, "invalid credentials");
        }
        Err(AuthError::InactiveIdentity) => {
            return write_error(StatusCode::UNAUTHORIZED, "account is disabled");
        }
        Err(e) => {
            error!(error = %e, "login failed");
            return write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    let (api_key, key_hash) = keys::generate_api_key();
    if let Err(e) = state.store.rotate_key_hash(identity.id, &key_hash).await {
        error!(error = %e, identity = %identity.id, "failed to rotate API key");
        return write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    }

    info!(identity = %identity.id, username = %identity.username, "login, API key rotated");
    Json(AuthResponse {
        message: "login successful".to_string(),
        api_key,
    })
    .into_response()
}

/// Text generation. The only rate-limited route.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(AuthIdentity(identity)): Extension<AuthIdentity>,
    Json(body): Json<GenerateRequest>,
) -> Response {
    if let Some(resp) = check_rate_limit(&state, identity.id) {
        return resp;
    }

    let params = GenerateParams {
        prompt: body.prompt,
        max_tokens: body.max_tokens,
        temperature: body.temperature,
        top_p: body.top_p,
        model: body.model,
        stop_sequences: body.stop_sequences,
    };

    match state.generator.generate(&identity, params).await {
        Ok(generation) => Json(GenerateResponse {
            text: generation.text,
            model: generation.model,
            provider: generation.provider,
            usage: GenerateUsage {
                input_tokens: generation.input_tokens,
                output_tokens: generation.output_tokens,
                total_tokens: generation.total_tokens,
                cost: generation.cost,
            },
            response_time_ms: generation.response_time_ms,
        })
        .into_response(),
        Err(e) => generate_error_response(e),
    }
}

/// Models listing. Static; no upstream call.
pub async fn models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provider = state.backend.name();
    Json(ModelsResponse {
        models: state
            .backend
            .models()
            .into_iter()
            .map(|entry| ModelInfo {
                id: entry.id,
                provider: provider.to_string(),
                kind: entry.kind,
            })
            .collect(),
    })
}

/// Usage statistics for the calling identity over the last 30 days.
pub async fn usage(
    State(state): State<Arc<AppState>>,
    Extension(AuthIdentity(identity)): Extension<AuthIdentity>,
) -> Response {
    match state.store.usage_stats(identity.id, USAGE_WINDOW_DAYS).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!(error = %e, identity = %identity.id, "failed to load usage stats");
            write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Check the rate limit; returns Some(Response) if the request is rejected.
fn check_rate_limit(state: &AppState, identity_id: Uuid) -> Option<Response> {
    let limiter = state.rate_limiter.as_ref()?;
    match limiter.check_and_increment(identity_id) {
        Decision::Allowed { .. } => None,
        Decision::Limited { limit, retry_after } => {
            let retry_secs = retry_after.as_secs_f64().ceil() as u64;
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: "rate limit exceeded".to_string(),
                }),
            )
                .into_response();
            let headers = response.headers_mut();
            headers.insert("Retry-After", HeaderValue::from(retry_secs));
            headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(retry_secs));
            Some(response)
        }
    }
}

fn generate_error_response(err: GenerateError) -> Response {
    match err {
        GenerateError::Validation(message) => write_error(StatusCode::BAD_REQUEST, &message),
        GenerateError::Inference(InferenceError::Timeout) => {
            error!("backend request timed out");
            write_error(StatusCode::GATEWAY_TIMEOUT, "upstream timeout")
        }
        GenerateError::Inference(e) => {
            error!(error = %e, "backend request failed");
            write_error(StatusCode::BAD_GATEWAY, "upstream unavailable")
        }
        GenerateError::Store(e) => {
            error!(error = %e, "failed to record usage");
            write_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn write_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
