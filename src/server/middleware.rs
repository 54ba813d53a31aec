use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::auth::AuthError;
use crate::protocol::ErrorResponse;
use crate::server::handlers::AppState;
use crate::store::Identity;

/// Authenticated identity stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Identity);

/// Auth middleware: extracts the Bearer API key, resolves it through the
/// auth gate, injects `AuthIdentity` into extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req.headers().get("authorization");

    let presented_key = match auth_header.and_then(|v| v.to_str().ok()) {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        Some(_) => {
            return auth_error("invalid authorization header format");
        }
        None => {
            return auth_error("missing API key");
        }
    };

    match state.gate.authenticate(presented_key).await {
        Ok(identity) => {
            req.extensions_mut().insert(AuthIdentity(identity));
            next.run(req).await
        }
        Err(AuthError::InactiveIdentity) => auth_error("API key is disabled"),
        Err(AuthError::Store(e)) => {
            error!(error = %e, "identity lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                }),
            )
                .into_response()
        }
        Err(_) => auth_error("invalid API key"),
    }
}

fn auth_error(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
