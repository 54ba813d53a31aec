mod auth;
mod backend;
mod config;
mod generate;
mod protocol;
mod server;
mod store;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use auth::AuthGate;
use backend::{InferenceBackend, OpenAiBackend, OpenAiConfig};
use config::{parse_origin_list, Config};
use generate::Generator;
use server::handlers::AppState;
use server::ratelimit::{RateLimiter, RateLimiterConfig};
use store::{PostgresStore, Store};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // Configure logging
    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt().json().init();
        }
        _ => {
            tracing_subscriber::fmt().init();
        }
    }

    // Store
    let postgres = match PostgresStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };
    if let Err(e) = postgres.init_schema().await {
        error!(error = %e, "failed to apply database schema");
        std::process::exit(1);
    }
    let store: Arc<dyn Store> = Arc::new(postgres);

    // Inference backend
    let openai = OpenAiBackend::new(OpenAiConfig {
        base_url: config.backend_base_url.clone(),
        api_key: config.backend_api_key.clone(),
        default_model: config.backend_model.clone(),
        timeout: Duration::from_secs(config.backend_timeout_secs),
    });
    info!(
        backend = openai.name(),
        base_url = openai.base_url(),
        "using inference backend"
    );
    let backend: Arc<dyn InferenceBackend> = Arc::new(openai);

    // Rate limiter
    let rate_limiter = if config.rate_limit_requests > 0 {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
            max_requests: config.rate_limit_requests,
            window: Duration::from_secs(config.rate_limit_window_secs),
        }));

        info!(
            max_requests = config.rate_limit_requests,
            window_secs = config.rate_limit_window_secs,
            "rate limiting enabled"
        );

        // Cleanup task, dropped with the runtime at shutdown
        let cleanup_limiter = limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(600));
            loop {
                interval.tick().await;
                // Entries idle for two full windows can no longer affect a decision
                cleanup_limiter.cleanup(cleanup_limiter.window() * 2);
            }
        });

        Some(limiter)
    } else {
        warn!("rate limiting disabled");
        None
    };

    let state = Arc::new(AppState {
        gate: AuthGate::new(store.clone()),
        generator: Generator::new(
            backend.clone(),
            store.clone(),
            config.max_tokens_limit,
            config.price_per_1k_tokens,
        ),
        store,
        backend,
        rate_limiter,
    });

    let origins = parse_origin_list(&config.allowed_origins);
    let app = server::build_router(state, &origins);

    let addr = normalize_addr(&config.addr);
    let listener = TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        error!(addr = addr, error = %e, "failed to bind");
        std::process::exit(1);
    });

    info!(addr = addr, "server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "server error");
            std::process::exit(1);
        });

    info!("server stopped");
}

/// Expand ":8000" to "0.0.0.0:8000".
fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
