//! HTTP ingress for Palaver.
//!
//! Deliberately thin: the transport terminates here and the raw envelope
//! body is forwarded to the protocol dispatcher unmodified. Notifications
//! get an empty 202; everything else gets the dispatcher's response
//! envelope with a 200, including protocol-level errors.
//!
//! Built on Axum.

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tracing::info;

use palaver_config::AppConfig;
use palaver_core::error::Error;
use palaver_core::store::ConversationStore;
use palaver_protocol::Dispatcher;
use palaver_store::MemoryStore;
use palaver_store::SqliteStore;
use palaver_store::TimedStore;

/// Build the Axum router over a shared dispatcher.
pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Build the conversation store selected by configuration.
///
/// Every store is wrapped in [`TimedStore`] so a stalled storage layer
/// surfaces as a retryable error instead of hanging the request.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>, Error> {
    let store: Arc<dyn ConversationStore> = match config.store.backend.as_str() {
        "memory" => Arc::new(MemoryStore::new()),
        "sqlite" => {
            let store = SqliteStore::new(&config.store.path)
                .await
                .map_err(Error::Store)?;
            Arc::new(store)
        }
        other => {
            return Err(Error::Config {
                message: format!("unknown store backend '{other}'"),
            });
        }
    };
    Ok(Arc::new(TimedStore::new(store)))
}

/// Start the ingress HTTP server and run until shutdown.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = build_store(&config).await?;
    let router = palaver_backends::build_from_config(&config);
    let dispatcher = Arc::new(Dispatcher::new(&config, store, router));

    let app = build_router(dispatcher);

    info!(addr = %addr, store = %config.store.backend, "Ingress starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn rpc_handler(State(dispatcher): State<Arc<Dispatcher>>, body: String) -> Response {
    match dispatcher.handle(&body).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        // Notifications expect no response body.
        None => StatusCode::ACCEPTED.into_response(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
