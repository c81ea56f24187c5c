//! Hub HTTP API.
//!
//! Provides:
//! - `POST /health` - Ingest an agent's telemetry payload
//! - `GET /health` - Latest telemetry of every known instance

mod schema;
pub mod store;

use std::future::Future;
use std::sync::Arc;

use tokio::task;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::info::Info;
pub use store::{MetricsRow, MetricsStore};

/// Create the hub router.
pub fn create_router(store: Arc<MetricsStore>) -> Router {
    Router::new()
        .route("/health", get(get_health).post(post_health))
        .with_state(store)
}

/// Handler for `GET /health`.
async fn get_health(State(store): State<Arc<MetricsStore>>) -> Response {
    match task::spawn_blocking(move || store.all()).await {
        Ok(Ok(rows)) => Json(rows).into_response(),
        Ok(Err(e)) => {
            tracing::error!("Error retrieving system information from DB: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!("Metrics query task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Handler for `POST /health`.
///
/// Returns 400 for a malformed payload and 500 if the store rejects it.
async fn post_health(State(store): State<Arc<MetricsStore>>, body: Bytes) -> Response {
    let info: Info = match serde_json::from_slice(&body) {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!("Error reading json body of request: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let instance_id = info.spec.id.clone();
    match task::spawn_blocking(move || store.upsert(&info)).await {
        Ok(Ok(())) => (StatusCode::OK, "success").into_response(),
        Ok(Err(e)) => {
            tracing::error!(
                "Error writing system information to db for {}: {:#}",
                instance_id,
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!("Metrics write task failed for {}: {}", instance_id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve the hub on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    store: Arc<MetricsStore>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Initializing hub on addr: {}", addr);
    }

    axum::serve(listener, create_router(store))
        .with_graceful_shutdown(shutdown)
        .await
}
