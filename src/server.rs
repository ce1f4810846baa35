//! HTTP front end: `POST /ask` and `GET /healthz`.
//!
//! Browser clients on other origins are admitted through a CORS layer built
//! from `cors_origins` in the config.
//!
//! The index and embedder are shared read-only across requests. Each query
//! runs on the blocking pool since embedding is blocking I/O and ranking is
//! a CPU-bound scan.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

use crate::embedder::Embedder;
use crate::pipeline::{PipelineError, RetrievalPipeline, Thresholds};
use crate::store::VectorStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub thresholds: Thresholds,
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ask", post(ask_handler))
        .layer(cors)
        .with_state(state)
}

/// CORS policy for the API. A `"*"` entry allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o.trim() == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o.trim()).with_context(|| format!("invalid CORS origin {o}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str, cors: CorsLayer) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid bind address {addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Serving {} records on http://{addr}", state.store.len());

    axum::serve(listener, router(state, cors))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn ask_handler(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "question is required"));
    }

    let question = req.question;
    let result = tokio::task::spawn_blocking(move || {
        RetrievalPipeline::new(&state.store, &*state.embedder)
            .with_thresholds(state.thresholds)
            .with_top_k(state.top_k)
            .answer(&question)
    })
    .await
    .map_err(|e| {
        error!("Query task failed: {e}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "query task failed")
    })?;

    match result {
        Ok(answer) => Ok(Json(AskResponse { answer })),
        Err(e @ PipelineError::Embedding(_)) => {
            error!("{e}");
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
        Err(e) => {
            error!("{e}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}
