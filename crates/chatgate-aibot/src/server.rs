// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook HTTP server built on axum.
//!
//! Routes: `GET /callback` (URL verification), `POST /callback` (messages
//! and polls), `GET /health` (unauthenticated process status). Codec
//! failures map to 4xx per the protocol: 403 for signature mismatches,
//! 400 for malformed or undecryptable bodies, 500 for encryption failures.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chatgate_core::GateError;

use crate::AibotAdapter;
use crate::handler;
use crate::wire::CallbackParams;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct ServerState {
    pub adapter: Arc<AibotAdapter>,
    pub start_time: Instant,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

pub fn router(adapter: Arc<AibotAdapter>) -> Router {
    let state = ServerState {
        adapter,
        start_time: Instant::now(),
    };
    Router::new()
        .route("/callback", get(get_callback).post(post_callback))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves until `stop` fires; in-flight requests drain first.
pub async fn serve(
    adapter: Arc<AibotAdapter>,
    host: &str,
    port: u16,
    stop: CancellationToken,
) -> Result<(), GateError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GateError::AdapterSend {
            message: format!("failed to bind webhook server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!(addr = addr.as_str(), "aibot webhook server listening");

    axum::serve(listener, router(adapter))
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
        .map_err(|e| GateError::AdapterSend {
            message: format!("webhook server error: {e}"),
            source: Some(Box::new(e)),
        })
}

fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::SignatureInvalid => StatusCode::FORBIDDEN,
        GateError::DecryptFailed(_) | GateError::Malformed(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET verification handshake: echo the decrypted `echostr` as text.
async fn get_callback(
    State(state): State<ServerState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match handler::handle_verify(&state.adapter, &params) {
        Ok(plaintext) => (StatusCode::OK, plaintext).into_response(),
        Err(e) => {
            warn!(error = %e, "url verification failed");
            status_for(&e).into_response()
        }
    }
}

/// Message and poll callbacks.
async fn post_callback(
    State(state): State<ServerState>,
    Query(params): Query<CallbackParams>,
    body: String,
) -> Response {
    match handler::handle_callback(&state.adapter, &params, &body).await {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(e) => {
            warn!(error = %e, "callback handling failed");
            status_for(&e).into_response()
        }
    }
}

async fn get_health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
