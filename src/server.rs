//! HTTP surface: storage-event webhook, health check and a manual test trigger.

use crate::core::dedup::RecentEvents;
use crate::core::etl::EtlEngine;
use crate::domain::model::ProcessOutcome;
use crate::domain::ports::{Pipeline, Storage};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub struct AppState<S: Storage, P: Pipeline> {
    pub engine: Arc<EtlEngine<S, P>>,
    pub recent: Arc<RecentEvents>,
}

impl<S: Storage, P: Pipeline> AppState<S, P> {
    pub fn new(engine: EtlEngine<S, P>, dedup_window: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            recent: Arc::new(RecentEvents::new(dedup_window)),
        }
    }
}

impl<S: Storage, P: Pipeline> Clone for AppState<S, P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            recent: Arc::clone(&self.recent),
        }
    }
}

pub fn router<S, P>(state: AppState<S, P>) -> Router
where
    S: Storage + 'static,
    P: Pipeline + 'static,
{
    Router::new()
        .route("/", post(handle_storage_event::<S, P>))
        .route("/health", get(health))
        .route("/test", post(handle_test::<S, P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A JSON object with at least one key; anything else counts as no payload.
fn json_object(body: &[u8]) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

fn non_empty_str<'a>(payload: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

async fn handle_storage_event<S, P>(State(state): State<AppState<S, P>>, body: Bytes) -> Response
where
    S: Storage + 'static,
    P: Pipeline + 'static,
{
    let Some(payload) = json_object(&body) else {
        tracing::error!("❌ No JSON payload received");
        return (StatusCode::BAD_REQUEST, "Bad Request: no JSON payload").into_response();
    };

    let bucket = non_empty_str(&payload, "bucket");
    let name = non_empty_str(&payload, "name");
    let event_type = payload
        .get("eventType")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    let (Some(bucket), Some(name)) = (bucket, name) else {
        tracing::error!("❌ Missing bucket or file name in payload: {:?}", payload);
        return (StatusCode::BAD_REQUEST, "Bad Request: missing file information").into_response();
    };

    let key = format!("{}/{}", bucket, name);
    if let Some(elapsed) = state.recent.check_and_record(&key) {
        tracing::info!(
            "⏭️  Duplicate event ignored: {} (last attempt {:.1}s ago)",
            key,
            elapsed.as_secs_f64()
        );
        return (StatusCode::OK, "OK: duplicate event ignored").into_response();
    }

    tracing::info!("📨 Received event: {} for {}", event_type, key);

    match state.engine.process_uploaded_file(bucket, name).await {
        ProcessOutcome::Success { .. } => {
            (StatusCode::OK, format!("Successfully processed: {}", name)).into_response()
        }
        ProcessOutcome::Skipped { reason } => {
            (StatusCode::OK, format!("Skipped: {} - {}", name, reason)).into_response()
        }
        ProcessOutcome::Error { reason } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error processing: {} - {}", name, reason),
        )
            .into_response(),
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn handle_test<S, P>(State(state): State<AppState<S, P>>, body: Bytes) -> Response
where
    S: Storage + 'static,
    P: Pipeline + 'static,
{
    let Some(payload) = json_object(&body) else {
        return (StatusCode::BAD_REQUEST, "Bad Request: JSON required").into_response();
    };

    let (Some(bucket), Some(file)) = (
        non_empty_str(&payload, "bucket"),
        non_empty_str(&payload, "file"),
    ) else {
        return (StatusCode::BAD_REQUEST, "Bad Request: bucket and file required").into_response();
    };

    tracing::info!("🧪 Test processing: {}/{}", bucket, file);
    let outcome = state.engine.process_uploaded_file(bucket, file).await;

    match serde_json::to_string_pretty(&outcome) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Test Error: {}", e),
        )
            .into_response(),
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received, draining connections");
}
