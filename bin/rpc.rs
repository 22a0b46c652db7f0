//! Axum HTTP handlers for rigbridge.
//!
//! - `GET /health` - Health check
//! - `POST /api/taskcsv` - Write a status update
//! - `OPTIONS /api/taskcsv` - CORS preflight, answered by the CORS layer
//! - `GET /api/taskcsv` - Server-sent event stream of the completed-cycle counter
//! - `GET /api/taskcsv/status` - Decoded status file and run state

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use rigbridge::{
    ProgressStreamer, RunState, SettingsTable, StatusError, StatusRecord, StatusStore,
    StatusUpdate, StatusWriter, seed_defaults,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::health::{HealthState, health_handler};

/// Path of the status channel endpoints.
pub const TASKCSV_PATH: &str = "/api/taskcsv";

/// Shared application state for axum handlers.
#[derive(Debug, Clone)]
pub struct AppState<S: StatusStore> {
    /// Writes status updates and publishes the run state.
    pub writer: StatusWriter<S>,
    /// Streams progress to subscribers.
    pub streamer: ProgressStreamer<S>,
    /// Flips to `true` when the server shuts down; ends open streams.
    pub shutdown: watch::Receiver<bool>,
}

/// Success response for a status write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable result.
    pub message: String,
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Snapshot of the status file and the in-memory run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Decoded status file, with defaults for absent rows.
    pub record: StatusRecord,
    /// Authoritative run state.
    pub run_state: RunState,
}

/// Creates the axum router with all endpoints.
pub fn create_router<S: StatusStore>(
    writer: StatusWriter<S>,
    streamer: ProgressStreamer<S>,
    health_state: HealthState,
    shutdown: watch::Receiver<bool>,
) -> Router {
    let state = AppState { writer, streamer, shutdown };

    Router::new()
        .route("/health", get(health_handler))
        .with_state(health_state)
        .route(
            TASKCSV_PATH,
            post(write_handler::<S>).get(stream_handler::<S>),
        )
        .route("/api/taskcsv/status", get(snapshot_handler::<S>))
        .with_state(state)
        .layer(cors_layer())
}

/// Wildcard-origin CORS. Every `OPTIONS` request is answered here as a
/// preflight advertising `POST, GET, OPTIONS`.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

/// Handler for `POST /api/taskcsv`.
async fn write_handler<S: StatusStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected status update");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state.writer.write(update).await {
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResponse { message: "CSV file updated successfully".to_string() }),
        )
            .into_response(),
        Err(e) if e.is_client_error() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update CSV file"),
    }
}

/// Logs when a progress subscriber goes away.
struct SubscriberGuard;

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        info!("progress subscriber disconnected");
    }
}

/// Handler for `GET /api/taskcsv`.
async fn stream_handler<S: StatusStore>(State(state): State<AppState<S>>) -> Response {
    if let Err(e) = state.streamer.ensure_seeded().await {
        error!(error = %e, "failed to create status file");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to open CSV file");
    }

    info!(
        interval_ms = state.streamer.interval().as_millis() as u64,
        "progress subscriber connected"
    );

    let guard = SubscriberGuard;
    let mut shutdown = state.shutdown.clone();
    let events = state
        .streamer
        .subscribe()
        .map(move |value| {
            let _guard = &guard;
            Ok::<_, Infallible>(Event::default().data(value))
        })
        .take_until(async move {
            // A dropped sender means no shutdown will ever be signalled.
            if shutdown.wait_for(|stopping| *stopping).await.is_err() {
                std::future::pending::<()>().await;
            }
        });

    ([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response()
}

/// Handler for `GET /api/taskcsv/status`.
async fn snapshot_handler<S: StatusStore>(State(state): State<AppState<S>>) -> Response {
    match load_snapshot(&state).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to read status file");
            let message = format!("Failed to read CSV file: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

async fn load_snapshot<S: StatusStore>(
    state: &AppState<S>,
) -> Result<StatusSnapshot, StatusError> {
    let store = state.writer.store();
    seed_defaults(store).await?;
    let table = SettingsTable::decode(&store.read().await?)?;

    Ok(StatusSnapshot {
        record: StatusRecord::from_table(&table),
        run_state: state.writer.run_state().get(),
    })
}
