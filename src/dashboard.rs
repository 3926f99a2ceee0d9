//! Local HTTP interface over the latest committed reading.
//!
//! Serves whatever the store holds right now and never touches the
//! hardware, so it stays responsive while a capture is in flight.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::SetupError;
use crate::reading::ItemResult;
use crate::state::{CycleStats, StateStore};

pub fn router(store: StateStore) -> Router {
    Router::new()
        .route("/api/latest", get(latest))
        .route("/api/weight", get(weight))
        .route("/api/image", get(image))
        .route("/api/items", get(items))
        .with_state(store)
}

/// Binds the listener up front so a bad address is a setup failure, not
/// something discovered after the capture loop is already running.
pub async fn bind(addr: &str) -> Result<TcpListener, SetupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| SetupError::DashboardBind {
            addr: addr.to_string(),
            source,
        })
}

pub async fn serve(
    listener: TcpListener,
    store: StateStore,
    cancel_token: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("dashboard listening on http://{addr}");
    }
    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await
}

#[derive(Serialize)]
struct LatestResponse {
    weight: Option<f64>,
    captured_at: Option<DateTime<Utc>>,
    items: Option<Vec<ItemResult>>,
    /// Size of the held frame; the bytes themselves live at /api/image.
    image_bytes: Option<usize>,
    errors: LatestErrors,
    stats: CycleStats,
}

#[derive(Serialize)]
struct LatestErrors {
    weight: Option<String>,
    camera: Option<String>,
    analysis: Option<String>,
}

#[derive(Serialize)]
struct WeightResponse {
    weight: f64,
    timestamp: DateTime<Utc>,
}

fn not_available(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("no {what} captured yet") })),
    )
        .into_response()
}

async fn latest(State(store): State<StateStore>) -> Json<LatestResponse> {
    let snap = store.snapshot();
    Json(LatestResponse {
        weight: snap.weight,
        captured_at: snap.captured_at,
        items: snap.items,
        image_bytes: snap.image.as_ref().map(|image| image.len()),
        errors: LatestErrors {
            weight: snap.last_weight_error,
            camera: snap.last_camera_error,
            analysis: snap.last_analysis_error,
        },
        stats: snap.stats,
    })
}

async fn weight(State(store): State<StateStore>) -> Response {
    let snap = store.snapshot();
    match (snap.weight, snap.captured_at) {
        (Some(weight), Some(timestamp)) => Json(WeightResponse { weight, timestamp }).into_response(),
        _ => not_available("weight"),
    }
}

async fn image(State(store): State<StateStore>) -> Response {
    let snap = store.snapshot();
    match snap.image {
        Some(image) => (
            [(header::CONTENT_TYPE, "image/jpeg")],
            image.as_ref().clone(),
        )
            .into_response(),
        None => not_available("image"),
    }
}

async fn items(State(store): State<StateStore>) -> Response {
    let snap = store.snapshot();
    match snap.items {
        // Bare array, the same shape the analysis reply carries.
        Some(items) => Json(items).into_response(),
        None => not_available("analysis"),
    }
}
