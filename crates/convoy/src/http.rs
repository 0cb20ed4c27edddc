// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface: webhook routes plus unauthenticated health and metrics.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use convoy_whatsapp::{webhook_router, WebhookState};
use tower_http::trace::TraceLayer;

/// State for `/health` and `/metrics`.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    /// Renders Prometheus text format; `None` serves 404 on `/metrics`.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

pub fn app(webhook: WebhookState, health: HealthState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(health);

    Router::new()
        .merge(public_routes)
        .merge(webhook_router(webhook))
        .layer(TraceLayer::new_for_http())
}

async fn get_health(State(health): State<HealthState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": health.start_time.elapsed().as_secs(),
    }))
}

async fn get_metrics(State(health): State<HealthState>) -> Result<String, StatusCode> {
    match &health.prometheus_render {
        Some(render) => Ok(render()),
        None => Err(StatusCode::NOT_FOUND),
    }
}
