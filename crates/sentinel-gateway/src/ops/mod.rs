//! Operational HTTP endpoints.
//!
//! - `/health`  : status summary (JSON)
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 when draining)
//! - `/metrics` : Prometheus text format
//! - `/`        : endpoint index

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::app_state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": if state.is_draining() { "draining" } else { "ok" },
        "timestamp": Utc::now().timestamp_millis(),
        "version": env!("CARGO_PKG_VERSION"),
        "rules": state.engine().policy().rule_count(),
        "trackedIdentities": state.engine().tracked_identities(),
        "auditPersistent": state.engine().audit().has_sink(),
    }))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "sentinel",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Governance sidecar for AI agents",
        "endpoints": {
            "POST /governance/check": "Check if an action is allowed",
            "GET /governance/audit": "Query audit logs",
            "GET /governance/stats": "Get governance statistics",
            "POST /governance/budget/set": "Set budget limit",
            "POST /governance/budget/reset": "Reset budget usage",
            "GET /governance/policy": "Show the active policy",
            "POST /governance/policy/reload": "Reload the policy source",
            "POST /governance/inference": "Record model inference usage",
            "GET /health": "Health check",
            "GET /metrics": "Prometheus metrics",
        },
    }))
}
