//! Axum router wiring.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport::http};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/governance/check", post(http::check))
        .route("/governance/audit", get(http::audit))
        .route("/governance/stats", get(http::stats))
        .route("/governance/budget/set", post(http::set_budget))
        .route("/governance/budget/reset", post(http::reset_budget))
        .route("/governance/policy", get(http::policy))
        .route("/governance/policy/reload", post(http::reload_policy))
        .route("/governance/inference", post(http::inference))
        .route("/health", get(ops::health))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .route("/", get(ops::index))
        .with_state(state)
}
