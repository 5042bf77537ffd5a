//! Governance HTTP handlers.
//!
//! Bodies and query strings are parsed leniently into `Option` fields so a
//! missing `userId`/`action` is reported as a 400 with a readable message
//! rather than a bare extractor rejection.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use sentinel_core::error::SentinelError;
use sentinel_core::audit::DEFAULT_QUERY_LIMIT;
use sentinel_core::{AuditFilter, AuditKind, Decision, InferenceReport};

use crate::app_state::AppState;
use crate::engine::{CheckRequest, IdentityStats};
use crate::policy::PolicyConfig;

use super::error::{ApiError, ApiResult};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

fn required(field: &str, value: Option<String>) -> ApiResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{field} is required"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBody {
    pub user_id: Option<String>,
    pub action: Option<String>,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    pub cost_estimate: Option<f64>,
}

/// POST /governance/check
pub async fn check(
    State(state): State<AppState>,
    payload: Result<Json<CheckBody>, JsonRejection>,
) -> ApiResult<Json<Decision>> {
    let b = body(payload)?;
    let req = CheckRequest {
        identity: required("userId", b.user_id)?,
        action: required("action", b.action)?,
        context: b.context.unwrap_or_default(),
        cost_estimate: b.cost_estimate,
    };
    let decision = state.engine().evaluate(&req)?;
    Ok(Json(decision))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub user_id: Option<String>,
    pub action: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditQuery {
    fn into_filter(self) -> ApiResult<AuditFilter> {
        let kind = match self.kind.as_deref().filter(|k| !k.is_empty()) {
            Some(k) => Some(k.parse::<AuditKind>()?),
            None => None,
        };
        Ok(AuditFilter {
            identity: self.user_id.filter(|v| !v.is_empty()),
            action: self.action.filter(|v| !v.is_empty()),
            kind,
            since: self.since,
            until: self.until,
            limit: self.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
            offset: self.offset.unwrap_or(0),
        })
    }
}

/// GET /governance/audit
pub async fn audit(
    State(state): State<AppState>,
    params: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let filter = query(params)?.into_filter()?;
    let recorder = Arc::clone(state.engine().audit());
    let logs = tokio::task::spawn_blocking(move || recorder.query(&filter))
        .await
        .map_err(|e| SentinelError::Internal(format!("audit query task: {e}")))?;
    Ok(Json(json!({ "logs": logs })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub user_id: Option<String>,
}

/// GET /governance/stats
pub async fn stats(
    State(state): State<AppState>,
    params: Result<Query<StatsQuery>, QueryRejection>,
) -> ApiResult<Json<IdentityStats>> {
    let identity = required("userId", query(params)?.user_id)?;
    Ok(Json(state.engine().stats(&identity)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBudgetBody {
    pub user_id: Option<String>,
    pub limit: Option<f64>,
}

/// POST /governance/budget/set
pub async fn set_budget(
    State(state): State<AppState>,
    payload: Result<Json<SetBudgetBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let b = body(payload)?;
    let identity = required("userId", b.user_id)?;
    let limit = b
        .limit
        .ok_or_else(|| ApiError::bad_request("limit is required"))?;
    state.engine().set_limit(&identity, limit)?;
    Ok(Json(json!({ "success": true, "userId": identity, "limit": limit })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetBudgetBody {
    pub user_id: Option<String>,
}

/// POST /governance/budget/reset
pub async fn reset_budget(
    State(state): State<AppState>,
    payload: Result<Json<ResetBudgetBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let identity = required("userId", body(payload)?.user_id)?;
    state.engine().reset_usage(&identity)?;
    Ok(Json(json!({ "success": true, "userId": identity })))
}

/// GET /governance/policy
pub async fn policy(State(state): State<AppState>) -> Json<PolicyConfig> {
    Json(state.engine().policy().snapshot().as_ref().clone())
}

/// POST /governance/policy/reload
///
/// The source is re-read as a whole; on failure the active policy stays.
pub async fn reload_policy(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let source = state.policy_source();
    let cfg = source.load().await.map_err(|e| {
        tracing::warn!(source = %source.describe(), error = %e, "policy reload rejected");
        e
    })?;
    let rules = cfg.rules.len();
    state.engine().policy().update_policy(cfg)?;
    tracing::info!(source = %source.describe(), rules, "policy reloaded");
    Ok(Json(json!({ "success": true, "rules": rules, "source": source.describe() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceBody {
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub report: InferenceReport,
}

/// POST /governance/inference
pub async fn inference(
    State(state): State<AppState>,
    payload: Result<Json<InferenceBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let b = body(payload)?;
    let identity = required("userId", b.user_id)?;
    state.engine().record_inference(&identity, &b.report)?;
    Ok(Json(json!({ "success": true, "userId": identity })))
}
