use crate::{error::AppError, AppState};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use core_types::StrategyKind;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

fn parse_strategy(name: &str) -> Result<StrategyKind, AppError> {
    StrategyKind::parse(name).ok_or_else(|| AppError::UnknownStrategy(name.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    limit: usize,
}

fn default_log_limit() -> usize {
    50
}

/// # GET /api/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let status = state.supervisor.status().await;
    Json(json!(status))
}

/// # GET /api/logs/:strategy
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Path(strategy): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let kind = parse_strategy(&strategy)?;
    let logs = state.supervisor.logs(kind, query.limit.min(500));
    Ok(Json(json!({ "strategy": kind, "logs": logs })))
}

/// # POST /api/strategies/:strategy/start
pub async fn start_strategy(
    State(state): State<Arc<AppState>>,
    Path(strategy): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let kind = parse_strategy(&strategy)?;
    let started = state.supervisor.start(kind).await?;
    Ok(Json(json!({ "strategy": kind, "started": started })))
}

/// # POST /api/strategies/:strategy/stop
pub async fn stop_strategy(
    State(state): State<Arc<AppState>>,
    Path(strategy): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let kind = parse_strategy(&strategy)?;
    let stopped = state.supervisor.stop(kind).await?;
    Ok(Json(json!({ "strategy": kind, "stopped": stopped })))
}

/// # POST /api/users/:user_id/enable
pub async fn enable_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<JsonValue>, AppError> {
    let changed = state.supervisor.enable_for_user(user_id).await?;
    Ok(Json(json!({ "user_id": user_id, "enabled": changed })))
}

/// # POST /api/users/:user_id/disable
///
/// Engines skip the user within one tick. Open orders placed earlier are
/// deliberately left on the book.
pub async fn disable_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<JsonValue>, AppError> {
    let changed = state.supervisor.disable_for_user(user_id).await?;
    Ok(Json(json!({ "user_id": user_id, "disabled": changed })))
}

/// # POST /api/bots/:bot_id/adjust-liquidity
pub async fn adjust_liquidity(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<Json<JsonValue>, AppError> {
    let report = state.supervisor.force_adjust_liquidity(bot_id).await?;
    Ok(Json(json!(report)))
}
