use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::Actor;
use crate::error::AppError;
use crate::models::match_record::{Decision, MatchKey, MatchRecord, MatchView, Side};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/matches/:order_id/:operator_id", get(get_match))
        .route(
            "/matches/:order_id/:operator_id/operator-status",
            patch(update_operator_status),
        )
        .route(
            "/matches/:order_id/:operator_id/client-status",
            patch(update_client_status),
        )
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

async fn get_match(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((order_id, operator_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MatchView>, AppError> {
    let view = state
        .query
        .fetch_match(actor.id, MatchKey::new(order_id, operator_id))
        .await?;
    Ok(Json(view))
}

async fn update_operator_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((order_id, operator_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<MatchRecord>, AppError> {
    decide(&state, actor, MatchKey::new(order_id, operator_id), Side::Operator, payload.decision).await
}

async fn update_client_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((order_id, operator_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<MatchRecord>, AppError> {
    decide(&state, actor, MatchKey::new(order_id, operator_id), Side::Client, payload.decision).await
}

async fn decide(
    state: &AppState,
    actor: Actor,
    key: MatchKey,
    side: Side,
    decision: Decision,
) -> Result<Json<MatchRecord>, AppError> {
    let record = state.workflow.decide(actor.id, key, side, decision).await?;
    Ok(Json(record))
}
