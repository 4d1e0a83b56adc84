use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::auth::Actor;
use crate::engine::queue::enqueue_dispatch;
use crate::error::AppError;
use crate::models::operator::OperatorSummary;
use crate::models::order::{DroneOrder, OrderStatus, TimeWindow};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/dispatch-matching", post(dispatch_matching))
        .route("/orders/:id/eligible-operators", get(eligible_operators))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub service: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub coordinates: String,
    pub window: TimeWindow,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<DroneOrder>, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title cannot be empty".to_string()));
    }
    if payload.service.trim().is_empty() {
        return Err(AppError::BadRequest("service cannot be empty".to_string()));
    }
    if payload.window.from > payload.window.to {
        return Err(AppError::BadRequest(
            "window.from must not be after window.to".to_string(),
        ));
    }

    let order = DroneOrder {
        id: Uuid::new_v4(),
        client_id: actor.id,
        title: payload.title,
        description: payload.description,
        service: payload.service,
        parameters: payload.parameters,
        coordinates: payload.coordinates,
        window: payload.window,
        status: OrderStatus::Open,
        assigned_operator: None,
        created_at: Utc::now(),
    };

    state.orders.insert(order.clone()).await?;
    info!(order_id = %order.id, client_id = %order.client_id, "order created");

    // Already logged and counted; dispatch-matching re-triggers it.
    let _ = enqueue_dispatch(&state, order.id);

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DroneOrder>, AppError> {
    let order = state
        .orders
        .fetch(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order))
}

async fn dispatch_matching(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.orders.fetch(id).await?.is_none() {
        return Err(AppError::NotFound(format!("order {} not found", id)));
    }

    enqueue_dispatch(&state, id)?;
    Ok(StatusCode::ACCEPTED)
}

async fn eligible_operators(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<OperatorSummary>>, AppError> {
    let operators = state.query.interested_operators(actor.id, id).await?;
    Ok(Json(operators))
}
