use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::Actor;
use crate::engine::query::{MatchFilter, PageRequest};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::match_record::{MatchStatus, MatchView};
use crate::models::operator::{OperatorProfile, OperatorSummary};
use crate::models::order::OrderStatus;
use crate::models::page::Page;
use crate::notify::is_plausible_address;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/operators", post(register_operator).get(list_operators))
        .route("/operators/:id/matches", get(list_matches))
}

#[derive(Deserialize)]
pub struct RegisterOperatorRequest {
    pub name: String,
    pub email: String,
    pub coordinates: Option<String>,
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub services: BTreeSet<String>,
}

// Query string of the match listing. Kept flat because urlencoded
// deserialization cannot handle numbers inside flattened structs.
#[derive(Debug, Deserialize)]
pub struct MatchListParams {
    pub service: Option<String>,
    pub order_status: Option<OrderStatus>,
    pub operator_status: Option<MatchStatus>,
    pub client_status: Option<MatchStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub radius: Option<f64>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl MatchListParams {
    fn split(self) -> (MatchFilter, PageRequest) {
        (
            MatchFilter {
                service: self.service,
                order_status: self.order_status,
                operator_status: self.operator_status,
                client_status: self.client_status,
                from_date: self.from_date,
                to_date: self.to_date,
                location: self.location,
                radius: self.radius,
            },
            PageRequest {
                page: self.page,
                size: self.size,
            },
        )
    }
}

async fn register_operator(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<RegisterOperatorRequest>,
) -> Result<Json<OperatorProfile>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !is_plausible_address(&payload.email) {
        return Err(AppError::BadRequest(format!(
            "{:?} is not an email address",
            payload.email
        )));
    }
    if let Some(raw) = payload.coordinates.as_deref() {
        raw.parse::<GeoPoint>()
            .map_err(|err| AppError::BadRequest(err.to_string()))?;
    }
    if payload
        .radius_km
        .is_some_and(|radius| !radius.is_finite() || radius < 0.0)
    {
        return Err(AppError::BadRequest("radius_km must be >= 0".to_string()));
    }

    let profile = OperatorProfile {
        id: actor.id,
        name: payload.name,
        email: payload.email,
        coordinates: payload.coordinates,
        radius_km: payload.radius_km,
        services: payload.services,
        updated_at: Utc::now(),
    };

    state.operators.register(profile.clone()).await?;
    Ok(Json(profile))
}

async fn list_operators(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OperatorSummary>>, AppError> {
    let operators = state.operators.list().await?;
    Ok(Json(operators.iter().map(|p| p.summary()).collect()))
}

async fn list_matches(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(params): Query<MatchListParams>,
) -> Result<Json<Page<MatchView>>, AppError> {
    let (filter, page) = params.split();
    let matches = state.query.list_matches(actor.id, id, &filter, page).await?;
    Ok(Json(matches))
}
