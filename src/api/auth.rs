use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| AppError::Unauthenticated("missing X-Actor-Id header".to_string()))?;

        let raw = raw
            .to_str()
            .map_err(|_| AppError::Unauthenticated("invalid X-Actor-Id header".to_string()))?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|err| AppError::Unauthenticated(format!("X-Actor-Id is not a uuid: {err}")))?;

        Ok(Actor { id })
    }
}
