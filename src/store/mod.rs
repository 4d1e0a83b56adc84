pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::match_record::{MatchKey, MatchRecord, MatchStatus, Side};
use crate::models::operator::OperatorProfile;
use crate::models::order::{DroneOrder, OrderStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("match {0} not found")]
    MatchNotFound(MatchKey),

    #[error("{side} status of match {key} is already {current}")]
    AlreadyDecided {
        key: MatchKey,
        side: Side,
        current: MatchStatus,
    },

    #[error("order {id} cannot move from {from:?} to {to:?}")]
    InvalidOrderTransition {
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(MatchRecord),
    Duplicate,
}

#[async_trait]
pub trait MatchRecordStore: Send + Sync {
    /// Inserts the record unless its (order, operator) pair is taken. Racing
    /// inserts for the same pair yield exactly one `Created`.
    async fn create(&self, record: MatchRecord) -> Result<CreateOutcome, StoreError>;

    async fn fetch(&self, key: MatchKey) -> Result<Option<MatchRecord>, StoreError>;

    /// Atomically moves one side from `PENDING` to `status`. Fails with
    /// [`StoreError::AlreadyDecided`] if that side is already terminal.
    async fn decide(
        &self,
        key: MatchKey,
        side: Side,
        status: MatchStatus,
    ) -> Result<MatchRecord, StoreError>;

    async fn for_operator(&self, operator_id: Uuid) -> Result<Vec<MatchRecord>, StoreError>;

    async fn for_order(&self, order_id: Uuid) -> Result<Vec<MatchRecord>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: DroneOrder) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<DroneOrder>, StoreError>;

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, DroneOrder>, StoreError>;

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<DroneOrder, StoreError>;

    async fn assign_operator(&self, id: Uuid, operator_id: Uuid) -> Result<DroneOrder, StoreError>;

    /// Undoes `assign_operator`: back to `OPEN`, but only while the order is
    /// still `IN_PROGRESS` with `operator_id` assigned.
    async fn release_operator(&self, id: Uuid, operator_id: Uuid) -> Result<DroneOrder, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait OperatorDirectory: Send + Sync {
    async fn register(&self, profile: OperatorProfile) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<OperatorProfile>, StoreError>;

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<OperatorProfile>, StoreError>;

    async fn matchable(&self) -> Result<Vec<OperatorProfile>, StoreError>;

    async fn list(&self) -> Result<Vec<OperatorProfile>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
