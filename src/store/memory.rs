use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::match_record::{MatchKey, MatchRecord, MatchStatus, Side};
use crate::models::operator::OperatorProfile;
use crate::models::order::{DroneOrder, OrderStatus};
use crate::store::{CreateOutcome, MatchRecordStore, OperatorDirectory, OrderRepository, StoreError};

#[derive(Default)]
pub struct InMemoryMatches {
    records: DashMap<MatchKey, MatchRecord>,
}

impl InMemoryMatches {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchRecordStore for InMemoryMatches {
    async fn create(&self, record: MatchRecord) -> Result<CreateOutcome, StoreError> {
        match self.records.entry(record.key()) {
            Entry::Occupied(_) => Ok(CreateOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(CreateOutcome::Created(record))
            }
        }
    }

    async fn fetch(&self, key: MatchKey) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.records.get(&key).map(|entry| entry.value().clone()))
    }

    async fn decide(
        &self,
        key: MatchKey,
        side: Side,
        status: MatchStatus,
    ) -> Result<MatchRecord, StoreError> {
        let mut record = self
            .records
            .get_mut(&key)
            .ok_or(StoreError::MatchNotFound(key))?;

        let current = record.status(side);
        if current.is_terminal() {
            return Err(StoreError::AlreadyDecided { key, side, current });
        }

        record.set_status(side, status);
        Ok(record.clone())
    }

    async fn for_operator(&self, operator_id: Uuid) -> Result<Vec<MatchRecord>, StoreError> {
        let mut records: Vec<MatchRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().operator_id == operator_id)
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        Ok(records)
    }

    async fn for_order(&self, order_id: Uuid) -> Result<Vec<MatchRecord>, StoreError> {
        let mut records: Vec<MatchRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by_key(|record| record.operator_id);
        Ok(records)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}

#[derive(Default)]
pub struct InMemoryOrders {
    orders: DashMap<Uuid, DroneOrder>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn insert(&self, order: DroneOrder) -> Result<(), StoreError> {
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<DroneOrder>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, DroneOrder>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.orders.get(id).map(|entry| (*id, entry.value().clone())))
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<DroneOrder, StoreError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        if !order.status.can_transition_to(status) {
            return Err(StoreError::InvalidOrderTransition {
                id,
                from: order.status,
                to: status,
            });
        }

        order.status = status;
        Ok(order.clone())
    }

    async fn assign_operator(&self, id: Uuid, operator_id: Uuid) -> Result<DroneOrder, StoreError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        if order.status != OrderStatus::Open {
            return Err(StoreError::InvalidOrderTransition {
                id,
                from: order.status,
                to: OrderStatus::InProgress,
            });
        }

        order.status = OrderStatus::InProgress;
        order.assigned_operator = Some(operator_id);
        Ok(order.clone())
    }

    async fn release_operator(&self, id: Uuid, operator_id: Uuid) -> Result<DroneOrder, StoreError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        if order.status != OrderStatus::InProgress || order.assigned_operator != Some(operator_id) {
            return Err(StoreError::InvalidOrderTransition {
                id,
                from: order.status,
                to: OrderStatus::Open,
            });
        }

        order.status = OrderStatus::Open;
        order.assigned_operator = None;
        Ok(order.clone())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.orders.len())
    }
}

#[derive(Default)]
pub struct InMemoryOperators {
    profiles: DashMap<Uuid, OperatorProfile>,
}

impl InMemoryOperators {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperatorDirectory for InMemoryOperators {
    async fn register(&self, profile: OperatorProfile) -> Result<(), StoreError> {
        self.profiles.insert(profile.id, profile);
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<OperatorProfile>, StoreError> {
        Ok(self.profiles.get(&id).map(|entry| entry.value().clone()))
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<OperatorProfile>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn matchable(&self) -> Result<Vec<OperatorProfile>, StoreError> {
        Ok(self
            .profiles
            .iter()
            .filter(|entry| entry.coordinates.is_some() && entry.radius_km.is_some())
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list(&self) -> Result<Vec<OperatorProfile>, StoreError> {
        let mut profiles: Vec<OperatorProfile> =
            self.profiles.iter().map(|entry| entry.value().clone()).collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(profiles)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.profiles.len())
    }
}
