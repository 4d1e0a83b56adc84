use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::SupersededMatchPolicy;
use crate::models::match_record::{
    Decision, MatchEvent, MatchKey, MatchRecord, MatchStatus, Side,
};
use crate::models::order::{DroneOrder, OrderStatus};
use crate::observability::metrics::Metrics;
use crate::store::{MatchRecordStore, OrderRepository, StoreError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("match {0} not found")]
    MatchNotFound(MatchKey),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("actor {actor} may not decide the {side} side of match {key}")]
    UnauthorizedActor { actor: Uuid, side: Side, key: MatchKey },

    #[error("{side} status of match {key} is already {current}")]
    IllegalTransition {
        key: MatchKey,
        side: Side,
        current: MatchStatus,
    },

    #[error("order {order_id} is {status:?} and no longer editable")]
    OrderNotEditable { order_id: Uuid, status: OrderStatus },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MatchNotFound(key) => WorkflowError::MatchNotFound(key),
            StoreError::OrderNotFound(id) => WorkflowError::OrderNotFound(id),
            StoreError::AlreadyDecided { key, side, current } => {
                WorkflowError::IllegalTransition { key, side, current }
            }
            StoreError::InvalidOrderTransition { id, from, .. } => WorkflowError::OrderNotEditable {
                order_id: id,
                status: from,
            },
            other => WorkflowError::Store(other),
        }
    }
}

pub struct AcceptanceWorkflow {
    orders: Arc<dyn OrderRepository>,
    matches: Arc<dyn MatchRecordStore>,
    policy: SupersededMatchPolicy,
    order_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    events: broadcast::Sender<MatchEvent>,
    metrics: Metrics,
}

impl AcceptanceWorkflow {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        matches: Arc<dyn MatchRecordStore>,
        policy: SupersededMatchPolicy,
        events: broadcast::Sender<MatchEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            matches,
            policy,
            order_locks: DashMap::new(),
            events,
            metrics,
        }
    }

    pub async fn decide(
        &self,
        actor: Uuid,
        key: MatchKey,
        side: Side,
        decision: Decision,
    ) -> Result<MatchRecord, WorkflowError> {
        let lock = self.order_lock(key.order_id);
        let _guard = lock.mutex.lock().await;

        let record = self
            .matches
            .fetch(key)
            .await?
            .ok_or(WorkflowError::MatchNotFound(key))?;
        let order = self
            .orders
            .fetch(key.order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(key.order_id))?;

        authorize(actor, side, &record, &order)?;

        let current = record.status(side);
        if current.is_terminal() {
            return Err(WorkflowError::IllegalTransition { key, side, current });
        }

        ensure_editable(side, &record, &order)?;

        // Claim the order before touching the record.
        let assigns = side == Side::Operator && decision == Decision::Accepted;
        if assigns {
            self.orders.assign_operator(order.id, record.operator_id).await?;
        }

        let updated = match self.matches.decide(key, side, decision.into()).await {
            Ok(updated) => updated,
            Err(err) => {
                if assigns {
                    self.release(order.id, record.operator_id).await;
                }
                return Err(err.into());
            }
        };
        self.announce(side, decision, &updated);

        if assigns {
            info!(
                order_id = %order.id,
                operator_id = %record.operator_id,
                "order assigned to accepting operator"
            );

            if self.policy == SupersededMatchPolicy::AutoReject {
                self.reject_superseded(order.id, record.operator_id).await?;
            }
        }

        Ok(updated)
    }

    async fn release(&self, order_id: Uuid, operator_id: Uuid) {
        if let Err(err) = self.orders.release_operator(order_id, operator_id).await {
            error!(
                order_id = %order_id,
                operator_id = %operator_id,
                error = %err,
                "failed to release order after failed decision"
            );
        }
    }

    async fn reject_superseded(&self, order_id: Uuid, winner: Uuid) -> Result<(), WorkflowError> {
        let others = self.matches.for_order(order_id).await?;

        for record in others
            .into_iter()
            .filter(|r| r.operator_id != winner && r.operator_status == MatchStatus::Pending)
        {
            match self
                .matches
                .decide(record.key(), Side::Operator, MatchStatus::Rejected)
                .await
            {
                Ok(updated) => self.announce(Side::Operator, Decision::Rejected, &updated),
                Err(StoreError::AlreadyDecided { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        debug!(order_id = %order_id, "superseded matches rejected");
        Ok(())
    }

    fn announce(&self, side: Side, decision: Decision, record: &MatchRecord) {
        self.metrics
            .match_transitions_total
            .with_label_values(&[side.as_str(), decision.as_str()])
            .inc();

        info!(
            order_id = %record.order_id,
            operator_id = %record.operator_id,
            side = %side,
            decision = decision.as_str(),
            "match decided"
        );

        let _ = self.events.send(MatchEvent::StatusChanged {
            side,
            record: record.clone(),
        });
    }

    fn order_lock(&self, order_id: Uuid) -> OrderLock<'_> {
        let mutex = self
            .order_locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        OrderLock {
            locks: &self.order_locks,
            order_id,
            mutex,
        }
    }
}

struct OrderLock<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    order_id: Uuid,
    mutex: Arc<Mutex<()>>,
}

impl Drop for OrderLock<'_> {
    fn drop(&mut self) {
        // Only this handle and the table still reference it.
        self.locks
            .remove_if(&self.order_id, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}

fn authorize(
    actor: Uuid,
    side: Side,
    record: &MatchRecord,
    order: &DroneOrder,
) -> Result<(), WorkflowError> {
    let allowed = match side {
        Side::Operator => record.operator_id == actor,
        Side::Client => order.client_id == actor,
    };

    if allowed {
        Ok(())
    } else {
        Err(WorkflowError::UnauthorizedActor {
            actor,
            side,
            key: record.key(),
        })
    }
}

fn ensure_editable(side: Side, record: &MatchRecord, order: &DroneOrder) -> Result<(), WorkflowError> {
    if order.is_open() {
        return Ok(());
    }

    // The client may still confirm the operator the order was handed to.
    let confirms_assignee = side == Side::Client
        && order.status == OrderStatus::InProgress
        && order.assigned_operator == Some(record.operator_id);

    if confirms_assignee {
        Ok(())
    } else {
        Err(WorkflowError::OrderNotEditable {
            order_id: order.id,
            status: order.status,
        })
    }
}
