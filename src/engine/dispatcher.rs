use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::geo::find_eligible;
use crate::models::match_record::{MatchEvent, MatchRecord};
use crate::models::operator::OperatorProfile;
use crate::models::order::OrderStatus;
use crate::notify::NotificationSink;
use crate::observability::metrics::Metrics;
use crate::state::AppState;
use crate::store::{CreateOutcome, MatchRecordStore, OperatorDirectory, OrderRepository, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchJob {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OrderMissing,
    OrderClosed(OrderStatus),
    MalformedCoordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Matched {
        created: usize,
        duplicates: usize,
        failed: usize,
    },
    Skipped(SkipReason),
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Matched { .. } => "matched",
            DispatchOutcome::Skipped(_) => "skipped",
        }
    }
}

pub struct MatchDispatcher {
    orders: Arc<dyn OrderRepository>,
    operators: Arc<dyn OperatorDirectory>,
    matches: Arc<dyn MatchRecordStore>,
    notifier: NotificationSink,
    events: broadcast::Sender<MatchEvent>,
    metrics: Metrics,
}

impl MatchDispatcher {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        operators: Arc<dyn OperatorDirectory>,
        matches: Arc<dyn MatchRecordStore>,
        notifier: NotificationSink,
        events: broadcast::Sender<MatchEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            operators,
            matches,
            notifier,
            events,
            metrics,
        }
    }

    pub async fn dispatch(&self, order_id: Uuid) -> Result<DispatchOutcome, StoreError> {
        let Some(order) = self.orders.fetch(order_id).await? else {
            warn!(order_id = %order_id, "dispatch for unknown order");
            return Ok(DispatchOutcome::Skipped(SkipReason::OrderMissing));
        };

        if !order.is_open() {
            debug!(order_id = %order.id, status = ?order.status, "order no longer matchable");
            return Ok(DispatchOutcome::Skipped(SkipReason::OrderClosed(order.status)));
        }

        let candidates = self.operators.matchable().await?;
        let eligible = match find_eligible(&order.coordinates, &order.service, &candidates) {
            Ok(eligible) => eligible,
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "order skipped from matching");
                return Ok(DispatchOutcome::Skipped(SkipReason::MalformedCoordinates));
            }
        };

        let mut fresh: Vec<OperatorProfile> = Vec::new();
        let mut duplicates = 0;
        let mut failed = 0;

        for operator in eligible {
            match self.matches.create(MatchRecord::new(order.id, operator.id)).await {
                Ok(CreateOutcome::Created(record)) => {
                    self.metrics.matches_created_total.inc();
                    let _ = self.events.send(MatchEvent::Created { record });
                    fresh.push(operator.clone());
                }
                Ok(CreateOutcome::Duplicate) => {
                    debug!(order_id = %order.id, operator_id = %operator.id, "match already exists");
                    duplicates += 1;
                }
                Err(err) => {
                    error!(
                        order_id = %order.id,
                        operator_id = %operator.id,
                        error = %err,
                        "failed to create match"
                    );
                    failed += 1;
                }
            }
        }

        let created = fresh.len();
        info!(
            order_id = %order.id,
            created,
            duplicates,
            failed,
            "order dispatched"
        );

        if !fresh.is_empty() {
            self.notifier.notify_all(fresh, &order).await;
        }

        Ok(DispatchOutcome::Matched {
            created,
            duplicates,
            failed,
        })
    }

    pub async fn run_job(&self, job: DispatchJob) {
        let start = Instant::now();
        let outcome = match self.dispatch(job.order_id).await {
            Ok(outcome) => outcome.label(),
            Err(err) => {
                error!(order_id = %job.order_id, error = %err, "dispatch failed");
                "error"
            }
        };

        self.metrics
            .dispatch_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .dispatch_total
            .with_label_values(&[outcome])
            .inc();
    }
}

pub async fn run_match_dispatcher(state: Arc<AppState>, mut dispatch_rx: mpsc::Receiver<DispatchJob>) {
    info!("match dispatcher started");

    while let Some(job) = dispatch_rx.recv().await {
        state.metrics.dispatch_jobs_in_queue.dec();

        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.run_job(job).await;
        });
    }

    warn!("match dispatcher stopped: queue channel closed");
}
