use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::engine::dispatcher::{DispatchJob, MatchDispatcher};
use crate::engine::query::MatchQueryEngine;
use crate::engine::workflow::AcceptanceWorkflow;
use crate::models::match_record::MatchEvent;
use crate::notify::{LogTransport, MailTransport, NotificationSink};
use crate::observability::metrics::Metrics;
use crate::store::memory::{InMemoryMatches, InMemoryOperators, InMemoryOrders};
use crate::store::{MatchRecordStore, OperatorDirectory, OrderRepository};

pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub operators: Arc<dyn OperatorDirectory>,
    pub matches: Arc<dyn MatchRecordStore>,
    pub dispatcher: Arc<MatchDispatcher>,
    pub workflow: AcceptanceWorkflow,
    pub query: MatchQueryEngine,
    pub dispatch_tx: mpsc::Sender<DispatchJob>,
    pub match_events_tx: broadcast::Sender<MatchEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        transport: Arc<dyn MailTransport>,
    ) -> (Self, mpsc::Receiver<DispatchJob>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_queue_size);
        let (match_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let metrics = Metrics::new();

        let orders: Arc<dyn OrderRepository> = Arc::new(InMemoryOrders::new());
        let operators: Arc<dyn OperatorDirectory> = Arc::new(InMemoryOperators::new());
        let matches: Arc<dyn MatchRecordStore> = Arc::new(InMemoryMatches::new());

        let notifier = NotificationSink::new(
            transport,
            Duration::from_millis(config.notification_timeout_ms),
            config.map_link_base.clone(),
            metrics.clone(),
        );

        let dispatcher = Arc::new(MatchDispatcher::new(
            orders.clone(),
            operators.clone(),
            matches.clone(),
            notifier,
            match_events_tx.clone(),
            metrics.clone(),
        ));

        let workflow = AcceptanceWorkflow::new(
            orders.clone(),
            matches.clone(),
            config.superseded_match_policy,
            match_events_tx.clone(),
            metrics.clone(),
        );

        let query = MatchQueryEngine::new(
            orders.clone(),
            operators.clone(),
            matches.clone(),
            config.default_page_size,
            config.max_page_size,
        );

        (
            Self {
                orders,
                operators,
                matches,
                dispatcher,
                workflow,
                query,
                dispatch_tx,
                match_events_tx,
                metrics,
            },
            dispatch_rx,
        )
    }

    pub fn in_memory(config: &Config) -> (Self, mpsc::Receiver<DispatchJob>) {
        Self::new(config, Arc::new(LogTransport::new(config.mail_from.clone())))
    }
}
