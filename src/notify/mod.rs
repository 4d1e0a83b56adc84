use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::operator::OperatorProfile;
use crate::models::order::DroneOrder;
use crate::observability::metrics::Metrics;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid recipient address {0:?}")]
    InvalidRecipient(String),

    #[error("delivery to {recipient} timed out after {timeout_ms} ms")]
    Timeout { recipient: String, timeout_ms: u128 },

    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

pub struct LogTransport {
    from: String,
}

impl LogTransport {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        info!(from = %self.from, to = %recipient, subject, body, "mail sent");
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationSink {
    transport: Arc<dyn MailTransport>,
    timeout: Duration,
    map_link_base: String,
    metrics: Metrics,
}

impl NotificationSink {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        timeout: Duration,
        map_link_base: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            transport,
            timeout,
            map_link_base: map_link_base.into(),
            metrics,
        }
    }

    pub fn compose(&self, order: &DroneOrder) -> (String, String) {
        let subject = format!("New {} order available", order.service);
        let body = format!(
            "A new order matching your services is available.\n\n\
             Service: {}\n\
             Coordinates: {}\n\
             Map: {}\n",
            order.service,
            order.coordinates,
            map_link(&self.map_link_base, &order.coordinates),
        );
        (subject, body)
    }

    pub async fn notify(&self, operator: &OperatorProfile, order: &DroneOrder) {
        match self.try_notify(operator, order).await {
            Ok(()) => {
                self.metrics
                    .notifications_total
                    .with_label_values(&["sent"])
                    .inc();
                debug!(order_id = %order.id, operator_id = %operator.id, "operator notified");
            }
            Err(err) => {
                self.metrics
                    .notifications_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(
                    order_id = %order.id,
                    operator_id = %operator.id,
                    error = %err,
                    "operator notification failed"
                );
            }
        }
    }

    pub async fn notify_all(&self, operators: Vec<OperatorProfile>, order: &DroneOrder) {
        let order = Arc::new(order.clone());

        let attempts = operators.into_iter().map(|operator| {
            let sink = self.clone();
            let order = order.clone();
            tokio::spawn(async move { sink.notify(&operator, &order).await })
        });

        for result in join_all(attempts).await {
            if let Err(err) = result {
                self.metrics
                    .notifications_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(order_id = %order.id, error = %err, "notification task aborted");
            }
        }
    }

    async fn try_notify(
        &self,
        operator: &OperatorProfile,
        order: &DroneOrder,
    ) -> Result<(), NotificationError> {
        if !is_plausible_address(&operator.email) {
            return Err(NotificationError::InvalidRecipient(operator.email.clone()));
        }

        let (subject, body) = self.compose(order);

        tokio::time::timeout(
            self.timeout,
            self.transport.send(&operator.email, &subject, &body),
        )
        .await
        .map_err(|_| NotificationError::Timeout {
            recipient: operator.email.clone(),
            timeout_ms: self.timeout.as_millis(),
        })?
    }
}

pub fn map_link(base: &str, coordinates: &str) -> String {
    let compact: String = coordinates.chars().filter(|c| !c.is_whitespace()).collect();
    format!("{base}{compact}")
}

pub(crate) fn is_plausible_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !address.chars().any(char::is_whitespace)
}
