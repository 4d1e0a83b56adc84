use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{OrderStatus, TimeWindow};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::Accepted => "ACCEPTED",
            MatchStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl From<Decision> for MatchStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => MatchStatus::Accepted,
            Decision::Rejected => MatchStatus::Rejected,
        }
    }
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Operator,
    Client,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Operator => "operator",
            Side::Client => "client",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub order_id: Uuid,
    pub operator_id: Uuid,
}

impl MatchKey {
    pub fn new(order_id: Uuid, operator_id: Uuid) -> Self {
        Self {
            order_id,
            operator_id,
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order_id, self.operator_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRecord {
    pub order_id: Uuid,
    pub operator_id: Uuid,
    pub operator_status: MatchStatus,
    pub client_status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(order_id: Uuid, operator_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            operator_id,
            operator_status: MatchStatus::Pending,
            client_status: MatchStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.order_id, self.operator_id)
    }

    pub fn status(&self, side: Side) -> MatchStatus {
        match side {
            Side::Operator => self.operator_status,
            Side::Client => self.client_status,
        }
    }

    pub(crate) fn set_status(&mut self, side: Side, status: MatchStatus) {
        match side {
            Side::Operator => self.operator_status = status,
            Side::Client => self.client_status = status,
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    Created { record: MatchRecord },
    StatusChanged { side: Side, record: MatchRecord },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: Uuid,
    pub title: String,
    pub service: String,
    pub coordinates: String,
    pub window: TimeWindow,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchView {
    pub order: OrderSummary,
    pub operator_id: Uuid,
    pub distance_km: Option<f64>,
    pub operator_status: MatchStatus,
    pub client_status: MatchStatus,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Decision, MatchRecord, MatchStatus, Side};

    #[test]
    fn new_record_is_pending_on_both_sides() {
        let record = MatchRecord::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(record.status(Side::Operator), MatchStatus::Pending);
        assert_eq!(record.status(Side::Client), MatchStatus::Pending);
    }

    #[test]
    fn setting_one_side_leaves_the_other_alone() {
        let mut record = MatchRecord::new(Uuid::new_v4(), Uuid::new_v4());
        record.set_status(Side::Client, Decision::Rejected.into());

        assert_eq!(record.client_status, MatchStatus::Rejected);
        assert_eq!(record.operator_status, MatchStatus::Pending);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!MatchStatus::Pending.is_terminal());
        assert!(MatchStatus::Accepted.is_terminal());
        assert!(MatchStatus::Rejected.is_terminal());
    }

    #[test]
    fn decision_parses_from_upper_case() {
        let decision: Decision = serde_json::from_str("\"REJECTED\"").unwrap();
        assert_eq!(decision, Decision::Rejected);
        assert!(serde_json::from_str::<Decision>("\"PENDING\"").is_err());
    }
}
