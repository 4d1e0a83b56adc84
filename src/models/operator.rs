use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub coordinates: Option<String>,
    pub radius_km: Option<f64>,
    pub services: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl OperatorProfile {
    pub fn offers(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    pub fn summary(&self) -> OperatorSummary {
        OperatorSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}
