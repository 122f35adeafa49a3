use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::severity::Severity;

/// Delivery lifecycle of an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Failed,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Immutable record of a detected change.
///
/// Once created, only `delivery_state` may change; `message` and
/// `detected_at` are fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub detected_at: DateTime<Utc>,
    pub delivery_state: DeliveryState,
}

impl Alert {
    #[must_use]
    pub fn new(
        rule_id: String,
        severity: Severity,
        message: String,
        detected_at: DateTime<Utc>,
    ) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(
            format!("{rule_id}:{}:{message}", detected_at.timestamp_micros()).as_bytes(),
        );
        Self {
            id: hex::encode(digest)[..12].to_string(),
            rule_id,
            severity,
            message,
            detected_at,
            delivery_state: DeliveryState::Pending,
        }
    }
}
