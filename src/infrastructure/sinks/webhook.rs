use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::entities::alert::Alert;
use crate::domain::entities::entity::Entity;
use crate::domain::ports::sink::{AlertSink, DeliveryError};

/// Delivers alerts as JSON POSTs to a webhook endpoint.
///
/// The dispatcher owns retries; this sink only classifies each outcome as
/// transient (worth retrying) or permanent.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Creates a new webhook sink targeting the given URL.
    ///
    /// The HTTP client timeout covers DNS resolution, connection, and
    /// response.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Permanent` if the HTTP client cannot be
    /// initialized (e.g. TLS backend failure).
    pub fn new(url: String, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Permanent(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { url, client })
    }

    fn format_payload(alert: &Alert, target: &Entity) -> Value {
        json!({
            "event": "osint_alert",
            "alert_id": alert.id,
            "rule_id": alert.rule_id,
            "severity": format!("{}", alert.severity),
            "entity": {
                "type": target.entity_type,
                "value": target.canonical_value,
            },
            "message": alert.message,
            "detected_at": alert.detected_at.to_rfc3339(),
        })
    }
}

/// 2xx is delivered; 429 and 5xx are worth retrying; any other status means
/// the endpoint rejected the payload.
fn classify_status(status: reqwest::StatusCode) -> Result<(), DeliveryError> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(DeliveryError::Transient(format!("HTTP {status}")));
    }
    Err(DeliveryError::Permanent(format!("HTTP {status}")))
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn deliver(&self, alert: &Alert, target: &Entity) -> Result<(), DeliveryError> {
        let payload = Self::format_payload(alert, target);
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            // Timeouts and connection failures are retryable by nature.
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        classify_status(response.status())
    }
}
