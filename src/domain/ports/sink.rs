use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::alert::Alert;
use crate::domain::entities::entity::Entity;

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Worth retrying: timeout, connection failure, 5xx, 429.
    #[error("transient delivery failure: {0}")]
    Transient(String),
    /// Not worth retrying: the endpoint rejected the payload.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert about `target` to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Transient` for failures the dispatcher should
    /// retry with backoff, `DeliveryError::Permanent` otherwise.
    async fn deliver(&self, alert: &Alert, target: &Entity) -> Result<(), DeliveryError>;
}
