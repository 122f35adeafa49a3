use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::entities::alert::{Alert, DeliveryState};
use crate::domain::entities::entity::Entity;
use crate::domain::ports::sink::{AlertSink, DeliveryError};
use crate::domain::ports::store::AlertStore;

/// Retry policy for alert delivery.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// An alert queued for delivery, together with the entity it concerns.
#[derive(Debug, Clone)]
pub struct AlertEnvelope {
    pub alert: Alert,
    pub target: Entity,
}

/// Drains the alert channel and delivers each alert through the sink.
///
/// Transient failures are retried with exponential backoff; the alert's
/// delivery state is persisted as `delivered` or `failed` when the attempt
/// sequence ends. Delivery never blocks detection: the scheduler only pushes
/// into the channel.
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    alert_store: Arc<dyn AlertStore>,
    policy: DispatchPolicy,
}

impl AlertDispatcher {
    #[must_use]
    pub fn new(
        sink: Arc<dyn AlertSink>,
        alert_store: Arc<dyn AlertStore>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            sink,
            alert_store,
            policy,
        }
    }

    /// Consume envelopes until the channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<AlertEnvelope>) {
        while let Some(envelope) = rx.recv().await {
            let state = self.dispatch_one(&envelope.alert, &envelope.target).await;
            if let Err(e) = self
                .alert_store
                .update_delivery_state(&envelope.alert.id, state)
            {
                tracing::warn!("Failed to persist delivery state: {e}");
            }
        }
        tracing::debug!("Alert channel closed, dispatcher stopping");
    }

    /// Deliver one alert, retrying transient failures. Returns the final
    /// delivery state.
    pub async fn dispatch_one(&self, alert: &Alert, target: &Entity) -> DeliveryState {
        let mut attempt = 1u32;
        loop {
            match self.sink.deliver(alert, target).await {
                Ok(()) => {
                    tracing::info!(
                        "Alert {} delivered (attempt {attempt}): {}",
                        alert.id,
                        alert.message
                    );
                    return DeliveryState::Delivered;
                }
                Err(DeliveryError::Permanent(reason)) => {
                    tracing::warn!("Alert {} rejected permanently: {reason}", alert.id);
                    return DeliveryState::Failed;
                }
                Err(DeliveryError::Transient(reason)) => {
                    if attempt >= self.policy.max_attempts {
                        tracing::warn!(
                            "Alert {} failed after {attempt} attempt(s): {reason}",
                            alert.id
                        );
                        return DeliveryState::Failed;
                    }
                    let delay = self.policy.backoff_base * 2u32.saturating_pow(attempt - 1);
                    tracing::debug!(
                        "Alert {} attempt {attempt} failed ({reason}), retrying in {delay:?}",
                        alert.id
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
