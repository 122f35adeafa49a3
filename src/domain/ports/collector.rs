use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::entity::Entity;
use crate::domain::entities::monitor_rule::MonitorRule;
use crate::domain::entities::observation::Observation;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("source unreachable: {0}")]
    Unreachable(String),
    #[error("timeout while probing target")]
    Timeout,
    #[error("malformed response from source: {0}")]
    Malformed(String),
}

/// Current reading of a monitored target, as seen by one source.
///
/// `digest_basis` is the stable text the scheduler hashes to decide whether
/// the reading changed since the previous tick; it must not contain volatile
/// fields such as timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub digest_basis: String,
    pub summary: String,
    pub observations: Vec<Observation>,
}

#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable source name, used for rate limiting and evidence records.
    fn source(&self) -> &'static str;

    /// Probe the rule's target and return the current reading.
    ///
    /// # Errors
    ///
    /// Returns `CollectError` if the source is unreachable, the probe times
    /// out, or the response cannot be parsed.
    async fn probe(&self, rule: &MonitorRule, target: &Entity) -> Result<Probe, CollectError>;
}
