use thiserror::Error;

use crate::domain::normalizer::ValidationError;
use crate::domain::ports::collector::CollectError;
use crate::domain::ports::sink::DeliveryError;
use crate::domain::ports::store::StoreError;

/// Failures surfaced by the application services.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("entity not found: {0}")]
    EntityNotFound(String),
    #[error("rule not found: {0}")]
    RuleNotFound(String),
    #[error("rule {0} is in the failed state; resume or purge it")]
    RuleFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("export failed: {0}")]
    Export(String),
}

impl ServiceError {
    /// Stable category string, used in log fields and exit reporting.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidRule(_) | Self::Export(_) => "validation",
            Self::EntityNotFound(_) | Self::RuleNotFound(_) => "not_found",
            Self::RuleFailed(_) => "rule_failed",
            Self::Collect(_) | Self::Delivery(_) => "transient_io",
            Self::Store(_) => "persistence",
        }
    }
}
