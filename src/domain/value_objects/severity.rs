use serde::{Deserialize, Serialize};

/// Severity level for monitoring alerts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl Severity {
    #[must_use]
    pub const fn color(&self) -> &str {
        match self {
            Self::Low => "blue",
            Self::Medium => "yellow",
            Self::High => "red",
        }
    }
}
