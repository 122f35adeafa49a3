use serde::{Deserialize, Serialize};

use crate::domain::entities::relationship::RelationshipType;
use crate::domain::value_objects::confidence::Confidence;

/// One hop in a correlation path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathStep {
    pub from: String,
    pub to: String,
    pub rel_type: RelationshipType,
    pub confidence: Confidence,
}

/// An ordered sequence of relationships connecting the queried entity to
/// another entity within the traversal depth bound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Path {
    pub steps: Vec<PathStep>,
}

impl Path {
    /// Product of per-hop confidences; an empty path scores 1.0.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.confidence.value())
            .product::<f64>()
    }

    #[must_use]
    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    /// Final entity id reached by the path, if any step exists.
    #[must_use]
    pub fn terminus(&self) -> Option<&str> {
        self.steps.last().map(|s| s.to.as_str())
    }
}
