use serde::{Deserialize, Serialize};

/// Certainty score in `[0, 1]` attached to entities and relationships.
///
/// Fusion is monotonic: corroboration from a previously unseen source never
/// decreases the score, contradiction never increases it. The exact weights
/// are a design parameter, not a property other code may rely on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(transparent)]
pub struct Confidence(f64);

/// Weight applied when a new distinct source corroborates an entity.
const CORROBORATION_WEIGHT: f64 = 0.3;

/// Weight applied when a relationship is re-observed.
const REOBSERVATION_WEIGHT: f64 = 0.25;

/// Multiplier applied when sources contradict each other on an attribute.
const CONTRADICTION_FACTOR: f64 = 0.8;

/// Floor below which contradiction no longer pushes the score.
const FLOOR: f64 = 0.05;

impl Confidence {
    /// Initial score for a freshly observed entity or edge.
    pub const SEED: Self = Self(0.5);

    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// A previously unseen source agreed with what we already know.
    #[must_use]
    pub fn corroborate(self) -> Self {
        Self(self.0 + (1.0 - self.0) * CORROBORATION_WEIGHT)
    }

    /// The same edge was observed again (evidence appended elsewhere).
    #[must_use]
    pub fn strengthen(self) -> Self {
        Self(self.0 + (1.0 - self.0) * REOBSERVATION_WEIGHT)
    }

    /// A source reported a value conflicting with an earlier observation.
    #[must_use]
    pub fn contradict(self) -> Self {
        Self((self.0 * CONTRADICTION_FACTOR).max(FLOOR))
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::SEED
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
