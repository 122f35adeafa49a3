use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::confidence::Confidence;

/// Closed set of typed edges between entities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    SameAsn,
    SharesCertificate,
    WalletCluster,
    Employs,
    Supplies,
    Mentions,
    ReverseOf,
}

impl RelationshipType {
    pub const ALL: [Self; 7] = [
        Self::SameAsn,
        Self::SharesCertificate,
        Self::WalletCluster,
        Self::Employs,
        Self::Supplies,
        Self::Mentions,
        Self::ReverseOf,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameAsn => "same_asn",
            Self::SharesCertificate => "shares_certificate",
            Self::WalletCluster => "wallet_cluster",
            Self::Employs => "employs",
            Self::Supplies => "supplies",
            Self::Mentions => "mentions",
            Self::ReverseOf => "reverse_of",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Symmetric edge types carry no meaningful direction; their endpoints
    /// are stored in canonical (sorted) order so a re-observation from the
    /// other side merges into the same row.
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(
            self,
            Self::SameAsn | Self::SharesCertificate | Self::WalletCluster
        )
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source reference supporting an edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

/// A directed, typed, evidenced edge between two entities.
///
/// Deduplicated on `(source_id, target_id, rel_type)`: re-observation
/// strengthens confidence and appends evidence instead of creating a
/// second edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
    pub confidence: Confidence,
    pub evidence: Vec<Evidence>,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Build a new edge with a single evidence entry, canonicalizing
    /// endpoint order for symmetric types.
    #[must_use]
    pub fn observed(
        source_id: String,
        target_id: String,
        rel_type: RelationshipType,
        source: &str,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let (source_id, target_id) = if rel_type.is_symmetric() && target_id < source_id {
            (target_id, source_id)
        } else {
            (source_id, target_id)
        };

        Self {
            source_id,
            target_id,
            rel_type,
            confidence: Confidence::SEED,
            evidence: vec![Evidence {
                source: source.to_string(),
                observed_at,
            }],
            created_at: observed_at,
        }
    }

    /// Merge a re-observation of the same edge: evidence is appended in
    /// order and confidence strengthened once.
    pub fn merge_from(&mut self, incoming: &Self) {
        debug_assert_eq!(
            (&self.source_id, &self.target_id, self.rel_type),
            (&incoming.source_id, &incoming.target_id, incoming.rel_type)
        );
        self.evidence.extend(incoming.evidence.iter().cloned());
        self.confidence = self.confidence.strengthen();
    }

    /// The endpoint opposite to `id`, if the edge touches it.
    #[must_use]
    pub fn other_endpoint(&self, id: &str) -> Option<&str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rel_type_parse_roundtrip() {
        for t in RelationshipType::ALL {
            assert_eq!(RelationshipType::parse(t.as_str()), Some(t));
        }
        assert_eq!(RelationshipType::parse("friends_with"), None);
    }

    #[test]
    fn symmetric_types_canonicalize_endpoint_order() {
        let ab = Relationship::observed(
            "bbb".into(),
            "aaa".into(),
            RelationshipType::SameAsn,
            "bgp-lookup",
            Utc::now(),
        );
        assert_eq!(ab.source_id, "aaa");
        assert_eq!(ab.target_id, "bbb");
    }

    #[test]
    fn directed_types_keep_endpoint_order() {
        let edge = Relationship::observed(
            "bbb".into(),
            "aaa".into(),
            RelationshipType::Employs,
            "registry",
            Utc::now(),
        );
        assert_eq!(edge.source_id, "bbb");
        assert_eq!(edge.target_id, "aaa");
    }

    #[test]
    fn merge_appends_evidence_and_strengthens() {
        let now = Utc::now();
        let mut edge = Relationship::observed(
            "a".into(),
            "b".into(),
            RelationshipType::SameAsn,
            "bgp-lookup",
            now,
        );
        let before = edge.confidence;

        let again = Relationship::observed(
            "a".into(),
            "b".into(),
            RelationshipType::SameAsn,
            "bgp-lookup",
            now + chrono::TimeDelta::minutes(5),
        );
        edge.merge_from(&again);

        assert_eq!(edge.evidence.len(), 2);
        assert!(edge.confidence.value() > before.value());
    }

    #[test]
    fn other_endpoint_resolves_both_directions() {
        let edge = Relationship::observed(
            "a".into(),
            "b".into(),
            RelationshipType::Mentions,
            "socmint",
            Utc::now(),
        );
        assert_eq!(edge.other_endpoint("a"), Some("b"));
        assert_eq!(edge.other_endpoint("b"), Some("a"));
        assert_eq!(edge.other_endpoint("c"), None);
    }
}
