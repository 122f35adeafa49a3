use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::value_objects::confidence::Confidence;

/// Closed set of intelligence subject kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Domain,
    Ip,
    Asn,
    Certificate,
    Wallet,
    Username,
    Email,
    Phone,
    Company,
    Person,
}

impl EntityType {
    pub const ALL: [Self; 10] = [
        Self::Domain,
        Self::Ip,
        Self::Asn,
        Self::Certificate,
        Self::Wallet,
        Self::Username,
        Self::Email,
        Self::Phone,
        Self::Company,
        Self::Person,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Ip => "ip",
            Self::Asn => "asn",
            Self::Certificate => "certificate",
            Self::Wallet => "wallet",
            Self::Username => "username",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Company => "company",
            Self::Person => "person",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's contribution to an entity attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeValue {
    pub value: String,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of merging an incoming observation into a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new: same sources, same values. Only timestamps moved.
    Unchanged,
    /// A previously unseen source agreed with the stored record.
    Corroborated,
    /// A source reported a value conflicting with an earlier one.
    Contradicted,
}

/// A de-duplicated intelligence subject.
///
/// Exactly one entity exists per `(entity_type, canonical_value)`; its id is
/// deterministic over that pair. Attributes are append-and-merge: later
/// observations add contributions, they never silently overwrite earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub canonical_value: String,
    pub attributes: BTreeMap<String, Vec<AttributeValue>>,
    pub confidence: Confidence,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Deterministic entity id: first 16 hex chars of SHA-256 over `type:value`.
#[must_use]
pub fn entity_id(entity_type: EntityType, canonical_value: &str) -> String {
    let digest = Sha256::digest(format!("{entity_type}:{canonical_value}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

impl Entity {
    /// Build a fresh entity from a single observation's contributions.
    #[must_use]
    pub fn from_observation(
        entity_type: EntityType,
        canonical_value: String,
        attributes: BTreeMap<String, String>,
        source: &str,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let attributes = attributes
            .into_iter()
            .map(|(key, value)| {
                (
                    key,
                    vec![AttributeValue {
                        value,
                        source: source.to_string(),
                        observed_at,
                    }],
                )
            })
            .collect();

        Self {
            id: entity_id(entity_type, &canonical_value),
            entity_type,
            canonical_value,
            attributes,
            confidence: Confidence::SEED,
            first_seen: observed_at,
            last_seen: observed_at,
        }
    }

    /// Every source that has contributed at least one attribute value.
    fn known_sources(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .values()
            .flatten()
            .map(|a| a.source.as_str())
    }

    /// Merge a fresh observation of the same `(type, canonical_value)` pair.
    ///
    /// Contributions identical in `(key, value, source)` are not duplicated;
    /// their timestamp only advances. Confidence moves once per merge:
    /// a conflicting value from a different source contradicts, a brand-new
    /// source corroborates, anything else leaves the score untouched.
    pub fn merge_from(&mut self, incoming: &Self) -> MergeOutcome {
        debug_assert_eq!(self.id, incoming.id);

        let new_source = incoming
            .known_sources()
            .any(|s| !self.known_sources().any(|known| known == s));

        let mut conflict = false;
        for (key, contributions) in &incoming.attributes {
            let slot = self.attributes.entry(key.clone()).or_default();
            for contribution in contributions {
                if let Some(existing) = slot
                    .iter_mut()
                    .find(|a| a.value == contribution.value && a.source == contribution.source)
                {
                    if contribution.observed_at > existing.observed_at {
                        existing.observed_at = contribution.observed_at;
                    }
                    continue;
                }
                if slot
                    .iter()
                    .any(|a| a.source != contribution.source && a.value != contribution.value)
                {
                    conflict = true;
                }
                slot.push(contribution.clone());
            }
        }

        self.first_seen = self.first_seen.min(incoming.first_seen);
        self.last_seen = self.last_seen.max(incoming.last_seen);

        if conflict {
            self.confidence = self.confidence.contradict();
            MergeOutcome::Contradicted
        } else if new_source {
            self.confidence = self.confidence.corroborate();
            MergeOutcome::Corroborated
        } else {
            MergeOutcome::Unchanged
        }
    }
}
