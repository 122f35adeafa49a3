use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw observation record pushed by an external collector.
///
/// `entity_type` is an open string at the boundary; the normalizer validates
/// it against the closed entity-type set before anything is ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observation {
    pub entity_type: String,
    pub raw_value: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_format() {
        let json = r#"{
            "entity_type": "ip",
            "raw_value": "8.8.8.8",
            "attributes": {"asn": "AS15169"},
            "source": "bgp-lookup",
            "observed_at": "2025-06-01T12:00:00Z"
        }"#;
        let obs: Observation = serde_json::from_str(json).expect("deserialize");
        assert_eq!(obs.entity_type, "ip");
        assert_eq!(obs.attributes["asn"], "AS15169");
    }

    #[test]
    fn attributes_default_to_empty() {
        let json = r#"{
            "entity_type": "domain",
            "raw_value": "example.com",
            "source": "manual",
            "observed_at": "2025-06-01T12:00:00Z"
        }"#;
        let obs: Observation = serde_json::from_str(json).expect("deserialize");
        assert!(obs.attributes.is_empty());
    }
}
