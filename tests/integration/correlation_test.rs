#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use chrono::Utc;

use argus::application::services::correlate::CorrelationService;
use argus::application::services::ingest::IngestService;
use argus::domain::entities::entity::EntityType;
use argus::domain::entities::observation::Observation;
use argus::domain::entities::relationship::RelationshipType;
use argus::domain::ports::store::{EntityStore, RelationshipStore};
use argus::infrastructure::persistence::in_memory_store::InMemoryStore;
use argus::infrastructure::persistence::sqlite_store::SqliteStore;

fn ip_observation(ip: &str, asn: &str) -> Observation {
    let mut attributes = BTreeMap::new();
    attributes.insert("asn".to_string(), asn.to_string());
    Observation {
        entity_type: "ip".to_string(),
        raw_value: ip.to_string(),
        attributes,
        source: "bgp-lookup".to_string(),
        observed_at: Utc::now(),
    }
}

fn domain_observation(domain: &str, fingerprint: &str) -> Observation {
    let mut attributes = BTreeMap::new();
    attributes.insert("cert_fingerprint".to_string(), fingerprint.to_string());
    Observation {
        entity_type: "domain".to_string(),
        raw_value: domain.to_string(),
        attributes,
        source: "ct-log".to_string(),
        observed_at: Utc::now(),
    }
}

#[test]
fn shared_asn_produces_a_correlation() {
    let store = InMemoryStore::new();
    let ingest = IngestService::new(&store, &store);
    ingest
        .ingest(&[
            ip_observation("8.8.8.8", "AS15169"),
            ip_observation("8.8.4.4", "AS15169"),
        ])
        .expect("ingest");

    let correlations = CorrelationService::new(&store, &store)
        .correlate(EntityType::Ip, "8.8.8.8", 3)
        .expect("correlate");

    assert_eq!(correlations.len(), 1);
    let peer = &correlations[0];
    assert_eq!(peer.entity.canonical_value, "8.8.4.4");
    assert_eq!(peer.path.hops(), 1);
    assert_eq!(peer.path.steps[0].rel_type, RelationshipType::SameAsn);
}

#[test]
fn reingestion_is_idempotent_and_corroborates() {
    let store = InMemoryStore::new();
    let ingest = IngestService::new(&store, &store);
    let batch = [
        ip_observation("8.8.8.8", "AS15169"),
        ip_observation("8.8.4.4", "AS15169"),
    ];

    ingest.ingest(&batch).expect("first ingest");
    let first_edges = store.list_relationships().expect("edges");
    let first_confidence = first_edges[0].confidence.value();

    ingest.ingest(&batch).expect("second ingest");

    assert_eq!(store.list_entities(None).expect("entities").len(), 2);
    let second_edges = store.list_relationships().expect("edges");
    assert_eq!(second_edges.len(), first_edges.len());
    // Seeing the same link again strengthens it, never duplicates it.
    assert!(second_edges[0].confidence.value() > first_confidence);
}

#[test]
fn multi_hop_chain_discounts_confidence() {
    let store = InMemoryStore::new();
    let ingest = IngestService::new(&store, &store);
    // a.example and b.example share a certificate; b.example mentions a
    // username, putting the username two hops from a.example.
    let mut mention = BTreeMap::new();
    mention.insert("mentions".to_string(), "username:@shadow".to_string());
    ingest
        .ingest(&[
            domain_observation("a.example", "AA:BB:CC:DD:AA:BB:CC:DD:AA:BB:CC:DD:AA:BB:CC:DD:AA:BB:CC:DD"),
            domain_observation("b.example", "AA:BB:CC:DD:AA:BB:CC:DD:AA:BB:CC:DD:AA:BB:CC:DD:AA:BB:CC:DD"),
            Observation {
                entity_type: "domain".to_string(),
                raw_value: "b.example".to_string(),
                attributes: mention,
                source: "paste-scan".to_string(),
                observed_at: Utc::now(),
            },
        ])
        .expect("ingest");

    let correlations = CorrelationService::new(&store, &store)
        .correlate(EntityType::Domain, "a.example", 3)
        .expect("correlate");

    let direct = correlations
        .iter()
        .find(|c| c.entity.canonical_value == "b.example")
        .expect("direct peer");
    let indirect = correlations
        .iter()
        .find(|c| c.entity.canonical_value == "shadow")
        .expect("two-hop peer");

    assert_eq!(direct.path.hops(), 1);
    assert_eq!(indirect.path.hops(), 2);
    assert!(indirect.path.confidence() < direct.path.confidence());
}

#[test]
fn graph_survives_sqlite_roundtrip() {
    let store = SqliteStore::in_memory().expect("store");
    let ingest = IngestService::new(&store, &store);
    ingest
        .ingest(&[
            ip_observation("1.1.1.1", "AS13335"),
            ip_observation("1.0.0.1", "AS13335"),
        ])
        .expect("ingest");

    let correlations = CorrelationService::new(&store, &store)
        .correlate(EntityType::Ip, "1.1.1.1", 2)
        .expect("correlate");

    assert_eq!(correlations.len(), 1);
    assert_eq!(correlations[0].entity.canonical_value, "1.0.0.1");
}
