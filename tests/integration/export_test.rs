#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use chrono::Utc;

use argus::application::services::export::{ExportFormat, ExportService};
use argus::application::services::ingest::IngestService;
use argus::domain::entities::entity::EntityType;
use argus::domain::entities::observation::Observation;
use argus::infrastructure::persistence::in_memory_store::InMemoryStore;

fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let mut attributes = BTreeMap::new();
    attributes.insert("ptr_domain".to_string(), "example.com".to_string());
    let observations = [
        Observation {
            entity_type: "domain".to_string(),
            raw_value: "example.com".to_string(),
            attributes: BTreeMap::new(),
            source: "manual".to_string(),
            observed_at: Utc::now(),
        },
        Observation {
            entity_type: "ip".to_string(),
            raw_value: "93.184.216.34".to_string(),
            attributes,
            source: "dns".to_string(),
            observed_at: Utc::now(),
        },
    ];
    IngestService::new(&store, &store)
        .ingest(&observations)
        .expect("ingest");
    store
}

#[test]
fn json_export_contains_nodes_and_links() {
    let store = seeded_store();
    let out = ExportService::new(&store, &store)
        .export(ExportFormat::Json, None)
        .expect("export");

    let parsed: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(parsed["nodes"].as_array().expect("nodes").len(), 2);
    assert_eq!(parsed["links"].as_array().expect("links").len(), 1);
}

#[test]
fn type_filter_drops_edges_with_excluded_endpoints() {
    let store = seeded_store();
    let out = ExportService::new(&store, &store)
        .export(ExportFormat::Json, Some(&[EntityType::Domain]))
        .expect("export");

    let parsed: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(parsed["nodes"].as_array().expect("nodes").len(), 1);
    // The ip endpoint is filtered out, so the edge must go too.
    assert!(parsed["links"].as_array().expect("links").is_empty());
}

#[test]
fn gexf_and_graphml_are_well_formed_enough() {
    let store = seeded_store();
    let service = ExportService::new(&store, &store);

    let gexf = service.export(ExportFormat::Gexf, None).expect("gexf");
    assert!(gexf.starts_with("<?xml"));
    assert!(gexf.contains("<gexf"));
    assert!(gexf.contains("example.com"));

    let graphml = service.export(ExportFormat::Graphml, None).expect("graphml");
    assert!(graphml.contains("<graphml"));
    assert!(graphml.contains("93.184.216.34"));
}
