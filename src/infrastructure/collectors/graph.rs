use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::entity::Entity;
use crate::domain::entities::monitor_rule::MonitorRule;
use crate::domain::ports::collector::{CollectError, Collector, Probe};
use crate::domain::ports::store::RelationshipStore;

/// Watches the stored graph itself: the reading is the set of edges incident
/// to the target, so any newly ingested relationship changes the digest.
pub struct GraphCollector {
    store: Arc<dyn RelationshipStore>,
}

impl GraphCollector {
    #[must_use]
    pub fn new(store: Arc<dyn RelationshipStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Collector for GraphCollector {
    fn source(&self) -> &'static str {
        "graph"
    }

    async fn probe(&self, _rule: &MonitorRule, target: &Entity) -> Result<Probe, CollectError> {
        let edges = self
            .store
            .neighbors(&target.id, None)
            .map_err(|e| CollectError::Unreachable(e.to_string()))?;

        let mut lines: Vec<String> = edges
            .iter()
            .map(|r| format!("{}->{}:{}", r.source_id, r.target_id, r.rel_type))
            .collect();
        lines.sort_unstable();

        Ok(Probe {
            digest_basis: lines.join(";"),
            summary: format!("{} relationship(s) incident", lines.len()),
            observations: Vec::new(),
        })
    }
}
