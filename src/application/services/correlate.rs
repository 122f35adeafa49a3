use std::collections::HashMap;

use crate::application::error::ServiceError;
use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::path::{Path, PathStep};
use crate::domain::ports::store::{EntityStore, RelationshipStore};

/// One entity reachable from the query subject, with the strongest path
/// connecting them.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub entity: Entity,
    pub path: Path,
}

/// Bounded graph traversal over a read snapshot of the store.
///
/// Edges are walked in both directions regardless of stored orientation.
/// For every reachable entity the strongest path wins: highest product of
/// per-hop confidences, ties broken by fewer hops.
pub struct CorrelationService<'a> {
    entity_store: &'a dyn EntityStore,
    relationship_store: &'a dyn RelationshipStore,
}

impl<'a> CorrelationService<'a> {
    #[must_use]
    pub const fn new(
        entity_store: &'a dyn EntityStore,
        relationship_store: &'a dyn RelationshipStore,
    ) -> Self {
        Self {
            entity_store,
            relationship_store,
        }
    }

    /// All entities within `max_depth` hops of `(entity_type, value)`,
    /// strongest correlations first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::EntityNotFound` when the subject is not in the
    /// graph, or a storage error if reads fail.
    pub fn correlate(
        &self,
        entity_type: EntityType,
        canonical_value: &str,
        max_depth: usize,
    ) -> Result<Vec<Correlation>, ServiceError> {
        let start = self
            .entity_store
            .find_entity(entity_type, canonical_value)?
            .ok_or_else(|| {
                ServiceError::EntityNotFound(format!("{entity_type}:{canonical_value}"))
            })?;

        let mut best: HashMap<String, Path> = HashMap::new();
        let mut frontier: Vec<(String, Path)> = vec![(start.id.clone(), Path { steps: vec![] })];

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for (node, path) in &frontier {
                for edge in self.relationship_store.neighbors(node, None)? {
                    let Some(other) = edge.other_endpoint(node) else {
                        continue;
                    };
                    if other == start.id {
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.steps.push(PathStep {
                        from: node.clone(),
                        to: other.to_string(),
                        rel_type: edge.rel_type,
                        confidence: edge.confidence,
                    });
                    if is_improvement(best.get(other), &extended) {
                        best.insert(other.to_string(), extended.clone());
                        next.push((other.to_string(), extended));
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut correlations = Vec::with_capacity(best.len());
        for (id, path) in best {
            // Dangling edge endpoints are skipped rather than failing the query.
            if let Some(entity) = self.entity_store.get_entity(&id)? {
                correlations.push(Correlation { entity, path });
            }
        }

        correlations.sort_by(|a, b| {
            b.path
                .confidence()
                .partial_cmp(&a.path.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.hops().cmp(&b.path.hops()))
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });

        tracing::debug!(
            "Correlation for {entity_type}:{canonical_value} found {} related entit(ies)",
            correlations.len()
        );
        Ok(correlations)
    }
}

fn is_improvement(current: Option<&Path>, candidate: &Path) -> bool {
    match current {
        None => true,
        Some(existing) => {
            let (a, b) = (candidate.confidence(), existing.confidence());
            a > b || (a == b && candidate.hops() < existing.hops())
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::entities::relationship::{Relationship, RelationshipType};
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn seed_entity(store: &InMemoryStore, entity_type: EntityType, value: &str) -> Entity {
        let entity = Entity::from_observation(
            entity_type,
            value.to_string(),
            BTreeMap::new(),
            "test",
            Utc::now(),
        );
        store.upsert_entity(&entity).expect("upsert")
    }

    fn seed_edge(store: &InMemoryStore, a: &Entity, b: &Entity, rel_type: RelationshipType) {
        store
            .upsert_relationship(&Relationship::observed(
                a.id.clone(),
                b.id.clone(),
                rel_type,
                "test",
                Utc::now(),
            ))
            .expect("upsert edge");
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let store = InMemoryStore::new();
        let service = CorrelationService::new(&store, &store);

        let err = service
            .correlate(EntityType::Domain, "missing.example", 3)
            .expect_err("must fail");
        assert!(matches!(err, ServiceError::EntityNotFound(_)));
    }

    #[test]
    fn finds_direct_neighbor() {
        let store = InMemoryStore::new();
        let a = seed_entity(&store, EntityType::Ip, "8.8.8.8");
        let b = seed_entity(&store, EntityType::Ip, "8.8.4.4");
        seed_edge(&store, &a, &b, RelationshipType::SameAsn);

        let service = CorrelationService::new(&store, &store);
        let found = service
            .correlate(EntityType::Ip, "8.8.8.8", 3)
            .expect("correlate");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity.id, b.id);
        assert_eq!(found[0].path.hops(), 1);
    }

    #[test]
    fn traversal_ignores_edge_direction() {
        let store = InMemoryStore::new();
        let company = seed_entity(&store, EntityType::Company, "acme ltd");
        let person = seed_entity(&store, EntityType::Person, "jane doe");
        seed_edge(&store, &company, &person, RelationshipType::Employs);

        let service = CorrelationService::new(&store, &store);
        // Query from the target side of the directed edge.
        let found = service
            .correlate(EntityType::Person, "jane doe", 2)
            .expect("correlate");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity.id, company.id);
    }

    #[test]
    fn depth_bound_is_respected() {
        let store = InMemoryStore::new();
        let a = seed_entity(&store, EntityType::Ip, "10.0.0.1");
        let b = seed_entity(&store, EntityType::Ip, "10.0.0.2");
        let c = seed_entity(&store, EntityType::Ip, "10.0.0.3");
        let d = seed_entity(&store, EntityType::Ip, "10.0.0.4");
        seed_edge(&store, &a, &b, RelationshipType::SameAsn);
        seed_edge(&store, &b, &c, RelationshipType::SameAsn);
        seed_edge(&store, &c, &d, RelationshipType::SameAsn);

        let service = CorrelationService::new(&store, &store);
        let found = service
            .correlate(EntityType::Ip, "10.0.0.1", 2)
            .expect("correlate");

        let ids: Vec<&str> = found.iter().map(|c| c.entity.id.as_str()).collect();
        assert!(ids.contains(&b.id.as_str()));
        assert!(ids.contains(&c.id.as_str()));
        assert!(!ids.contains(&d.id.as_str()), "d is 3 hops away");
    }

    #[test]
    fn stronger_path_ranks_first_and_ties_prefer_fewer_hops() {
        let store = InMemoryStore::new();
        let a = seed_entity(&store, EntityType::Ip, "10.0.0.1");
        let b = seed_entity(&store, EntityType::Ip, "10.0.0.2");
        let c = seed_entity(&store, EntityType::Ip, "10.0.0.3");
        seed_edge(&store, &a, &b, RelationshipType::SameAsn);
        seed_edge(&store, &b, &c, RelationshipType::SameAsn);
        // Direct a-c edge as well: same seed confidence, fewer hops.
        seed_edge(&store, &a, &c, RelationshipType::SharesCertificate);

        let service = CorrelationService::new(&store, &store);
        let found = service
            .correlate(EntityType::Ip, "10.0.0.1", 3)
            .expect("correlate");

        // Both neighbors reachable in one hop beat any two-hop alternative.
        assert_eq!(found.len(), 2);
        for correlation in &found {
            assert_eq!(correlation.path.hops(), 1);
        }
        assert!(found[0].path.confidence() >= found[1].path.confidence());
    }

    #[test]
    fn subject_itself_never_appears_in_results() {
        let store = InMemoryStore::new();
        let a = seed_entity(&store, EntityType::Ip, "10.0.0.1");
        let b = seed_entity(&store, EntityType::Ip, "10.0.0.2");
        seed_edge(&store, &a, &b, RelationshipType::SameAsn);

        let service = CorrelationService::new(&store, &store);
        let found = service
            .correlate(EntityType::Ip, "10.0.0.1", 4)
            .expect("correlate");

        assert!(found.iter().all(|c| c.entity.id != a.id));
    }
}
