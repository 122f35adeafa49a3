use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::entities::alert::{Alert, DeliveryState};
use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::monitor_rule::{MonitorRule, RuleState};
use crate::domain::entities::relationship::{Relationship, RelationshipType};
use crate::domain::ports::store::{
    AlertStore, CacheStore, EntityStore, RelationshipStore, RuleStore, StoreError,
};

type EdgeKey = (String, String, RelationshipType);

/// Volatile store used by tests and one-shot runs.
#[derive(Default)]
pub struct InMemoryStore {
    entities: Mutex<HashMap<String, Entity>>,
    relationships: Mutex<HashMap<EdgeKey, Relationship>>,
    rules: Mutex<HashMap<String, MonitorRule>>,
    alerts: Mutex<Vec<Alert>>,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl EntityStore for InMemoryStore {
    fn upsert_entity(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let mut entities = lock(&self.entities);
        let merged = match entities.get_mut(&entity.id) {
            Some(stored) => {
                stored.merge_from(entity);
                stored.clone()
            }
            None => {
                entities.insert(entity.id.clone(), entity.clone());
                entity.clone()
            }
        };
        Ok(merged)
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        Ok(lock(&self.entities).get(id).cloned())
    }

    fn find_entity(
        &self,
        entity_type: EntityType,
        canonical_value: &str,
    ) -> Result<Option<Entity>, StoreError> {
        Ok(lock(&self.entities)
            .values()
            .find(|e| e.entity_type == entity_type && e.canonical_value == canonical_value)
            .cloned())
    }

    fn entities_with_attribute(
        &self,
        entity_type: EntityType,
        key: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StoreError> {
        Ok(lock(&self.entities)
            .values()
            .filter(|e| {
                e.entity_type == entity_type
                    && e.attributes
                        .get(key)
                        .is_some_and(|contributions| contributions.iter().any(|a| a.value == value))
            })
            .cloned()
            .collect())
    }

    fn list_entities(&self, types: Option<&[EntityType]>) -> Result<Vec<Entity>, StoreError> {
        let mut entities: Vec<Entity> = lock(&self.entities)
            .values()
            .filter(|e| types.is_none_or(|allowed| allowed.contains(&e.entity_type)))
            .cloned()
            .collect();
        entities.sort_by(|a, b| {
            (a.entity_type, &a.canonical_value).cmp(&(b.entity_type, &b.canonical_value))
        });
        Ok(entities)
    }
}

impl RelationshipStore for InMemoryStore {
    fn upsert_relationship(
        &self,
        relationship: &Relationship,
    ) -> Result<Relationship, StoreError> {
        let key = (
            relationship.source_id.clone(),
            relationship.target_id.clone(),
            relationship.rel_type,
        );
        let mut relationships = lock(&self.relationships);
        let merged = match relationships.get_mut(&key) {
            Some(stored) => {
                stored.merge_from(relationship);
                stored.clone()
            }
            None => {
                relationships.insert(key, relationship.clone());
                relationship.clone()
            }
        };
        Ok(merged)
    }

    fn neighbors(
        &self,
        entity_id: &str,
        rel_types: Option<&[RelationshipType]>,
    ) -> Result<Vec<Relationship>, StoreError> {
        Ok(lock(&self.relationships)
            .values()
            .filter(|r| r.source_id == entity_id || r.target_id == entity_id)
            .filter(|r| rel_types.is_none_or(|allowed| allowed.contains(&r.rel_type)))
            .cloned()
            .collect())
    }

    fn list_relationships(&self) -> Result<Vec<Relationship>, StoreError> {
        let mut edges: Vec<Relationship> = lock(&self.relationships).values().cloned().collect();
        edges.sort_by(|a, b| {
            (&a.source_id, &a.target_id, a.rel_type).cmp(&(&b.source_id, &b.target_id, b.rel_type))
        });
        Ok(edges)
    }
}

impl RuleStore for InMemoryStore {
    fn save_rule(&self, rule: &MonitorRule) -> Result<(), StoreError> {
        lock(&self.rules).insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    fn get_rule(&self, id: &str) -> Result<MonitorRule, StoreError> {
        lock(&self.rules)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn load_rules(&self, state: Option<RuleState>) -> Result<Vec<MonitorRule>, StoreError> {
        let mut rules: Vec<MonitorRule> = lock(&self.rules)
            .values()
            .filter(|r| state.is_none_or(|s| r.state == s))
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    fn delete_rule(&self, id: &str) -> Result<(), StoreError> {
        lock(&self.rules)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl AlertStore for InMemoryStore {
    fn record_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        lock(&self.alerts).push(alert.clone());
        Ok(())
    }

    fn update_delivery_state(
        &self,
        alert_id: &str,
        state: DeliveryState,
    ) -> Result<(), StoreError> {
        let mut alerts = lock(&self.alerts);
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        alert.delivery_state = state;
        Ok(())
    }

    fn recent_alerts(&self, count: usize) -> Result<Vec<Alert>, StoreError> {
        let mut alerts = lock(&self.alerts).clone();
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        alerts.truncate(count);
        Ok(alerts)
    }
}

impl CacheStore for InMemoryStore {
    fn cache_put(&self, source: &str, target: &str, payload: &str) -> Result<(), StoreError> {
        lock(&self.cache).insert(
            (source.to_string(), target.to_string()),
            payload.to_string(),
        );
        Ok(())
    }

    fn cache_get(&self, source: &str, target: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.cache)
            .get(&(source.to_string(), target.to_string()))
            .cloned())
    }

    fn cache_clear(&self) -> Result<usize, StoreError> {
        let mut cache = lock(&self.cache);
        let removed = cache.len();
        cache.clear();
        Ok(removed)
    }
}
