use thiserror::Error;

use crate::domain::entities::alert::{Alert, DeliveryState};
use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::monitor_rule::{MonitorRule, RuleState};
use crate::domain::entities::relationship::{Relationship, RelationshipType};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    #[error("entry not found: {0}")]
    NotFound(String),
}

pub trait EntityStore: Send + Sync {
    /// Insert or merge an entity keyed by its deterministic id.
    ///
    /// The merge applies the domain rules: attributes append, timestamps
    /// advance, confidence moves once. The write is atomic per entity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn upsert_entity(&self, entity: &Entity) -> Result<Entity, StoreError>;

    /// Retrieve an entity by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn get_entity(&self, id: &str) -> Result<Option<Entity>, StoreError>;

    /// Retrieve an entity by its `(type, canonical_value)` pair.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn find_entity(
        &self,
        entity_type: EntityType,
        canonical_value: &str,
    ) -> Result<Option<Entity>, StoreError>;

    /// All entities of `entity_type` carrying an attribute contribution
    /// with this exact `(key, value)` pair.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn entities_with_attribute(
        &self,
        entity_type: EntityType,
        key: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StoreError>;

    /// All stored entities, optionally restricted to a type allowlist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list_entities(&self, types: Option<&[EntityType]>) -> Result<Vec<Entity>, StoreError>;
}

pub trait RelationshipStore: Send + Sync {
    /// Insert or merge an edge keyed by `(source_id, target_id, rel_type)`.
    ///
    /// Re-observation appends evidence and strengthens confidence.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn upsert_relationship(&self, relationship: &Relationship)
        -> Result<Relationship, StoreError>;

    /// All edges touching `entity_id` in either direction, optionally
    /// restricted to a type allowlist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn neighbors(
        &self,
        entity_id: &str,
        rel_types: Option<&[RelationshipType]>,
    ) -> Result<Vec<Relationship>, StoreError>;

    /// All stored edges.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list_relationships(&self) -> Result<Vec<Relationship>, StoreError>;
}

pub trait RuleStore: Send + Sync {
    /// Insert or fully update a monitoring rule.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn save_rule(&self, rule: &MonitorRule) -> Result<(), StoreError>;

    /// Retrieve one rule by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such rule exists, or another
    /// `StoreError` if the read fails.
    fn get_rule(&self, id: &str) -> Result<MonitorRule, StoreError>;

    /// All rules, optionally restricted to one lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn load_rules(&self, state: Option<RuleState>) -> Result<Vec<MonitorRule>, StoreError>;

    /// Remove a rule permanently.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such rule exists, or another
    /// `StoreError` if the write fails.
    fn delete_rule(&self, id: &str) -> Result<(), StoreError>;
}

pub trait AlertStore: Send + Sync {
    /// Persist a freshly detected alert.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn record_alert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Update only the delivery state of a stored alert.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such alert exists, or another
    /// `StoreError` if the write fails.
    fn update_delivery_state(&self, alert_id: &str, state: DeliveryState)
        -> Result<(), StoreError>;

    /// The most recent alerts, newest first, up to `count`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn recent_alerts(&self, count: usize) -> Result<Vec<Alert>, StoreError>;
}

pub trait CacheStore: Send + Sync {
    /// Cache a collector reading keyed by `(source, target)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn cache_put(&self, source: &str, target: &str, payload: &str) -> Result<(), StoreError>;

    /// Retrieve a cached reading, if present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn cache_get(&self, source: &str, target: &str) -> Result<Option<String>, StoreError>;

    /// Drop every cached reading. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn cache_clear(&self) -> Result<usize, StoreError>;
}

/// Full persistence surface, satisfied by any type implementing all five
/// store ports.
pub trait GraphStore:
    EntityStore + RelationshipStore + RuleStore + AlertStore + CacheStore
{
}

impl<T> GraphStore for T where
    T: EntityStore + RelationshipStore + RuleStore + AlertStore + CacheStore
{
}
