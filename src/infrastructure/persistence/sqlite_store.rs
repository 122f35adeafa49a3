use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::entities::alert::{Alert, DeliveryState};
use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::monitor_rule::{MonitorRule, RuleState};
use crate::domain::entities::relationship::{Relationship, RelationshipType};
use crate::domain::ports::store::{
    AlertStore, CacheStore, EntityStore, RelationshipStore, RuleStore, StoreError,
};

/// SQLite-backed persistent store for the entity graph, rules, alerts and
/// the collector lookup cache.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new `SQLite` store at the given path.
    ///
    /// Expands `~`, creates parent directories, opens connection,
    /// sets WAL mode and pragmas, and initializes schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the database cannot be opened or initialized.
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let expanded = shellexpand::tilde(path);
        let db_path = PathBuf::from(expanded.as_ref());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        let conn =
            Connection::open(&db_path).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and `--ephemeral` runs.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        super::migrations::initialize_schema(&conn)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Remove alerts and cached readings older than the retention period.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if deletion fails.
    pub fn cleanup_old(&self, retention_hours: u64) -> Result<(), StoreError> {
        let hours =
            i64::try_from(retention_hours).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let delta = chrono::TimeDelta::try_hours(hours)
            .ok_or_else(|| StoreError::WriteFailed("invalid retention hours".into()))?;
        let cutoff = (Utc::now() - delta).to_rfc3339();

        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        conn.execute("DELETE FROM alerts WHERE detected_at < ?1", params![cutoff])
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.execute(
            "DELETE FROM lookup_cache WHERE cached_at < ?1",
            params![cutoff],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        drop(conn);
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, StoreError> {
    serde_json::from_str(data).map_err(|e| StoreError::ReadFailed(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::WriteFailed(e.to_string()))
}

impl EntityStore for SqliteStore {
    fn upsert_entity(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        // Read-merge-write under one transaction so each entity write is
        // atomic even with multiple callers.
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT data FROM entities WHERE id = ?1",
                params![entity.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let merged = match existing {
            Some(data) => {
                let mut stored: Entity = decode(&data)?;
                stored.merge_from(entity);
                stored
            }
            None => entity.clone(),
        };

        tx.execute(
            "INSERT OR REPLACE INTO entities (id, entity_type, canonical_value, last_seen, data) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                merged.id,
                merged.entity_type.as_str(),
                merged.canonical_value,
                merged.last_seen.to_rfc3339(),
                encode(&merged)?,
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        tx.commit()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);
        Ok(merged)
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM entities WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(conn);
        data.as_deref().map(decode).transpose()
    }

    fn find_entity(
        &self,
        entity_type: EntityType,
        canonical_value: &str,
    ) -> Result<Option<Entity>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM entities WHERE entity_type = ?1 AND canonical_value = ?2",
                params![entity_type.as_str(), canonical_value],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(conn);
        data.as_deref().map(decode).transpose()
    }

    fn entities_with_attribute(
        &self,
        entity_type: EntityType,
        key: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StoreError> {
        // Attributes live inside the JSON blob; filter in Rust after the
        // type-indexed fetch.
        let candidates = self.list_entities(Some(&[entity_type]))?;
        Ok(candidates
            .into_iter()
            .filter(|e| {
                e.attributes
                    .get(key)
                    .is_some_and(|contributions| contributions.iter().any(|a| a.value == value))
            })
            .collect())
    }

    fn list_entities(&self, types: Option<&[EntityType]>) -> Result<Vec<Entity>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let mut stmt = conn
            .prepare("SELECT data, entity_type FROM entities ORDER BY entity_type, canonical_value")
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);

        let mut entities = Vec::with_capacity(rows.len());
        for (data, type_str) in rows {
            if let Some(allowed) = types {
                let matches = EntityType::parse(&type_str)
                    .is_some_and(|t| allowed.contains(&t));
                if !matches {
                    continue;
                }
            }
            entities.push(decode(&data)?);
        }
        Ok(entities)
    }
}

impl RelationshipStore for SqliteStore {
    fn upsert_relationship(
        &self,
        relationship: &Relationship,
    ) -> Result<Relationship, StoreError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        let tx = conn
            .transaction()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT data FROM relationships \
                 WHERE source_id = ?1 AND target_id = ?2 AND rel_type = ?3",
                params![
                    relationship.source_id,
                    relationship.target_id,
                    relationship.rel_type.as_str(),
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let merged = match existing {
            Some(data) => {
                let mut stored: Relationship = decode(&data)?;
                stored.merge_from(relationship);
                stored
            }
            None => relationship.clone(),
        };

        tx.execute(
            "INSERT OR REPLACE INTO relationships (source_id, target_id, rel_type, data) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                merged.source_id,
                merged.target_id,
                merged.rel_type.as_str(),
                encode(&merged)?,
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        tx.commit()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);
        Ok(merged)
    }

    fn neighbors(
        &self,
        entity_id: &str,
        rel_types: Option<&[RelationshipType]>,
    ) -> Result<Vec<Relationship>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let mut stmt = conn
            .prepare(
                "SELECT data, rel_type FROM relationships \
                 WHERE source_id = ?1 OR target_id = ?1",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![entity_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);

        let mut edges = Vec::with_capacity(rows.len());
        for (data, type_str) in rows {
            if let Some(allowed) = rel_types {
                let matches = RelationshipType::parse(&type_str)
                    .is_some_and(|t| allowed.contains(&t));
                if !matches {
                    continue;
                }
            }
            edges.push(decode(&data)?);
        }
        Ok(edges)
    }

    fn list_relationships(&self) -> Result<Vec<Relationship>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let mut stmt = conn
            .prepare("SELECT data FROM relationships ORDER BY source_id, target_id, rel_type")
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);
        rows.iter().map(|data| decode(data)).collect()
    }
}

impl RuleStore for SqliteStore {
    fn save_rule(&self, rule: &MonitorRule) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        conn.execute(
            "INSERT OR REPLACE INTO rules (id, state, data) VALUES (?1, ?2, ?3)",
            params![rule.id, rule.state.to_string(), encode(rule)?],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        drop(conn);
        Ok(())
    }

    fn get_rule(&self, id: &str) -> Result<MonitorRule, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let data: Option<String> = conn
            .query_row("SELECT data FROM rules WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(conn);
        data.as_deref()
            .map(decode)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn load_rules(&self, state: Option<RuleState>) -> Result<Vec<MonitorRule>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let rows = match state {
            Some(state) => {
                let mut stmt = conn
                    .prepare("SELECT data FROM rules WHERE state = ?1 ORDER BY id")
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
                let rows = stmt
                    .query_map(params![state.to_string()], |row| row.get::<_, String>(0))
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
                drop(stmt);
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT data FROM rules ORDER BY id")
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
                drop(stmt);
                rows
            }
        };

        drop(conn);
        rows.iter().map(|data| decode(data)).collect()
    }

    fn delete_rule(&self, id: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        let affected = conn
            .execute("DELETE FROM rules WHERE id = ?1", params![id])
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        drop(conn);
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl AlertStore for SqliteStore {
    fn record_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        conn.execute(
            "INSERT OR REPLACE INTO alerts (id, rule_id, detected_at, delivery_state, data) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                alert.id,
                alert.rule_id,
                alert.detected_at.to_rfc3339(),
                alert.delivery_state.to_string(),
                encode(alert)?,
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        drop(conn);
        Ok(())
    }

    fn update_delivery_state(
        &self,
        alert_id: &str,
        state: DeliveryState,
    ) -> Result<(), StoreError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        let tx = conn
            .transaction()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let data: Option<String> = tx
            .query_row(
                "SELECT data FROM alerts WHERE id = ?1",
                params![alert_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let mut alert: Alert = data
            .as_deref()
            .map(decode)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(alert_id.to_string()))?;
        alert.delivery_state = state;

        tx.execute(
            "UPDATE alerts SET delivery_state = ?2, data = ?3 WHERE id = ?1",
            params![alert_id, state.to_string(), encode(&alert)?],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        tx.commit()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);
        Ok(())
    }

    fn recent_alerts(&self, count: usize) -> Result<Vec<Alert>, StoreError> {
        let limit = i64::try_from(count).map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let mut stmt = conn
            .prepare("SELECT data FROM alerts ORDER BY detected_at DESC LIMIT ?1")
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);
        rows.iter().map(|data| decode(data)).collect()
    }
}

impl CacheStore for SqliteStore {
    fn cache_put(&self, source: &str, target: &str, payload: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        conn.execute(
            "INSERT OR REPLACE INTO lookup_cache (source, target, cached_at, payload) \
             VALUES (?1, ?2, ?3, ?4)",
            params![source, target, Utc::now().to_rfc3339(), payload],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        drop(conn);
        Ok(())
    }

    fn cache_get(&self, source: &str, target: &str) -> Result<Option<String>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let payload = conn
            .query_row(
                "SELECT payload FROM lookup_cache WHERE source = ?1 AND target = ?2",
                params![source, target],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(conn);
        Ok(payload)
    }

    fn cache_clear(&self) -> Result<usize, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;

        let removed = conn
            .execute("DELETE FROM lookup_cache", [])
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        drop(conn);
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::severity::Severity;
    use std::collections::BTreeMap;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().expect("in-memory store")
    }

    fn sample_entity(value: &str, source: &str) -> Entity {
        let mut attributes = BTreeMap::new();
        attributes.insert("registrar".to_string(), "Example Inc".to_string());
        Entity::from_observation(
            EntityType::Domain,
            value.to_string(),
            attributes,
            source,
            Utc::now(),
        )
    }

    #[test]
    fn entity_upsert_and_lookup() {
        let store = store();
        let entity = sample_entity("example.com", "whois");

        let stored = store.upsert_entity(&entity).expect("upsert");
        assert_eq!(stored.id, entity.id);

        let by_id = store.get_entity(&entity.id).expect("read").expect("found");
        assert_eq!(by_id.canonical_value, "example.com");

        let by_value = store
            .find_entity(EntityType::Domain, "example.com")
            .expect("read")
            .expect("found");
        assert_eq!(by_value.id, entity.id);

        assert!(store
            .find_entity(EntityType::Domain, "missing.example")
            .expect("read")
            .is_none());
    }

    #[test]
    fn entity_upsert_merges_instead_of_replacing() {
        let store = store();
        store
            .upsert_entity(&sample_entity("example.com", "whois"))
            .expect("first");
        let merged = store
            .upsert_entity(&sample_entity("example.com", "ct-logs"))
            .expect("second");

        // Second source corroborates: two contributions, higher confidence.
        assert_eq!(merged.attributes["registrar"].len(), 2);
        assert!(merged.confidence.value() > 0.5);

        let count = store.list_entities(None).expect("list").len();
        assert_eq!(count, 1);
    }

    #[test]
    fn entities_with_attribute_filters_by_pair() {
        let store = store();
        let mut attrs = BTreeMap::new();
        attrs.insert("asn".to_string(), "AS15169".to_string());
        for ip in ["8.8.8.8", "8.8.4.4"] {
            store
                .upsert_entity(&Entity::from_observation(
                    EntityType::Ip,
                    ip.to_string(),
                    attrs.clone(),
                    "bgp-lookup",
                    Utc::now(),
                ))
                .expect("upsert");
        }
        store
            .upsert_entity(&Entity::from_observation(
                EntityType::Ip,
                "1.1.1.1".to_string(),
                BTreeMap::new(),
                "bgp-lookup",
                Utc::now(),
            ))
            .expect("upsert");

        let hits = store
            .entities_with_attribute(EntityType::Ip, "asn", "AS15169")
            .expect("query");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn list_entities_honors_type_allowlist() {
        let store = store();
        store
            .upsert_entity(&sample_entity("example.com", "whois"))
            .expect("upsert");
        store
            .upsert_entity(&Entity::from_observation(
                EntityType::Ip,
                "8.8.8.8".to_string(),
                BTreeMap::new(),
                "manual",
                Utc::now(),
            ))
            .expect("upsert");

        let only_ips = store
            .list_entities(Some(&[EntityType::Ip]))
            .expect("list");
        assert_eq!(only_ips.len(), 1);
        assert_eq!(only_ips[0].entity_type, EntityType::Ip);
    }

    #[test]
    fn relationship_upsert_deduplicates() {
        let store = store();
        let edge = Relationship::observed(
            "aaa".into(),
            "bbb".into(),
            RelationshipType::SameAsn,
            "bgp-lookup",
            Utc::now(),
        );

        store.upsert_relationship(&edge).expect("first");
        let merged = store.upsert_relationship(&edge).expect("second");

        assert_eq!(merged.evidence.len(), 2);
        assert_eq!(store.list_relationships().expect("list").len(), 1);
    }

    #[test]
    fn neighbors_sees_both_directions() {
        let store = store();
        store
            .upsert_relationship(&Relationship::observed(
                "aaa".into(),
                "bbb".into(),
                RelationshipType::Employs,
                "registry",
                Utc::now(),
            ))
            .expect("edge");

        assert_eq!(store.neighbors("aaa", None).expect("query").len(), 1);
        assert_eq!(store.neighbors("bbb", None).expect("query").len(), 1);
        assert!(store.neighbors("ccc", None).expect("query").is_empty());

        let filtered = store
            .neighbors("aaa", Some(&[RelationshipType::SameAsn]))
            .expect("query");
        assert!(filtered.is_empty());
    }

    #[test]
    fn rule_lifecycle() {
        let store = store();
        let mut rule = MonitorRule::new(
            "target".into(),
            crate::domain::entities::monitor_rule::MonitorCondition::CertChange,
            3600,
            vec![],
        );
        store.save_rule(&rule).expect("save");

        let loaded = store.get_rule(&rule.id).expect("get");
        assert_eq!(loaded.interval_seconds, 3600);

        rule.state = RuleState::Paused;
        rule.consecutive_failures = 2;
        store.save_rule(&rule).expect("update");

        let active = store.load_rules(Some(RuleState::Active)).expect("load");
        assert!(active.is_empty());
        let paused = store.load_rules(Some(RuleState::Paused)).expect("load");
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].consecutive_failures, 2);

        store.delete_rule(&rule.id).expect("delete");
        assert!(matches!(
            store.get_rule(&rule.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_rule(&rule.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn alert_delivery_state_updates() {
        let store = store();
        let alert = Alert::new(
            "rule-1".into(),
            Severity::High,
            "certificate fingerprint changed".into(),
            Utc::now(),
        );
        store.record_alert(&alert).expect("record");

        store
            .update_delivery_state(&alert.id, DeliveryState::Delivered)
            .expect("update");

        let recent = store.recent_alerts(10).expect("read");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].delivery_state, DeliveryState::Delivered);

        assert!(matches!(
            store.update_delivery_state("missing", DeliveryState::Failed),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn cache_put_get_clear() {
        let store = store();
        store
            .cache_put("crt.sh", "example.com", "[\"fp-aaa\"]")
            .expect("put");
        store
            .cache_put("crt.sh", "other.example", "[\"fp-bbb\"]")
            .expect("put");

        assert_eq!(
            store.cache_get("crt.sh", "example.com").expect("get"),
            Some("[\"fp-aaa\"]".to_string())
        );
        assert!(store.cache_get("dns", "example.com").expect("get").is_none());

        let removed = store.cache_clear().expect("clear");
        assert_eq!(removed, 2);
        assert!(store
            .cache_get("crt.sh", "example.com")
            .expect("get")
            .is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("argus.db");
        let path_str = path.to_string_lossy().to_string();

        {
            let store = SqliteStore::new(&path_str).expect("open");
            store
                .upsert_entity(&sample_entity("example.com", "whois"))
                .expect("upsert");
        }

        let reopened = SqliteStore::new(&path_str).expect("reopen");
        assert!(reopened
            .find_entity(EntityType::Domain, "example.com")
            .expect("read")
            .is_some());
    }

    #[test]
    fn cleanup_old_drops_stale_alerts() {
        let store = store();
        let stale = Alert::new(
            "rule-1".into(),
            Severity::Low,
            "old".into(),
            Utc::now() - chrono::TimeDelta::days(30),
        );
        let fresh = Alert::new("rule-1".into(), Severity::Low, "new".into(), Utc::now());
        store.record_alert(&stale).expect("record");
        store.record_alert(&fresh).expect("record");

        store.cleanup_old(24).expect("cleanup");

        let remaining = store.recent_alerts(10).expect("read");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }
}
