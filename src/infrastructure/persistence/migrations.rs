use rusqlite::Connection;

/// Initialize the database schema, creating tables if they don't exist.
///
/// Rows carry the full record as JSON in a `data` column; the typed columns
/// alongside exist for indexing and filtering only.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS entities (
            id              TEXT PRIMARY KEY,
            entity_type     TEXT NOT NULL,
            canonical_value TEXT NOT NULL,
            last_seen       TEXT NOT NULL,
            data            TEXT NOT NULL,
            UNIQUE(entity_type, canonical_value)
        );

        CREATE TABLE IF NOT EXISTS relationships (
            source_id   TEXT NOT NULL,
            target_id   TEXT NOT NULL,
            rel_type    TEXT NOT NULL,
            data        TEXT NOT NULL,
            PRIMARY KEY (source_id, target_id, rel_type)
        );

        CREATE TABLE IF NOT EXISTS rules (
            id          TEXT PRIMARY KEY,
            state       TEXT NOT NULL,
            data        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id              TEXT PRIMARY KEY,
            rule_id         TEXT NOT NULL,
            detected_at     TEXT NOT NULL,
            delivery_state  TEXT NOT NULL,
            data            TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lookup_cache (
            source      TEXT NOT NULL,
            target      TEXT NOT NULL,
            cached_at   TEXT NOT NULL,
            payload     TEXT NOT NULL,
            PRIMARY KEY (source, target)
        );

        CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);
        CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id);
        CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id);
        CREATE INDEX IF NOT EXISTS idx_rules_state ON rules(state);
        CREATE INDEX IF NOT EXISTS idx_alerts_detected_at ON alerts(detected_at);",
    )?;
    Ok(())
}
