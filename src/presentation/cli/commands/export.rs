use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use crate::application::services::export::{ExportFormat, ExportService};
use crate::domain::entities::entity::EntityType;
use crate::domain::ports::store::{EntityStore, RelationshipStore};

/// Serializes the graph (optionally restricted to `types`) to a file or
/// stdout.
///
/// # Errors
///
/// Returns an error on an unknown format or entity type, a store failure, or
/// a failed file write.
pub fn run_export(
    entity_store: &dyn EntityStore,
    relationship_store: &dyn RelationshipStore,
    format: &str,
    types: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let format =
        ExportFormat::parse(format).with_context(|| format!("unknown export format '{format}'"))?;

    let type_filter = if types.is_empty() {
        None
    } else {
        let parsed = types
            .iter()
            .map(|t| {
                EntityType::parse(t).with_context(|| format!("unknown entity type '{t}'"))
            })
            .collect::<anyhow::Result<Vec<EntityType>>>()?;
        Some(parsed)
    };

    let service = ExportService::new(entity_store, relationship_store);
    let document = service.export(format, type_filter.as_deref())?;

    match output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "{} graph written to {} ({} bytes)",
                "✓".green().bold(),
                path.display(),
                document.len()
            );
        }
        None => println!("{document}"),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::entities::entity::Entity;
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;
    use chrono::Utc;
    use colored::control;
    use std::collections::BTreeMap;

    fn disable_colors() {
        control::set_override(false);
    }

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let entity = Entity::from_observation(
            EntityType::Domain,
            "example.com".to_string(),
            BTreeMap::new(),
            "manual",
            Utc::now(),
        );
        store.upsert_entity(&entity).expect("seed");
        store
    }

    #[test]
    fn export_json_to_stdout() {
        disable_colors();
        let store = seeded_store();
        assert!(run_export(&store, &store, "json", &[], None).is_ok());
    }

    #[test]
    fn export_to_file_writes_document() {
        disable_colors();
        let store = seeded_store();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("graph.gexf");

        run_export(&store, &store, "gexf", &[], Some(&path)).expect("export");
        let written = std::fs::read_to_string(&path).expect("read back");
        assert!(written.contains("example.com"));
    }

    #[test]
    fn export_unknown_format_errors() {
        disable_colors();
        let store = seeded_store();
        assert!(run_export(&store, &store, "dot", &[], None).is_err());
    }

    #[test]
    fn export_unknown_type_filter_errors() {
        disable_colors();
        let store = seeded_store();
        let types = vec!["planet".to_string()];
        assert!(run_export(&store, &store, "json", &types, None).is_err());
    }
}
