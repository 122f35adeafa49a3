use std::io::Read;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use crate::application::services::ingest::IngestService;
use crate::domain::entities::observation::Observation;
use crate::domain::ports::store::{EntityStore, RelationshipStore};
use crate::presentation::cli::formatters::graph_fmt::print_section_header;

/// Reads a JSON array of observations from `file` ("-" for stdin) and merges
/// it into the graph.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the JSON is not an array of
/// observations, or a store write fails.
pub fn run_ingest(
    entity_store: &dyn EntityStore,
    relationship_store: &dyn RelationshipStore,
    file: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let content = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?
    };

    let observations: Vec<Observation> =
        serde_json::from_str(&content).context("input must be a JSON array of observations")?;

    let service = IngestService::new(entity_store, relationship_store);
    let report = service.ingest(&observations)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_section_header("📥 Ingest");
    println!(
        "  {} observation(s) accepted, {} relationship(s) recorded",
        report.accepted.to_string().bold(),
        report.relationships
    );
    if !report.rejected.is_empty() {
        println!(
            "  {} observation(s) rejected:",
            report.rejected.len().to_string().yellow().bold()
        );
        for rejected in &report.rejected {
            println!("    #{}: {}", rejected.index, rejected.reason);
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;
    use colored::control;
    use std::io::Write;

    fn disable_colors() {
        control::set_override(false);
    }

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn ingest_valid_batch() {
        disable_colors();
        let store = InMemoryStore::new();
        let file = write_temp(
            r#"[{
                "entity_type": "domain",
                "raw_value": "Example.COM",
                "source": "manual",
                "observed_at": "2025-06-01T12:00:00Z"
            }]"#,
        );

        let result = run_ingest(&store, &store, file.path(), false);
        assert!(result.is_ok());
        assert_eq!(store.list_entities(None).expect("list").len(), 1);
    }

    #[test]
    fn ingest_rejects_bad_records_without_failing() {
        disable_colors();
        let store = InMemoryStore::new();
        let file = write_temp(
            r#"[
                {"entity_type": "ip", "raw_value": "not-an-ip",
                 "source": "manual", "observed_at": "2025-06-01T12:00:00Z"},
                {"entity_type": "ip", "raw_value": "8.8.8.8",
                 "source": "manual", "observed_at": "2025-06-01T12:00:00Z"}
            ]"#,
        );

        let result = run_ingest(&store, &store, file.path(), true);
        assert!(result.is_ok());
        assert_eq!(store.list_entities(None).expect("list").len(), 1);
    }

    #[test]
    fn ingest_non_array_input_errors() {
        disable_colors();
        let store = InMemoryStore::new();
        let file = write_temp(r#"{"not": "an array"}"#);

        let result = run_ingest(&store, &store, file.path(), false);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_missing_file_errors() {
        disable_colors();
        let store = InMemoryStore::new();
        let result = run_ingest(&store, &store, Path::new("/nonexistent/obs.json"), false);
        assert!(result.is_err());
    }
}
