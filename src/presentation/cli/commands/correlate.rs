use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use crate::application::services::correlate::{Correlation, CorrelationService};
use crate::domain::entities::entity::EntityType;
use crate::domain::normalizer;
use crate::domain::ports::store::{EntityStore, RelationshipStore};
use crate::presentation::cli::formatters::graph_fmt::{
    colorize_confidence, print_section_header, sanitize_terminal,
};

/// Lists entities correlated with a subject, strongest first.
///
/// # Errors
///
/// Returns an error on an unknown entity type, a value that cannot be
/// canonicalized, a subject not present in the graph, or a store failure.
pub fn run_correlate(
    entity_store: &dyn EntityStore,
    relationship_store: &dyn RelationshipStore,
    entity_type: &str,
    value: &str,
    max_depth: usize,
    json: bool,
) -> anyhow::Result<()> {
    let entity_type = EntityType::parse(entity_type)
        .with_context(|| format!("unknown entity type '{entity_type}'"))?;
    let canonical = normalizer::canonical_value(entity_type, value)?;

    let service = CorrelationService::new(entity_store, relationship_store);
    let correlations = service.correlate(entity_type, &canonical, max_depth)?;

    if json {
        print_correlations_json(&canonical, &correlations)?;
    } else {
        print_correlations_human(entity_type, &canonical, &correlations);
    }

    Ok(())
}

fn print_correlations_json(subject: &str, correlations: &[Correlation]) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = correlations
        .iter()
        .map(|c| {
            json!({
                "entity_type": c.entity.entity_type,
                "value": c.entity.canonical_value,
                "confidence": c.path.confidence(),
                "hops": c.path.hops(),
                "path": c.path.steps,
            })
        })
        .collect();
    let output = json!({ "subject": subject, "correlations": items });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_correlations_human(
    entity_type: EntityType,
    subject: &str,
    correlations: &[Correlation],
) {
    print_section_header(&format!("🔗 Correlations for {entity_type}:{subject}"));

    if correlations.is_empty() {
        println!("{}", "No correlated entities within depth bound".dimmed());
        return;
    }

    println!(
        "  {:<12} {:<30} {:<6} {}",
        "Type".dimmed(),
        "Value".dimmed(),
        "Hops".dimmed(),
        "Confidence".dimmed()
    );
    println!("  {}", "─".repeat(60).dimmed());
    for c in correlations {
        println!(
            "  {:<12} {:<30} {:<6} {}",
            c.entity.entity_type.to_string(),
            sanitize_terminal(&c.entity.canonical_value),
            c.path.hops(),
            colorize_confidence(c.path.confidence())
        );
    }
}
