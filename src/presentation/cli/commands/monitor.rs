use anyhow::Context;
use colored::Colorize;

use crate::application::services::scheduler::MonitorAdmin;
use crate::domain::entities::entity::EntityType;
use crate::domain::entities::monitor_rule::{MonitorCondition, MonitorRule, RuleState};
use crate::domain::ports::store::{EntityStore, RuleStore};
use crate::presentation::cli::formatters::graph_fmt::print_section_header;

/// Creates a rule watching `(entity_type, value)` for `condition`.
///
/// # Errors
///
/// Returns an error on unknown types or conditions, an interval below the
/// configured floor, a leak rule without keywords, a target entity not yet in
/// the graph, or a store failure.
pub fn run_monitor_add(
    entity_store: &dyn EntityStore,
    rule_store: &dyn RuleStore,
    min_interval_secs: u64,
    entity_type: &str,
    value: &str,
    condition: &str,
    interval: u64,
    keywords: Vec<String>,
) -> anyhow::Result<()> {
    let entity_type = EntityType::parse(entity_type)
        .with_context(|| format!("unknown entity type '{entity_type}'"))?;
    let condition = MonitorCondition::parse(condition)
        .with_context(|| format!("unknown condition '{condition}'"))?;

    let admin = MonitorAdmin::new(entity_store, rule_store, min_interval_secs);
    let rule = admin.start(entity_type, value, condition, interval, keywords)?;

    println!(
        "{} rule {} created ({} every {}s)",
        "✓".green().bold(),
        rule.id.bold(),
        rule.condition,
        rule.interval_seconds
    );
    Ok(())
}

/// Pauses a rule, or deletes it when `purge` is set.
///
/// # Errors
///
/// Returns an error if the rule does not exist, the rule is in the failed
/// state (resume or purge it instead), or the store fails.
pub fn run_monitor_stop(
    entity_store: &dyn EntityStore,
    rule_store: &dyn RuleStore,
    rule_id: &str,
    purge: bool,
) -> anyhow::Result<()> {
    let admin = MonitorAdmin::new(entity_store, rule_store, 0);
    admin.stop(rule_id, purge)?;
    if purge {
        println!("{} rule {} deleted", "✓".green().bold(), rule_id.bold());
    } else {
        println!("{} rule {} paused", "✓".green().bold(), rule_id.bold());
    }
    Ok(())
}

/// Reactivates a paused or failed rule and resets its failure count.
///
/// # Errors
///
/// Returns an error if the rule does not exist or the store fails.
pub fn run_monitor_resume(
    entity_store: &dyn EntityStore,
    rule_store: &dyn RuleStore,
    rule_id: &str,
) -> anyhow::Result<()> {
    let admin = MonitorAdmin::new(entity_store, rule_store, 0);
    admin.resume(rule_id)?;
    println!("{} rule {} active", "✓".green().bold(), rule_id.bold());
    Ok(())
}

/// Lists all rules with their state and last run.
///
/// # Errors
///
/// Returns an error if the store fails or JSON serialization fails.
pub fn run_monitor_status(
    entity_store: &dyn EntityStore,
    rule_store: &dyn RuleStore,
    json: bool,
) -> anyhow::Result<()> {
    let admin = MonitorAdmin::new(entity_store, rule_store, 0);
    let rules = admin.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    print_section_header("👁 Monitor rules");
    if rules.is_empty() {
        println!("{}", "No rules configured".dimmed());
        return Ok(());
    }

    println!(
        "  {:<14} {:<22} {:<10} {:<10} {}",
        "Rule".dimmed(),
        "Condition".dimmed(),
        "Interval".dimmed(),
        "State".dimmed(),
        "Last run".dimmed()
    );
    println!("  {}", "─".repeat(72).dimmed());
    for rule in &rules {
        println!(
            "  {:<14} {:<22} {:<10} {:<10} {}",
            rule.id,
            rule.condition.to_string(),
            format!("{}s", rule.interval_seconds),
            state_label(rule),
            rule.last_run_at
                .map_or_else(|| "never".to_string(), |t| t.format("%d/%m %H:%M").to_string())
        );
    }
    Ok(())
}

fn state_label(rule: &MonitorRule) -> String {
    match rule.state {
        RuleState::Active => format!("{}", "active".green()),
        RuleState::Paused => format!("{}", "paused".yellow()),
        RuleState::Failed => format!("{}", "failed".red().bold()),
    }
}
