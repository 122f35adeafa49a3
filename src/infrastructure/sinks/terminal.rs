use async_trait::async_trait;
use colored::Colorize;

use crate::domain::entities::alert::Alert;
use crate::domain::entities::entity::Entity;
use crate::domain::ports::sink::{AlertSink, DeliveryError};
use crate::domain::value_objects::severity::Severity;

/// Prints alerts to the terminal. Used when no webhook is configured.
#[derive(Default)]
pub struct TerminalSink;

impl TerminalSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn severity_badge(severity: Severity) -> String {
    let label = format!(" {severity} ");
    match severity {
        Severity::High => format!("{}", label.on_red().white().bold()),
        Severity::Medium => format!("{}", label.on_yellow().black()),
        Severity::Low => format!("{}", label.on_blue().white()),
    }
}

/// Strips escape characters so stored values cannot inject terminal control
/// sequences.
fn sanitize_terminal(input: &str) -> String {
    input.chars().filter(|c| *c != '\x1b').collect()
}

#[async_trait]
impl AlertSink for TerminalSink {
    async fn deliver(&self, alert: &Alert, target: &Entity) -> Result<(), DeliveryError> {
        println!(
            "{} {} {}:{} — {}",
            severity_badge(alert.severity),
            alert.detected_at.format("%d/%m %H:%M").to_string().dimmed(),
            target.entity_type,
            sanitize_terminal(&target.canonical_value).bold(),
            sanitize_terminal(&alert.message)
        );
        Ok(())
    }
}
