use colored::{ColoredString, Colorize};

use crate::domain::value_objects::severity::Severity;

pub fn print_section_header(title: &str) {
    println!("{}", title.bold().cyan());
    let display_width = title.chars().count();
    println!("{}", "─".repeat(display_width).cyan());
}

#[must_use]
pub fn severity_badge(severity: Severity) -> String {
    let label = format!(" {severity} ");
    match severity {
        Severity::High => format!("{}", label.on_red().white().bold()),
        Severity::Medium => format!("{}", label.on_yellow().black()),
        Severity::Low => format!("{}", label.on_blue().white()),
    }
}

#[must_use]
pub fn colorize_confidence(value: f64) -> ColoredString {
    let text = format!("{value:.2}");
    if value >= 0.8 {
        text.green().bold()
    } else if value >= 0.5 {
        text.yellow()
    } else {
        text.dimmed()
    }
}

/// Strips escape characters so stored values cannot inject terminal control
/// sequences.
#[must_use]
pub fn sanitize_terminal(input: &str) -> String {
    input.chars().filter(|c| *c != '\x1b').collect()
}
