use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// argus — OSINT correlation and monitoring engine
///
/// Ingests observations from open sources, builds an entity graph, and
/// watches targets for changes worth alerting on.
#[derive(Parser, Debug)]
#[command(name = "argus")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a JSON array of observations from a file, or stdin with "-"
    #[command(alias = "i")]
    Ingest {
        /// File to read ("-" for stdin)
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List entities correlated with a subject, strongest first
    #[command(alias = "c")]
    Correlate {
        /// Entity type of the subject (domain, ip, email, ...)
        entity_type: String,

        /// Subject value
        value: String,

        /// Traversal depth override (default: config)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage monitor rules
    #[command(alias = "m")]
    Monitor {
        #[command(subcommand)]
        action: MonitorAction,
    },

    /// Export the graph
    #[command(alias = "e")]
    Export {
        /// Output format: json, gexf, or graphml
        #[arg(long, default_value = "json")]
        format: String,

        /// Restrict to these entity types (comma separated)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Drop all cached source lookups
    ClearCache,

    /// Run the monitoring daemon
    #[command(alias = "d")]
    Daemon,
}

/// Monitor rule management
#[derive(Subcommand, Debug)]
pub enum MonitorAction {
    /// Create a rule watching an entity
    Add {
        /// Entity type of the target
        entity_type: String,

        /// Target value
        value: String,

        /// Condition: cert_change, dns_change, new_relationship,
        /// leak_keyword_match
        #[arg(long)]
        condition: String,

        /// Probe interval in seconds
        #[arg(long, default_value = "300")]
        interval: u64,

        /// Keywords for leak rules (comma separated)
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
    },

    /// Pause a rule, or delete it with --purge
    Stop {
        /// Rule identifier
        rule_id: String,

        /// Delete the rule instead of pausing it
        #[arg(long)]
        purge: bool,
    },

    /// Reactivate a paused or failed rule
    Resume {
        /// Rule identifier
        rule_id: String,
    },

    /// List all rules and their states
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
