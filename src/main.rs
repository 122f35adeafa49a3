use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use argus::application::config::AppConfig;
use argus::application::services::dispatch::{AlertDispatcher, DispatchPolicy};
use argus::application::services::scheduler::{CollectorSet, MonitorScheduler, SchedulerSettings};
use argus::domain::entities::monitor_rule::MonitorCondition;
use argus::domain::ports::sink::AlertSink;
use argus::infrastructure::collectors::{
    CertCollector, DnsCollector, GraphCollector, LeakCollector,
};
use argus::infrastructure::persistence::sqlite_store::SqliteStore;
use argus::infrastructure::sinks::terminal::TerminalSink;
use argus::infrastructure::sinks::webhook::WebhookSink;
use argus::presentation::cli::app::{Cli, Commands, MonitorAction};
use argus::presentation::cli::commands::clear_cache::run_clear_cache;
use argus::presentation::cli::commands::correlate::run_correlate;
use argus::presentation::cli::commands::daemon::run_daemon;
use argus::presentation::cli::commands::export::run_export;
use argus::presentation::cli::commands::ingest::run_ingest;
use argus::presentation::cli::commands::monitor::{
    run_monitor_add, run_monitor_resume, run_monitor_status, run_monitor_stop,
};

fn print_banner() {
    println!("{}", "━".repeat(44).cyan());
    println!("{}", "  ARGUS — OSINT Correlation Engine".bold().cyan());
    println!("{}", "━".repeat(44).cyan());
}

fn setup_tracing(config: &AppConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(config.general.log_filter.clone())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(&config.database.path)?;
    if let Err(e) = store.cleanup_old(config.database.retention_hours) {
        tracing::warn!("Failed to purge stale records: {e}");
    }
    Ok(store)
}

fn build_collectors(
    config: &AppConfig,
    store: &Arc<SqliteStore>,
) -> anyhow::Result<CollectorSet> {
    let probe_timeout = Duration::from_secs(config.monitoring.collector_timeout_secs);
    Ok(CollectorSet::new()
        .with(
            MonitorCondition::CertChange,
            Arc::new(CertCollector::new(probe_timeout, store.clone())?),
        )
        .with(MonitorCondition::DnsChange, Arc::new(DnsCollector::new()))
        .with(
            MonitorCondition::NewRelationship,
            Arc::new(GraphCollector::new(store.clone())),
        )
        .with(
            MonitorCondition::LeakKeywordMatch,
            Arc::new(LeakCollector::new(probe_timeout)?),
        ))
}

fn build_sink(config: &AppConfig) -> anyhow::Result<Arc<dyn AlertSink>> {
    match config.dispatch.webhook_url {
        Some(ref url) => Ok(Arc::new(WebhookSink::new(
            url.clone(),
            Duration::from_secs(config.dispatch.timeout_secs),
        )?)),
        None => {
            tracing::info!("No webhook configured, alerts go to the terminal");
            Ok(Arc::new(TerminalSink::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        AppConfig::load_from(path)?
    } else {
        AppConfig::load()?
    };

    setup_tracing(&config, cli.verbose);

    // Manual DI — main.rs is the only place that knows concrete types
    match cli.command {
        Some(Commands::Ingest { file, json }) => {
            let store = open_store(&config)?;
            run_ingest(&store, &store, &file, json)?;
        }
        Some(Commands::Correlate {
            entity_type,
            value,
            depth,
            json,
        }) => {
            let store = open_store(&config)?;
            let depth = depth.unwrap_or(config.correlation.default_max_depth);
            run_correlate(&store, &store, &entity_type, &value, depth, json)?;
        }
        Some(Commands::Monitor { action }) => {
            let store = open_store(&config)?;
            match action {
                MonitorAction::Add {
                    entity_type,
                    value,
                    condition,
                    interval,
                    keywords,
                } => run_monitor_add(
                    &store,
                    &store,
                    config.monitoring.min_rule_interval_secs,
                    &entity_type,
                    &value,
                    &condition,
                    interval,
                    keywords,
                )?,
                MonitorAction::Stop { rule_id, purge } => {
                    run_monitor_stop(&store, &store, &rule_id, purge)?;
                }
                MonitorAction::Resume { rule_id } => {
                    run_monitor_resume(&store, &store, &rule_id)?;
                }
                MonitorAction::Status { json } => run_monitor_status(&store, &store, json)?,
            }
        }
        Some(Commands::Export {
            format,
            types,
            output,
        }) => {
            let store = open_store(&config)?;
            run_export(&store, &store, &format, &types, output.as_deref())?;
        }
        Some(Commands::ClearCache) => {
            let store = open_store(&config)?;
            run_clear_cache(&store)?;
        }
        Some(Commands::Daemon) | None => {
            let store = Arc::new(open_store(&config)?);
            print_banner();
            tracing::info!("Database: {}", config.database_path().display());

            let collectors = Arc::new(build_collectors(&config, &store)?);
            let sink = build_sink(&config)?;

            let (alerts_tx, alerts_rx) = tokio::sync::mpsc::channel(64);
            let settings = SchedulerSettings {
                failure_budget: config.monitoring.failure_budget,
                collector_timeout: Duration::from_secs(config.monitoring.collector_timeout_secs),
                max_inflight_per_source: config.monitoring.max_inflight_per_source,
                reconcile_interval: Duration::from_secs(config.monitoring.reconcile_interval_secs),
            };
            let scheduler = MonitorScheduler::new(store.clone(), collectors, alerts_tx, settings);

            let policy = DispatchPolicy {
                max_attempts: config.dispatch.max_attempts,
                backoff_base: Duration::from_secs(config.dispatch.backoff_base_secs),
            };
            let dispatcher = AlertDispatcher::new(sink, store, policy);

            run_daemon(scheduler, dispatcher, alerts_rx).await?;
        }
    }

    Ok(())
}
