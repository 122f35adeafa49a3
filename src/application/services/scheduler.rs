use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::MissedTickBehavior;

use crate::application::error::ServiceError;
use crate::application::services::dispatch::AlertEnvelope;
use crate::application::services::ingest::IngestService;
use crate::domain::entities::alert::Alert;
use crate::domain::entities::entity::EntityType;
use crate::domain::entities::monitor_rule::{MonitorCondition, MonitorRule, RuleState};
use crate::domain::normalizer::canonical_value;
use crate::domain::ports::collector::Collector;
use crate::domain::ports::store::{EntityStore, GraphStore, RuleStore, StoreError};

/// Scheduler tuning knobs, taken from the monitoring config section.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub failure_budget: u32,
    pub collector_timeout: Duration,
    pub max_inflight_per_source: usize,
    pub reconcile_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            failure_budget: 5,
            collector_timeout: Duration::from_secs(10),
            max_inflight_per_source: 4,
            reconcile_interval: Duration::from_secs(30),
        }
    }
}

/// Condition-to-collector dispatch table.
#[derive(Default)]
pub struct CollectorSet {
    inner: HashMap<MonitorCondition, Arc<dyn Collector>>,
}

impl CollectorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, condition: MonitorCondition, collector: Arc<dyn Collector>) -> Self {
        self.inner.insert(condition, collector);
        self
    }

    #[must_use]
    pub fn get(&self, condition: MonitorCondition) -> Option<Arc<dyn Collector>> {
        self.inner.get(&condition).cloned()
    }
}

/// Caps concurrent probes per source name.
pub struct SourceLimiter {
    max_inflight: usize,
    semaphores: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
}

impl SourceLimiter {
    #[must_use]
    pub fn new(max_inflight: usize) -> Self {
        Self {
            max_inflight: max_inflight.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore(&self, source: &'static str) -> Arc<Semaphore> {
        let mut map = match self.semaphores.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(source)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_inflight)))
            .clone()
    }

    /// Wait for a probe slot against `source`.
    pub async fn acquire(&self, source: &'static str) -> tokio::sync::OwnedSemaphorePermit {
        let semaphore = self.semaphore(source);
        // The semaphore is never closed.
        loop {
            match semaphore.clone().acquire_owned().await {
                Ok(permit) => return permit,
                Err(_) => tokio::task::yield_now().await,
            }
        }
    }
}

/// Stable hash over a probe's digest basis, compared across ticks to detect
/// change.
#[must_use]
pub fn result_digest(basis: &str) -> String {
    hex::encode(Sha256::digest(basis.as_bytes()))
}

/// Rule administration: create, pause, resume, delete, list.
pub struct MonitorAdmin<'a> {
    entity_store: &'a dyn EntityStore,
    rule_store: &'a dyn RuleStore,
    min_interval_secs: u64,
}

impl<'a> MonitorAdmin<'a> {
    #[must_use]
    pub const fn new(
        entity_store: &'a dyn EntityStore,
        rule_store: &'a dyn RuleStore,
        min_interval_secs: u64,
    ) -> Self {
        Self {
            entity_store,
            rule_store,
            min_interval_secs,
        }
    }

    /// Create and persist a new active rule watching `(entity_type, value)`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` when the target is not in the graph, the
    /// interval is below the configured floor, or the write fails.
    pub fn start(
        &self,
        entity_type: EntityType,
        raw_value: &str,
        condition: MonitorCondition,
        interval_seconds: u64,
        keywords: Vec<String>,
    ) -> Result<MonitorRule, ServiceError> {
        if interval_seconds < self.min_interval_secs {
            return Err(ServiceError::InvalidRule(format!(
                "interval {interval_seconds}s is below the {}s floor",
                self.min_interval_secs
            )));
        }
        if condition == MonitorCondition::LeakKeywordMatch && keywords.is_empty() {
            return Err(ServiceError::InvalidRule(
                "leak_keyword_match rules need at least one keyword".into(),
            ));
        }

        let value = canonical_value(entity_type, raw_value)?;
        let target = self
            .entity_store
            .find_entity(entity_type, &value)?
            .ok_or_else(|| ServiceError::EntityNotFound(format!("{entity_type}:{value}")))?;

        let rule = MonitorRule::new(target.id, condition, interval_seconds, keywords);
        self.rule_store.save_rule(&rule)?;
        tracing::info!(
            "Rule {} created: {} on {entity_type}:{value} every {interval_seconds}s",
            rule.id,
            condition
        );
        Ok(rule)
    }

    /// Pause a rule, or delete it entirely when `purge` is set. A paused
    /// rule's task stops at its next tick boundary. A failed rule cannot be
    /// paused (pausing would erase the failed marker); resume or purge it.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RuleNotFound` for an unknown id,
    /// `ServiceError::RuleFailed` when pausing a rule in the failed state,
    /// or a storage error.
    pub fn stop(&self, rule_id: &str, purge: bool) -> Result<(), ServiceError> {
        if purge {
            return self
                .rule_store
                .delete_rule(rule_id)
                .map_err(|e| not_found_as_rule(e, rule_id));
        }
        let mut rule = self
            .rule_store
            .get_rule(rule_id)
            .map_err(|e| not_found_as_rule(e, rule_id))?;
        if rule.state == RuleState::Failed {
            return Err(ServiceError::RuleFailed(rule_id.to_string()));
        }
        rule.state = RuleState::Paused;
        self.rule_store.save_rule(&rule)?;
        tracing::info!("Rule {rule_id} paused");
        Ok(())
    }

    /// Reactivate a paused or failed rule, resetting its failure counter.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RuleNotFound` for an unknown id, or a storage
    /// error.
    pub fn resume(&self, rule_id: &str) -> Result<(), ServiceError> {
        let mut rule = self
            .rule_store
            .get_rule(rule_id)
            .map_err(|e| not_found_as_rule(e, rule_id))?;
        rule.state = RuleState::Active;
        rule.consecutive_failures = 0;
        self.rule_store.save_rule(&rule)?;
        tracing::info!("Rule {rule_id} resumed");
        Ok(())
    }

    /// All rules, regardless of state.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn status(&self) -> Result<Vec<MonitorRule>, ServiceError> {
        Ok(self.rule_store.load_rules(None)?)
    }
}

fn not_found_as_rule(e: StoreError, rule_id: &str) -> ServiceError {
    match e {
        StoreError::NotFound(_) => ServiceError::RuleNotFound(rule_id.to_string()),
        other => ServiceError::Store(other),
    }
}

struct RuleHandle {
    stop: watch::Sender<bool>,
}

/// Runs one tokio task per active rule and reconciles the task set with the
/// rule store.
///
/// A rule's ticks never overlap: each task probes inline on its own interval
/// with skipped (never queued) missed ticks. Stop requests take effect at
/// the next tick boundary; an in-flight probe always completes.
pub struct MonitorScheduler<S: GraphStore + 'static> {
    store: Arc<S>,
    collectors: Arc<CollectorSet>,
    limiter: Arc<SourceLimiter>,
    alerts: mpsc::Sender<AlertEnvelope>,
    settings: SchedulerSettings,
    tasks: Mutex<HashMap<String, RuleHandle>>,
}

impl<S: GraphStore + 'static> MonitorScheduler<S> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        collectors: Arc<CollectorSet>,
        alerts: mpsc::Sender<AlertEnvelope>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            collectors,
            limiter: Arc::new(SourceLimiter::new(settings.max_inflight_per_source)),
            alerts,
            settings,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile until `shutdown` fires, then stop every rule task.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.reconcile_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.reconcile() {
                        tracing::warn!("Rule reconciliation failed: {e}");
                    }
                }
            }
        }

        self.stop_all();
        tracing::info!("Scheduler stopped");
    }

    /// Align running tasks with the active rules in the store: spawn tasks
    /// for new rules, signal stop for rules no longer active.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rule set cannot be read.
    pub fn reconcile(&self) -> Result<(), ServiceError> {
        let active: HashMap<String, MonitorRule> = self
            .store
            .load_rules(Some(RuleState::Active))?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        tasks.retain(|rule_id, handle| {
            if active.contains_key(rule_id) {
                return true;
            }
            tracing::debug!("Stopping task for rule {rule_id}");
            let _ = handle.stop.send(true);
            false
        });

        for (rule_id, rule) in active {
            if tasks.contains_key(&rule_id) {
                continue;
            }
            let Some(collector) = self.collectors.get(rule.condition) else {
                tracing::warn!("No collector registered for {}, skipping", rule.condition);
                continue;
            };
            let (stop_tx, stop_rx) = watch::channel(false);
            let worker = RuleWorker {
                store: self.store.clone(),
                collector,
                limiter: self.limiter.clone(),
                alerts: self.alerts.clone(),
                failure_budget: self.settings.failure_budget,
                collector_timeout: self.settings.collector_timeout,
            };
            tracing::info!("Starting task for rule {rule_id} ({})", rule.condition);
            tokio::spawn(worker.run(rule, stop_rx));
            tasks.insert(rule_id, RuleHandle { stop: stop_tx });
        }

        Ok(())
    }

    fn stop_all(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (rule_id, handle) in tasks.drain() {
            tracing::debug!("Stopping task for rule {rule_id}");
            let _ = handle.stop.send(true);
        }
    }

    /// Number of rule tasks currently running.
    #[must_use]
    pub fn running_tasks(&self) -> usize {
        match self.tasks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// One rule's probe loop.
struct RuleWorker<S: GraphStore + 'static> {
    store: Arc<S>,
    collector: Arc<dyn Collector>,
    limiter: Arc<SourceLimiter>,
    alerts: mpsc::Sender<AlertEnvelope>,
    failure_budget: u32,
    collector_timeout: Duration,
}

impl<S: GraphStore + 'static> RuleWorker<S> {
    async fn run(self, mut rule: MonitorRule, mut stop: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(rule.interval_seconds.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; that run establishes
        // the baseline hash.
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = interval.tick() => {
                    if !self.tick(&mut rule).await {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Task for rule {} exited", rule.id);
    }

    /// One probe cycle. Returns `false` when the rule leaves the active
    /// state and the task must end.
    async fn tick(&self, rule: &mut MonitorRule) -> bool {
        let outcome = self.probe(rule).await;
        rule.last_run_at = Some(Utc::now());

        match outcome {
            Ok(digest_and_alert) => {
                rule.consecutive_failures = 0;
                let (digest, alert) = digest_and_alert;
                rule.last_result_hash = Some(digest);
                if let Some(envelope) = alert {
                    if let Err(e) = self.store.record_alert(&envelope.alert) {
                        tracing::warn!("Failed to record alert: {e}");
                    }
                    if self.alerts.send(envelope).await.is_err() {
                        tracing::warn!("Alert channel closed, dropping alert");
                    }
                }
            }
            Err(e) => {
                rule.consecutive_failures += 1;
                tracing::warn!(
                    "Rule {} probe failed ({}/{}): {e}",
                    rule.id,
                    rule.consecutive_failures,
                    self.failure_budget
                );
                if rule.consecutive_failures >= self.failure_budget {
                    rule.state = RuleState::Failed;
                    tracing::warn!("Rule {} marked failed, stopping its task", rule.id);
                }
            }
        }

        if let Err(e) = self.store.save_rule(rule) {
            tracing::warn!("Failed to persist rule {}: {e}", rule.id);
        }
        rule.state == RuleState::Active
    }

    /// Probe the target and compare against the previous digest. Returns the
    /// new digest and, when the reading changed, a pending alert envelope.
    async fn probe(
        &self,
        rule: &MonitorRule,
    ) -> Result<(String, Option<AlertEnvelope>), ServiceError> {
        let target = self
            .store
            .get_entity(&rule.target_entity_id)?
            .ok_or_else(|| ServiceError::EntityNotFound(rule.target_entity_id.clone()))?;

        let permit = self.limiter.acquire(self.collector.source()).await;
        let probe = tokio::time::timeout(
            self.collector_timeout,
            self.collector.probe(rule, &target),
        )
        .await
        .map_err(|_| crate::domain::ports::collector::CollectError::Timeout)??;
        drop(permit);

        // Monitoring feeds the graph: probe observations go through the same
        // ingestion path as external batches.
        let ingest = IngestService::new(&*self.store, &*self.store);
        if let Err(e) = ingest.ingest(&probe.observations) {
            tracing::warn!("Failed to ingest probe observations: {e}");
        }

        let digest = result_digest(&probe.digest_basis);
        let changed = rule
            .last_result_hash
            .as_deref()
            .is_some_and(|previous| previous != digest);

        let envelope = changed.then(|| {
            let alert = Alert::new(
                rule.id.clone(),
                rule.condition.severity(),
                format!(
                    "{} on {}:{}: {}",
                    rule.condition, target.entity_type, target.canonical_value, probe.summary
                ),
                Utc::now(),
            );
            AlertEnvelope {
                alert,
                target: target.clone(),
            }
        });

        Ok((digest, envelope))
    }
}
