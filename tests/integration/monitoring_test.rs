#![allow(clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use argus::application::services::dispatch::{AlertDispatcher, DispatchPolicy};
use argus::application::services::scheduler::{
    CollectorSet, MonitorAdmin, MonitorScheduler, SchedulerSettings,
};
use argus::domain::entities::alert::{Alert, DeliveryState};
use argus::domain::entities::entity::{Entity, EntityType};
use argus::domain::entities::monitor_rule::{MonitorCondition, MonitorRule, RuleState};
use argus::domain::ports::collector::{CollectError, Collector, Probe};
use argus::domain::ports::sink::{AlertSink, DeliveryError};
use argus::domain::ports::store::{AlertStore, EntityStore, RuleStore};
use argus::domain::value_objects::severity::Severity;
use argus::infrastructure::persistence::in_memory_store::InMemoryStore;

struct ScriptedCollector {
    readings: Vec<&'static str>,
    cursor: AtomicUsize,
}

impl ScriptedCollector {
    fn new(readings: Vec<&'static str>) -> Self {
        Self {
            readings,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    fn source(&self) -> &'static str {
        "scripted"
    }

    async fn probe(&self, _rule: &MonitorRule, _target: &Entity) -> Result<Probe, CollectError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let reading = self
            .readings
            .get(index)
            .or_else(|| self.readings.last())
            .copied()
            .unwrap_or("");
        Ok(Probe {
            digest_basis: reading.to_string(),
            summary: format!("reading {reading}"),
            observations: Vec::new(),
        })
    }
}

struct TrackingSink {
    delivered: Mutex<Vec<Alert>>,
}

impl TrackingSink {
    const fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AlertSink for TrackingSink {
    async fn deliver(&self, alert: &Alert, _target: &Entity) -> Result<(), DeliveryError> {
        self.delivered.lock().expect("lock").push(alert.clone());
        Ok(())
    }
}

fn seed_domain(store: &InMemoryStore) -> Entity {
    let entity = Entity::from_observation(
        EntityType::Domain,
        "example.com".to_string(),
        BTreeMap::new(),
        "manual",
        Utc::now(),
    );
    store.upsert_entity(&entity).expect("seed")
}

fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        failure_budget: 3,
        collector_timeout: Duration::from_secs(5),
        max_inflight_per_source: 4,
        reconcile_interval: Duration::from_secs(1),
    }
}

#[tokio::test(start_paused = true)]
async fn change_is_detected_once_and_delivered() {
    let store = Arc::new(InMemoryStore::new());
    seed_domain(&store);

    let admin = MonitorAdmin::new(&*store, &*store, 30);
    admin
        .start(
            EntityType::Domain,
            "example.com",
            MonitorCondition::CertChange,
            60,
            Vec::new(),
        )
        .expect("rule");

    let collectors = Arc::new(CollectorSet::new().with(
        MonitorCondition::CertChange,
        Arc::new(ScriptedCollector::new(vec!["serial-a", "serial-a", "serial-b"])),
    ));
    let (alerts_tx, alerts_rx) = tokio::sync::mpsc::channel(16);
    let scheduler =
        MonitorScheduler::new(store.clone(), collectors, alerts_tx, fast_settings());

    let sink = Arc::new(TrackingSink::new());
    let dispatcher = AlertDispatcher::new(sink.clone(), store.clone(), DispatchPolicy::default());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });
    let dispatch_task = tokio::spawn(async move { dispatcher.run(alerts_rx).await });

    // Baseline at the first tick, no change at the second, change at the
    // third, stable afterwards.
    tokio::time::sleep(Duration::from_secs(250)).await;
    shutdown_tx.send(true).expect("shutdown");
    scheduler_task.await.expect("scheduler");
    dispatch_task.await.expect("dispatcher");

    let alerts = store.recent_alerts(10).expect("alerts");
    assert_eq!(alerts.len(), 1, "only the a->b transition alerts");
    assert_eq!(alerts[0].severity, Severity::High);
    assert_eq!(alerts[0].delivery_state, DeliveryState::Delivered);
    assert_eq!(sink.delivered.lock().expect("lock").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_collector_exhausts_budget() {
    struct FailingCollector;

    #[async_trait]
    impl Collector for FailingCollector {
        fn source(&self) -> &'static str {
            "scripted"
        }
        async fn probe(
            &self,
            _rule: &MonitorRule,
            _target: &Entity,
        ) -> Result<Probe, CollectError> {
            Err(CollectError::Unreachable("no route".to_string()))
        }
    }

    let store = Arc::new(InMemoryStore::new());
    seed_domain(&store);
    let admin = MonitorAdmin::new(&*store, &*store, 30);
    let rule = admin
        .start(
            EntityType::Domain,
            "example.com",
            MonitorCondition::DnsChange,
            60,
            Vec::new(),
        )
        .expect("rule");

    let collectors = Arc::new(
        CollectorSet::new().with(MonitorCondition::DnsChange, Arc::new(FailingCollector)),
    );
    let (alerts_tx, _alerts_rx) = tokio::sync::mpsc::channel(16);
    let scheduler =
        MonitorScheduler::new(store.clone(), collectors, alerts_tx, fast_settings());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_secs(400)).await;
    shutdown_tx.send(true).expect("shutdown");
    scheduler_task.await.expect("scheduler");

    let stored = store.get_rule(&rule.id).expect("rule");
    assert_eq!(stored.state, RuleState::Failed);
    assert!(stored.consecutive_failures >= 3);
    assert!(store.recent_alerts(10).expect("alerts").is_empty());
}

#[tokio::test(start_paused = true)]
async fn paused_rule_is_descheduled() {
    let store = Arc::new(InMemoryStore::new());
    seed_domain(&store);
    let admin = MonitorAdmin::new(&*store, &*store, 30);
    let rule = admin
        .start(
            EntityType::Domain,
            "example.com",
            MonitorCondition::CertChange,
            60,
            Vec::new(),
        )
        .expect("rule");

    let collectors = Arc::new(CollectorSet::new().with(
        MonitorCondition::CertChange,
        Arc::new(ScriptedCollector::new(vec!["serial-a"])),
    ));
    let (alerts_tx, _alerts_rx) = tokio::sync::mpsc::channel(16);
    let scheduler = Arc::new(MonitorScheduler::new(
        store.clone(),
        collectors,
        alerts_tx,
        fast_settings(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = scheduler.clone();
    let scheduler_task = tokio::spawn(async move { runner.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(scheduler.running_tasks(), 1);

    MonitorAdmin::new(&*store, &*store, 30)
        .stop(&rule.id, false)
        .expect("stop");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(scheduler.running_tasks(), 0);

    shutdown_tx.send(true).expect("shutdown");
    scheduler_task.await.expect("scheduler");
}
