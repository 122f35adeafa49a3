use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::severity::Severity;

/// What a monitoring rule watches for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MonitorCondition {
    CertChange,
    DnsChange,
    NewRelationship,
    LeakKeywordMatch,
}

impl MonitorCondition {
    pub const ALL: [Self; 4] = [
        Self::CertChange,
        Self::DnsChange,
        Self::NewRelationship,
        Self::LeakKeywordMatch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CertChange => "cert_change",
            Self::DnsChange => "dns_change",
            Self::NewRelationship => "new_relationship",
            Self::LeakKeywordMatch => "leak_keyword_match",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Alert severity assigned to a detected change for this condition.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::CertChange | Self::LeakKeywordMatch => Severity::High,
            Self::DnsChange => Severity::Medium,
            Self::NewRelationship => Severity::Low,
        }
    }
}

impl std::fmt::Display for MonitorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a monitoring rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleState {
    Active,
    Paused,
    Failed,
}

impl std::fmt::Display for RuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A persistent watch on one entity.
///
/// Mutated only by the scheduler (timestamps, state, hash, failure counter);
/// created and paused/resumed by explicit requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorRule {
    pub id: String,
    pub target_entity_id: String,
    pub condition: MonitorCondition,
    pub interval_seconds: u64,
    pub state: RuleState,
    /// Keywords matched by `leak_keyword_match` rules; empty otherwise.
    pub keywords: Vec<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result_hash: Option<String>,
    /// Persisted so a daemon restart does not reset the failure budget.
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
}

impl MonitorRule {
    #[must_use]
    pub fn new(
        target_entity_id: String,
        condition: MonitorCondition,
        interval_seconds: u64,
        keywords: Vec<String>,
    ) -> Self {
        let created_at = Utc::now();
        let id = rule_id(&target_entity_id, condition, created_at);
        Self {
            id,
            target_entity_id,
            condition,
            interval_seconds,
            state: RuleState::Active,
            keywords,
            last_run_at: None,
            last_result_hash: None,
            consecutive_failures: 0,
            created_at,
        }
    }
}

fn rule_id(target: &str, condition: MonitorCondition, created_at: DateTime<Utc>) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(
        format!("{target}:{condition}:{}", created_at.timestamp_micros()).as_bytes(),
    );
    hex::encode(digest)[..12].to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn condition_parse_roundtrip() {
        for c in MonitorCondition::ALL {
            assert_eq!(MonitorCondition::parse(c.as_str()), Some(c));
        }
        assert_eq!(MonitorCondition::parse("weather_change"), None);
    }

    #[test]
    fn condition_severity_mapping() {
        assert_eq!(MonitorCondition::CertChange.severity(), Severity::High);
        assert_eq!(MonitorCondition::DnsChange.severity(), Severity::Medium);
        assert_eq!(MonitorCondition::NewRelationship.severity(), Severity::Low);
        assert_eq!(
            MonitorCondition::LeakKeywordMatch.severity(),
            Severity::High
        );
    }

    #[test]
    fn new_rule_starts_active_with_no_history() {
        let rule = MonitorRule::new(
            "abc123".into(),
            MonitorCondition::CertChange,
            3600,
            vec![],
        );
        assert_eq!(rule.state, RuleState::Active);
        assert!(rule.last_run_at.is_none());
        assert!(rule.last_result_hash.is_none());
        assert_eq!(rule.consecutive_failures, 0);
        assert_eq!(rule.id.len(), 12);
    }

    #[test]
    fn rule_ids_differ_across_creations() {
        let a = MonitorRule::new("abc".into(), MonitorCondition::DnsChange, 60, vec![]);
        let b = MonitorRule::new("abc".into(), MonitorCondition::CertChange, 60, vec![]);
        assert_ne!(a.id, b.id);
    }
}
