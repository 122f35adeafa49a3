use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::monitor_rule::MonitorRule;
use crate::domain::entities::observation::Observation;
use crate::domain::ports::collector::{CollectError, Collector, Probe};
use crate::domain::ports::store::CacheStore;

const DEFAULT_BASE_URL: &str = "https://crt.sh";

/// Certificates issued for names the monitored domain does not use itself
/// are still interesting, but unbounded SAN lists would flood the graph.
const MAX_SAN_OBSERVATIONS: usize = 20;

/// Watches certificate transparency logs (crt.sh) for a domain.
///
/// The reading digest covers the set of known certificate serials, so a new
/// issuance or a rotation shows up as a change while re-ordered log output
/// does not.
pub struct CertCollector {
    client: reqwest::Client,
    cache: Arc<dyn CacheStore>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CtLogEntry {
    serial_number: String,
    #[serde(default)]
    name_value: String,
}

impl CertCollector {
    /// Creates a collector querying crt.sh with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `CollectError::Unreachable` if the HTTP client cannot be
    /// initialized.
    pub fn new(
        timeout: Duration,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, CollectError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectError::Unreachable(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn reading_from_entries(entries: &[CtLogEntry]) -> (String, String) {
        let mut serials: Vec<&str> = entries
            .iter()
            .map(|e| e.serial_number.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        serials.sort_unstable();
        serials.dedup();

        let basis = serials.join(",");
        let summary = format!("{} certificate(s) on record", serials.len());
        (basis, summary)
    }

    fn observations_from_entries(domain: &str, entries: &[CtLogEntry]) -> Vec<Observation> {
        let observed_at = Utc::now();
        let mut observations = Vec::new();

        if let Some(latest) = entries.iter().map(|e| e.serial_number.as_str()).max() {
            let mut attributes = BTreeMap::new();
            attributes.insert("cert_serial".to_string(), latest.to_string());
            observations.push(Observation {
                entity_type: "domain".to_string(),
                raw_value: domain.to_string(),
                attributes,
                source: "crt.sh".to_string(),
                observed_at,
            });
        }

        // SANs on the same certificates are sibling names worth a node each.
        let mut sans: Vec<&str> = entries
            .iter()
            .flat_map(|e| e.name_value.lines())
            .map(str::trim)
            .filter(|name| !name.is_empty() && !name.starts_with('*'))
            .filter(|name| !name.eq_ignore_ascii_case(domain))
            .collect();
        sans.sort_unstable();
        sans.dedup();

        for san in sans.into_iter().take(MAX_SAN_OBSERVATIONS) {
            observations.push(Observation {
                entity_type: "domain".to_string(),
                raw_value: san.to_string(),
                attributes: BTreeMap::new(),
                source: "crt.sh".to_string(),
                observed_at,
            });
        }

        observations
    }
}

#[async_trait]
impl Collector for CertCollector {
    fn source(&self) -> &'static str {
        "crt.sh"
    }

    async fn probe(&self, _rule: &MonitorRule, target: &Entity) -> Result<Probe, CollectError> {
        if target.entity_type != EntityType::Domain {
            return Err(CollectError::Malformed(format!(
                "certificate probes apply to domains, not {}",
                target.entity_type
            )));
        }

        let url = format!("{}/?q={}&output=json", self.base_url, target.canonical_value);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollectError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollectError::Unreachable(format!(
                "crt.sh returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CollectError::Malformed(e.to_string()))?;

        // crt.sh answers an empty body when no certificates are on record.
        let entries: Vec<CtLogEntry> = if body.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&body).map_err(|e| CollectError::Malformed(e.to_string()))?
        };

        if let Err(e) = self.cache.cache_put("crt.sh", &target.canonical_value, &body) {
            tracing::warn!("failed to cache crt.sh payload: {e}");
        }

        let (digest_basis, summary) = Self::reading_from_entries(&entries);
        let observations = Self::observations_from_entries(&target.canonical_value, &entries);

        Ok(Probe {
            digest_basis,
            summary,
            observations,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn entry(serial: &str, names: &str) -> CtLogEntry {
        CtLogEntry {
            serial_number: serial.to_string(),
            name_value: names.to_string(),
        }
    }

    #[test]
    fn reading_is_order_independent() {
        let (a, _) = CertCollector::reading_from_entries(&[entry("02", ""), entry("01", "")]);
        let (b, _) = CertCollector::reading_from_entries(&[entry("01", ""), entry("02", "")]);
        assert_eq!(a, b);
        assert_eq!(a, "01,02");
    }

    #[test]
    fn reading_dedupes_serials() {
        let (basis, summary) =
            CertCollector::reading_from_entries(&[entry("0a", ""), entry("0a", "")]);
        assert_eq!(basis, "0a");
        assert_eq!(summary, "1 certificate(s) on record");
    }

    #[test]
    fn san_observations_skip_wildcards_and_self() {
        let entries = [entry("01", "example.com\n*.example.com\nmail.example.com")];
        let observations = CertCollector::observations_from_entries("example.com", &entries);

        // One for the domain itself (cert_serial) plus the one real SAN.
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].raw_value, "example.com");
        assert_eq!(observations[0].attributes["cert_serial"], "01");
        assert_eq!(observations[1].raw_value, "mail.example.com");
    }

    #[test]
    fn parses_ct_log_payload() {
        let body = r#"[
            {"serial_number": "03a1", "name_value": "example.com\nwww.example.com"},
            {"serial_number": "03a2", "name_value": "example.com"}
        ]"#;
        let entries: Vec<CtLogEntry> = serde_json::from_str(body).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].serial_number, "03a1");
    }
}
