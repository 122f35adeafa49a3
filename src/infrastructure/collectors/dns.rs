use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::lookup_host;

use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::monitor_rule::MonitorRule;
use crate::domain::entities::observation::Observation;
use crate::domain::ports::collector::{CollectError, Collector, Probe};

/// Resolves a domain through the system resolver and digests the address set.
///
/// Address ordering from resolvers is not stable, so the reading sorts before
/// hashing; only an actual record change alters the digest.
#[derive(Default)]
pub struct DnsCollector;

impl DnsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn reading_from_addrs(addrs: &mut Vec<String>) -> (String, String) {
        addrs.sort_unstable();
        addrs.dedup();
        let basis = addrs.join(",");
        let summary = format!("resolves to {} address(es)", addrs.len());
        (basis, summary)
    }
}

#[async_trait]
impl Collector for DnsCollector {
    fn source(&self) -> &'static str {
        "dns"
    }

    async fn probe(&self, _rule: &MonitorRule, target: &Entity) -> Result<Probe, CollectError> {
        if target.entity_type != EntityType::Domain {
            return Err(CollectError::Malformed(format!(
                "DNS probes apply to domains, not {}",
                target.entity_type
            )));
        }

        let domain = target.canonical_value.clone();
        // lookup_host wants a socket address; the port is discarded.
        let resolved = lookup_host(format!("{domain}:443"))
            .await
            .map_err(|e| CollectError::Unreachable(e.to_string()))?;

        let mut addrs: Vec<String> = resolved.map(|sock| sock.ip().to_string()).collect();
        let (digest_basis, summary) = Self::reading_from_addrs(&mut addrs);

        let observed_at = Utc::now();
        let observations = addrs
            .iter()
            .map(|ip| {
                let mut attributes = BTreeMap::new();
                attributes.insert("ptr_domain".to_string(), domain.clone());
                Observation {
                    entity_type: "ip".to_string(),
                    raw_value: ip.clone(),
                    attributes,
                    source: "dns".to_string(),
                    observed_at,
                }
            })
            .collect();

        Ok(Probe {
            digest_basis,
            summary,
            observations,
        })
    }
}
