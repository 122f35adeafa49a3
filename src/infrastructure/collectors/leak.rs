use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::entity::Entity;
use crate::domain::entities::monitor_rule::MonitorRule;
use crate::domain::ports::collector::{CollectError, Collector, Probe};

const DEFAULT_BASE_URL: &str = "https://psbdmp.ws/api/v3/search";

/// Searches a paste aggregation service for the rule's keywords.
///
/// The reading is the per-keyword hit count, so an alert fires when a keyword
/// starts (or stops) appearing, not on every tick it stays visible.
pub struct LeakCollector {
    client: reqwest::Client,
    base_url: String,
}

impl LeakCollector {
    /// Creates a collector with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `CollectError::Unreachable` if the HTTP client cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self, CollectError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectError::Unreachable(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn reading_from_counts(counts: &[(String, usize)]) -> (String, String) {
        let mut lines: Vec<String> = counts
            .iter()
            .map(|(keyword, hits)| format!("{keyword}={hits}"))
            .collect();
        lines.sort_unstable();

        let matched = counts.iter().filter(|(_, hits)| *hits > 0).count();
        (lines.join(";"), format!("{matched} keyword(s) matched"))
    }

    fn count_hits(body: &str, keyword: &str) -> usize {
        body.to_lowercase().matches(&keyword.to_lowercase()).count()
    }
}

#[async_trait]
impl Collector for LeakCollector {
    fn source(&self) -> &'static str {
        "paste-scan"
    }

    async fn probe(&self, rule: &MonitorRule, _target: &Entity) -> Result<Probe, CollectError> {
        if rule.keywords.is_empty() {
            return Err(CollectError::Malformed(
                "leak probe requires at least one keyword".to_string(),
            ));
        }

        let mut counts = Vec::with_capacity(rule.keywords.len());
        for keyword in &rule.keywords {
            let url = format!("{}/{keyword}", self.base_url);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| CollectError::Unreachable(e.to_string()))?;

            // A keyword with no pastes comes back 404 on some services.
            let hits = if response.status() == reqwest::StatusCode::NOT_FOUND {
                0
            } else if response.status().is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| CollectError::Malformed(e.to_string()))?;
                Self::count_hits(&body, keyword)
            } else {
                return Err(CollectError::Unreachable(format!(
                    "paste service returned HTTP {}",
                    response.status()
                )));
            };

            counts.push((keyword.clone(), hits));
        }

        let (digest_basis, summary) = Self::reading_from_counts(&counts);
        Ok(Probe {
            digest_basis,
            summary,
            observations: Vec::new(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn reading_is_order_independent() {
        let (a, _) = LeakCollector::reading_from_counts(&[
            ("acme".to_string(), 2),
            ("corp".to_string(), 0),
        ]);
        let (b, _) = LeakCollector::reading_from_counts(&[
            ("corp".to_string(), 0),
            ("acme".to_string(), 2),
        ]);
        assert_eq!(a, b);
        assert_eq!(a, "acme=2;corp=0");
    }

    #[test]
    fn summary_counts_only_matched_keywords() {
        let (_, summary) = LeakCollector::reading_from_counts(&[
            ("acme".to_string(), 3),
            ("corp".to_string(), 0),
        ]);
        assert_eq!(summary, "1 keyword(s) matched");
    }

    #[test]
    fn hit_counting_is_case_insensitive() {
        assert_eq!(LeakCollector::count_hits("Acme leaked ACME data", "acme"), 2);
        assert_eq!(LeakCollector::count_hits("nothing here", "acme"), 0);
    }
}
