use crate::application::error::ServiceError;
use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::observation::Observation;
use crate::domain::entities::relationship::{Relationship, RelationshipType};
use crate::domain::normalizer::{LinkHint, NormalizedObservation, Normalizer};
use crate::domain::ports::store::{EntityStore, RelationshipStore};

/// One observation the batch refused, with its position and reason.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RejectedObservation {
    pub index: usize,
    pub reason: String,
}

/// Outcome of ingesting a batch of observations.
#[derive(Debug, Default, serde::Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub relationships: usize,
    pub rejected: Vec<RejectedObservation>,
}

/// Normalizes raw observations and merges them into the graph.
///
/// Each observation is independent: a rejected record never aborts the rest
/// of the batch, and each entity write is atomic on its own.
pub struct IngestService<'a> {
    entity_store: &'a dyn EntityStore,
    relationship_store: &'a dyn RelationshipStore,
    normalizer: Normalizer,
}

impl<'a> IngestService<'a> {
    #[must_use]
    pub const fn new(
        entity_store: &'a dyn EntityStore,
        relationship_store: &'a dyn RelationshipStore,
    ) -> Self {
        Self {
            entity_store,
            relationship_store,
            normalizer: Normalizer::new(),
        }
    }

    /// Ingest a batch: normalize, upsert entities, resolve link hints into
    /// edges.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` only on storage failure; validation failures
    /// are reported per observation in the returned report.
    pub fn ingest(&self, observations: &[Observation]) -> Result<IngestReport, ServiceError> {
        let mut report = IngestReport::default();

        for (index, obs) in observations.iter().enumerate() {
            match self.normalizer.normalize(obs) {
                Ok(normalized) => {
                    report.relationships += self.apply(&normalized)?;
                    report.accepted += 1;
                }
                Err(e) => {
                    tracing::debug!("Observation {index} rejected: {e}");
                    report.rejected.push(RejectedObservation {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Ingested {} observation(s), {} rejected, {} edge write(s)",
            report.accepted,
            report.rejected.len(),
            report.relationships
        );
        Ok(report)
    }

    /// Upsert the entity and turn its hints into edges. Returns the number
    /// of edge writes performed.
    fn apply(&self, normalized: &NormalizedObservation) -> Result<usize, ServiceError> {
        let stored = self.entity_store.upsert_entity(&normalized.entity)?;
        let mut edges = 0usize;

        for hint in &normalized.hints {
            edges += self.resolve_hint(&stored, hint, &normalized.source, normalized.observed_at)?;
        }
        Ok(edges)
    }

    fn resolve_hint(
        &self,
        observed: &Entity,
        hint: &LinkHint,
        source: &str,
        observed_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize, ServiceError> {
        let mut written = 0usize;
        match hint {
            // Peer linking: every IP already sharing this ASN attribute gets
            // a same_asn edge to the observed IP.
            LinkHint::SameAsn { asn } => {
                for peer in
                    self.entity_store
                        .entities_with_attribute(EntityType::Ip, "asn", asn)?
                {
                    if peer.id != observed.id {
                        self.link(observed, &peer, RelationshipType::SameAsn, source, observed_at)?;
                        written += 1;
                    }
                }
            }
            LinkHint::SharesCertificate { fingerprint } => {
                for peer in self.entity_store.entities_with_attribute(
                    EntityType::Domain,
                    "cert_fingerprint",
                    fingerprint,
                )? {
                    if peer.id != observed.id {
                        self.link(
                            observed,
                            &peer,
                            RelationshipType::SharesCertificate,
                            source,
                            observed_at,
                        )?;
                        written += 1;
                    }
                }
            }
            LinkHint::WalletCluster { address } => {
                let peer =
                    self.ensure_entity(EntityType::Wallet, address, source, observed_at)?;
                self.link(
                    observed,
                    &peer,
                    RelationshipType::WalletCluster,
                    source,
                    observed_at,
                )?;
                written += 1;
            }
            LinkHint::Employs { person } => {
                let peer = self.ensure_entity(EntityType::Person, person, source, observed_at)?;
                self.link(observed, &peer, RelationshipType::Employs, source, observed_at)?;
                written += 1;
            }
            LinkHint::SuppliedBy { supplier } => {
                let peer =
                    self.ensure_entity(EntityType::Company, supplier, source, observed_at)?;
                // Edge direction: supplier -> supplied company.
                self.relationship_store
                    .upsert_relationship(&Relationship::observed(
                        peer.id,
                        observed.id.clone(),
                        RelationshipType::Supplies,
                        source,
                        observed_at,
                    ))?;
                written += 1;
            }
            LinkHint::Mentions { entity_type, value } => {
                let peer = self.ensure_entity(*entity_type, value, source, observed_at)?;
                self.link(observed, &peer, RelationshipType::Mentions, source, observed_at)?;
                written += 1;
            }
            LinkHint::ReverseOf { domain } => {
                let peer = self.ensure_entity(EntityType::Domain, domain, source, observed_at)?;
                self.link(observed, &peer, RelationshipType::ReverseOf, source, observed_at)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Fetch the counterpart by `(type, value)`, creating a bare entity if
    /// the graph has never seen it.
    fn ensure_entity(
        &self,
        entity_type: EntityType,
        canonical_value: &str,
        source: &str,
        observed_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Entity, ServiceError> {
        if let Some(existing) = self
            .entity_store
            .find_entity(entity_type, canonical_value)?
        {
            return Ok(existing);
        }
        let fresh = Entity::from_observation(
            entity_type,
            canonical_value.to_string(),
            std::collections::BTreeMap::new(),
            source,
            observed_at,
        );
        Ok(self.entity_store.upsert_entity(&fresh)?)
    }

    fn link(
        &self,
        a: &Entity,
        b: &Entity,
        rel_type: RelationshipType,
        source: &str,
        observed_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), ServiceError> {
        self.relationship_store
            .upsert_relationship(&Relationship::observed(
                a.id.clone(),
                b.id.clone(),
                rel_type,
                source,
                observed_at,
            ))?;
        Ok(())
    }
}
