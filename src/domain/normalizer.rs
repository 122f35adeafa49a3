//! Converts raw collector observations into canonical entity records.
//!
//! Normalization is pure: validation against the closed entity-type set,
//! per-type canonicalization of the raw value, and extraction of link hints
//! encoded in the observation's attributes. Hints are resolved against the
//! graph store by the ingest service, not here.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entities::entity::{Entity, EntityType};
use crate::domain::entities::observation::Observation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unrecognized entity type: '{0}'")]
    UnknownEntityType(String),
    #[error("cannot canonicalize {entity_type} value '{raw_value}': {reason}")]
    CannotCanonicalize {
        entity_type: EntityType,
        raw_value: String,
        reason: String,
    },
}

/// A relationship implied by the observation itself, expressed as pure data.
///
/// The counterpart value is already canonicalized; the ingest service turns
/// hints into concrete edges (looking up or creating the counterpart entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkHint {
    /// The observed IP belongs to this ASN; link it to every IP already
    /// known under the same ASN.
    SameAsn { asn: String },
    /// The observed entity presents this certificate; link it to every
    /// domain already known to share the fingerprint.
    SharesCertificate { fingerprint: String },
    /// The observed wallet transacts with this address.
    WalletCluster { address: String },
    /// The observed company employs this person.
    Employs { person: String },
    /// This supplier supplies the observed company.
    SuppliedBy { supplier: String },
    /// The observed entity mentions another entity (`type:value` form).
    Mentions {
        entity_type: EntityType,
        value: String,
    },
    /// PTR record: the observed IP reverses to this domain.
    ReverseOf { domain: String },
}

/// Canonical, validated form of one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedObservation {
    pub entity: Entity,
    pub hints: Vec<LinkHint>,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

/// Stateless per-type normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate and canonicalize one raw observation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the entity type is outside the closed
    /// set or the raw value cannot be canonicalized; nothing from a rejected
    /// observation may be ingested.
    pub fn normalize(&self, obs: &Observation) -> Result<NormalizedObservation, ValidationError> {
        let entity_type = EntityType::parse(&obs.entity_type)
            .ok_or_else(|| ValidationError::UnknownEntityType(obs.entity_type.clone()))?;
        let canonical = canonical_value(entity_type, &obs.raw_value)?;

        let hints = extract_hints(entity_type, &obs.attributes)?;

        let entity = Entity::from_observation(
            entity_type,
            canonical,
            obs.attributes.clone(),
            &obs.source,
            obs.observed_at,
        );

        Ok(NormalizedObservation {
            entity,
            hints,
            source: obs.source.clone(),
            observed_at: obs.observed_at,
        })
    }
}

/// Canonicalize a raw value per type-specific rules.
///
/// # Errors
///
/// Returns `ValidationError::CannotCanonicalize` for values the type's rules
/// reject.
pub fn canonical_value(
    entity_type: EntityType,
    raw_value: &str,
) -> Result<String, ValidationError> {
    let raw = raw_value.trim();
    let fail = |reason: &str| ValidationError::CannotCanonicalize {
        entity_type,
        raw_value: raw_value.to_string(),
        reason: reason.to_string(),
    };

    match entity_type {
        EntityType::Domain => canonical_domain(raw).ok_or_else(|| fail("not a valid hostname")),
        EntityType::Ip => raw
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| fail("not a valid IPv4/IPv6 address")),
        EntityType::Asn => canonical_asn(raw).ok_or_else(|| fail("not a valid AS number")),
        EntityType::Certificate => {
            canonical_fingerprint(raw).ok_or_else(|| fail("not a SHA-1/SHA-256 hex fingerprint"))
        }
        EntityType::Wallet => canonical_wallet(raw).ok_or_else(|| fail("not a known address form")),
        EntityType::Username => {
            let name = raw.strip_prefix('@').unwrap_or(raw).to_lowercase();
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                Err(fail("empty or contains whitespace"))
            } else {
                Ok(name)
            }
        }
        EntityType::Email => canonical_email(raw).ok_or_else(|| fail("not a valid address")),
        EntityType::Phone => canonical_phone(raw).ok_or_else(|| fail("too few digits")),
        EntityType::Company | EntityType::Person => {
            let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                Err(fail("empty name"))
            } else {
                Ok(collapsed.to_lowercase())
            }
        }
    }
}

/// Lower-cased, trailing dot stripped, label charset checked.
fn canonical_domain(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let trimmed = lowered.strip_suffix('.').unwrap_or(&lowered);
    if trimmed.is_empty() || !trimmed.contains('.') {
        return None;
    }
    let valid_labels = trimmed.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    valid_labels.then(|| trimmed.to_string())
}

/// `"as15169"`, `"AS15169"` and `"15169"` all canonicalize to `"AS15169"`.
fn canonical_asn(raw: &str) -> Option<String> {
    let digits = raw
        .strip_prefix("AS")
        .or_else(|| raw.strip_prefix("as"))
        .or_else(|| raw.strip_prefix("As"))
        .unwrap_or(raw);
    digits.parse::<u32>().ok().map(|n| format!("AS{n}"))
}

/// Colon-separated or bare hex, lower-cased; SHA-1 (40) or SHA-256 (64).
fn canonical_fingerprint(raw: &str) -> Option<String> {
    let bare: String = raw
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    let is_hex = !bare.is_empty() && bare.chars().all(|c| c.is_ascii_hexdigit());
    (is_hex && (bare.len() == 40 || bare.len() == 64)).then_some(bare)
}

/// Ethereum addresses are lower-cased hex; base58 addresses keep their case.
fn canonical_wallet(raw: &str) -> Option<String> {
    if let Some(hex_part) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        let lowered = hex_part.to_lowercase();
        let valid = lowered.len() == 40 && lowered.chars().all(|c| c.is_ascii_hexdigit());
        return valid.then(|| format!("0x{lowered}"));
    }
    // Base58 (bitcoin-style): no 0, O, I, l.
    let valid = (25..=62).contains(&raw.len())
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l'));
    valid.then(|| raw.to_string())
}

fn canonical_email(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let (local, domain) = lowered.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let domain = canonical_domain(domain)?;
    Some(format!("{local}@{domain}"))
}

/// Digits only, with an optional leading `+` preserved.
fn canonical_phone(raw: &str) -> Option<String> {
    let plus = raw.starts_with('+');
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 7 {
        return None;
    }
    Some(if plus { format!("+{digits}") } else { digits })
}

/// Attribute keys that encode relationships, per observing type.
fn extract_hints(
    entity_type: EntityType,
    attributes: &std::collections::BTreeMap<String, String>,
) -> Result<Vec<LinkHint>, ValidationError> {
    let mut hints = Vec::new();

    if entity_type == EntityType::Ip {
        if let Some(asn) = attributes.get("asn") {
            hints.push(LinkHint::SameAsn {
                asn: canonical_value(EntityType::Asn, asn)?,
            });
        }
        if let Some(domain) = attributes.get("ptr_domain") {
            hints.push(LinkHint::ReverseOf {
                domain: canonical_value(EntityType::Domain, domain)?,
            });
        }
    }

    if matches!(entity_type, EntityType::Domain | EntityType::Certificate) {
        if let Some(fp) = attributes.get("cert_fingerprint") {
            hints.push(LinkHint::SharesCertificate {
                fingerprint: canonical_value(EntityType::Certificate, fp)?,
            });
        }
    }

    if entity_type == EntityType::Wallet {
        if let Some(addr) = attributes.get("counterparty") {
            hints.push(LinkHint::WalletCluster {
                address: canonical_value(EntityType::Wallet, addr)?,
            });
        }
    }

    if entity_type == EntityType::Company {
        if let Some(person) = attributes.get("employee") {
            hints.push(LinkHint::Employs {
                person: canonical_value(EntityType::Person, person)?,
            });
        }
        if let Some(supplier) = attributes.get("supplier") {
            hints.push(LinkHint::SuppliedBy {
                supplier: canonical_value(EntityType::Company, supplier)?,
            });
        }
    }

    if let Some(mention) = attributes.get("mentions") {
        let (type_str, value) =
            mention
                .split_once(':')
                .ok_or_else(|| ValidationError::CannotCanonicalize {
                    entity_type,
                    raw_value: mention.clone(),
                    reason: "mentions attribute must be 'type:value'".to_string(),
                })?;
        let mentioned_type = EntityType::parse(type_str)
            .ok_or_else(|| ValidationError::UnknownEntityType(type_str.to_string()))?;
        hints.push(LinkHint::Mentions {
            entity_type: mentioned_type,
            value: canonical_value(mentioned_type, value)?,
        });
    }

    Ok(hints)
}
