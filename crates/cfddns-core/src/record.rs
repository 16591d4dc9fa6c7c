//! DNS record data model
//!
//! - [`DesiredRecord`]: one configured subdomain
//! - [`ZoneInfo`]: the zone the subdomains live in
//! - [`ObservedRecord`]: an A-record as the provider currently has it
//! - [`TargetRecord`]: a desired record rendered in provider shape

use serde::{Deserialize, Serialize};

/// The only record type this updater manages
pub const RECORD_TYPE_A: &str = "A";

/// Label meaning "the zone apex"
pub const APEX_LABEL: &str = "@";

/// A configured subdomain that must point at the current public IP
///
/// Deserialized from a `subdomains` entry of the configuration file
/// (`{ "name": "www", "proxied": true }`). The fully qualified name is
/// derived from the zone on every run and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Subdomain label; empty or `"@"` means the zone apex
    #[serde(rename = "name", default)]
    pub label: String,

    /// Whether traffic should go through Cloudflare's edge
    #[serde(default)]
    pub proxied: bool,
}

impl DesiredRecord {
    /// Create a new desired record
    pub fn new(label: impl Into<String>, proxied: bool) -> Self {
        Self {
            label: label.into(),
            proxied,
        }
    }

    /// Fully qualified name of this record inside `zone`
    ///
    /// The label is trimmed and lowercased. An empty label (including one
    /// made only of whitespace) or `"@"` resolves to the zone apex.
    pub fn fqdn(&self, zone: &ZoneInfo) -> String {
        let label = self.label.trim().to_lowercase();
        if label.is_empty() || label == APEX_LABEL {
            zone.name.clone()
        } else {
            format!("{}.{}", label, zone.name)
        }
    }
}

/// Zone metadata resolved from the zone id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    /// Base domain name of the zone (e.g. "example.com")
    pub name: String,
}

impl ZoneInfo {
    /// Create zone info from a base domain name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An A-record as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRecord {
    /// Provider-assigned identifier, unique within the zone
    pub id: String,

    /// Fully qualified record name
    pub name: String,

    /// Record content (an IPv4 literal for A-records)
    pub content: String,

    /// Time-to-live in seconds (1 means "automatic" on Cloudflare)
    #[serde(default)]
    pub ttl: u32,

    /// Proxy flag
    #[serde(default)]
    pub proxied: bool,

    /// Record type
    #[serde(rename = "type", default = "default_record_type")]
    pub record_type: String,
}

impl ObservedRecord {
    /// Create an A-record (mostly useful for tests and in-memory stores)
    pub fn a(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        ttl: u32,
        proxied: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            ttl,
            proxied,
            record_type: default_record_type(),
        }
    }
}

/// The record a configured subdomain should become
///
/// Serializes to the exact body of the create and update API calls:
/// `{ "type": "A", "name", "content", "ttl", "proxied" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Record type, always "A"
    #[serde(rename = "type")]
    pub record_type: String,

    /// Fully qualified record name
    pub name: String,

    /// Target IPv4 address
    pub content: String,

    /// Target TTL in seconds
    pub ttl: u32,

    /// Target proxy flag
    pub proxied: bool,
}

impl TargetRecord {
    /// Render the target A-record for an fqdn
    pub fn a(name: impl Into<String>, content: impl Into<String>, ttl: u32, proxied: bool) -> Self {
        Self {
            record_type: default_record_type(),
            name: name.into(),
            content: content.into(),
            ttl,
            proxied,
        }
    }

    /// Whether an observed record differs from this target in any field we manage
    pub fn differs_from(&self, observed: &ObservedRecord) -> bool {
        observed.content != self.content
            || observed.ttl != self.ttl
            || observed.proxied != self.proxied
    }

    /// The observed record this target turns into once written under `id`
    pub fn into_observed(self, id: impl Into<String>) -> ObservedRecord {
        ObservedRecord {
            id: id.into(),
            name: self.name,
            content: self.content,
            ttl: self.ttl,
            proxied: self.proxied,
            record_type: self.record_type,
        }
    }
}

fn default_record_type() -> String {
    RECORD_TYPE_A.to_string()
}
