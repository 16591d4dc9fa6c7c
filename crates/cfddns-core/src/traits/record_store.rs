// # Record Store and Zone Resolver Traits
//
// Define the provider-facing interfaces used by the engine:
//
// - [`ZoneResolver`]: zone id → zone base name
// - [`RecordStore`]: list, create, update and delete A-records of a zone
//
// ## Implementations
//
// - Cloudflare API v4: `cfddns-provider-cloudflare` crate
//
// Providers execute exactly one logical API operation per call. Deciding
// *what* to write is owned by the reconciler, and retry is owned by the
// engine's tick loop; providers only report success or failure.

use crate::record::{ObservedRecord, TargetRecord, ZoneInfo};
use async_trait::async_trait;

/// Trait for resolving zone metadata
#[async_trait]
pub trait ZoneResolver: Send + Sync {
    /// Resolve the base domain name of a zone
    ///
    /// An empty or missing name must be reported as an error.
    async fn resolve_zone(&self, zone_id: &str) -> Result<ZoneInfo, crate::Error>;
}

/// Trait for A-record storage at the DNS provider
///
/// All methods operate on the zone identified by `zone_id`. Listing order
/// must be the provider's own listing order; the reconciler's duplicate
/// tie-break depends on it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List every A-record of the zone
    async fn list_records(&self, zone_id: &str) -> Result<Vec<ObservedRecord>, crate::Error>;

    /// Create a new record
    async fn create_record(
        &self,
        zone_id: &str,
        record: &TargetRecord,
    ) -> Result<(), crate::Error>;

    /// Overwrite the record `record_id` with `record`
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &TargetRecord,
    ) -> Result<(), crate::Error>;

    /// Delete the record `record_id`
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
