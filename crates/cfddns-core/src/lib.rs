// # cfddns-core
//
// Core library of the Cloudflare DDNS updater.
//
// ## Architecture Overview
//
// - **Reconciler**: Pure decision logic turning desired subdomains and the
//   observed A-records of a zone into create / update / skip decisions plus
//   stale duplicates to purge
// - **IpSource**: Trait for discovering the current public IP
// - **ZoneResolver** / **RecordStore**: Traits for the provider API
// - **DdnsEngine**: Runs passes (fetch → reconcile → apply), once or on a timer
//
// ## Design Principles
//
// 1. **Stateless passes**: Every pass recomputes from freshly listed records
// 2. **Sequential I/O**: No concurrent API calls inside a pass
// 3. **Abort, don't retry**: A failed read aborts the pass; the next tick retries
// 4. **Library-First**: The daemon is a thin layer over this crate

pub mod traits;
pub mod engine;
pub mod reconcile;
pub mod record;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpSource, RecordStore, ZoneResolver};
pub use engine::{DdnsEngine, EngineEvent, RunPhase, RunReport, WriteKind};
pub use reconcile::{Action, ReconciliationDecision, Reconciler, reconcile};
pub use record::{DesiredRecord, ObservedRecord, TargetRecord, ZoneInfo};
pub use config::{DdnsConfig, EngineConfig};
pub use error::{Error, Result};
