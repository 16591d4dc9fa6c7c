//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Fetching the public IP via IpSource
//! - Resolving the zone name and listing its A-records
//! - Reconciling desired subdomains against the listed records
//! - Applying create/update/delete calls via RecordStore
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │  IpSource   │   │ ZoneResolver │   │ RecordStore.list │
//! └─────────────┘   └──────────────┘   └──────────────────┘
//!        │                 │                     │
//!        └─────────────────┼─────────────────────┘
//!                          ▼
//!                  ┌──────────────┐
//!                  │  Reconciler  │
//!                  └──────────────┘
//!                          │ decisions
//!                          ▼
//!        ┌───────────────────────────────────┐
//!        │ RecordStore.{create,update,delete} │
//!        └───────────────────────────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! `Idle → FetchingIp → ResolvingZone → ListingRecords → Reconciling →
//! Applying → Idle`
//!
//! 1. A failure before `Applying` aborts the pass (after a fixed backoff for
//!    zone and listing failures). Nothing is written.
//! 2. `Applying` always runs to completion: a failed write is logged and the
//!    next subdomain is processed. There is no rollback.
//! 3. All API calls of a pass are strictly sequential.
//!
//! In repeating mode the next tick is the only retry mechanism.

use crate::config::DdnsConfig;
use crate::error::Result;
use crate::reconcile::{Action, ReconciliationDecision, Reconciler};
use crate::record::DesiredRecord;
use crate::traits::{IpSource, RecordStore, ZoneResolver};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Shortest time between passes; the ticker rejects a zero period
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Phases of a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Waiting for the next pass
    Idle,
    /// Resolving the public IP
    FetchingIp,
    /// Resolving the zone base name
    ResolvingZone,
    /// Listing the zone's A-records
    ListingRecords,
    /// Computing decisions
    Reconciling,
    /// Issuing create/update/delete calls
    Applying,
    /// Terminal state after shutdown
    Stopped,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::FetchingIp => "fetching-ip",
            RunPhase::ResolvingZone => "resolving-zone",
            RunPhase::ListingRecords => "listing-records",
            RunPhase::Reconciling => "reconciling",
            RunPhase::Applying => "applying",
            RunPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Kind of write issued while applying decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

/// Tally of one completed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Records created
    pub created: usize,
    /// Records updated
    pub updated: usize,
    /// Subdomains already up to date
    pub skipped: usize,
    /// Stale records deleted
    pub deleted: usize,
    /// Writes that failed
    pub failed: usize,
}

impl RunReport {
    /// Whether any write of the pass failed
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Pass started
    PassStarted {
        subdomains: usize,
    },

    /// Record created
    RecordCreated {
        fqdn: String,
        content: String,
    },

    /// Keeper record updated
    RecordUpdated {
        fqdn: String,
        record_id: String,
        content: String,
    },

    /// Keeper already matched the target
    RecordSkipped {
        fqdn: String,
        record_id: String,
    },

    /// Stale duplicate deleted
    StaleRecordDeleted {
        fqdn: String,
        record_id: String,
    },

    /// A write failed; the pass continued
    WriteFailed {
        fqdn: String,
        kind: WriteKind,
        error: String,
    },

    /// Pass completed
    PassCompleted {
        report: RunReport,
    },

    /// Pass aborted before applying anything
    PassAborted {
        phase: RunPhase,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core DDNS engine
///
/// Owns the configuration for its whole lifetime; nothing is shared with
/// other tasks.
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Either call [`DdnsEngine::run_once()`] for a single pass, or
///    [`DdnsEngine::run()`] to repeat passes until shutdown
pub struct DdnsEngine {
    /// Public IP discovery
    ip_source: Box<dyn IpSource>,

    /// Zone name resolution
    zones: Box<dyn ZoneResolver>,

    /// Record storage at the provider
    store: Box<dyn RecordStore>,

    /// Zone the subdomains belong to
    zone_id: String,

    /// Subdomains to manage
    subdomains: Vec<DesiredRecord>,

    /// Delete stale duplicates
    purge_unknown_records: bool,

    /// Target TTL (already normalized)
    ttl: u32,

    /// Time between passes in repeating mode
    interval: Duration,

    /// Delay after a failed zone lookup or listing
    failure_backoff: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `ip_source`: IP source implementation
    /// - `zones`: Zone resolver implementation
    /// - `store`: Record store implementation
    /// - `config`: Loaded configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        zones: Box<dyn ZoneResolver>,
        store: Box<dyn RecordStore>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            ip_source,
            zones,
            store,
            zone_id: config.zone_id,
            subdomains: config.subdomains,
            purge_unknown_records: config.purge_unknown_records,
            ttl: config.ttl,
            interval: Duration::from_secs(u64::from(config.ttl)),
            failure_backoff: Duration::from_secs(config.engine.failure_backoff_secs),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Override the time between passes (defaults to the TTL)
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Time between passes in repeating mode
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run passes until `shutdown` fires
    ///
    /// The first pass starts immediately, later ones every
    /// [`interval`](Self::interval). Shutdown is only observed between
    /// passes: an in-flight pass finishes its API calls first. A dropped
    /// sender counts as shutdown.
    ///
    /// Failed passes are logged and never end the loop.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        info!(
            "Repeating every {:?} for {} subdomain(s)",
            self.interval,
            self.subdomains.len()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    debug!("Phase: {}", RunPhase::Stopped);
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        debug!("Pass failed, waiting for next tick: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Perform a single reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The pass reached `Applying` and finished it; the
    ///   report may still contain failed writes
    /// - `Err(Error)`: The pass was aborted before applying anything
    pub async fn run_once(&self) -> Result<RunReport> {
        self.emit_event(EngineEvent::PassStarted {
            subdomains: self.subdomains.len(),
        });

        self.enter(RunPhase::FetchingIp);
        let ip = match self.ip_source.current().await {
            Ok(ip) => ip,
            Err(e) => return Err(self.abort(RunPhase::FetchingIp, e)),
        };
        info!("Public IP ({}): {}", self.ip_source.source_name(), ip);

        self.enter(RunPhase::ResolvingZone);
        let zone = match self.zones.resolve_zone(&self.zone_id).await {
            Ok(zone) => zone,
            Err(e) => {
                self.backoff().await;
                return Err(self.abort(RunPhase::ResolvingZone, e));
            }
        };
        debug!("Zone {} resolved to {}", self.zone_id, zone.name);

        self.enter(RunPhase::ListingRecords);
        let observed = match self.store.list_records(&self.zone_id).await {
            Ok(records) => records,
            Err(e) => {
                self.backoff().await;
                return Err(self.abort(RunPhase::ListingRecords, e));
            }
        };
        debug!("Listed {} A-record(s) in {}", observed.len(), zone.name);

        self.enter(RunPhase::Reconciling);
        let content = ip.to_string();
        let decisions = Reconciler::new(&zone, &content, self.ttl).plan(&self.subdomains, &observed);

        self.enter(RunPhase::Applying);
        let mut report = RunReport::default();
        for decision in &decisions {
            self.apply(decision, &mut report).await;
        }

        self.enter(RunPhase::Idle);
        info!(
            "Pass complete: {} created, {} updated, {} unchanged, {} deleted, {} failed",
            report.created, report.updated, report.skipped, report.deleted, report.failed
        );
        self.emit_event(EngineEvent::PassCompleted { report });

        Ok(report)
    }

    /// Apply one decision, tallying outcomes into `report`
    async fn apply(&self, decision: &ReconciliationDecision, report: &mut RunReport) {
        let fqdn = &decision.fqdn;
        let target = &decision.target;

        match (decision.action, decision.keeper_id.as_deref()) {
            // An update always carries a keeper; without one there is nothing to update
            (Action::Create, _) | (Action::Update, None) => {
                info!("Adding new record: {} -> {}", fqdn, target.content);
                match self.store.create_record(&self.zone_id, target).await {
                    Ok(()) => {
                        report.created += 1;
                        self.emit_event(EngineEvent::RecordCreated {
                            fqdn: fqdn.clone(),
                            content: target.content.clone(),
                        });
                    }
                    Err(e) => self.write_failed(fqdn, WriteKind::Create, e, report),
                }
            }
            (Action::Update, Some(record_id)) => {
                info!("Updating record {}: {} -> {}", record_id, fqdn, target.content);
                match self
                    .store
                    .update_record(&self.zone_id, record_id, target)
                    .await
                {
                    Ok(()) => {
                        report.updated += 1;
                        self.emit_event(EngineEvent::RecordUpdated {
                            fqdn: fqdn.clone(),
                            record_id: record_id.to_string(),
                            content: target.content.clone(),
                        });
                    }
                    Err(e) => self.write_failed(fqdn, WriteKind::Update, e, report),
                }
            }
            (Action::Skip, record_id) => {
                debug!("Record {} already up to date", fqdn);
                report.skipped += 1;
                self.emit_event(EngineEvent::RecordSkipped {
                    fqdn: fqdn.clone(),
                    record_id: record_id.unwrap_or_default().to_string(),
                });
            }
        }

        if !self.purge_unknown_records {
            if !decision.stale_ids.is_empty() {
                debug!(
                    "Leaving {} duplicate record(s) for {} (purge disabled)",
                    decision.stale_ids.len(),
                    fqdn
                );
            }
            return;
        }

        for record_id in &decision.stale_ids {
            info!("Deleting stale record {} for {}", record_id, fqdn);
            match self.store.delete_record(&self.zone_id, record_id).await {
                Ok(()) => {
                    report.deleted += 1;
                    self.emit_event(EngineEvent::StaleRecordDeleted {
                        fqdn: fqdn.clone(),
                        record_id: record_id.clone(),
                    });
                }
                Err(e) => self.write_failed(fqdn, WriteKind::Delete, e, report),
            }
        }
    }

    fn write_failed(
        &self,
        fqdn: &str,
        kind: WriteKind,
        error: crate::Error,
        report: &mut RunReport,
    ) {
        warn!("{:?} failed for {}: {}", kind, fqdn, error);
        report.failed += 1;
        self.emit_event(EngineEvent::WriteFailed {
            fqdn: fqdn.to_string(),
            kind,
            error: error.to_string(),
        });
    }

    /// Log and report an aborted pass, handing the error back to the caller
    fn abort(&self, phase: RunPhase, error: crate::Error) -> crate::Error {
        error!("Pass aborted while {}: {}", phase, error);
        self.emit_event(EngineEvent::PassAborted {
            phase,
            error: error.to_string(),
        });
        error
    }

    async fn backoff(&self) {
        if !self.failure_backoff.is_zero() {
            tokio::time::sleep(self.failure_backoff).await;
        }
    }

    fn enter(&self, phase: RunPhase) {
        debug!("Phase: {}", phase);
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Full channel: drop the event rather than block a pass
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing engine.event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_phase_display() {
        assert_eq!(RunPhase::FetchingIp.to_string(), "fetching-ip");
        assert_eq!(RunPhase::ListingRecords.to_string(), "listing-records");
        assert_eq!(RunPhase::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_report_failures() {
        let mut report = RunReport::default();
        assert!(!report.has_failures());
        report.failed = 1;
        assert!(report.has_failures());
    }
}
