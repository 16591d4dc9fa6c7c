//! Record reconciliation
//!
//! Given the configured subdomains, the current public IP and the A-records
//! the provider currently holds for the zone, decide per subdomain whether to
//! create, update or leave its record alone, and which duplicates are stale.
//!
//! This module is pure: it performs no I/O and holds no state between runs.
//!
//! ## Duplicates
//!
//! Several observed records may share one fqdn. The scan keeps a single
//! *keeper* per fqdn:
//!
//! 1. The first matching record becomes the keeper.
//! 2. A later match whose content already equals the target IP replaces the
//!    keeper; the previous keeper becomes stale.
//! 3. Any other later match is stale.
//!
//! When several duplicates already hold the target IP, the last one wins and
//! the earlier ones are stale. Results therefore depend on the provider's
//! listing order, which is not guaranteed to be stable across calls.
//!
//! The update check compares the *final* keeper against the target. Earlier
//! releases compared against the first-encountered record only, which could
//! skip a needed TTL/proxy update on an upgraded keeper.

use crate::record::{DesiredRecord, ObservedRecord, TargetRecord, ZoneInfo};
use std::fmt;

/// What to do with the keeper of one fqdn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// No record exists for the fqdn
    Create,
    /// The keeper exists but differs from the target
    Update,
    /// The keeper already matches the target
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Skip => write!(f, "skip"),
        }
    }
}

/// Reconciliation outcome for a single desired record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationDecision {
    /// Fully qualified name of the desired record
    pub fqdn: String,

    /// Action against the keeper
    pub action: Action,

    /// Id of the observed record chosen to represent the fqdn
    pub keeper_id: Option<String>,

    /// Ids of duplicate records, in the order they were marked stale
    pub stale_ids: Vec<String>,

    /// Record to submit on create or update
    pub target: TargetRecord,
}

impl ReconciliationDecision {
    /// Whether this decision requires a write against the keeper
    pub fn needs_write(&self) -> bool {
        self.action != Action::Skip
    }
}

/// Per-run reconciler
///
/// Bundles the inputs that are fixed for one run (zone, target IP, TTL).
/// Build a fresh one each run.
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    zone: &'a ZoneInfo,
    target_content: &'a str,
    target_ttl: u32,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for one run
    ///
    /// `target_ttl` is expected to be normalized already
    /// (see [`crate::config::DdnsConfig::normalize_ttl`]).
    pub fn new(zone: &'a ZoneInfo, target_content: &'a str, target_ttl: u32) -> Self {
        Self {
            zone,
            target_content,
            target_ttl,
        }
    }

    /// Render the target record for a desired record
    pub fn target_for(&self, desired: &DesiredRecord) -> TargetRecord {
        TargetRecord::a(
            desired.fqdn(self.zone),
            self.target_content,
            self.target_ttl,
            desired.proxied,
        )
    }

    /// Reconcile a single desired record against the full observed record set
    pub fn reconcile(
        &self,
        desired: &DesiredRecord,
        observed: &[ObservedRecord],
    ) -> ReconciliationDecision {
        let target = self.target_for(desired);

        let mut keeper: Option<&ObservedRecord> = None;
        let mut stale_ids = Vec::new();

        for record in observed.iter().filter(|r| r.name == target.name) {
            match keeper {
                None => keeper = Some(record),
                Some(previous) if record.content == self.target_content => {
                    stale_ids.push(previous.id.clone());
                    keeper = Some(record);
                }
                Some(_) => stale_ids.push(record.id.clone()),
            }
        }

        let action = match keeper {
            None => Action::Create,
            Some(record) if target.differs_from(record) => Action::Update,
            Some(_) => Action::Skip,
        };

        ReconciliationDecision {
            fqdn: target.name.clone(),
            action,
            keeper_id: keeper.map(|r| r.id.clone()),
            stale_ids,
            target,
        }
    }

    /// Reconcile every desired record, in configuration order
    pub fn plan(
        &self,
        desired: &[DesiredRecord],
        observed: &[ObservedRecord],
    ) -> Vec<ReconciliationDecision> {
        desired
            .iter()
            .map(|record| self.reconcile(record, observed))
            .collect()
    }
}

/// Reconcile one desired record without building a [`Reconciler`] first
pub fn reconcile(
    desired: &DesiredRecord,
    zone: &ZoneInfo,
    target_content: &str,
    target_ttl: u32,
    observed: &[ObservedRecord],
) -> ReconciliationDecision {
    Reconciler::new(zone, target_content, target_ttl).reconcile(desired, observed)
}
