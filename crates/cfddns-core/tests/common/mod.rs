//! Test doubles and common utilities for engine contract tests
//!
//! The doubles keep their state behind `Arc`s so a test can hand one copy
//! to the engine and inspect another (`sharing_state_with`).

#![allow(dead_code)]

use cfddns_core::config::DdnsConfig;
use cfddns_core::error::{Error, Result};
use cfddns_core::record::{ObservedRecord, TargetRecord, ZoneInfo};
use cfddns_core::traits::{IpSource, RecordStore, ZoneResolver};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const ZONE_ID: &str = "023e105f4ecef8ad9ca31a8372d0c353";
pub const ZONE_NAME: &str = "example.com";
pub const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const TTL: u32 = 3600;

/// An IP source returning a fixed address, or failing when unresolved
pub struct StaticIpSource {
    ip: Option<Ipv4Addr>,
    call_count: Arc<AtomicUsize>,
}

impl StaticIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip: Some(ip),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unresolved() -> Self {
        Self {
            ip: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            ip: other.ip,
            call_count: Arc::clone(&other.call_count),
        }
    }
}

#[async_trait::async_trait]
impl IpSource for StaticIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.ip.ok_or_else(|| Error::ip_source("no ip in trace response"))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// A zone resolver returning a fixed name, or failing
pub struct StaticZoneResolver {
    name: Option<String>,
}

impl StaticZoneResolver {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { name: None }
    }
}

#[async_trait::async_trait]
impl ZoneResolver for StaticZoneResolver {
    async fn resolve_zone(&self, _zone_id: &str) -> Result<ZoneInfo> {
        match &self.name {
            Some(name) => Ok(ZoneInfo::new(name.clone())),
            None => Err(Error::provider("test", "zone lookup failed")),
        }
    }
}

/// A call recorded by [`InMemoryRecordStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    Create(String),
    Update(String),
    Delete(String),
}

#[derive(Default)]
struct StoreState {
    records: Vec<ObservedRecord>,
    calls: Vec<StoreCall>,
    next_id: usize,
    fail_list: bool,
    fail_create: HashSet<String>,
    fail_update: HashSet<String>,
    fail_delete: HashSet<String>,
}

/// A record store that applies writes to an in-memory record list
pub struct InMemoryRecordStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<ObservedRecord>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                records,
                next_id: 1000,
                ..StoreState::default()
            })),
        }
    }

    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
        }
    }

    /// Fail listing
    pub fn fail_list(self) -> Self {
        self.state.lock().unwrap().fail_list = true;
        self
    }

    /// Fail creates of the given fqdn
    pub fn fail_create_of(self, fqdn: &str) -> Self {
        self.state.lock().unwrap().fail_create.insert(fqdn.to_string());
        self
    }

    /// Fail updates of the given record id
    pub fn fail_update_of(self, record_id: &str) -> Self {
        self.state.lock().unwrap().fail_update.insert(record_id.to_string());
        self
    }

    /// Fail deletes of the given record id
    pub fn fail_delete_of(self, record_id: &str) -> Self {
        self.state.lock().unwrap().fail_delete.insert(record_id.to_string());
        self
    }

    pub fn records(&self) -> Vec<ObservedRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than `List`
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != StoreCall::List)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_records(&self, _zone_id: &str) -> Result<Vec<ObservedRecord>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::List);
        if state.fail_list {
            return Err(Error::http("connection reset"));
        }
        Ok(state.records.clone())
    }

    async fn create_record(&self, _zone_id: &str, record: &TargetRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Create(record.name.clone()));
        if state.fail_create.contains(&record.name) {
            return Err(Error::provider("test", "create rejected"));
        }
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.records.push(record.clone().into_observed(id));
        Ok(())
    }

    async fn update_record(
        &self,
        _zone_id: &str,
        record_id: &str,
        record: &TargetRecord,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Update(record_id.to_string()));
        if state.fail_update.contains(record_id) {
            return Err(Error::provider("test", "update rejected"));
        }
        let existing = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::not_found(record_id.to_string()))?;
        *existing = record.clone().into_observed(record_id);
        Ok(())
    }

    async fn delete_record(&self, _zone_id: &str, record_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Delete(record_id.to_string()));
        if state.fail_delete.contains(record_id) {
            return Err(Error::provider("test", "delete rejected"));
        }
        state.records.retain(|r| r.id != record_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Observed A-record in the test zone
/// A record store whose listing parks until the test releases it
///
/// `entered` fires once the engine is inside `list_records`; the call
/// returns after `release` is notified.
pub struct GatedRecordStore {
    inner: InMemoryRecordStore,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedRecordStore {
    pub fn new(inner: InMemoryRecordStore) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn gates(&self) -> (Arc<Notify>, Arc<Notify>) {
        (Arc::clone(&self.entered), Arc::clone(&self.release))
    }
}

#[async_trait::async_trait]
impl RecordStore for GatedRecordStore {
    async fn list_records(&self, zone_id: &str) -> Result<Vec<ObservedRecord>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.list_records(zone_id).await
    }

    async fn create_record(&self, zone_id: &str, record: &TargetRecord) -> Result<()> {
        self.inner.create_record(zone_id, record).await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &TargetRecord,
    ) -> Result<()> {
        self.inner.update_record(zone_id, record_id, record).await
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.inner.delete_record(zone_id, record_id).await
    }

    fn provider_name(&self) -> &'static str {
        "gated"
    }
}

pub fn observed(id: &str, name: &str, content: &str, ttl: u32, proxied: bool) -> ObservedRecord {
    ObservedRecord::a(id, name, content, ttl, proxied)
}

/// Helper to create a DdnsConfig for testing (no failure backoff)
pub fn config_with(subdomains: &[(&str, bool)], purge: bool) -> DdnsConfig {
    let mut config = DdnsConfig::new("test-token", ZONE_ID)
        .with_ttl(TTL)
        .with_purge(purge);
    for (label, proxied) in subdomains {
        config = config.with_subdomain(*label, *proxied);
    }
    config.engine.failure_backoff_secs = 0;
    config
}

/// Drain all events currently buffered in the channel
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<cfddns_core::EngineEvent>,
) -> Vec<cfddns_core::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
