//! Test doubles and common utilities for engine contract tests
//!
//! The mock record store keeps an operation log so tests can assert not
//! just what the engine mutated but the order it mutated in.

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use steer_core::config::{
    EngineSettings, FeedConfig, ProviderConfig, RecordType, SteerConfig, UnitConfig,
};
use steer_core::engine::EngineEvent;
use steer_core::error::Result;
use steer_core::traits::{
    AuthoritativeRecord, Candidate, FeedSnapshot, IpFeed, IpVersion, Line, Prober, RecordKind,
    RecordSpec, RecordStore,
};
use steer_core::{Error, Reconciler};

/// One provider call as observed by the mock store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Create {
        sub_domain: String,
        kind: RecordKind,
        line: Line,
        value: String,
    },
    Delete {
        record_id: String,
    },
}

impl StoreOp {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, StoreOp::List)
    }
}

/// In-memory record store that logs every call.
///
/// Creates append to the record set (with generated ids) so a second cycle
/// observes the state the first one left behind. Clones share state.
#[derive(Clone, Default)]
pub struct MockRecordStore {
    records: Arc<Mutex<Vec<AuthoritativeRecord>>>,
    ops: Arc<Mutex<Vec<StoreOp>>>,
    next_id: Arc<AtomicUsize>,
    fail_create_lines: Arc<Mutex<HashSet<Line>>>,
    fail_lists: Arc<Mutex<bool>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-existing record, returning its id
    pub fn seed(&self, sub_domain: &str, kind: RecordKind, line: Line, value: &str) -> String {
        let id = format!("seed-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(AuthoritativeRecord {
            id: id.clone(),
            sub_domain: sub_domain.to_string(),
            kind,
            line,
            value: value.to_string(),
            ttl: Some(600),
        });
        id
    }

    /// Make creates on one line fail
    pub fn fail_creates_on(&self, line: Line) {
        self.fail_create_lines.lock().unwrap().insert(line);
    }

    /// Make listings fail
    pub fn fail_lists(&self) {
        *self.fail_lists.lock().unwrap() = true;
    }

    /// All observed calls, in order
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Observed mutating calls, in order
    pub fn mutations(&self) -> Vec<StoreOp> {
        self.ops().into_iter().filter(StoreOp::is_mutation).collect()
    }

    /// Forget observed calls (state is kept)
    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Current record set
    pub fn records(&self) -> Vec<AuthoritativeRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn list_records(
        &self,
        _domain: &str,
        sub_domain: Option<&str>,
        kind: Option<&RecordKind>,
    ) -> Result<Vec<AuthoritativeRecord>> {
        self.ops.lock().unwrap().push(StoreOp::List);

        if *self.fail_lists.lock().unwrap() {
            return Err(Error::provider("mock", "listing disabled"));
        }

        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| sub_domain.is_none_or(|s| r.sub_domain == s))
            .filter(|r| kind.is_none_or(|k| &r.kind == k))
            .cloned()
            .collect())
    }

    async fn create_record(&self, _domain: &str, spec: &RecordSpec) -> Result<()> {
        self.ops.lock().unwrap().push(StoreOp::Create {
            sub_domain: spec.sub_domain.clone(),
            kind: spec.kind.clone(),
            line: spec.line,
            value: spec.value.clone(),
        });

        if self.fail_create_lines.lock().unwrap().contains(&spec.line) {
            return Err(Error::provider("mock", "create disabled for line"));
        }

        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(AuthoritativeRecord {
            id,
            sub_domain: spec.sub_domain.clone(),
            kind: spec.kind.clone(),
            line: spec.line,
            value: spec.value.clone(),
            ttl: Some(spec.ttl),
        });
        Ok(())
    }

    async fn delete_record(&self, _domain: &str, record_id: &str) -> Result<()> {
        self.ops.lock().unwrap().push(StoreOp::Delete {
            record_id: record_id.to_string(),
        });

        self.records.lock().unwrap().retain(|r| r.id != record_id);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

/// Feed that returns a fixed snapshot (or a failure)
#[derive(Clone, Default)]
pub struct StaticFeed {
    snapshot: Arc<Mutex<Option<FeedSnapshot>>>,
}

impl StaticFeed {
    /// Feed that always fails, simulating an outage
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: FeedSnapshot) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(Some(snapshot))),
        }
    }
}

#[async_trait]
impl IpFeed for StaticFeed {
    async fn fetch(&self) -> Result<FeedSnapshot> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::feed("feed offline"))
    }

    fn feed_name(&self) -> &'static str {
        "static"
    }
}

/// Prober that reports every address reachable
pub struct AlwaysUpProber;

#[async_trait]
impl Prober for AlwaysUpProber {
    async fn probe(&self, _addr: IpAddr) -> bool {
        true
    }
}

/// Prober with a fixed set of dead addresses
pub struct ScriptedProber {
    dead: HashSet<IpAddr>,
}

impl ScriptedProber {
    pub fn killing(addrs: &[&str]) -> Self {
        Self {
            dead: addrs.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, addr: IpAddr) -> bool {
        !self.dead.contains(&addr)
    }
}

/// Build a v4 snapshot from (line, addr, latency) triples
pub fn v4_snapshot(entries: &[(Line, &str, u32)]) -> FeedSnapshot {
    let mut snapshot = FeedSnapshot::new();
    for (line, addr, latency) in entries {
        snapshot.push(
            IpVersion::V4,
            *line,
            Candidate::new(addr.parse().unwrap(), *latency),
        );
    }
    snapshot
}

/// Build a v6 snapshot from (line, addr, latency) triples
pub fn v6_snapshot(entries: &[(Line, &str, u32)]) -> FeedSnapshot {
    let mut snapshot = FeedSnapshot::new();
    for (line, addr, latency) in entries {
        snapshot.push(
            IpVersion::V6,
            *line,
            Candidate::new(addr.parse().unwrap(), *latency),
        );
    }
    snapshot
}

/// One managed unit pointing at www.<domain>
pub fn www_unit(domain: &str, record_type: RecordType) -> UnitConfig {
    UnitConfig::new(domain, record_type).with_sub_domain("www")
}

/// Minimal config for the given units, tuned so tests run without pauses
pub fn test_config(units: Vec<UnitConfig>) -> SteerConfig {
    SteerConfig {
        feed: FeedConfig::Http {
            url: "http://feed.invalid/optimal".to_string(),
        },
        provider: ProviderConfig::Dnspod {
            token_id: "1234".to_string(),
            token: "test-token".to_string(),
        },
        units,
        engine: EngineSettings {
            check_interval_secs: 1,
            mutation_pause_ms: 0,
            ..EngineSettings::default()
        },
    }
}

/// Construct an engine over test doubles
pub fn engine_with(
    feed: impl IpFeed + 'static,
    store: impl RecordStore + 'static,
    prober: impl Prober + 'static,
    units: Vec<UnitConfig>,
) -> (Reconciler, tokio::sync::mpsc::Receiver<EngineEvent>) {
    Reconciler::new(
        Box::new(feed),
        Box::new(store),
        Box::new(prober),
        test_config(units),
    )
    .expect("engine construction succeeds")
}

/// Drain every event currently queued
pub fn drain_events(rx: &mut tokio::sync::mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
