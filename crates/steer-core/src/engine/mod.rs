//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Fetching the optimal-IP snapshot via IpFeed
//! - Selecting the best candidate per carrier line (liveness-aware)
//! - Diffing desired state against the live authoritative record set
//! - Applying the minimal create/delete sequence via RecordStore
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐      ┌────────────────┐      ┌─────────────┐
//! │  IpFeed  │────▶ │   Reconciler   │────▶ │ RecordStore │
//! └──────────┘      └────────────────┘      └─────────────┘
//!                     │           │
//!                     ▼           ▼
//!             ┌───────────────┐ ┌────────┐
//!             │ LivenessMonitor│ │ Events │
//!             └───────────────┘ └────────┘
//! ```
//!
//! ## Cycle Flow (per unit)
//!
//! 1. Fetch snapshot; no data → logged skip
//! 2. No candidates for the unit's IP version → logged skip
//! 3. Select best candidate per configured line, consolidate identical
//!    addresses onto the default line
//! 4. List current records, reshape line→kind→value (first-wins on
//!    duplicate keys)
//! 5. Unchanged targets are skipped; changed targets get conflict
//!    pre-clean, delete of the stale record, then create
//!
//! Desired state is recomputed from the feed on every cycle, never cached;
//! the engine converges to a fixed point and stops mutating once desired
//! equals actual.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{EngineSettings, SteerConfig, UnitConfig};
use crate::error::Result;
use crate::liveness::LivenessMonitor;
use crate::selector;
use crate::traits::{
    AuthoritativeRecord, Candidate, FeedSnapshot, IpFeed, IpVersion, Line, Prober, RecordKind,
    RecordSpec, RecordStore,
};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        units_count: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },

    /// A unit's cycle ended without mutation attempts
    CycleSkipped {
        unit: String,
        reason: String,
    },

    /// A target already matched the live record; no mutation issued
    TargetUnchanged {
        unit: String,
        line: Line,
        value: String,
    },

    /// A conflicting record (CNAME vs address kind) was removed
    ConflictCleaned {
        unit: String,
        kind: RecordKind,
        record_id: String,
    },

    /// A record was steered to a new value
    RecordApplied {
        unit: String,
        line: Line,
        value: String,
        latency_ms: u32,
    },

    /// A create or delete against the provider failed
    ApplyFailed {
        unit: String,
        line: Line,
        error: String,
    },
}

/// Reshaped view of the live record set: (line, kind) -> (id, value).
///
/// Duplicate keys are possible under provider races; the first record seen
/// wins and the duplicate is left alone.
type CurrentValues = HashMap<(Line, RecordKind), (String, String)>;

/// Core reconciliation engine
///
/// One full pass of fetch → select → diff → apply per managed unit. The
/// scheduler loop ([`Reconciler::run`]) drives passes on a fixed tick;
/// units are individually gated by their own update interval.
///
/// ## Threading
///
/// The engine runs all operations on a single async task. Feed fetches,
/// probes, and provider calls happen sequentially within a cycle; the only
/// throttling discipline is the fixed pause between mutating calls.
///
/// ## Failure Policy
///
/// Nothing here is fatal to the process. A feed outage skips the cycle, a
/// failed provider call skips that target, and the loop carries on; the
/// next scheduled cycle retries naturally via the diff.
pub struct Reconciler {
    /// Optimal-IP feed
    feed: Box<dyn IpFeed>,

    /// Authoritative record store
    store: Box<dyn RecordStore>,

    /// Probe verdict cache
    liveness: LivenessMonitor,

    /// Managed units
    units: Vec<UnitConfig>,

    /// Engine settings
    settings: EngineSettings,

    /// Per-unit timestamp of the last reconciliation attempt
    last_attempt: Mutex<HashMap<String, Instant>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a new reconciliation engine
    ///
    /// # Parameters
    ///
    /// - `feed`: optimal-IP feed implementation
    /// - `store`: record store implementation
    /// - `prober`: reachability probe implementation
    /// - `config`: steering configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        feed: Box<dyn IpFeed>,
        store: Box<dyn RecordStore>,
        prober: Box<dyn Prober>,
        config: SteerConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let cache_duration = LivenessMonitor::cache_duration_for(Duration::from_secs(
            config.engine.check_interval_secs,
        ));
        let liveness = LivenessMonitor::new(prober, cache_duration);

        let engine = Self {
            feed,
            store,
            liveness,
            units: config.units,
            settings: config.engine,
            last_attempt: Mutex::new(HashMap::new()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until ctrl-c
    ///
    /// Reconciles every enabled unit immediately, then re-evaluates on the
    /// configured tick. One unit's reconciliation fully completes before
    /// the next unit is considered; passes never overlap.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a controlled shutdown signal (testing)
    ///
    /// Production code should use [`Reconciler::run`], which shuts down on
    /// OS signals rather than a programmatic channel.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            units_count: self.units.len(),
        });

        // Immediate pass on startup
        self.reconcile_all().await;

        let period = Duration::from_secs(self.settings.check_interval_secs);
        // First tick only after one full period; the startup pass already ran
        let mut ticks =
            IntervalStream::new(tokio::time::interval_at(tokio::time::Instant::now() + period, period));

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    Some(_) = ticks.next() => {
                        self.reconcile_due().await;
                    }

                    _ = &mut rx => {
                        info!("shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    Some(_) = ticks.next() => {
                        self.reconcile_due().await;
                    }

                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        }

        info!("engine stopped");
        Ok(())
    }

    /// Reconcile every enabled unit, ignoring interval gating.
    ///
    /// This is the startup pass; it is also the entry point for embedders
    /// and tests that drive cycles explicitly.
    pub async fn reconcile_all(&self) {
        for unit in &self.units {
            if !unit.enabled {
                debug!("unit {} is disabled, skipping", unit.key());
                continue;
            }
            self.attempt_unit(unit).await;
        }
    }

    /// Reconcile the units whose own update interval has elapsed
    async fn reconcile_due(&self) {
        for unit in &self.units {
            if !unit.enabled {
                continue;
            }

            let due = {
                let marks = self.last_attempt.lock().unwrap();
                marks.get(&unit.key()).is_none_or(|last| {
                    last.elapsed() >= Duration::from_secs(unit.update_interval_secs)
                })
            };

            if due {
                info!("unit {} is due for reconciliation", unit.key());
                self.attempt_unit(unit).await;
            }
        }
    }

    /// Run one unit's cycle and record the attempt mark
    async fn attempt_unit(&self, unit: &UnitConfig) {
        if let Err(e) = self.reconcile_unit(unit).await {
            // Unit-level failures are logged, never propagated to the loop
            error!("reconciliation of {} failed: {}", unit.key(), e);
        }
        self.last_attempt
            .lock()
            .unwrap()
            .insert(unit.key(), Instant::now());
    }

    /// One reconciliation cycle for one unit
    async fn reconcile_unit(&self, unit: &UnitConfig) -> Result<()> {
        let version = unit.record_type.version();
        let kind = unit.record_type.kind();

        // Fetch the snapshot; no data means no mutation this cycle
        let snapshot = match self.feed.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("feed unavailable, skipping {}: {}", unit.key(), e);
                self.emit_event(EngineEvent::CycleSkipped {
                    unit: unit.key(),
                    reason: "feed unavailable".to_string(),
                });
                return Ok(());
            }
        };

        if !snapshot.has_candidates(version) {
            warn!("no {} candidates in feed, skipping {}", version, unit.key());
            self.emit_event(EngineEvent::CycleSkipped {
                unit: unit.key(),
                reason: format!("no {} candidates", version),
            });
            return Ok(());
        }

        // Best candidate per configured line
        let best_by_line = self.select_by_line(unit, &snapshot, version).await;
        if best_by_line.is_empty() {
            warn!("no reachable candidate on any line, skipping {}", unit.key());
            self.emit_event(EngineEvent::CycleSkipped {
                unit: unit.key(),
                reason: "no reachable candidates".to_string(),
            });
            return Ok(());
        }

        let targets = consolidate(&best_by_line);

        // Live state; a listing failure leaves us blind, so no mutations
        let current = match self
            .store
            .list_records(&unit.domain, Some(&unit.sub_domain), None)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("record listing failed, skipping {}: {}", unit.key(), e);
                self.emit_event(EngineEvent::CycleSkipped {
                    unit: unit.key(),
                    reason: "record listing failed".to_string(),
                });
                return Ok(());
            }
        };

        let current_values = reshape(&current, &unit.sub_domain);
        let mut cleaned: HashSet<String> = HashSet::new();

        for (line, candidate) in targets {
            let target_value = candidate.addr.to_string();

            // Idempotence gate: converged targets issue no calls
            if let Some((_, value)) = current_values.get(&(line, kind.clone()))
                && *value == target_value
            {
                debug!(
                    "{} {} already resolves to {}, nothing to do",
                    unit.key(),
                    line,
                    target_value
                );
                self.emit_event(EngineEvent::TargetUnchanged {
                    unit: unit.key(),
                    line,
                    value: target_value,
                });
                continue;
            }

            self.apply_target(unit, &current, &current_values, &mut cleaned, line, &candidate)
                .await;
        }

        Ok(())
    }

    /// Best candidate for each of the unit's configured carrier lines.
    ///
    /// Lines with no candidate are omitted. Versions listed in the probe
    /// policy are liveness-filtered; the rest select on latency alone.
    async fn select_by_line(
        &self,
        unit: &UnitConfig,
        snapshot: &FeedSnapshot,
        version: IpVersion,
    ) -> Vec<(Line, Candidate)> {
        let probed = self.settings.probe_versions.contains(&version);

        let mut best = Vec::new();
        for line in Line::STEERED {
            if !unit.lines.contains(&line) {
                continue;
            }

            let candidate = if probed {
                selector::best_available_for_line(snapshot, version, line, &self.liveness).await
            } else {
                selector::best_for_line(snapshot, version, line).cloned()
            };

            if let Some(candidate) = candidate {
                best.push((line, candidate));
            }
        }
        best
    }

    /// Apply one differing target: conflict pre-clean, delete the stale
    /// record at the exact (sub_domain, kind, line) key, then create.
    ///
    /// A provider failure here is logged and ends this target's work only;
    /// the caller continues with the remaining targets.
    async fn apply_target(
        &self,
        unit: &UnitConfig,
        current: &[AuthoritativeRecord],
        current_values: &CurrentValues,
        cleaned: &mut HashSet<String>,
        line: Line,
        candidate: &Candidate,
    ) {
        let kind = unit.record_type.kind();

        // CNAME and address kinds are mutually exclusive at one name; it is
        // our job to enforce that, not the provider's. Delete-before-create
        // ordering is load-bearing.
        for record in current {
            if record.sub_domain == unit.sub_domain
                && record.kind.conflicts_with(&kind)
                && !cleaned.contains(&record.id)
            {
                info!(
                    "removing conflicting {} record at {}/{}",
                    record.kind, unit.domain, unit.sub_domain
                );
                match self.store.delete_record(&unit.domain, &record.id).await {
                    Ok(()) => {
                        cleaned.insert(record.id.clone());
                        self.emit_event(EngineEvent::ConflictCleaned {
                            unit: unit.key(),
                            kind: record.kind.clone(),
                            record_id: record.id.clone(),
                        });
                    }
                    Err(e) => {
                        warn!("failed to remove conflicting record {}: {}", record.id, e);
                        self.emit_event(EngineEvent::ApplyFailed {
                            unit: unit.key(),
                            line,
                            error: e.to_string(),
                        });
                    }
                }
                self.pause().await;
            }
        }

        // No atomic update primitive is relied upon: a changed value is
        // delete-then-create, with a brief window where the record is
        // absent. A failed delete skips the create so the key cannot end up
        // with two records.
        if let Some((record_id, stale_value)) = current_values.get(&(line, kind.clone())) {
            debug!(
                "replacing {} {} {} -> {}",
                unit.key(),
                line,
                stale_value,
                candidate.addr
            );
            if let Err(e) = self.store.delete_record(&unit.domain, record_id).await {
                warn!("failed to delete stale record {}: {}", record_id, e);
                self.emit_event(EngineEvent::ApplyFailed {
                    unit: unit.key(),
                    line,
                    error: e.to_string(),
                });
                self.pause().await;
                return;
            }
            self.pause().await;
        }

        let spec = RecordSpec {
            sub_domain: unit.sub_domain.clone(),
            kind: kind.clone(),
            line,
            value: candidate.addr.to_string(),
            ttl: unit.ttl,
            remark: unit.remark.clone(),
        };

        match self.store.create_record(&unit.domain, &spec).await {
            Ok(()) => {
                info!(
                    "steered {} {} -> {} ({}ms)",
                    unit.key(),
                    line,
                    candidate.addr,
                    candidate.latency_ms
                );
                self.emit_event(EngineEvent::RecordApplied {
                    unit: unit.key(),
                    line,
                    value: candidate.addr.to_string(),
                    latency_ms: candidate.latency_ms,
                });
            }
            Err(e) => {
                error!("failed to create record for {} {}: {}", unit.key(), line, e);
                self.emit_event(EngineEvent::ApplyFailed {
                    unit: unit.key(),
                    line,
                    error: e.to_string(),
                });
            }
        }
        self.pause().await;
    }

    /// Fixed pause between successive mutating provider calls
    async fn pause(&self) {
        if self.settings.mutation_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.mutation_pause_ms)).await;
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Dropping on a full channel bounds memory under slow consumers
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping event");
        }
    }
}

/// Collapse per-line winners into the mutation targets for one cycle.
///
/// All lines agreeing on one address collapse to a single default-line
/// target carrying the minimum latency among the contributors (for the
/// log, not for selection). Diverging lines each keep their own target,
/// plus a default-line target with the lowest-latency winner; on equal
/// latency the first line in fixed order wins.
fn consolidate(best_by_line: &[(Line, Candidate)]) -> Vec<(Line, Candidate)> {
    let Some((_, first)) = best_by_line.first() else {
        return Vec::new();
    };
    let unanimous = best_by_line.iter().all(|(_, c)| c.addr == first.addr);

    if unanimous {
        let mut min_latency = first.latency_ms;
        for (_, candidate) in best_by_line {
            if candidate.latency_ms < min_latency {
                min_latency = candidate.latency_ms;
            }
        }
        return vec![(Line::Default, Candidate::new(first.addr, min_latency))];
    }

    let mut winner = first;
    for (_, candidate) in &best_by_line[1..] {
        if candidate.latency_ms < winner.latency_ms {
            winner = candidate;
        }
    }

    let mut targets = best_by_line.to_vec();
    targets.push((Line::Default, winner.clone()));
    targets
}

/// Reshape a listing into (line, kind) -> (id, value) for one name.
///
/// Duplicates at a key (provider race) are kept lenient: the first record
/// encountered wins, the duplicate is neither used nor deleted.
fn reshape(records: &[AuthoritativeRecord], sub_domain: &str) -> CurrentValues {
    let mut values = CurrentValues::new();
    for record in records {
        if record.sub_domain != sub_domain {
            continue;
        }
        values
            .entry((record.line, record.kind.clone()))
            .or_insert_with(|| (record.id.clone(), record.value.clone()));
    }
    values
}
