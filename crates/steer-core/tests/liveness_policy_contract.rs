//! Engine Contract Test: Liveness Policy
//!
//! Candidate selection is liveness-aware only for the versions named in
//! the probe policy (v4 by default). A latency-optimal but unreachable v4
//! candidate must never be steered to; v6 selection ignores liveness
//! entirely under the default policy.

mod common;

use common::*;
use steer_core::config::RecordType;
use steer_core::engine::EngineEvent;
use steer_core::traits::{Line, RecordKind};

#[tokio::test]
async fn unreachable_v4_candidate_is_never_steered_to() {
    let store = MockRecordStore::new();
    // The latency-optimal candidate is dead; the runner-up is fine
    let feed = StaticFeed::with_snapshot(v4_snapshot(&[
        (Line::Mobile, "1.1.1.1", 3),
        (Line::Mobile, "2.2.2.2", 20),
    ]));

    let (engine, _events) = engine_with(
        feed,
        store.clone(),
        ScriptedProber::killing(&["1.1.1.1"]),
        vec![www_unit("example.com", RecordType::A)],
    );

    engine.reconcile_all().await;

    assert_eq!(
        store.mutations(),
        vec![StoreOp::Create {
            sub_domain: "www".to_string(),
            kind: RecordKind::A,
            line: Line::Default,
            value: "2.2.2.2".to_string(),
        }]
    );
}

#[tokio::test]
async fn all_candidates_unreachable_skips_the_cycle() {
    let store = MockRecordStore::new();
    let feed = StaticFeed::with_snapshot(v4_snapshot(&[
        (Line::Mobile, "1.1.1.1", 3),
        (Line::Telecom, "2.2.2.2", 4),
    ]));

    let (engine, mut events) = engine_with(
        feed,
        store.clone(),
        ScriptedProber::killing(&["1.1.1.1", "2.2.2.2"]),
        vec![www_unit("example.com", RecordType::A)],
    );

    engine.reconcile_all().await;

    assert!(store.ops().is_empty());
    assert!(
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, EngineEvent::CycleSkipped { .. }))
    );
}

#[tokio::test]
async fn v6_selection_ignores_liveness_by_design() {
    let store = MockRecordStore::new();
    let feed = StaticFeed::with_snapshot(v6_snapshot(&[(Line::Telecom, "2606:4700::1", 40)]));

    // The v6 candidate is "dead", but the default policy never probes v6
    let (engine, _events) = engine_with(
        feed,
        store.clone(),
        ScriptedProber::killing(&["2606:4700::1"]),
        vec![www_unit("example.com", RecordType::Aaaa)],
    );

    engine.reconcile_all().await;

    assert_eq!(
        store.mutations(),
        vec![StoreOp::Create {
            sub_domain: "www".to_string(),
            kind: RecordKind::Aaaa,
            line: Line::Default,
            value: "2606:4700::1".to_string(),
        }]
    );
}
