//! Candidate selection
//!
//! Pure, deterministic functions over a [`FeedSnapshot`]: find the
//! lowest-latency candidate for one line, or across every line of a
//! version. `None` means the scope has no candidates; that is "no update
//! this cycle", not an error.
//!
//! The `*_available` variants additionally consult the
//! [`LivenessMonitor`]: candidates are tried in ascending-latency order and
//! the first reachable one wins. Which IP versions get the liveness
//! treatment is the caller's policy, not encoded here.
//!
//! Tie-break everywhere: strict `<` comparison, so on equal latency the
//! first candidate seen wins (feed order within a line, fixed [`Line`]
//! order across lines).

use crate::liveness::LivenessMonitor;
use crate::traits::{Candidate, FeedSnapshot, IpVersion, Line};

/// Lowest-latency candidate across all lines of `version`.
///
/// Returns `None` iff every line of the version is empty or absent.
pub fn best_overall(snapshot: &FeedSnapshot, version: IpVersion) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for (_, candidates) in snapshot.lines(version) {
        for candidate in candidates {
            if best.is_none_or(|b| candidate.latency_ms < b.latency_ms) {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Lowest-latency candidate restricted to one line.
pub fn best_for_line(snapshot: &FeedSnapshot, version: IpVersion, line: Line) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for candidate in snapshot.candidates(version, line) {
        if best.is_none_or(|b| candidate.latency_ms < b.latency_ms) {
            best = Some(candidate);
        }
    }
    best
}

/// Lowest-latency *reachable* candidate across all lines of `version`.
pub async fn best_available_overall(
    snapshot: &FeedSnapshot,
    version: IpVersion,
    liveness: &LivenessMonitor,
) -> Option<Candidate> {
    let pool: Vec<&Candidate> = snapshot
        .lines(version)
        .flat_map(|(_, candidates)| candidates.iter())
        .collect();
    first_available(pool, liveness).await
}

/// Lowest-latency *reachable* candidate restricted to one line.
pub async fn best_available_for_line(
    snapshot: &FeedSnapshot,
    version: IpVersion,
    line: Line,
    liveness: &LivenessMonitor,
) -> Option<Candidate> {
    let pool: Vec<&Candidate> = snapshot.candidates(version, line).iter().collect();
    first_available(pool, liveness).await
}

/// Probe candidates in ascending-latency order, first available wins.
///
/// The sort is stable, so equal latencies keep their pool order.
async fn first_available(
    mut pool: Vec<&Candidate>,
    liveness: &LivenessMonitor,
) -> Option<Candidate> {
    pool.sort_by_key(|candidate| candidate.latency_ms);
    for candidate in pool {
        if liveness.is_available(candidate.addr).await {
            return Some(candidate.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Prober;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::net::IpAddr;
    use std::time::Duration;

    fn snapshot(entries: &[(Line, &str, u32)]) -> FeedSnapshot {
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

    /// Prober with a fixed set of dead addresses
    struct ScriptedProber {
        dead: HashSet<IpAddr>,
    }

    impl ScriptedProber {
        fn killing(addrs: &[&str]) -> Self {
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

    fn monitor(dead: &[&str]) -> LivenessMonitor {
        LivenessMonitor::new(Box::new(ScriptedProber::killing(dead)), Duration::from_secs(1))
    }

    #[test]
    fn best_overall_returns_strict_minimum_across_lines() {
        let s = snapshot(&[
            (Line::Mobile, "2.2.2.2", 5),
            (Line::Unicom, "3.3.3.3", 7),
            (Line::Telecom, "4.4.4.4", 9),
        ]);
        let best = best_overall(&s, IpVersion::V4).unwrap();
        assert_eq!(best.addr, "2.2.2.2".parse::<IpAddr>().unwrap());
        assert_eq!(best.latency_ms, 5);
    }

    #[test]
    fn best_overall_none_iff_every_line_empty() {
        assert!(best_overall(&FeedSnapshot::new(), IpVersion::V4).is_none());

        let s = snapshot(&[(Line::Mobile, "1.1.1.1", 10)]);
        assert!(best_overall(&s, IpVersion::V6).is_none());
        assert!(best_overall(&s, IpVersion::V4).is_some());
    }

    #[test]
    fn best_for_line_is_min_by_latency_over_that_line() {
        let s = snapshot(&[
            (Line::Unicom, "1.1.1.1", 12),
            (Line::Unicom, "2.2.2.2", 8),
            (Line::Mobile, "3.3.3.3", 1),
        ]);
        let best = best_for_line(&s, IpVersion::V4, Line::Unicom).unwrap();
        assert_eq!(best.addr, "2.2.2.2".parse::<IpAddr>().unwrap());

        assert!(best_for_line(&s, IpVersion::V4, Line::Telecom).is_none());
    }

    #[test]
    fn equal_latency_keeps_first_seen() {
        let s = snapshot(&[
            (Line::Mobile, "1.1.1.1", 10),
            (Line::Mobile, "9.9.9.9", 10),
        ]);
        let best = best_for_line(&s, IpVersion::V4, Line::Mobile).unwrap();
        assert_eq!(best.addr, "1.1.1.1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn liveness_gate_never_returns_an_unavailable_candidate() {
        let s = snapshot(&[
            (Line::Mobile, "1.1.1.1", 3),
            (Line::Mobile, "2.2.2.2", 20),
        ]);
        // The latency-optimal candidate is dead
        let m = monitor(&["1.1.1.1"]);

        let best = best_available_for_line(&s, IpVersion::V4, Line::Mobile, &m)
            .await
            .unwrap();
        assert_eq!(best.addr, "2.2.2.2".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn all_unavailable_yields_none() {
        let s = snapshot(&[
            (Line::Telecom, "1.1.1.1", 3),
            (Line::Telecom, "2.2.2.2", 4),
        ]);
        let m = monitor(&["1.1.1.1", "2.2.2.2"]);

        assert!(
            best_available_for_line(&s, IpVersion::V4, Line::Telecom, &m)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn available_variant_probes_in_ascending_latency_order() {
        let s = snapshot(&[
            (Line::Mobile, "5.5.5.5", 50),
            (Line::Unicom, "6.6.6.6", 2),
        ]);
        let m = monitor(&[]);

        let best = best_available_overall(&s, IpVersion::V4, &m).await.unwrap();
        assert_eq!(best.addr, "6.6.6.6".parse::<IpAddr>().unwrap());
    }
}
