// # IP Feed Trait
//
// Defines the interface for fetching the optimal-IP candidate snapshot.
//
// ## Implementations
//
// - HTTP-based: `steer-feed-http` crate
// - Future: file-based fixtures, aggregating feeds
//
// ## Usage
//
// ```rust,ignore
// use steer_core::{IpFeed, IpVersion, Line};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let feed = /* IpFeed implementation */;
//
//     let snapshot = feed.fetch().await?;
//     for candidate in snapshot.candidates(IpVersion::V4, Line::Mobile) {
//         println!("{} ({}ms)", candidate.addr, candidate.latency_ms);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// IP version of a candidate bucket (A records steer v4, AAAA steer v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "v4"),
            IpVersion::V6 => write!(f, "v6"),
        }
    }
}

/// A network-operator-specific DNS view.
///
/// `Default` is the cross-operator view; the other three are the carrier
/// lines the feed partitions candidates by. The declaration order is the
/// fixed iteration order used everywhere a deterministic sweep is needed
/// (tie-breaks, snapshot traversal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Line {
    Default,
    Mobile,
    Unicom,
    Telecom,
}

impl Line {
    /// The carrier lines candidates are steered per-line on, in fixed order.
    pub const STEERED: [Line; 3] = [Line::Mobile, Line::Unicom, Line::Telecom];

    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Line::Default => "default",
            Line::Mobile => "mobile",
            Line::Unicom => "unicom",
            Line::Telecom => "telecom",
        }
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Line {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Line::Default),
            "mobile" => Ok(Line::Mobile),
            "unicom" => Ok(Line::Unicom),
            "telecom" => Ok(Line::Telecom),
            other => Err(crate::Error::invalid_input(format!("unknown line: {}", other))),
        }
    }
}

/// An (address, latency) pair reported by the feed for one version/line.
///
/// Latency is milliseconds, lower is better. Equality is by both fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Candidate address
    pub addr: IpAddr,
    /// Measured latency in milliseconds
    pub latency_ms: u32,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(addr: IpAddr, latency_ms: u32) -> Self {
        Self { addr, latency_ms }
    }
}

/// One fetch of the optimal-IP feed: version -> line -> ordered candidates.
///
/// Produced fresh on every fetch and never cached across reconciliation
/// cycles. Candidate order within a line is the feed's order; it is the
/// tie-break when latencies are equal (first seen wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    buckets: BTreeMap<IpVersion, BTreeMap<Line, Vec<Candidate>>>,
}

impl FeedSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate to a version/line bucket, preserving feed order
    pub fn push(&mut self, version: IpVersion, line: Line, candidate: Candidate) {
        self.buckets
            .entry(version)
            .or_default()
            .entry(line)
            .or_default()
            .push(candidate);
    }

    /// Candidates for one version/line, empty when the bucket is absent
    pub fn candidates(&self, version: IpVersion, line: Line) -> &[Candidate] {
        self.buckets
            .get(&version)
            .and_then(|lines| lines.get(&line))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate the non-empty lines of a version in fixed `Line` order
    pub fn lines(&self, version: IpVersion) -> impl Iterator<Item = (Line, &[Candidate])> {
        self.buckets
            .get(&version)
            .into_iter()
            .flat_map(|lines| lines.iter().map(|(line, c)| (*line, c.as_slice())))
    }

    /// True when any line of the version has at least one candidate
    pub fn has_candidates(&self, version: IpVersion) -> bool {
        self.lines(version).any(|(_, candidates)| !candidates.is_empty())
    }
}

/// Trait for optimal-IP feed implementations
///
/// One read operation per reconciliation cycle. A fetch failure is "no data
/// this cycle" for the units depending on it; the engine logs and skips,
/// it never escalates.
///
/// Implementations must be thread-safe and usable across async tasks. They
/// must not cache snapshots, retry internally, or make steering decisions;
/// retry cadence is owned by the scheduler loop.
#[async_trait]
pub trait IpFeed: Send + Sync {
    /// Fetch the current candidate snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(FeedSnapshot)`: The freshly fetched snapshot
    /// - `Err(Error)`: Transport failure or malformed payload
    async fn fetch(&self) -> Result<FeedSnapshot, crate::Error>;

    /// Get the feed name (for logging/debugging)
    fn feed_name(&self) -> &'static str;
}

/// Helper trait for constructing feeds from configuration
pub trait IpFeedFactory: Send + Sync {
    /// Create an IpFeed instance from configuration
    fn create(&self, config: &crate::config::FeedConfig) -> Result<Box<dyn IpFeed>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_preserves_feed_order() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.push(IpVersion::V4, Line::Mobile, Candidate::new("1.1.1.1".parse().unwrap(), 10));
        snapshot.push(IpVersion::V4, Line::Mobile, Candidate::new("2.2.2.2".parse().unwrap(), 10));

        let candidates = snapshot.candidates(IpVersion::V4, Line::Mobile);
        assert_eq!(candidates[0].addr, "1.1.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(candidates[1].addr, "2.2.2.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn absent_bucket_is_empty_not_error() {
        let snapshot = FeedSnapshot::new();
        assert!(snapshot.candidates(IpVersion::V6, Line::Telecom).is_empty());
        assert!(!snapshot.has_candidates(IpVersion::V6));
    }

    #[test]
    fn lines_iterate_in_fixed_order() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.push(IpVersion::V4, Line::Telecom, Candidate::new("4.4.4.4".parse().unwrap(), 9));
        snapshot.push(IpVersion::V4, Line::Mobile, Candidate::new("2.2.2.2".parse().unwrap(), 5));

        let order: Vec<Line> = snapshot.lines(IpVersion::V4).map(|(line, _)| line).collect();
        assert_eq!(order, vec![Line::Mobile, Line::Telecom]);
    }

    #[test]
    fn line_parses_from_config_strings() {
        assert_eq!("mobile".parse::<Line>().unwrap(), Line::Mobile);
        assert_eq!(" Telecom ".parse::<Line>().unwrap(), Line::Telecom);
        assert!("backbone".parse::<Line>().is_err());
    }
}
