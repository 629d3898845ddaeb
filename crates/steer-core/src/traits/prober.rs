//! Reachability prober trait
//!
//! A probe is a single round-trip reachability check with a short, fixed
//! timeout. Liveness is advisory: a probe that times out or fails at the
//! transport level reports "unavailable", it never surfaces an error.
//!
//! Verdict caching is owned by [`LivenessMonitor`](crate::LivenessMonitor);
//! implementations perform exactly one physical check per call.

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for reachability probe implementations
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one address, returning its reachability verdict
    async fn probe(&self, addr: IpAddr) -> bool;
}
