// # Liveness Monitor
//
// Advisory reachability checking with a bounded-staleness verdict cache.
//
// ## Purpose
//
// The feed refreshes frequently and the same addresses recur across units
// and cycles. Probing every candidate on every evaluation would be
// redundant, so verdicts are cached for a bounded duration derived from the
// scheduler interval: `cache_duration = max(1, check_interval / 3)` seconds,
// so the cache refreshes at least three times within one reconciliation
// interval.
//
// ## Crash Behavior
//
// The cache is memory-only. A fresh process re-probes from scratch, which
// is accepted behavior.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::traits::Prober;

/// Default TCP port probed for reachability
pub const DEFAULT_PROBE_PORT: u16 = 443;

/// Default probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Clock seam so cache expiry is testable without real sleeps
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall-clock implementation of [`Clock`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cached probe verdict for one address
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    available: bool,
    checked_at: Instant,
}

/// Liveness monitor wrapping a [`Prober`] with a verdict cache.
///
/// Owned by the reconciliation engine; the cache map is touched only from
/// the single engine task, the mutex documents the ownership discipline
/// should a future version evaluate units in parallel.
pub struct LivenessMonitor {
    prober: Box<dyn Prober>,
    clock: Box<dyn Clock>,
    cache_duration: Duration,
    cache: Mutex<HashMap<IpAddr, CacheEntry>>,
}

impl LivenessMonitor {
    /// Create a monitor with the system clock
    pub fn new(prober: Box<dyn Prober>, cache_duration: Duration) -> Self {
        Self::with_clock(prober, Box::new(SystemClock), cache_duration)
    }

    /// Create a monitor with an injected clock (testing)
    pub fn with_clock(
        prober: Box<dyn Prober>,
        clock: Box<dyn Clock>,
        cache_duration: Duration,
    ) -> Self {
        Self {
            prober,
            clock,
            cache_duration,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Cache duration derived from the scheduler check interval:
    /// `max(1, check_interval / 3)` seconds.
    pub fn cache_duration_for(check_interval: Duration) -> Duration {
        Duration::from_secs((check_interval.as_secs() / 3).max(1))
    }

    /// Reachability verdict for one address.
    ///
    /// Serves the cached verdict when it is younger than the cache
    /// duration; otherwise performs a fresh probe and overwrites the entry.
    /// Never fails: probe errors are "unavailable".
    pub async fn is_available(&self, addr: IpAddr) -> bool {
        let now = self.clock.now();

        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(&addr)
                && now.duration_since(entry.checked_at) < self.cache_duration
            {
                return entry.available;
            }
        }

        let available = self.prober.probe(addr).await;
        debug!("probed {}: {}", addr, if available { "available" } else { "unavailable" });

        self.cache.lock().unwrap().insert(
            addr,
            CacheEntry {
                available,
                checked_at: now,
            },
        );

        available
    }

    /// Number of cached verdicts (testing/introspection)
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

/// TCP-connect reachability prober.
///
/// A single connection round-trip with a short fixed timeout; the
/// connection is dropped immediately on success.
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    /// Create a prober targeting the given port with the given timeout
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: IpAddr) -> bool {
        let target = SocketAddr::new(addr, self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("probe {} failed: {}", target, e);
                false
            }
            Err(_) => {
                debug!("probe {} timed out after {:?}", target, self.timeout);
                false
            }
        }
    }
}
