// # steer-core
//
// Core library for the latency-steered DNS reconciler.
//
// ## Architecture Overview
//
// This library continuously steers a set of DNS hostnames toward the
// lowest-latency address reported by an external optimal-IP feed,
// partitioned by carrier line (mobile/unicom/telecom) and IP version:
//
// - **IpFeed**: Trait for fetching the candidate-IP snapshot
// - **RecordStore**: Trait for the authoritative DNS provider
//   (list/create/delete records)
// - **Prober**: Trait for advisory reachability probes
// - **Reconciler**: Engine that diffs desired state against the live
//   record set and applies the minimal mutation sequence
// - **ProviderRegistry**: Plugin-based registry for record stores and feeds
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Convergent**: Desired state is recomputed from the feed every cycle
//    and the engine stops mutating once desired == actual
// 3. **Plugin-Based**: Stores and feeds are registered dynamically
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Best-Effort**: A flaky feed or provider never terminates the loop

pub mod traits;
pub mod selector;
pub mod liveness;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpFeed, RecordStore, Prober};
pub use traits::{FeedSnapshot, Candidate, IpVersion, Line, RecordKind, AuthoritativeRecord};
pub use engine::Reconciler;
pub use liveness::{LivenessMonitor, TcpProber};
pub use registry::ProviderRegistry;
pub use config::{SteerConfig, FeedConfig, ProviderConfig, UnitConfig, EngineSettings};
pub use error::{Error, Result};
