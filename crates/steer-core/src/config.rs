//! Configuration types for the steering system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::traits::{IpVersion, Line, RecordKind};

/// Main steering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteerConfig {
    /// Optimal-IP feed configuration
    pub feed: FeedConfig,

    /// Authoritative record store configuration
    pub provider: ProviderConfig,

    /// Managed units (one per domain/sub-domain/record-type)
    pub units: Vec<UnitConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineSettings,
}

impl SteerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.units.is_empty() {
            return Err(crate::Error::config("no units configured"));
        }

        self.provider.validate()?;
        self.feed.validate()?;

        for unit in &self.units {
            unit.validate()?;
        }

        if self.engine.check_interval_secs == 0 {
            return Err(crate::Error::config("check interval must be > 0"));
        }

        Ok(())
    }
}

/// Optimal-IP feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedConfig {
    /// HTTP feed returning the `{success, data}` snapshot envelope
    Http {
        /// URL to fetch the snapshot from
        url: String,
    },

    /// Custom feed
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl FeedConfig {
    /// Validate the feed configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            FeedConfig::Http { url } => {
                if url.is_empty() {
                    return Err(crate::Error::config("feed URL cannot be empty"));
                }
                Ok(())
            }
            FeedConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("custom feed factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom feed config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the feed type name
    pub fn type_name(&self) -> &str {
        match self {
            FeedConfig::Http { .. } => "http",
            FeedConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Authoritative record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// DNSPod provider
    Dnspod {
        /// API token ID
        token_id: String,
        /// API token secret
        token: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Dnspod { token_id, token } => {
                if token_id.is_empty() || token.is_empty() {
                    return Err(crate::Error::config("DNSPod credentials cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Dnspod { .. } => "dnspod",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Managed record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// The IP version this record type steers
    pub fn version(&self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }

    /// The provider-facing record kind
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordType::A => RecordKind::A,
            RecordType::Aaaa => RecordKind::Aaaa,
        }
    }
}

/// One managed unit: a (domain, sub-domain, record type) tuple under this
/// system's control. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Registered domain (e.g., "example.com")
    pub domain: String,

    /// Host part relative to the domain ("@" for the apex)
    #[serde(default = "default_sub_domain")]
    pub sub_domain: String,

    /// Record type to steer
    pub record_type: RecordType,

    /// TTL for created records
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Remark attached to created records
    #[serde(default)]
    pub remark: Option<String>,

    /// Whether this unit is reconciled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum seconds between reconciliation attempts for this unit
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Carrier lines steered per-line (the default line is always derived)
    #[serde(default = "default_lines")]
    pub lines: Vec<Line>,
}

impl UnitConfig {
    /// Create a unit with defaults for everything but the identity
    pub fn new(domain: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            domain: domain.into(),
            sub_domain: default_sub_domain(),
            record_type,
            ttl: default_ttl(),
            remark: None,
            enabled: default_enabled(),
            update_interval_secs: default_update_interval_secs(),
            lines: default_lines(),
        }
    }

    /// Set the sub-domain
    pub fn with_sub_domain(mut self, sub_domain: impl Into<String>) -> Self {
        self.sub_domain = sub_domain.into();
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the steered lines
    pub fn with_lines(mut self, lines: Vec<Line>) -> Self {
        self.lines = lines;
        self
    }

    /// Enable or disable the unit
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the per-unit reconciliation interval
    pub fn with_update_interval_secs(mut self, secs: u64) -> Self {
        self.update_interval_secs = secs;
        self
    }

    /// Stable key identifying this unit in scheduling state and logs
    pub fn key(&self) -> String {
        format!(
            "{}/{}:{}",
            self.domain,
            self.sub_domain,
            self.record_type.kind()
        )
    }

    /// Validate the unit configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("unit domain cannot be empty"));
        }
        if self.sub_domain.is_empty() {
            return Err(crate::Error::config("unit sub_domain cannot be empty"));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config("unit ttl must be > 0"));
        }
        if self.update_interval_secs == 0 {
            return Err(crate::Error::config("unit update interval must be > 0"));
        }
        Ok(())
    }
}

fn default_sub_domain() -> String {
    "@".to_string()
}

fn default_ttl() -> u32 {
    600
}

fn default_enabled() -> bool {
    true
}

fn default_update_interval_secs() -> u64 {
    900
}

fn default_lines() -> Vec<Line> {
    Line::STEERED.to_vec()
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Scheduler tick interval in seconds
    ///
    /// Units are evaluated every tick and reconciled once their own
    /// `update_interval_secs` has elapsed since their last attempt.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Pause between successive mutating provider calls (milliseconds)
    ///
    /// Also imposed between a delete and its paired create. Rate-limit
    /// courtesy toward the provider API.
    #[serde(default = "default_mutation_pause_ms")]
    pub mutation_pause_ms: u64,

    /// TCP port probed for candidate reachability
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// IP versions whose candidates are liveness-filtered before selection
    ///
    /// Versions not listed select on latency alone.
    #[serde(default = "default_probe_versions")]
    pub probe_versions: Vec<IpVersion>,

    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            mutation_pause_ms: default_mutation_pause_ms(),
            probe_port: default_probe_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_versions: default_probe_versions(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_mutation_pause_ms() -> u64 {
    500
}

fn default_probe_port() -> u16 {
    crate::liveness::DEFAULT_PROBE_PORT
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_probe_versions() -> Vec<IpVersion> {
    vec![IpVersion::V4]
}

fn default_event_channel_capacity() -> usize {
    1000
}
