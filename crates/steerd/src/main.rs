// # steerd - Steering Daemon
//
// Thin integration layer for the latency-steered DNS reconciler:
// 1. Reads configuration from environment variables
// 2. Initializes tracing and the runtime
// 3. Registers the record store and feed implementations
// 4. Starts the reconciliation engine
//
// All steering logic lives in steer-core; nothing here makes DNS
// decisions.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Provider
// - `STEER_DNSPOD_ID`: DNSPod API token ID
// - `STEER_DNSPOD_TOKEN`: DNSPod API token secret
// - `STEER_MODE`: set to `dry-run` to log mutations without applying them
//
// ### Feed
// - `STEER_FEED_URL`: optimal-IP feed endpoint (defaults to the public
//   feed)
//
// ### Engine
// - `STEER_CHECK_INTERVAL_SECS`: scheduler tick (default 60)
// - `STEER_MUTATION_PAUSE_MS`: pause between mutating calls (default 500)
// - `STEER_PROBE_PORT`: TCP port probed for reachability (default 443)
// - `STEER_PROBE_TIMEOUT_MS`: per-probe timeout (default 1500)
// - `STEER_PROBE_VERSIONS`: comma list of probed versions (default "v4")
// - `STEER_LOG_LEVEL`: trace|debug|info|warn|error (default info)
//
// ### Units (indexed, starting at 1)
// - `STEER_DOMAIN_<i>`: registered domain (required per unit)
// - `STEER_SUB_DOMAIN_<i>`: host part (default "@")
// - `STEER_TTL_<i>`: record TTL (default 600)
// - `STEER_UPDATE_INTERVAL_SECS_<i>`: per-unit interval (default 900)
// - `STEER_ENABLED_<i>`: whether the unit is reconciled (default true)
// - `STEER_LINES_<i>`: steered carrier lines (default
//   "mobile,unicom,telecom")
// - `STEER_REMARK_<i>`: remark attached to created records (default
//   "steer")
// - `STEER_IPV4_ENABLED_<i>` / `STEER_IPV6_ENABLED_<i>`: each enabled
//   version yields one unit (A and/or AAAA; v4 defaults on, v6 off)
//
// ## Example
//
// ```bash
// export STEER_DNSPOD_ID=12345
// export STEER_DNSPOD_TOKEN=your_token
// export STEER_DOMAIN_1=example.com
// export STEER_SUB_DOMAIN_1=www
//
// steerd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use steer_core::config::RecordType;
use steer_core::traits::{IpVersion, Line};
use steer_core::{
    EngineSettings, FeedConfig, ProviderConfig, Reconciler, SteerConfig, TcpProber, UnitConfig,
};

/// Public optimal-IP feed used when no endpoint is configured
const DEFAULT_FEED_URL: &str = "https://api.vvhan.com/tool/cf_ip";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SteerExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SteerExitCode> for ExitCode {
    fn from(code: SteerExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration assembled from the environment
struct Config {
    steer: SteerConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let token_id = env::var("STEER_DNSPOD_ID").unwrap_or_default();
        let token = env::var("STEER_DNSPOD_TOKEN").unwrap_or_default();

        let feed_url = env::var("STEER_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());

        let mut engine = EngineSettings::default();
        if let Some(secs) = parse_env("STEER_CHECK_INTERVAL_SECS")? {
            engine.check_interval_secs = secs;
        }
        if let Some(ms) = parse_env("STEER_MUTATION_PAUSE_MS")? {
            engine.mutation_pause_ms = ms;
        }
        if let Some(port) = parse_env("STEER_PROBE_PORT")? {
            engine.probe_port = port;
        }
        if let Some(ms) = parse_env("STEER_PROBE_TIMEOUT_MS")? {
            engine.probe_timeout_ms = ms;
        }
        if let Ok(raw) = env::var("STEER_PROBE_VERSIONS") {
            engine.probe_versions = parse_versions(&raw)?;
        }

        Ok(Self {
            steer: SteerConfig {
                feed: FeedConfig::Http { url: feed_url },
                provider: ProviderConfig::Dnspod { token_id, token },
                units: units_from_env()?,
                engine,
            },
            log_level: env::var("STEER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Everything that can be rejected before touching the network is
    /// rejected here, with actionable messages.
    fn validate(&self) -> Result<()> {
        let ProviderConfig::Dnspod { token_id, token } = &self.steer.provider else {
            anyhow::bail!("steerd only wires the DNSPod provider");
        };

        if token_id.is_empty() || token.is_empty() {
            anyhow::bail!(
                "STEER_DNSPOD_ID and STEER_DNSPOD_TOKEN are required. \
                Set them via: export STEER_DNSPOD_ID=... STEER_DNSPOD_TOKEN=..."
            );
        }

        // Catch obvious placeholder tokens (common mistake)
        let token_lower = token.to_lowercase();
        if token_lower.contains("your_token")
            || token_lower.contains("replace_me")
            || token_lower.contains("example")
            || token_lower == "token"
        {
            anyhow::bail!(
                "STEER_DNSPOD_TOKEN appears to be a placeholder. \
                Use an actual API token from DNSPod."
            );
        }

        if self.steer.units.is_empty() {
            anyhow::bail!(
                "At least one unit is required. \
                Set it via: export STEER_DOMAIN_1=example.com"
            );
        }

        for unit in &self.steer.units {
            validate_domain_name(&unit.domain)?;

            if !(1..=86400).contains(&unit.ttl) {
                anyhow::bail!(
                    "STEER_TTL must be between 1 and 86400 seconds. Got: {}",
                    unit.ttl
                );
            }

            if !(10..=86400).contains(&unit.update_interval_secs) {
                anyhow::bail!(
                    "STEER_UPDATE_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                    unit.update_interval_secs
                );
            }
        }

        let interval = self.steer.engine.check_interval_secs;
        if !(1..=3600).contains(&interval) {
            anyhow::bail!(
                "STEER_CHECK_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "STEER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional numeric environment variable
fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

/// Parse a boolean environment variable with a default
fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => raw.to_lowercase() == "true",
        Err(_) => default,
    }
}

/// Parse a comma-separated list of IP versions
fn parse_versions(raw: &str) -> Result<Vec<IpVersion>> {
    let mut versions = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match part.to_lowercase().as_str() {
            "v4" => versions.push(IpVersion::V4),
            "v6" => versions.push(IpVersion::V6),
            other => anyhow::bail!("STEER_PROBE_VERSIONS entry '{}' is not v4 or v6", other),
        }
    }
    Ok(versions)
}

/// Parse a comma-separated list of carrier lines
fn parse_lines(raw: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let line: Line = part
            .parse()
            .map_err(|e| anyhow::anyhow!("STEER_LINES entry rejected: {}", e))?;
        if line != Line::Default {
            // The default line is always derived, never configured
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Assemble units from the indexed STEER_DOMAIN_<i> environment scheme.
///
/// Each index yields one unit per enabled IP version (A and/or AAAA).
fn units_from_env() -> Result<Vec<UnitConfig>> {
    let mut units = Vec::new();

    let mut i = 1;
    while let Ok(domain) = env::var(format!("STEER_DOMAIN_{}", i)) {
        let sub_domain =
            env::var(format!("STEER_SUB_DOMAIN_{}", i)).unwrap_or_else(|_| "@".to_string());
        let remark = env::var(format!("STEER_REMARK_{}", i)).unwrap_or_else(|_| "steer".to_string());
        let ttl = parse_env(&format!("STEER_TTL_{}", i))?.unwrap_or(600);
        let update_interval_secs =
            parse_env(&format!("STEER_UPDATE_INTERVAL_SECS_{}", i))?.unwrap_or(900);
        let enabled = env_flag(&format!("STEER_ENABLED_{}", i), true);
        let lines = match env::var(format!("STEER_LINES_{}", i)) {
            Ok(raw) => parse_lines(&raw)?,
            Err(_) => Line::STEERED.to_vec(),
        };

        let mut push_unit = |record_type: RecordType| {
            let mut unit = UnitConfig::new(domain.clone(), record_type)
                .with_sub_domain(sub_domain.clone())
                .with_ttl(ttl)
                .with_enabled(enabled)
                .with_update_interval_secs(update_interval_secs)
                .with_lines(lines.clone());
            unit.remark = Some(remark.clone());
            units.push(unit);
        };

        if env_flag(&format!("STEER_IPV4_ENABLED_{}", i), true) {
            push_unit(RecordType::A);
        }
        if env_flag(&format!("STEER_IPV6_ENABLED_{}", i), false) {
            push_unit(RecordType::Aaaa);
        }

        i += 1;
    }

    Ok(units)
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 validation; not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SteerExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SteerExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SteerExitCode::ConfigError.into();
    }

    info!("starting steerd daemon");
    info!("configuration loaded: {} unit(s)", config.steer.units.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return SteerExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        if let Err(e) = run_daemon(config.steer).await {
            error!("daemon error: {}", e);
            SteerExitCode::RuntimeError
        } else {
            SteerExitCode::CleanShutdown
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: SteerConfig) -> Result<()> {
    // Create provider registry and register built-in implementations
    let registry = steer_core::ProviderRegistry::new();

    #[cfg(feature = "dnspod")]
    {
        info!("registering DNSPod record store");
        steer_provider_dnspod::register(&registry);
    }

    #[cfg(feature = "http-feed")]
    {
        info!("registering HTTP feed");
        steer_feed_http::register(&registry);
    }

    let store = registry.create_record_store(&config.provider)?;
    let feed = registry.create_feed(&config.feed)?;

    let prober = TcpProber::new(
        config.engine.probe_port,
        Duration::from_millis(config.engine.probe_timeout_ms),
    );

    for unit in &config.units {
        info!("managing unit: {}", unit.key());
    }

    let (engine, mut events) = Reconciler::new(feed, store, Box::new(prober), config)?;

    // Drain engine events into the log so the bounded channel never fills
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!("engine event: {:?}", event);
        }
    });

    info!("starting reconciliation engine");
    engine.run().await?;

    Ok(())
}
