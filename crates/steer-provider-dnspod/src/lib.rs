// # DNSPod Record Store
//
// This crate provides the DNSPod record store implementation for the
// steering system.
//
// ## API Surface
//
// - List records: POST `Record.List` (optionally narrowed by sub_domain
//   and record type)
// - Create record: POST `Record.Create`
// - Delete record: POST `Record.Remove`
//
// Every request is a form POST to `https://dnsapi.cn/{path}` carrying the
// common parameters (`login_token`, `format=json`, `lang=cn`,
// `error_on_empty=no`). The HTTP status is almost always 200; the real
// verdict is the envelope's `status.code`, where `"1"` is success and
// anything else carries a `status.message`.
//
// DNSPod keys records by (sub_domain, type, line) and names lines with
// Chinese carrier labels; this crate maps them to [`Line`] and skips
// records on lines it does not steer.
//
// ## Architectural Constraints
//
// - Makes one HTTP request per trait method call
// - Full error propagation to the engine (which owns retry cadence,
//   throttling, and the delete-then-create protocol)
// - NO retry logic, NO caching, NO background tasks
// - Dry-run mode performs listings but logs and skips mutations
//
// ## Security
//
// The API token never appears in logs; the Debug implementation redacts it.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use steer_core::config::ProviderConfig;
use steer_core::traits::{
    AuthoritativeRecord, Line, RecordKind, RecordSpec, RecordStore, RecordStoreFactory,
};
use steer_core::{Error, Result};

/// DNSPod API base URL
const DNSPOD_API_BASE: &str = "https://dnsapi.cn";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// DNSPod carrier label for a line
fn label_for_line(line: Line) -> &'static str {
    match line {
        Line::Default => "默认",
        Line::Mobile => "移动",
        Line::Unicom => "联通",
        Line::Telecom => "电信",
    }
}

/// Line for a DNSPod carrier label, `None` for lines we do not steer
fn line_for_label(label: &str) -> Option<Line> {
    match label {
        "默认" => Some(Line::Default),
        "移动" => Some(Line::Mobile),
        "联通" => Some(Line::Unicom),
        "电信" => Some(Line::Telecom),
        _ => None,
    }
}

/// DNSPod record store
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store performs `Record.List` requests but
/// logs the intended `Record.Create`/`Record.Remove` payloads instead of
/// sending them. This allows safe validation against a live zone.
pub struct DnspodStore {
    /// API token ID
    token_id: String,

    /// API token secret
    /// ⚠️ NEVER log this value
    token: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: list allowed, mutations logged and skipped
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DnspodStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnspodStore")
            .field("token_id", &self.token_id)
            .field("token", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DnspodStore {
    /// Create a new DNSPod store
    ///
    /// # Parameters
    ///
    /// - `token_id`: DNSPod API token ID
    /// - `token`: DNSPod API token secret
    /// - `dry_run`: if true, perform listings but skip mutations
    pub fn new(token_id: impl Into<String>, token: impl Into<String>, dry_run: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            token_id: token_id.into(),
            token: token.into(),
            client,
            dry_run,
        }
    }

    /// Create a store in live mode
    pub fn new_live(token_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(token_id, token, false)
    }

    /// Create a store in dry-run mode
    pub fn new_dry_run(token_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(token_id, token, true)
    }

    /// Issue one API request and unwrap the DNSPod envelope
    ///
    /// # Parameters
    ///
    /// - `path`: API method path (e.g., "Record.List")
    /// - `params`: method-specific form parameters
    async fn api_request(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", DNSPOD_API_BASE, path);
        let login_token = format!("{},{}", self.token_id, self.token);

        let mut form: Vec<(&str, &str)> = vec![
            ("login_token", login_token.as_str()),
            ("format", "json"),
            ("lang", "cn"),
            ("error_on_empty", "no"),
        ];
        form.extend_from_slice(params);

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::provider("dnspod", format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return match status.as_u16() {
                401 | 403 => Err(Error::auth(format!(
                    "DNSPod rejected the credentials. Status: {}",
                    status
                ))),
                429 => Err(Error::rate_limited(format!(
                    "DNSPod rate limit exceeded. Status: {}",
                    status
                ))),
                _ => Err(Error::provider(
                    "dnspod",
                    format!("{} returned HTTP {}", path, status),
                )),
            };
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::provider("dnspod", format!("failed to parse response: {}", e)))?;

        // The envelope code is a string; "1" is the only success value
        let code = json["status"]["code"].as_str().unwrap_or("-1");
        if code != "1" {
            let message = json["status"]["message"].as_str().unwrap_or("unknown error");
            return Err(Error::provider(
                "dnspod",
                format!("{} failed (code {}): {}", path, code, message),
            ));
        }

        Ok(json)
    }
}

/// Parse one record object from a `Record.List` response.
///
/// Records on lines we do not steer, or with fields missing, yield `None`
/// and are skipped by the caller.
fn parse_record(value: &Value) -> Option<AuthoritativeRecord> {
    // DNSPod serializes ids as strings in v2 responses and numbers in some
    // older payloads; tolerate both.
    let id = match &value["id"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let sub_domain = value["name"].as_str()?.to_string();
    let kind = RecordKind::from_provider(value["type"].as_str()?);
    let line = line_for_label(value["line"].as_str()?)?;
    let record_value = value["value"].as_str()?.to_string();

    let ttl = match &value["ttl"] {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        _ => None,
    };

    Some(AuthoritativeRecord {
        id,
        sub_domain,
        kind,
        line,
        value: record_value,
        ttl,
    })
}

#[async_trait]
impl RecordStore for DnspodStore {
    async fn list_records(
        &self,
        domain: &str,
        sub_domain: Option<&str>,
        kind: Option<&RecordKind>,
    ) -> Result<Vec<AuthoritativeRecord>> {
        let mut params: Vec<(&str, &str)> = vec![("domain", domain)];
        if let Some(sub_domain) = sub_domain {
            params.push(("sub_domain", sub_domain));
        }
        if let Some(kind) = kind {
            params.push(("record_type", kind.as_str()));
        }

        let json = self.api_request("Record.List", &params).await?;

        let mut records = Vec::new();
        if let Some(raw_records) = json["records"].as_array() {
            for raw in raw_records {
                match parse_record(raw) {
                    Some(record) => records.push(record),
                    None => tracing::debug!("skipping unrecognized record entry: {}", raw),
                }
            }
        }

        tracing::debug!("listed {} records for {}", records.len(), domain);
        Ok(records)
    }

    async fn create_record(&self, domain: &str, spec: &RecordSpec) -> Result<()> {
        let ttl = spec.ttl.to_string();
        let line = label_for_line(spec.line);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] would create {} record {}/{} line {} -> {}",
                spec.kind,
                domain,
                spec.sub_domain,
                spec.line,
                spec.value
            );
            return Ok(());
        }

        let mut params: Vec<(&str, &str)> = vec![
            ("domain", domain),
            ("sub_domain", &spec.sub_domain),
            ("record_type", spec.kind.as_str()),
            ("record_line", line),
            ("value", &spec.value),
            ("ttl", &ttl),
        ];
        if let Some(remark) = &spec.remark {
            params.push(("remark", remark));
        }

        self.api_request("Record.Create", &params).await?;

        tracing::info!(
            "created {} record {}/{} line {} -> {}",
            spec.kind,
            domain,
            spec.sub_domain,
            spec.line,
            spec.value
        );
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] would delete record {} of {}", record_id, domain);
            return Ok(());
        }

        self.api_request("Record.Remove", &[("domain", domain), ("record_id", record_id)])
            .await?;

        tracing::info!("deleted record {} of {}", record_id, domain);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "dnspod"
    }
}

/// Factory for creating DNSPod stores
pub struct DnspodFactory;

impl RecordStoreFactory for DnspodFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            ProviderConfig::Dnspod { token_id, token } => {
                if token_id.is_empty() || token.is_empty() {
                    return Err(Error::config("DNSPod credentials are required"));
                }

                // Dry-run selection mirrors the daemon's mode switch
                let dry_run = std::env::var("STEER_MODE")
                    .unwrap_or_default()
                    .to_lowercase()
                    == "dry-run";

                if dry_run {
                    tracing::warn!(
                        "DNSPod store running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(DnspodStore::new(
                    token_id.clone(),
                    token.clone(),
                    dry_run,
                )))
            }
            _ => Err(Error::config("invalid config for DNSPod store")),
        }
    }
}

/// Register the DNSPod store with a registry
pub fn register(registry: &steer_core::ProviderRegistry) {
    registry.register_record_store("dnspod", Box::new(DnspodFactory));
}
