// # HTTP Optimal-IP Feed
//
// This crate provides the HTTP feed client for the steering system.
//
// ## Wire Format
//
// The feed answers one GET with an envelope:
//
// ```json
// {
//   "success": true,
//   "data": {
//     "v4": {
//       "CM": [{"ip": "1.2.3.4", "latency": 10}],
//       "CU": [{"ip": "5.6.7.8", "latency": 12}],
//       "CT": [{"ip": "9.9.9.9", "latency": 11}]
//     },
//     "v6": {}
//   }
// }
// ```
//
// `CM`/`CU`/`CT` are the mobile/unicom/telecom carrier buckets. Unknown
// line keys are ignored; entries whose address does not parse are dropped.
// `success: false`, transport failures, and malformed payloads all surface
// as errors, which the engine treats as "no data this cycle".

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use steer_core::ProviderRegistry;
use steer_core::config::FeedConfig;
use steer_core::traits::{Candidate, FeedSnapshot, IpFeed, IpFeedFactory, IpVersion, Line};
use steer_core::{Error, Result};

/// Default HTTP timeout for feed requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Response envelope: `success` gates `data`
#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<FeedData>,
}

/// Candidate buckets keyed by carrier label
#[derive(Debug, Default, Deserialize)]
struct FeedData {
    #[serde(default)]
    v4: HashMap<String, Vec<FeedEntry>>,
    #[serde(default)]
    v6: HashMap<String, Vec<FeedEntry>>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    ip: String,
    latency: u32,
}

/// Feed carrier label -> line, `None` for buckets we do not steer
fn line_for_label(label: &str) -> Option<Line> {
    match label {
        "CM" => Some(Line::Mobile),
        "CU" => Some(Line::Unicom),
        "CT" => Some(Line::Telecom),
        _ => None,
    }
}

/// HTTP-based optimal-IP feed
pub struct HttpFeed {
    /// URL to fetch the snapshot from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpFeed {
    /// Create a new HTTP feed client
    ///
    /// # Parameters
    ///
    /// - `url`: endpoint returning the snapshot envelope
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

/// Convert a parsed envelope into a snapshot, dropping malformed entries
fn snapshot_from_envelope(envelope: FeedEnvelope) -> Result<FeedSnapshot> {
    if !envelope.success {
        return Err(Error::feed("feed reported success=false"));
    }

    let data = envelope
        .data
        .ok_or_else(|| Error::feed("feed envelope has no data"))?;

    let mut snapshot = FeedSnapshot::new();
    for (version, buckets) in [(IpVersion::V4, data.v4), (IpVersion::V6, data.v6)] {
        for (label, entries) in buckets {
            let Some(line) = line_for_label(&label) else {
                tracing::debug!("ignoring unknown feed bucket: {}", label);
                continue;
            };
            for entry in entries {
                match entry.ip.parse::<IpAddr>() {
                    Ok(addr) => snapshot.push(version, line, Candidate::new(addr, entry.latency)),
                    Err(_) => {
                        tracing::debug!("dropping unparsable feed address: {}", entry.ip);
                    }
                }
            }
        }
    }

    Ok(snapshot)
}

#[async_trait::async_trait]
impl IpFeed for HttpFeed {
    async fn fetch(&self) -> Result<FeedSnapshot> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::feed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::feed(format!("HTTP error: {}", response.status())));
        }

        let envelope: FeedEnvelope = response
            .json()
            .await
            .map_err(|e| Error::feed(format!("failed to parse response: {}", e)))?;

        snapshot_from_envelope(envelope)
    }

    fn feed_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP feeds
pub struct HttpFeedFactory;

impl IpFeedFactory for HttpFeedFactory {
    fn create(&self, config: &FeedConfig) -> Result<Box<dyn IpFeed>> {
        match config {
            FeedConfig::Http { url } => Ok(Box::new(HttpFeed::new(url.clone()))),
            _ => Err(Error::config("invalid config for HTTP feed")),
        }
    }
}

/// Register the HTTP feed with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_feed("http", Box::new(HttpFeedFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<FeedSnapshot> {
        let envelope: FeedEnvelope = serde_json::from_str(text).map_err(Error::from)?;
        snapshot_from_envelope(envelope)
    }

    #[test]
    fn factory_creation() {
        let factory = HttpFeedFactory;

        let config = FeedConfig::Http {
            url: "https://feed.example/optimal".to_string(),
        };

        assert!(factory.create(&config).is_ok());
    }

    #[test]
    fn carrier_buckets_map_to_lines() {
        let snapshot = parse(
            r#"{"success": true, "data": {"v4": {
                "CM": [{"ip": "1.1.1.1", "latency": 10}],
                "CU": [{"ip": "2.2.2.2", "latency": 12}],
                "CT": [{"ip": "3.3.3.3", "latency": 11}]
            }}}"#,
        )
        .unwrap();

        assert_eq!(snapshot.candidates(IpVersion::V4, Line::Mobile).len(), 1);
        assert_eq!(
            snapshot.candidates(IpVersion::V4, Line::Unicom)[0].addr,
            "2.2.2.2".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            snapshot.candidates(IpVersion::V4, Line::Telecom)[0].latency_ms,
            11
        );
    }

    #[test]
    fn unsuccessful_envelope_is_an_error() {
        assert!(parse(r#"{"success": false}"#).is_err());
        assert!(parse(r#"{"success": true}"#).is_err());
    }

    #[test]
    fn unknown_buckets_and_bad_addresses_are_dropped() {
        let snapshot = parse(
            r#"{"success": true, "data": {"v4": {
                "CM": [{"ip": "not-an-ip", "latency": 5}, {"ip": "1.1.1.1", "latency": 9}],
                "ABROAD": [{"ip": "8.8.8.8", "latency": 1}]
            }}}"#,
        )
        .unwrap();

        let mobile = snapshot.candidates(IpVersion::V4, Line::Mobile);
        assert_eq!(mobile.len(), 1);
        assert_eq!(mobile[0].latency_ms, 9);
        assert!(!snapshot.has_candidates(IpVersion::V6));
    }

    #[test]
    fn v6_bucket_parses_independently() {
        let snapshot = parse(
            r#"{"success": true, "data": {
                "v4": {},
                "v6": {"CT": [{"ip": "2606:4700::1", "latency": 40}]}
            }}"#,
        )
        .unwrap();

        assert!(snapshot.has_candidates(IpVersion::V6));
        assert!(!snapshot.has_candidates(IpVersion::V4));
    }
}
