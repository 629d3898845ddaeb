// # Record Store Trait
//
// Defines the interface for the authoritative DNS provider: list records for
// a scope, create a record, delete a record by identifier.
//
// No in-place "modify" primitive is assumed to exist uniformly across
// providers; callers compose delete+create when changing a record's value,
// accepting the brief window where the record is absent.
//
// ## Implementations
//
// - DNSPod: `steer-provider-dnspod` crate
// - Future: Cloudflare, Aliyun, etc.

use async_trait::async_trait;

use super::ip_feed::{IpVersion, Line};

/// DNS record kind as exposed by the provider.
///
/// A and AAAA are the managed kinds; CNAME participates in conflict
/// pre-cleaning (it is mutually exclusive with any other kind at the same
/// name); anything else found in a listing is tolerated and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    A,
    Aaaa,
    Cname,
    Other(String),
}

impl RecordKind {
    /// The managed kind steering a given IP version
    pub fn for_version(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordKind::A,
            IpVersion::V6 => RecordKind::Aaaa,
        }
    }

    /// The IP version this kind steers, `None` for non-address kinds
    pub fn ip_version(&self) -> Option<IpVersion> {
        match self {
            RecordKind::A => Some(IpVersion::V4),
            RecordKind::Aaaa => Some(IpVersion::V6),
            _ => None,
        }
    }

    /// Provider wire name ("A", "AAAA", "CNAME", ...)
    pub fn as_str(&self) -> &str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
            RecordKind::Cname => "CNAME",
            RecordKind::Other(s) => s,
        }
    }

    /// Parse a provider wire name; unknown kinds are preserved, not rejected
    pub fn from_provider(s: &str) -> Self {
        match s {
            "A" => RecordKind::A,
            "AAAA" => RecordKind::Aaaa,
            "CNAME" => RecordKind::Cname,
            other => RecordKind::Other(other.to_string()),
        }
    }

    /// Whether two kinds may not coexist at the same name.
    ///
    /// CNAME excludes every other kind at a name; address kinds coexist
    /// with each other.
    pub fn conflicts_with(&self, other: &RecordKind) -> bool {
        match (self, other) {
            (RecordKind::Cname, RecordKind::Cname) => false,
            (RecordKind::Cname, _) | (_, RecordKind::Cname) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record as reported by the provider.
///
/// Identity is the provider-assigned `id`. The provider normally keeps at
/// most one record per (sub_domain, kind, line), but that invariant can be
/// violated transiently by provider races; callers must tolerate duplicates
/// in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeRecord {
    /// Provider-assigned record identifier
    pub id: String,
    /// Host part relative to the domain ("@" for the apex)
    pub sub_domain: String,
    /// Record kind
    pub kind: RecordKind,
    /// Network line the record answers on
    pub line: Line,
    /// Record value (address text for A/AAAA)
    pub value: String,
    /// Time-to-live, when reported
    pub ttl: Option<u32>,
}

/// Value object describing a record to create.
///
/// Plain immutable construction per call; no request-object mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub sub_domain: String,
    pub kind: RecordKind,
    pub line: Line,
    pub value: String,
    pub ttl: u32,
    pub remark: Option<String>,
}

/// Trait for authoritative record store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// Implementations perform exactly one provider API call per method and
/// surface failures as errors. They must not retry, pause, or reorder
/// calls; inter-call throttling and the delete-then-create protocol are
/// owned by the [`Reconciler`](crate::Reconciler).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List records under a domain
    ///
    /// Both filters are optional narrowing, never required: `sub_domain`
    /// restricts to one name, `kind` to one record kind.
    async fn list_records(
        &self,
        domain: &str,
        sub_domain: Option<&str>,
        kind: Option<&RecordKind>,
    ) -> Result<Vec<AuthoritativeRecord>, crate::Error>;

    /// Create one record
    async fn create_record(&self, domain: &str, spec: &RecordSpec)
    -> Result<(), crate::Error>;

    /// Delete one record by provider identifier
    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_provider_names() {
        assert_eq!(RecordKind::from_provider("A"), RecordKind::A);
        assert_eq!(RecordKind::from_provider("AAAA"), RecordKind::Aaaa);
        assert_eq!(RecordKind::from_provider("CNAME"), RecordKind::Cname);
        assert_eq!(
            RecordKind::from_provider("TXT"),
            RecordKind::Other("TXT".to_string())
        );
        assert_eq!(RecordKind::Aaaa.as_str(), "AAAA");
    }

    #[test]
    fn cname_conflicts_with_address_kinds() {
        assert!(RecordKind::Cname.conflicts_with(&RecordKind::A));
        assert!(RecordKind::Aaaa.conflicts_with(&RecordKind::Cname));
        assert!(!RecordKind::A.conflicts_with(&RecordKind::Aaaa));
        assert!(!RecordKind::Cname.conflicts_with(&RecordKind::Cname));
    }

    #[test]
    fn kind_maps_versions() {
        assert_eq!(RecordKind::for_version(IpVersion::V4), RecordKind::A);
        assert_eq!(RecordKind::for_version(IpVersion::V6), RecordKind::Aaaa);
        assert_eq!(RecordKind::Cname.ip_version(), None);
    }
}
