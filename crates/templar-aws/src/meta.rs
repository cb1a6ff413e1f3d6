//! Instance-metadata client.
//!
//! [`Ec2Meta`] answers `meta-data/...` and `dynamic/...` lookups through a
//! [`MetadataSource`]. Successful answers are cached per path. The first transport failure
//! marks the client as not running on EC2, after which every lookup skips the network and
//! returns its default.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::Value as JsonValue;

/// Region reported when the metadata service gives no answer and no default was supplied.
pub const UNKNOWN_REGION: &str = "unknown";

const IDENTITY_DOCUMENT: &str = "dynamic/instance-identity/document";

/// Something that can answer paths under `<endpoint>/latest/`.
///
/// `Ok(None)` means the service answered but has no value (404 and friends). `Err` means
/// the service could not be reached at all.
pub trait MetadataSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Option<String>>;
}

/// Blocking HTTP client for the EC2 instance metadata service.
#[derive(Debug)]
pub struct HttpMetadataSource {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpMetadataSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build metadata HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/latest/{}", self.endpoint, path.trim_start_matches('/'))
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch(&self, path: &str) -> Result<Option<String>> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?;

        if !response.status().is_success() {
            tracing::debug!("metadata {path}: HTTP {}", response.status());
            return Ok(None);
        }
        let body = response
            .text()
            .with_context(|| format!("reading body of {url}"))?;
        Ok(Some(body))
    }
}

/// A source that is never reachable. Used when no HTTP client could be built.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSource;

impl MetadataSource for OfflineSource {
    fn fetch(&self, _path: &str) -> Result<Option<String>> {
        Err(anyhow!("instance metadata service unavailable"))
    }
}

/// Caching metadata client.
pub struct Ec2Meta {
    source: Arc<dyn MetadataSource>,
    cache: Mutex<HashMap<String, String>>,
    non_aws: AtomicBool,
}

impl Ec2Meta {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            non_aws: AtomicBool::new(false),
        }
    }

    /// A client that already knows it is not on EC2.
    pub fn offline() -> Self {
        let meta = Self::new(Arc::new(OfflineSource));
        meta.non_aws.store(true, Ordering::Relaxed);
        meta
    }

    /// Whether a transport failure has been seen.
    pub fn is_non_aws(&self) -> bool {
        self.non_aws.load(Ordering::Relaxed)
    }

    /// `meta-data/<key>`, or `default`, or `""`.
    pub fn meta(&self, key: &str, default: Option<&str>) -> String {
        self.lookup(&format!("meta-data/{key}"))
            .unwrap_or_else(|| default.unwrap_or_default().to_string())
    }

    /// `dynamic/<key>`, or `default`, or `""`.
    pub fn dynamic(&self, key: &str, default: Option<&str>) -> String {
        self.lookup(&format!("dynamic/{key}"))
            .unwrap_or_else(|| default.unwrap_or_default().to_string())
    }

    /// The `region` of the instance identity document, or `default`, or `"unknown"`.
    pub fn region(&self, default: Option<&str>) -> String {
        self.lookup(IDENTITY_DOCUMENT)
            .and_then(|doc| region_from_document(&doc))
            .unwrap_or_else(|| default.unwrap_or(UNKNOWN_REGION).to_string())
    }

    /// Fetch `path`, consulting and filling the cache. `None` on any failure.
    pub fn lookup(&self, path: &str) -> Option<String> {
        if self.is_non_aws() {
            return None;
        }
        if let Some(hit) = self.cache_lock().get(path) {
            return Some(hit.clone());
        }

        match self.source.fetch(path) {
            Ok(Some(value)) => {
                self.cache_lock().insert(path.to_string(), value.clone());
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("instance metadata unreachable, using defaults: {e:#}");
                self.non_aws.store(true, Ordering::Relaxed);
                None
            }
        }
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Ec2Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ec2Meta")
            .field("non_aws", &self.is_non_aws())
            .field("cached", &self.cache_lock().len())
            .finish()
    }
}

fn region_from_document(doc: &str) -> Option<String> {
    let doc: JsonValue = serde_json::from_str(doc).ok()?;
    doc.get("region")?.as_str().map(str::to_string)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// In-memory metadata service. Paths not in `values` answer `Ok(None)`.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub values: HashMap<String, String>,
        pub unreachable: bool,
        pub calls: AtomicUsize,
    }

    impl StubSource {
        pub fn with(values: &[(&str, &str)]) -> Self {
            Self {
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MetadataSource for StubSource {
        fn fetch(&self, path: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.values.get(path).cloned())
        }
    }

    #[test]
    fn test_unreachable_uses_defaults() {
        let meta = Ec2Meta::new(Arc::new(StubSource::unreachable()));
        assert_eq!(meta.region(None), "unknown");
        assert_eq!(meta.region(Some("eu-west-1")), "eu-west-1");
        assert_eq!(meta.meta("foo", None), "");
        assert_eq!(meta.meta("foo", Some("bar")), "bar");
        assert_eq!(meta.dynamic("foo", None), "");
        assert!(meta.is_non_aws());
    }

    #[test]
    fn test_first_failure_stops_network_use() {
        let source = Arc::new(StubSource::unreachable());
        let meta = Ec2Meta::new(source.clone());

        meta.meta("instance-id", None);
        meta.meta("instance-id", None);
        meta.region(None);

        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_values_are_cached() {
        let source = Arc::new(StubSource::with(&[("meta-data/instance-id", "i-1234")]));
        let meta = Ec2Meta::new(source.clone());

        assert_eq!(meta.meta("instance-id", None), "i-1234");
        assert_eq!(meta.meta("instance-id", Some("ignored")), "i-1234");
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_missing_key_defaults_without_going_offline() {
        let source = Arc::new(StubSource::with(&[("meta-data/ami-id", "ami-1")]));
        let meta = Ec2Meta::new(source.clone());

        assert_eq!(meta.meta("nope", Some("dflt")), "dflt");
        assert!(!meta.is_non_aws());
        assert_eq!(meta.meta("ami-id", None), "ami-1");
    }

    #[test]
    fn test_region_from_identity_document() {
        let doc = r#"{"region":"us-east-2","instanceId":"i-1"}"#;
        let meta = Ec2Meta::new(Arc::new(StubSource::with(&[(IDENTITY_DOCUMENT, doc)])));
        assert_eq!(meta.region(Some("eu-west-1")), "us-east-2");
        assert_eq!(
            meta.dynamic("instance-identity/document", None),
            doc.to_string()
        );
    }

    #[test]
    fn test_malformed_document_falls_back() {
        let meta = Ec2Meta::new(Arc::new(StubSource::with(&[(IDENTITY_DOCUMENT, "<html>")])));
        assert_eq!(meta.region(None), "unknown");
    }

    #[test]
    fn test_offline_client_never_fetches() {
        let meta = Ec2Meta::offline();
        assert!(meta.is_non_aws());
        assert_eq!(meta.meta("foo", None), "");
    }

    #[test]
    fn test_http_source_url() {
        let source =
            HttpMetadataSource::new("http://169.254.169.254/", Duration::from_millis(10)).unwrap();
        assert_eq!(
            source.url("meta-data/instance-id"),
            "http://169.254.169.254/latest/meta-data/instance-id"
        );
        assert_eq!(
            source.url("/dynamic/x"),
            "http://169.254.169.254/latest/dynamic/x"
        );
    }
}
