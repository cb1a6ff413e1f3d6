//! EC2 instance-metadata functions for templar.
//!
//! [`AwsNamespace`] is a [`FuncGroup`] that publishes:
//!
//! | helper | result |
//! |---|---|
//! | `{{ec2meta "instance-id" "default"}}` | `meta-data/<key>` |
//! | `{{ec2dynamic "instance-identity/document"}}` | `dynamic/<key>` |
//! | `{{ec2tag "Name"}}` | instance tag value |
//! | `{{ec2region}}` | region from the identity document, else `"unknown"` |
//! | `{{aws "EC2Meta" "instance-id"}}` | any of the above by operation name |
//!
//! Lookups never fail a render. When the metadata service cannot be reached the caller's
//! default is returned, or `""` (`"unknown"` for the region).
//!
//! Nothing touches the network until a template calls one of these helpers. The
//! namespace's operations object ([`AwsFuncs`]) is built once per [`AwsNamespace`] and
//! shared by every helper and clone.

pub mod funcs;
pub mod info;
pub mod meta;

use std::sync::Arc;
use std::time::Duration;

use handlebars::{Handlebars, JsonValue};
use templar_core::lazy::LazyResource;
use templar_core::namespace::{register_fn, to_text, FuncGroup};

pub use funcs::AwsFuncs;
pub use info::Ec2Info;
pub use meta::{Ec2Meta, HttpMetadataSource, MetadataSource, OfflineSource};

/// Instance metadata service address.
pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";

/// Per-request timeout for metadata lookups.
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Builds the transport for a new metadata client.
pub type SourceFactory = Arc<dyn Fn() -> Arc<dyn MetadataSource> + Send + Sync>;

/// Where and how to reach the metadata service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// The `aws` function group.
#[derive(Clone)]
pub struct AwsNamespace {
    funcs: Arc<LazyResource<AwsFuncs>>,
    source: SourceFactory,
}

impl AwsNamespace {
    /// Talk to the metadata service described by `config` over HTTP.
    pub fn new(config: AwsConfig) -> Self {
        Self::with_source_factory(http_factory(config))
    }

    pub fn with_source_factory(source: SourceFactory) -> Self {
        Self {
            funcs: Arc::new(LazyResource::new()),
            source,
        }
    }

    /// The shared operations object, built on first call.
    pub fn ns(&self) -> Arc<AwsFuncs> {
        self.funcs.get(|| AwsFuncs::new(Arc::clone(&self.source)))
    }
}

impl std::fmt::Debug for AwsNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsNamespace")
            .field("funcs", &self.funcs)
            .finish()
    }
}

impl FuncGroup for AwsNamespace {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn functions(&self) -> Vec<&'static str> {
        vec!["aws", "ec2meta", "ec2dynamic", "ec2tag", "ec2region"]
    }

    fn install(&self, registry: &mut Handlebars<'static>) {
        let ns = self.clone();
        register_fn(registry, "aws", move |args| {
            let args = texts(args);
            let (op, rest) = args
                .split_first()
                .ok_or_else(|| "missing operation name".to_string())?;
            ns.ns().call(op, rest).map(JsonValue::String)
        });

        // Flat aliases.
        for (name, op) in [
            ("ec2meta", "EC2Meta"),
            ("ec2dynamic", "EC2Dynamic"),
            ("ec2tag", "EC2Tag"),
            ("ec2region", "EC2Region"),
        ] {
            let ns = self.clone();
            register_fn(registry, name, move |args| {
                ns.ns().call(op, &texts(args)).map(JsonValue::String)
            });
        }
    }
}

fn texts(args: &[&JsonValue]) -> Vec<String> {
    args.iter().map(|v| to_text(v)).collect()
}

fn http_factory(config: AwsConfig) -> SourceFactory {
    Arc::new(move || -> Arc<dyn MetadataSource> {
        match HttpMetadataSource::new(&config.endpoint, config.timeout) {
            Ok(source) => {
                tracing::info!("using instance metadata endpoint {}", config.endpoint);
                Arc::new(source)
            }
            Err(e) => {
                tracing::warn!("instance metadata disabled: {e:#}");
                Arc::new(OfflineSource)
            }
        }
    })
}

pub(crate) fn offline_factory() -> SourceFactory {
    Arc::new(|| -> Arc<dyn MetadataSource> { Arc::new(OfflineSource) })
}
