//! The operations behind the `aws` namespace.

use std::sync::Arc;

use templar_core::lazy::LazyResource;

use crate::info::Ec2Info;
use crate::meta::Ec2Meta;
use crate::SourceFactory;

/// EC2 lookups with lazily constructed clients.
///
/// Neither client exists until an operation needs it: region, meta and dynamic share the
/// metadata client, tags use the info client. Each is built exactly once.
pub struct AwsFuncs {
    meta: LazyResource<Ec2Meta>,
    info: LazyResource<Ec2Info>,
    source: SourceFactory,
}

impl AwsFuncs {
    pub fn new(source: SourceFactory) -> Self {
        Self {
            meta: LazyResource::new(),
            info: LazyResource::new(),
            source,
        }
    }

    /// Use already-built clients instead of constructing them on first use.
    pub fn with_clients(meta: Ec2Meta, info: Ec2Info) -> Self {
        Self {
            meta: LazyResource::ready(meta),
            info: LazyResource::ready(info),
            source: crate::offline_factory(),
        }
    }

    pub fn ec2_region(&self, default: Option<&str>) -> String {
        self.meta().region(default)
    }

    pub fn ec2_meta(&self, key: &str, default: Option<&str>) -> String {
        self.meta().meta(key, default)
    }

    pub fn ec2_dynamic(&self, key: &str, default: Option<&str>) -> String {
        self.meta().dynamic(key, default)
    }

    pub fn ec2_tag(&self, tag: &str, default: Option<&str>) -> String {
        self.info().tag(tag, default)
    }

    /// Run the operation named `op` (`EC2Region`, `EC2Meta`, `EC2Dynamic`, `EC2Tag`).
    pub fn call(&self, op: &str, args: &[String]) -> Result<String, String> {
        let arg = |i: usize| args.get(i).map(String::as_str);
        let key = || arg(0).ok_or_else(|| format!("{op} needs a key"));
        match op {
            "EC2Region" => Ok(self.ec2_region(arg(0))),
            "EC2Meta" => Ok(self.ec2_meta(key()?, arg(1))),
            "EC2Dynamic" => Ok(self.ec2_dynamic(key()?, arg(1))),
            "EC2Tag" => Ok(self.ec2_tag(key()?, arg(1))),
            other => Err(format!("unknown aws operation {other:?}")),
        }
    }

    pub fn meta_ready(&self) -> bool {
        self.meta.is_ready()
    }

    pub fn info_ready(&self) -> bool {
        self.info.is_ready()
    }

    fn meta(&self) -> Arc<Ec2Meta> {
        self.meta.get(|| {
            tracing::info!("initializing instance metadata client");
            Ec2Meta::new((self.source)())
        })
    }

    fn info(&self) -> Arc<Ec2Info> {
        self.info.get(|| {
            tracing::info!("initializing instance info client");
            Ec2Info::new(Arc::new(Ec2Meta::new((self.source)())))
        })
    }
}

impl std::fmt::Debug for AwsFuncs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsFuncs")
            .field("meta", &self.meta)
            .field("info", &self.info)
            .finish()
    }
}
