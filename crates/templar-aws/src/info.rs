use std::sync::Arc;

use crate::meta::Ec2Meta;

/// Instance information beyond plain metadata keys. Currently only tags.
///
/// Tags are read from `meta-data/tags/instance/<tag>`, which is only populated when the
/// instance has tag access enabled in its metadata options.
#[derive(Debug, Clone)]
pub struct Ec2Info {
    meta: Arc<Ec2Meta>,
}

impl Ec2Info {
    pub fn new(meta: Arc<Ec2Meta>) -> Self {
        Self { meta }
    }

    /// Value of instance tag `tag`, or `default`, or `""`.
    pub fn tag(&self, tag: &str, default: Option<&str>) -> String {
        self.meta
            .lookup(&format!("meta-data/tags/instance/{tag}"))
            .unwrap_or_else(|| default.unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::StubSource;

    #[test]
    fn test_tag_lookup() {
        let source = StubSource::with(&[("meta-data/tags/instance/Name", "web-1")]);
        let info = Ec2Info::new(Arc::new(Ec2Meta::new(Arc::new(source))));

        assert_eq!(info.tag("Name", None), "web-1");
        assert_eq!(info.tag("Env", None), "");
        assert_eq!(info.tag("Env", Some("dev")), "dev");
    }

    #[test]
    fn test_tag_offline() {
        let info = Ec2Info::new(Arc::new(Ec2Meta::offline()));
        assert_eq!(info.tag("foo", None), "");
    }
}
