//! File-backed data sources: `datasource`/`ds`, `datasourceExists`, `include`.
//!
//! Sources are declared on the command line as `alias=path`, `alias=file:///path`, or a
//! bare path whose file stem becomes the alias. Documents are parsed by extension (JSON,
//! YAML, TOML; anything else is tried as JSON) and cached for the rest of the run.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use handlebars::{Handlebars, JsonValue};

use super::conv::{parse_toml, parse_yaml};
use super::{register_fn, text_arg, FuncGroup};
use crate::error::{Result, TemplarError};

/// One declared data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub alias: String,
    pub path: PathBuf,
}

impl DataSource {
    /// Parse a `--datasource` argument.
    pub fn parse(spec: &str) -> Result<Self> {
        let (alias, location) = match spec.split_once('=') {
            Some((alias, location)) => (alias.to_string(), location),
            None => {
                let alias = Path::new(spec)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                (alias, spec)
            }
        };

        if alias.is_empty() {
            return Err(TemplarError::InvalidDatasource(format!(
                "cannot derive an alias from '{spec}'"
            )));
        }

        let path = match location.split_once("://") {
            Some(("file", path)) => PathBuf::from(path),
            Some((scheme, _)) => {
                return Err(TemplarError::InvalidDatasource(format!(
                    "unsupported scheme '{scheme}' in '{spec}' (only file sources are supported)"
                )))
            }
            None => PathBuf::from(location),
        };

        if path.as_os_str().is_empty() {
            return Err(TemplarError::InvalidDatasource(format!(
                "no path given for '{alias}'"
            )));
        }

        Ok(Self { alias, path })
    }

    fn resolve(&self, subpath: Option<&str>) -> PathBuf {
        match subpath {
            Some(sub) => self.path.join(sub),
            None => self.path.clone(),
        }
    }
}

/// The declared data sources of a run, with a parse cache.
#[derive(Debug, Default)]
pub struct Data {
    sources: BTreeMap<String, DataSource>,
    cache: Mutex<HashMap<PathBuf, JsonValue>>,
}

impl Data {
    /// Build from `--datasource` arguments. Later declarations of an alias win.
    pub fn from_specs(specs: &[String]) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for spec in specs {
            let source = DataSource::parse(spec)?;
            tracing::debug!("datasource {} -> {}", source.alias, source.path.display());
            sources.insert(source.alias.clone(), source);
        }
        Ok(Self {
            sources,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn exists(&self, alias: &str) -> bool {
        self.sources.contains_key(alias)
    }

    /// The parsed document behind `alias` (optionally a file below it).
    pub fn datasource(
        &self,
        alias: &str,
        subpath: Option<&str>,
    ) -> std::result::Result<JsonValue, String> {
        let path = self.source(alias)?.resolve(subpath);

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = cache.get(&path) {
            return Ok(value.clone());
        }

        let text = read_text(&path)?;
        let value = parse_document(&path, &text)?;
        cache.insert(path, value.clone());
        Ok(value)
    }

    /// The raw text behind `alias`, unparsed.
    pub fn include(&self, alias: &str, subpath: Option<&str>) -> std::result::Result<String, String> {
        read_text(&self.source(alias)?.resolve(subpath))
    }

    fn source(&self, alias: &str) -> std::result::Result<&DataSource, String> {
        self.sources
            .get(alias)
            .ok_or_else(|| format!("undefined datasource '{alias}'"))
    }
}

fn read_text(path: &Path) -> std::result::Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

fn parse_document(path: &Path, text: &str) -> std::result::Result<JsonValue, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("yaml" | "yml") => parse_yaml(text),
        Some("toml") => parse_toml(text),
        _ => serde_json::from_str(text)
            .map_err(|e| format!("invalid JSON in {}: {e}", path.display())),
    }
}

/// Function group exposing a run's [`Data`] to templates.
#[derive(Debug, Clone)]
pub struct DataFuncs {
    data: Arc<Data>,
}

impl DataFuncs {
    pub fn new(data: Arc<Data>) -> Self {
        Self { data }
    }
}

impl FuncGroup for DataFuncs {
    fn name(&self) -> &'static str {
        "data"
    }

    fn functions(&self) -> Vec<&'static str> {
        vec!["datasource", "ds", "datasourceExists", "include"]
    }

    fn install(&self, registry: &mut Handlebars<'static>) {
        for name in ["datasource", "ds"] {
            let data = Arc::clone(&self.data);
            register_fn(registry, name, move |args| {
                let alias = text_arg(args, 0)?;
                let subpath = args.get(1).map(|v| super::to_text(v));
                data.datasource(&alias, subpath.as_deref())
            });
        }

        let data = Arc::clone(&self.data);
        register_fn(registry, "datasourceExists", move |args| {
            Ok(data.exists(&text_arg(args, 0)?).into())
        });

        let data = Arc::clone(&self.data);
        register_fn(registry, "include", move |args| {
            let alias = text_arg(args, 0)?;
            let subpath = args.get(1).map(|v| super::to_text(v));
            data.include(&alias, subpath.as_deref()).map(JsonValue::String)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_alias_forms() {
        let ds = DataSource::parse("cfg=conf/app.yaml").unwrap();
        assert_eq!(ds.alias, "cfg");
        assert_eq!(ds.path, PathBuf::from("conf/app.yaml"));

        let ds = DataSource::parse("cfg=file:///etc/app.json").unwrap();
        assert_eq!(ds.path, PathBuf::from("/etc/app.json"));

        let ds = DataSource::parse("conf/person.json").unwrap();
        assert_eq!(ds.alias, "person");
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(DataSource::parse("vault=vault:///secret/x").is_err());
        assert!(DataSource::parse("=conf/app.yaml").is_err());
        assert!(DataSource::parse("cfg=").is_err());
    }

    #[test]
    fn test_datasource_parses_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("app.yaml");
        let toml = dir.path().join("app.toml");
        let json = dir.path().join("app.data");
        std::fs::write(&yaml, "name: web\n").unwrap();
        std::fs::write(&toml, "name = \"db\"\n").unwrap();
        std::fs::write(&json, r#"{"name": "cache"}"#).unwrap();

        let data = Data::from_specs(&[
            format!("y={}", yaml.display()),
            format!("t={}", toml.display()),
            format!("j={}", json.display()),
        ])
        .unwrap();

        assert_eq!(data.datasource("y", None).unwrap(), json!({"name": "web"}));
        assert_eq!(data.datasource("t", None).unwrap(), json!({"name": "db"}));
        assert_eq!(data.datasource("j", None).unwrap(), json!({"name": "cache"}));
        assert!(data.exists("y"));
        assert!(!data.exists("nope"));
        assert!(data.datasource("nope", None).is_err());
    }

    #[test]
    fn test_datasource_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        std::fs::write(&path, r#"{"v": 1}"#).unwrap();

        let data = Data::from_specs(&[format!("v={}", path.display())]).unwrap();
        assert_eq!(data.datasource("v", None).unwrap(), json!({"v": 1}));

        std::fs::write(&path, r#"{"v": 2}"#).unwrap();
        assert_eq!(data.datasource("v", None).unwrap(), json!({"v": 1}));
    }

    #[test]
    fn test_include_and_subpath() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("motd.txt"), "hello\n").unwrap();

        let data = Data::from_specs(&[format!("files={}", dir.path().display())]).unwrap();
        assert_eq!(data.include("files", Some("motd.txt")).unwrap(), "hello\n");
    }
}
