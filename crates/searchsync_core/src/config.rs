//! Configuration loading and validation.
//!
//! The configuration is a JSON document:
//!
//! ```json
//! {
//!   "server": { "type": "meilisearch", "host": "http://localhost:7700", "key": "..." },
//!   "batchLimit": 100,
//!   "reindexOnStart": true,
//!   "indexes": {
//!     "articles": {
//!       "collectionName": "articles",
//!       "collectionField": "_collection",
//!       "fields": ["title", "author.name"],
//!       "filter": { "status": { "_eq": "published" } },
//!       "transform": "strip_tags"
//!     }
//!   }
//! }
//! ```
//!
//! Index order in the file is the order indexes are rebuilt in.

use crate::error::{ConfigError, ConfigResult};
use crate::registry::{IndexDefinition, IndexRegistry, DEFAULT_BATCH_LIMIT};
use crate::transform::TransformRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "SEARCHSYNC_CONFIG_PATH";

/// File name searched for when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "searchsync.json";

/// Known search backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Meilisearch over HTTP.
    Meilisearch,
    /// In-process backend, used for dry runs and tests.
    Memory,
}

impl BackendKind {
    /// Configuration name of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Meilisearch => "meilisearch",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meilisearch" => Ok(BackendKind::Meilisearch),
            "memory" => Ok(BackendKind::Memory),
            other => Err(ConfigError::UnknownBackend {
                kind: if other.is_empty() {
                    "Unknown".into()
                } else {
                    other.into()
                },
            }),
        }
    }
}

/// The `server` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Backend type (`meilisearch`, `memory`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Base URL of the backend.
    #[serde(default)]
    pub host: Option<String>,
    /// API key.
    #[serde(default)]
    pub key: Option<String>,
    /// Application id, for backends that use one.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Extra headers sent with every backend request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Parses and checks the backend type.
    pub fn backend_kind(&self) -> ConfigResult<BackendKind> {
        self.kind.parse()
    }

    /// Validates the section for its backend type.
    pub fn validate(&self) -> ConfigResult<BackendKind> {
        let kind = self.backend_kind()?;
        if kind == BackendKind::Meilisearch {
            let host = self.host.as_deref().ok_or_else(|| ConfigError::InvalidServer {
                message: "no host set, server.host is mandatory".into(),
            })?;
            validate_host(host)?;
        }
        Ok(kind)
    }
}

/// Parses `host`, which must look like `http://example.com/` with no path.
pub fn validate_host(host: &str) -> ConfigResult<Url> {
    let invalid = || ConfigError::InvalidServer {
        message: format!("invalid server.host \"{host}\", it must be like http://search.example.com/"),
    };

    let url = Url::parse(host).map_err(|_| invalid())?;
    let valid = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some_and(|h| !h.is_empty())
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();
    if !valid {
        return Err(invalid());
    }
    Ok(url)
}

/// One entry of the `indexes` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Source collection; defaults to the index name.
    #[serde(default)]
    pub collection_name: Option<String>,
    /// Metadata key set to the collection name.
    #[serde(default)]
    pub collection_field: Option<String>,
    /// Flattened field paths to keep.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Record filter passed to the source.
    #[serde(default)]
    pub filter: Option<Value>,
    /// Query-shaping hints passed to the source.
    #[serde(default)]
    pub deep: Option<Value>,
    /// Name of a registered transform.
    #[serde(default)]
    pub transform: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    server: ServerConfig,
    #[serde(default)]
    batch_limit: Option<usize>,
    #[serde(default)]
    reindex_on_start: bool,
    indexes: Map<String, Value>,
}

/// Validated extension configuration.
#[derive(Debug, Clone)]
pub struct SearchSyncConfig {
    /// Backend connection settings.
    pub server: ServerConfig,
    /// Page size for full scans.
    pub batch_limit: usize,
    /// Run a full reindex when the host starts.
    pub reindex_on_start: bool,
    /// Index definitions in file order.
    pub indexes: Vec<(String, IndexConfig)>,
}

impl SearchSyncConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(input: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    /// Reads, parses and validates a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), indexes = config.indexes.len(), "loaded configuration");
        Ok(config)
    }

    /// Validates an already parsed JSON value.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        let object = value.as_object().ok_or(ConfigError::NotAnObject)?;
        if !object.contains_key("indexes") {
            return Err(ConfigError::MissingSection { section: "indexes" });
        }
        if !object.contains_key("server") {
            return Err(ConfigError::MissingSection { section: "server" });
        }

        let raw: RawConfig = serde_json::from_value(value)?;
        let batch_limit = raw.batch_limit.unwrap_or(DEFAULT_BATCH_LIMIT);
        if batch_limit == 0 {
            return Err(ConfigError::InvalidBatchLimit);
        }

        let mut indexes = Vec::with_capacity(raw.indexes.len());
        for (name, entry) in raw.indexes {
            let index: IndexConfig =
                serde_json::from_value(entry).map_err(|e| ConfigError::InvalidIndex {
                    index: name.clone(),
                    message: e.to_string(),
                })?;
            indexes.push((name, index));
        }

        let config = Self {
            server: raw.server,
            batch_limit,
            reindex_on_start: raw.reindex_on_start,
            indexes,
        };
        config.server.validate()?;
        Ok(config)
    }

    /// Builds the index registry, resolving transform names.
    pub fn to_registry(&self, transforms: &TransformRegistry) -> ConfigResult<IndexRegistry> {
        let mut definitions = Vec::with_capacity(self.indexes.len());

        for (name, index) in &self.indexes {
            let collection = index.collection_name.clone().unwrap_or_else(|| name.clone());
            let mut definition = IndexDefinition::new(name.clone(), collection);
            definition.collection_field = index.collection_field.clone();
            definition.fields = index.fields.clone();
            definition.filter = index.filter.clone();
            definition.deep = index.deep.clone();

            if let Some(transform_name) = &index.transform {
                let transform =
                    transforms
                        .get(transform_name)
                        .ok_or_else(|| ConfigError::UnknownTransform {
                            index: name.clone(),
                            transform: transform_name.clone(),
                        })?;
                definition.transform = Some(transform.clone());
            }

            definitions.push(definition);
        }

        Ok(IndexRegistry::new(definitions)?
            .with_batch_limit(self.batch_limit)
            .with_reindex_on_start(self.reindex_on_start))
    }
}

/// Picks the configuration file to load.
///
/// An explicit path wins, then the environment variable, then
/// [`DEFAULT_CONFIG_FILE`] inside `search_dir`.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    search_dir: &Path,
) -> ConfigResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env_path {
        if !path.is_file() {
            return Err(ConfigError::Missing {
                message: format!("{CONFIG_PATH_ENV} is set, but {path:?} is missing"),
            });
        }
        return Ok(path);
    }

    let candidate = search_dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(ConfigError::Missing {
            message: format!("no {DEFAULT_CONFIG_FILE} found in {search_dir:?}"),
        })
    }
}

/// Loads the configuration from the explicit path, the environment, or the
/// working directory.
pub fn load_config(explicit: Option<&Path>) -> ConfigResult<SearchSyncConfig> {
    let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let path = resolve_config_path(explicit, env_path, Path::new("."))?;
    SearchSyncConfig::from_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "server": { "type": "meilisearch", "host": "http://localhost:7700", "key": "secret" },
        "batchLimit": 50,
        "reindexOnStart": true,
        "indexes": {
            "posts": { "collectionName": "articles", "fields": ["title"], "transform": "strip_tags" },
            "people": {},
            "drafts": { "collectionName": "articles", "filter": { "status": { "_eq": "draft" } } }
        }
    }"#;

    #[test]
    fn parses_sample() {
        let config = SearchSyncConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.batch_limit, 50);
        assert!(config.reindex_on_start);
        assert_eq!(config.server.key.as_deref(), Some("secret"));
        let names: Vec<_> = config.indexes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["posts", "people", "drafts"]);
    }

    #[test]
    fn registry_from_config() {
        let config = SearchSyncConfig::from_json_str(SAMPLE).unwrap();
        let registry = config.to_registry(&TransformRegistry::with_builtins()).unwrap();
        assert_eq!(registry.batch_limit(), 50);
        assert!(registry.reindex_on_start());
        assert_eq!(
            registry.indexes_for_collection("articles"),
            &["posts".to_string(), "drafts".to_string()]
        );
        assert_eq!(registry.get("people").unwrap().collection_name, "people");
        assert_eq!(
            registry.get("posts").unwrap().transform.as_ref().unwrap().name(),
            "strip_tags"
        );
        assert_eq!(
            registry.get("drafts").unwrap().filter,
            Some(json!({"status": {"_eq": "draft"}}))
        );
    }

    #[test]
    fn unknown_transform_is_fatal() {
        let config = SearchSyncConfig::from_json_str(SAMPLE).unwrap();
        let err = config.to_registry(&TransformRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTransform { .. }));
    }

    #[test]
    fn missing_sections() {
        let err = SearchSyncConfig::from_json_str(r#"{"server": {"type": "memory"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection { section: "indexes" }));

        let err = SearchSyncConfig::from_json_str(r#"{"indexes": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection { section: "server" }));

        let err = SearchSyncConfig::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::NotAnObject));
    }

    #[test]
    fn unknown_backend_type() {
        let err = SearchSyncConfig::from_json_str(r#"{"server": {"type": "solr"}, "indexes": {}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend { ref kind } if kind == "solr"));

        let err = SearchSyncConfig::from_json_str(r#"{"server": {}, "indexes": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend { ref kind } if kind == "Unknown"));
    }

    #[test]
    fn zero_batch_limit_rejected() {
        let err = SearchSyncConfig::from_json_str(
            r#"{"server": {"type": "memory"}, "batchLimit": 0, "indexes": {}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchLimit));
    }

    #[test]
    fn host_validation() {
        assert!(validate_host("http://localhost:7700").is_ok());
        assert!(validate_host("https://search.example.com/").is_ok());
        assert!(validate_host("search.example.com").is_err());
        assert!(validate_host("http://example.com/search").is_err());
        assert!(validate_host("http://:7700").is_err());
        assert!(validate_host("http://[::1]:7700").is_ok());
        assert!(validate_host("http://search.example.com/?x=1").is_err());
        assert!(validate_host("ftp://search.example.com/").is_err());
        assert!(validate_host("http://user:pw@search.example.com/").is_err());
        assert_eq!(
            validate_host("http://Search.Example.com:7700").unwrap().as_str(),
            "http://search.example.com:7700/"
        );

        let server = ServerConfig {
            kind: "meilisearch".into(),
            ..Default::default()
        };
        assert!(matches!(server.validate(), Err(ConfigError::InvalidServer { .. })));
    }

    #[test]
    fn memory_backend_needs_no_host() {
        let config = SearchSyncConfig::from_json_str(
            r#"{"server": {"type": "memory"}, "indexes": {"a": {}}}"#,
        )
        .unwrap();
        assert_eq!(config.server.backend_kind().unwrap(), BackendKind::Memory);
        assert_eq!(config.batch_limit, DEFAULT_BATCH_LIMIT);
        assert!(!config.reindex_on_start);
    }

    #[test]
    fn resolve_prefers_explicit_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("custom.json");
        let resolved = resolve_config_path(Some(&explicit), None, dir.path()).unwrap();
        assert_eq!(resolved, explicit);

        let missing_env = dir.path().join("nope.json");
        let err = resolve_config_path(None, Some(missing_env), dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_PATH_ENV));

        let err = resolve_config_path(None, None, dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));

        let default = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&default, SAMPLE).unwrap();
        let resolved = resolve_config_path(None, None, dir.path()).unwrap();
        assert_eq!(resolved, default);
        assert_eq!(SearchSyncConfig::from_path(&resolved).unwrap().indexes.len(), 3);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = SearchSyncConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
