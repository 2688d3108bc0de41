//! Builds the configured search backend.

use crate::backend::SearchBackend;
use crate::error::BackendResult;
use crate::memory::MemoryBackend;
use crate::meilisearch::{HttpClient, MeilisearchBackend};
use async_trait::async_trait;
use searchsync_core::{BackendKind, ConfigResult, Document, RecordId, ServerConfig};
use tracing::info;

/// A backend selected by `server.type`.
pub enum ConfiguredBackend<C: HttpClient> {
    /// Meilisearch over HTTP.
    Meilisearch(MeilisearchBackend<C>),
    /// In-process backend.
    Memory(MemoryBackend),
}

impl<C: HttpClient> ConfiguredBackend<C> {
    /// The backend type.
    pub fn kind(&self) -> BackendKind {
        match self {
            ConfiguredBackend::Meilisearch(_) => BackendKind::Meilisearch,
            ConfiguredBackend::Memory(_) => BackendKind::Memory,
        }
    }

    /// The in-process backend, if that is what was configured.
    pub fn as_memory(&self) -> Option<&MemoryBackend> {
        match self {
            ConfiguredBackend::Memory(backend) => Some(backend),
            ConfiguredBackend::Meilisearch(_) => None,
        }
    }
}

/// Creates the backend named by `server.type`.
///
/// Unknown types and invalid server settings are configuration errors. The
/// HTTP client is only used by HTTP backends.
pub fn create_backend<C: HttpClient>(
    config: &ServerConfig,
    client: C,
) -> ConfigResult<ConfiguredBackend<C>> {
    let kind = config.validate()?;
    info!(backend = %kind, "creating search backend");

    Ok(match kind {
        BackendKind::Meilisearch => {
            ConfiguredBackend::Meilisearch(MeilisearchBackend::new(config, client)?)
        }
        BackendKind::Memory => ConfiguredBackend::Memory(MemoryBackend::new()),
    })
}

#[async_trait]
impl<C: HttpClient> SearchBackend for ConfiguredBackend<C> {
    async fn create_index(&self, index: &str) -> BackendResult<()> {
        match self {
            ConfiguredBackend::Meilisearch(b) => b.create_index(index).await,
            ConfiguredBackend::Memory(b) => b.create_index(index).await,
        }
    }

    async fn clear_index(&self, index: &str) -> BackendResult<()> {
        match self {
            ConfiguredBackend::Meilisearch(b) => b.clear_index(index).await,
            ConfiguredBackend::Memory(b) => b.clear_index(index).await,
        }
    }

    async fn delete_document(&self, index: &str, id: &RecordId) -> BackendResult<()> {
        match self {
            ConfiguredBackend::Meilisearch(b) => b.delete_document(index, id).await,
            ConfiguredBackend::Memory(b) => b.delete_document(index, id).await,
        }
    }

    async fn upsert_document(
        &self,
        index: &str,
        id: &RecordId,
        document: Document,
        primary_key: Option<&str>,
    ) -> BackendResult<()> {
        match self {
            ConfiguredBackend::Meilisearch(b) => {
                b.upsert_document(index, id, document, primary_key).await
            }
            ConfiguredBackend::Memory(b) => {
                b.upsert_document(index, id, document, primary_key).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meilisearch::{HttpRequest, HttpResponse};
    use searchsync_core::ConfigError;

    struct NoClient;

    #[async_trait]
    impl HttpClient for NoClient {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, String> {
            Err("offline".into())
        }
    }

    fn server(kind: &str, host: Option<&str>) -> ServerConfig {
        ServerConfig {
            kind: kind.into(),
            host: host.map(Into::into),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn selects_backend_by_type() {
        let memory = create_backend(&server("memory", None), NoClient).unwrap();
        assert_eq!(memory.kind(), BackendKind::Memory);
        assert!(memory.as_memory().is_some());

        let meili = create_backend(&server("meilisearch", Some("http://localhost:7700")), NoClient)
            .unwrap();
        assert_eq!(meili.kind(), BackendKind::Meilisearch);
        assert!(meili.as_memory().is_none());
    }

    #[test]
    fn rejects_unknown_type() {
        let err = create_backend(&server("algolia", None), NoClient).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownBackend { ref kind } if kind == "algolia"));

        let err = create_backend(&server("", None), NoClient).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownBackend { ref kind } if kind == "Unknown"));
    }

    #[test]
    fn meilisearch_requires_host() {
        assert!(create_backend(&server("meilisearch", None), NoClient).is_err());
    }
}
