//! Meilisearch backend.
//!
//! This module maps the [`SearchBackend`] operations onto the Meilisearch
//! REST API. The actual HTTP client is abstracted via [`HttpClient`] so the
//! adapter can run over reqwest, hyper or a scripted client in tests.

use crate::backend::{with_primary_key, SearchBackend};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use searchsync_core::{ConfigError, ConfigResult, Document, RecordId, ServerConfig};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;
use url::Url;

/// HTTP method used by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Method name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request with an optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Headers, in addition to `Content-Type: application/json`.
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
}

/// An HTTP response with its body decoded as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Decoded body; `None` when empty or not JSON.
    pub body: Option<Value>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err` means
/// the request did not complete; error statuses are regular responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends one request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Search backend talking to a Meilisearch server.
pub struct MeilisearchBackend<C: HttpClient> {
    base_url: Url,
    headers: BTreeMap<String, String>,
    client: C,
}

impl<C: HttpClient> MeilisearchBackend<C> {
    /// Creates a backend from the `server` configuration section.
    ///
    /// The host must be a bare `http(s)://host[:port]/` URL.
    pub fn new(config: &ServerConfig, client: C) -> ConfigResult<Self> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| ConfigError::InvalidServer {
                message: "no host set, server.host is mandatory".into(),
            })?;
        let base_url = searchsync_core::config::validate_host(host)?;

        let mut headers = config.headers.clone();
        if let Some(key) = config.key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert("Authorization".into(), format!("Bearer {key}"));
        }

        Ok(Self {
            base_url,
            headers,
            client,
        })
    }

    /// Returns the parsed server URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Builds `base/segment/...`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::Other(format!("cannot build a path on {}", self.base_url))
            })?
            .clear()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<Value>,
    ) -> BackendResult<HttpResponse> {
        let request = HttpRequest {
            method,
            url: url.into(),
            headers: self.headers.clone(),
            body,
        };
        trace!(method = %method, url = %request.url, "meilisearch request");

        let response = self
            .client
            .send(request)
            .await
            .map_err(BackendError::Transport)?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(BackendError::Api {
                status: response.status,
                body: response.body,
            })
        }
    }
}

fn error_code(body: Option<&Value>) -> Option<&str> {
    body?.get("code")?.as_str()
}

#[async_trait]
impl<C: HttpClient> SearchBackend for MeilisearchBackend<C> {
    async fn create_index(&self, index: &str) -> BackendResult<()> {
        let url = self.endpoint(&["indexes"])?;
        let result = self
            .request(HttpMethod::Post, url, Some(json!({ "uid": index })))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(BackendError::Api { status, body })
                if status == 409 || error_code(body.as_ref()) == Some("index_already_exists") =>
            {
                Err(BackendError::AlreadyExists(index.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    async fn clear_index(&self, index: &str) -> BackendResult<()> {
        let url = self.endpoint(&["indexes", index, "documents"])?;
        match self.request(HttpMethod::Delete, url, None).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    async fn delete_document(&self, index: &str, id: &RecordId) -> BackendResult<()> {
        let key = id.key();
        let url = self.endpoint(&["indexes", index, "documents", &key])?;
        match self.request(HttpMethod::Delete, url, None).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    async fn upsert_document(
        &self,
        index: &str,
        id: &RecordId,
        document: Document,
        primary_key: Option<&str>,
    ) -> BackendResult<()> {
        let mut url = self.endpoint(&["indexes", index, "documents"])?;
        if let Some(key) = primary_key {
            url.query_pairs_mut().append_pair("primaryKey", key);
        }

        let document = with_primary_key(document, id, primary_key);
        self.request(HttpMethod::Post, url, Some(Value::Array(vec![Value::Object(document)])))
            .await
            .map(|_| ())
    }
}
