//! Integration tests: configuration to engine to backend, through the hooks.

use async_trait::async_trait;
use parking_lot::Mutex;
use searchsync_engine::searchsync_core::{RecordId, SearchSyncConfig, TransformRegistry};
use searchsync_engine::{
    create_backend, ConfiguredBackend, HostEvent, HttpClient, HttpMethod, HttpRequest,
    HttpResponse, MeilisearchBackend, MemoryRecordSource, SyncEngine, SyncHooks,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A tiny Meilisearch stand-in that answers over the `HttpClient` seam.
#[derive(Default)]
struct FakeMeilisearch {
    indexes: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
    requests: Mutex<Vec<(HttpMethod, String)>>,
}

impl FakeMeilisearch {
    fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indexes.lock().get(index)?.get(id).cloned()
    }

    fn count(&self, index: &str) -> usize {
        self.indexes.lock().get(index).map_or(0, BTreeMap::len)
    }

    fn reply(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            body: Some(body),
        }
    }

    fn accepted() -> HttpResponse {
        Self::reply(202, json!({"taskUid": 1, "status": "enqueued"}))
    }

    fn not_found(index: &str) -> HttpResponse {
        Self::reply(
            404,
            json!({"message": format!("Index `{index}` not found."), "code": "index_not_found"}),
        )
    }
}

#[async_trait]
impl HttpClient for FakeMeilisearch {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let path = request
            .url
            .strip_prefix("http://meili.test")
            .ok_or("unexpected host")?
            .to_string();
        self.requests.lock().push((request.method, path.clone()));

        let (path, query) = path.split_once('?').unwrap_or((path.as_str(), ""));
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let mut indexes = self.indexes.lock();

        let response = match (request.method, segments.as_slice()) {
            (HttpMethod::Post, ["indexes"]) => {
                let uid = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("uid"))
                    .and_then(Value::as_str)
                    .ok_or("missing uid")?
                    .to_string();
                if indexes.contains_key(&uid) {
                    Self::reply(
                        400,
                        json!({"message": format!("Index `{uid}` already exists."), "code": "index_already_exists"}),
                    )
                } else {
                    indexes.insert(uid, BTreeMap::new());
                    Self::accepted()
                }
            }
            (HttpMethod::Delete, ["indexes", index, "documents"]) => match indexes.get_mut(*index) {
                Some(docs) => {
                    docs.clear();
                    Self::accepted()
                }
                None => Self::not_found(index),
            },
            (HttpMethod::Delete, ["indexes", index, "documents", id]) => {
                match indexes.get_mut(*index) {
                    Some(docs) => {
                        docs.remove(*id);
                        Self::accepted()
                    }
                    None => Self::not_found(index),
                }
            }
            (HttpMethod::Post, ["indexes", index, "documents"]) => {
                let primary_key = query.strip_prefix("primaryKey=").unwrap_or("id");
                let docs = indexes.entry(index.to_string()).or_default();
                let body = request.body.and_then(|b| b.as_array().cloned()).unwrap_or_default();
                for doc in body {
                    let id = match doc.get(primary_key) {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Number(n)) => n.to_string(),
                        _ => {
                            return Ok(Self::reply(
                                400,
                                json!({"message": "missing primary key", "code": "missing_document_id"}),
                            ))
                        }
                    };
                    docs.insert(id, doc);
                }
                Self::accepted()
            }
            _ => Self::reply(404, json!({"message": "route not found"})),
        };
        Ok(response)
    }
}

/// Shares one fake server between the backend and the test.
struct SharedFake(Arc<FakeMeilisearch>);

#[async_trait]
impl HttpClient for SharedFake {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.0.send(request).await
    }
}

const CONFIG: &str = r#"{
    "server": { "type": "meilisearch", "host": "http://meili.test/", "key": "masterKey" },
    "batchLimit": 2,
    "reindexOnStart": true,
    "indexes": {
        "posts": {
            "collectionName": "articles",
            "collectionField": "_collection",
            "filter": { "status": { "_eq": "published" } },
            "transform": "strip_tags"
        },
        "post_titles": {
            "collectionName": "articles",
            "fields": ["title", "author.name"]
        },
        "people": {}
    }
}"#;

fn snapshot() -> MemoryRecordSource {
    MemoryRecordSource::from_snapshot(json!({
        "articles": {
            "primaryKey": "id",
            "records": [
                {"id": 1, "status": "published", "title": "<b>One</b>", "author": {"name": "Ada"}},
                {"id": 2, "status": "draft", "title": "Two", "author": {"name": "Bob"}},
                {"id": 3, "status": "published", "title": "<i>Three</i>", "author": {"name": "Cy"}}
            ]
        },
        "people": {
            "primaryKey": "slug",
            "records": [{"slug": "ada", "name": "Ada"}]
        }
    }))
    .unwrap()
}

fn meili_engine(
    fake: &Arc<FakeMeilisearch>,
) -> Arc<SyncEngine<MeilisearchBackend<SharedFake>, MemoryRecordSource>> {
    let config = SearchSyncConfig::from_json_str(CONFIG).unwrap();
    let registry = config.to_registry(&TransformRegistry::with_builtins()).unwrap();
    let backend = MeilisearchBackend::new(&config.server, SharedFake(Arc::clone(fake))).unwrap();
    Arc::new(SyncEngine::new(registry, backend, snapshot()))
}

#[tokio::test]
async fn server_start_builds_every_index() {
    let fake = Arc::new(FakeMeilisearch::default());
    let hooks = SyncHooks::new(meili_engine(&fake));

    assert_eq!(hooks.dispatch(HostEvent::ServerStart).await, 3);

    assert_eq!(fake.count("posts"), 2);
    assert_eq!(
        fake.document("posts", "1"),
        Some(json!({
            "id": 1,
            "status": "published",
            "title": "One",
            "author": {"name": "Ada"},
            "_collection": "articles",
        }))
    );
    assert_eq!(fake.count("post_titles"), 3);
    assert_eq!(
        fake.document("post_titles", "2"),
        Some(json!({"title": "Two", "author.name": "Bob", "id": 2}))
    );
    assert_eq!(
        fake.document("people", "ada"),
        Some(json!({"slug": "ada", "name": "Ada"}))
    );

    let stats = hooks.engine().stats();
    assert_eq!(stats.reindexes_completed, 3);
    assert_eq!(stats.documents_upserted, 6);
    assert!(stats.last_error.is_none());
}

#[tokio::test]
async fn restart_reuses_existing_indexes() {
    let fake = Arc::new(FakeMeilisearch::default());
    let hooks = SyncHooks::new(meili_engine(&fake));

    hooks.on_server_start().await;
    hooks.on_server_start().await;

    assert_eq!(fake.count("posts"), 2);
    assert_eq!(fake.count("post_titles"), 3);
    assert!(hooks.engine().stats().last_error.is_none());
}

#[tokio::test]
async fn item_events_fan_out_and_reconcile_drift() {
    let fake = Arc::new(FakeMeilisearch::default());
    let engine = meili_engine(&fake);
    let hooks = SyncHooks::new(Arc::clone(&engine));
    hooks.on_server_start().await;

    // Article 1 is unpublished upstream: it leaves the filtered index only.
    let source = engine.source();
    source.insert(
        "articles",
        json!({"id": 1, "status": "draft", "title": "One", "author": {"name": "Ada"}})
            .as_object()
            .cloned()
            .unwrap(),
    );
    let applied = hooks
        .dispatch(HostEvent::updated("articles", vec![RecordId::Int(1)]))
        .await;

    assert_eq!(applied, 2);
    assert_eq!(fake.document("posts", "1"), None);
    assert_eq!(
        fake.document("post_titles", "1"),
        Some(json!({"title": "One", "author.name": "Ada", "id": 1}))
    );

    // Article 3 is removed upstream.
    source.remove("articles", &RecordId::Int(3));
    hooks
        .dispatch(HostEvent::deleted("articles", vec![RecordId::Int(3)]))
        .await;

    assert_eq!(fake.document("posts", "3"), None);
    assert_eq!(fake.document("post_titles", "3"), None);
    assert_eq!(fake.count("posts"), 0);
    assert_eq!(fake.count("post_titles"), 2);
}

#[tokio::test]
async fn requests_use_documented_routes() {
    let fake = Arc::new(FakeMeilisearch::default());
    let engine = meili_engine(&fake);

    engine.ensure_collection_index("people").await;
    engine
        .incremental_update("people", &[RecordId::from("ada")])
        .await
        .unwrap();
    engine
        .incremental_delete("people", &[RecordId::from("ada")])
        .await
        .unwrap();

    let requests = fake.requests.lock().clone();
    assert_eq!(
        requests,
        vec![
            (HttpMethod::Post, "/indexes".to_string()),
            (
                HttpMethod::Post,
                "/indexes/people/documents?primaryKey=slug".to_string()
            ),
            (HttpMethod::Delete, "/indexes/people/documents/ada".to_string()),
        ]
    );
}

#[tokio::test]
async fn configured_memory_backend_runs_offline() {
    let config = SearchSyncConfig::from_json_str(
        r#"{ "server": { "type": "memory" }, "indexes": { "people": {} } }"#,
    )
    .unwrap();
    let registry = config.to_registry(&TransformRegistry::with_builtins()).unwrap();
    let backend = create_backend(&config.server, SharedFake(Arc::default())).unwrap();
    assert!(matches!(backend, ConfiguredBackend::Memory(_)));

    let engine = SyncEngine::new(registry, backend, snapshot());
    let summaries = engine.init_collection_indexes().await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].upserted, 1);
    let memory = engine.backend().as_memory().unwrap();
    assert_eq!(memory.document_count("people"), 1);
}

#[tokio::test]
async fn snapshot_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(
        &path,
        r#"{ "people": { "primaryKey": "slug", "records": [ { "slug": "x" }, { "slug": "y" } ] } }"#,
    )
    .unwrap();

    let source = MemoryRecordSource::from_snapshot_path(&path).unwrap();
    assert_eq!(source.len("people"), 2);

    assert!(MemoryRecordSource::from_snapshot_path(dir.path().join("missing.json")).is_err());
}
