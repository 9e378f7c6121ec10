//! End-to-end read counting through an instrumented mock store.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;

use docstore_monitoring::storage::MockDocumentStore;
use docstore_monitoring::{
    DocumentReference, DocumentStore, Instrumented, Listener, Monitoring, NoopSink, Options, Query,
    ReadKind, RecordingSink, Source, StoreError,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn next<S>(listener: &mut Listener<S>) -> Option<Result<S, StoreError>> {
    tokio::time::timeout(RECV_TIMEOUT, listener.updates.next())
        .await
        .ok()
        .flatten()
}

async fn seeded() -> Arc<MockDocumentStore> {
    let store = Arc::new(MockDocumentStore::new());
    store
        .set_document("users/1", json!({"name": "ada", "role": "admin"}))
        .await;
    store
        .set_document("users/2", json!({"name": "grace", "role": "admin"}))
        .await;
    store
        .set_document("users/3", json!({"name": "linus", "role": "member"}))
        .await;
    store
}

fn instrument(
    inner: &Arc<MockDocumentStore>,
) -> (Monitoring, Instrumented<Arc<MockDocumentStore>>) {
    let monitoring = Monitoring::with_sink(Options::default(), Arc::new(NoopSink));
    let store = monitoring.instrument(Arc::clone(inner)).unwrap();
    (monitoring, store)
}

#[tokio::test]
async fn test_document_fetch_results_pass_through() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let doc = DocumentReference::new("users/1");

    let through_wrapper = store.get_document(&doc).await.unwrap();
    let direct = inner.get_document(&doc).await.unwrap();

    assert_eq!(through_wrapper, direct);
    assert_eq!(inner.read_count(), 2);

    let counts = monitoring.document_counts();
    assert_eq!(counts.count_from_server, 1);
    assert_eq!(counts.count_of_each_path.get("users/1"), Some(&0));
}

#[tokio::test]
async fn test_document_fetch_errors_pass_through() {
    let inner = Arc::new(MockDocumentStore::new());
    let (monitoring, store) = instrument(&inner);
    let doc = DocumentReference::new("users/1");

    let through_wrapper = store.get_document_from(&doc, Source::Cache).await;
    let direct = inner.get_document_from(&doc, Source::Cache).await;

    assert!(through_wrapper.is_err());
    assert_eq!(through_wrapper, direct);

    let counts = monitoring.document_counts();
    assert_eq!(counts.error_count, 1);
    assert_eq!(counts.errors.get("users/1"), Some(&0));
    assert_eq!(counts.count_from_server + counts.count_from_cache, 0);
}

#[tokio::test]
async fn test_document_fetch_by_source() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let doc = DocumentReference::new("users/1");

    store.get_document_from(&doc, Source::Server).await.unwrap();
    store.get_document_from(&doc, Source::Cache).await.unwrap();
    store.get_document_from(&doc, Source::Cache).await.unwrap();

    let counts = monitoring.document_counts();
    assert_eq!(counts.count_from_server, 1);
    assert_eq!(counts.count_from_cache, 2);
    assert_eq!(counts.count_of_each_path_from_cache.get("users/1"), Some(&1));
}

#[tokio::test]
async fn test_query_fetch_counts_documents() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let admins = Query::collection("users").where_eq("role", "admin");

    let server = store.get_documents(&admins).await.unwrap();
    let cached = store
        .get_documents_from(&Query::collection("users"), Source::Cache)
        .await
        .unwrap();

    assert_eq!(server.len(), 2);
    assert_eq!(cached.len(), 3);

    let counts = monitoring.collection_counts();
    assert_eq!(counts.count_from_server, 2);
    assert_eq!(counts.count_from_cache, 3);
    assert_eq!(counts.count_of_each_path.len(), 2);
    assert_eq!(counts.count_of_each_path_from_cache.len(), 3);
}

#[tokio::test]
async fn test_query_fetch_error_counts_once() {
    let inner = seeded().await;
    inner.set_offline(true).await;
    let (monitoring, store) = instrument(&inner);

    let result = store
        .get_documents_from(&Query::collection("users"), Source::Server)
        .await;

    assert!(matches!(result, Err(StoreError::Unavailable(_))));
    let counts = monitoring.collection_counts();
    assert_eq!(counts.error_count, 1);
    assert_eq!(counts.count_from_server, 0);
}

#[tokio::test]
async fn test_document_listener_counts_every_delivery() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let mut listener = store.listen_document(&DocumentReference::new("users/1"));

    next(&mut listener).await.unwrap().unwrap();
    inner.set_document("users/1", json!({"name": "ada", "v": 2})).await;
    next(&mut listener).await.unwrap().unwrap();
    inner.set_document("users/1", json!({"name": "ada", "v": 3})).await;
    let latest = next(&mut listener).await.unwrap().unwrap();

    assert_eq!(latest.get("v"), Some(&json!(3)));
    let counts = monitoring.document_counts();
    assert_eq!(counts.count_from_server, 3);
    assert_eq!(counts.count_of_each_path.get("users/1"), Some(&2));
}

#[tokio::test]
async fn test_document_metadata_listener_counts_cache_and_server() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let mut listener = store.listen_document_with_metadata(&DocumentReference::new("users/1"), true);

    let first = next(&mut listener).await.unwrap().unwrap();
    let second = next(&mut listener).await.unwrap().unwrap();

    assert!(first.from_cache());
    assert!(!second.from_cache());
    let totals = monitoring.document_totals();
    assert_eq!(totals.count_from_cache, 1);
    assert_eq!(totals.count_from_server, 1);
}

#[tokio::test]
async fn test_query_listeners_count_every_snapshot() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let admins = Query::collection("users").where_eq("role", "admin");
    let mut plain = store.listen_query(&admins);
    let mut with_metadata = store.listen_query_with_metadata(&admins, false);

    next(&mut plain).await.unwrap().unwrap();
    next(&mut with_metadata).await.unwrap().unwrap();
    inner.set_document("users/4", json!({"role": "admin"})).await;
    let update = next(&mut plain).await.unwrap().unwrap();

    assert_eq!(update.len(), 3);
    // 2 + 2 initial documents, then 3 from the update on `plain`.
    assert_eq!(monitoring.collection_counts().count_from_server, 7);
}

#[tokio::test]
async fn test_listener_registration_passes_through() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);
    let mut listener = store.listen_query(&Query::collection("users"));
    next(&mut listener).await.unwrap().unwrap();

    listener.remove();
    inner.set_document("users/5", json!({})).await;

    assert!(next(&mut listener).await.is_none());
    assert_eq!(monitoring.collection_counts().count_from_server, 3);
}

#[tokio::test]
async fn test_undelivered_updates_are_not_counted() {
    let inner = seeded().await;
    let (monitoring, store) = instrument(&inner);

    let listener = store.listen_document(&DocumentReference::new("users/1"));
    inner.set_document("users/1", json!({"v": 2})).await;
    drop(listener);

    assert_eq!(monitoring.document_counts().count_from_server, 0);
}

#[tokio::test]
async fn test_every_entry_point_reports_to_its_kind() {
    let inner = seeded().await;
    let sink = Arc::new(RecordingSink::new());
    let monitoring = Monitoring::with_sink(Options::with_logs(), sink.clone());
    let store = monitoring.instrument(Arc::clone(&inner)).unwrap();
    let doc = DocumentReference::new("users/1");
    let query = Query::collection("users");

    store.get_document(&doc).await.unwrap();
    store.get_document_from(&doc, Source::Default).await.unwrap();
    next(&mut store.listen_document(&doc)).await.unwrap().unwrap();
    next(&mut store.listen_document_with_metadata(&doc, false))
        .await
        .unwrap()
        .unwrap();
    store.get_documents(&query).await.unwrap();
    store.get_documents_from(&query, Source::Default).await.unwrap();
    next(&mut store.listen_query(&query)).await.unwrap().unwrap();
    next(&mut store.listen_query_with_metadata(&query, false))
        .await
        .unwrap()
        .unwrap();

    let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            [ReadKind::Document; 4].as_slice(),
            [ReadKind::Collection; 4].as_slice()
        ]
        .concat()
    );
    assert_eq!(monitoring.document_counts().count_from_server, 4);
    assert_eq!(monitoring.collection_counts().count_from_server, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_on_distinct_paths() {
    const READERS: usize = 50;

    let inner = Arc::new(MockDocumentStore::new());
    let (monitoring, store) = instrument(&inner);
    let store = Arc::new(store);

    let handles: Vec<_> = (0..READERS)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .get_document(&DocumentReference::new(format!("users/{i}")))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let counts = monitoring.document_counts();
    assert_eq!(counts.count_from_server, READERS as u64);
    assert_eq!(counts.count_of_each_path.len(), READERS);
}

#[tokio::test]
async fn test_shared_client_behind_dyn_trait() {
    let inner = seeded().await;
    let monitoring = Monitoring::with_sink(Options::default(), Arc::new(NoopSink));
    let client: Arc<dyn DocumentStore> = inner;
    let store = monitoring.instrument(client).unwrap();

    store
        .get_document(&DocumentReference::new("users/2"))
        .await
        .unwrap();

    assert_eq!(monitoring.document_counts().count_from_server, 1);
}
