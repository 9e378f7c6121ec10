//! Mock document store for testing.
//!
//! Keeps documents in memory and models the two read origins of a real
//! client: reads confirmed by the "server" and reads served from a local
//! cache. A document enters the cache when it is written locally or read
//! from the server.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::interfaces::document_store::Result;
use crate::interfaces::{
    DocumentReference, DocumentSnapshot, DocumentStore, Listener, ListenerRegistration, Query,
    QuerySnapshot, SnapshotMetadata, Source, StoreError,
};

/// Channel capacity for change notifications.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct StoreState {
    documents: BTreeMap<String, Map<String, Value>>,
    /// Paths whose latest version is held in the local cache.
    cached: HashSet<String>,
}

struct Inner {
    state: RwLock<StoreState>,
    changes: broadcast::Sender<String>,
    fail_on_get: RwLock<bool>,
    offline: RwLock<bool>,
    reads: AtomicUsize,
}

impl Inner {
    /// Decide whether a read is served from the cache, or fail it.
    async fn resolve_source(&self, source: Source, path: &str) -> Result<bool> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if *self.fail_on_get.read().await {
            return Err(StoreError::Unavailable(format!("injected failure reading {path}")));
        }
        let offline = *self.offline.read().await;
        match (source, offline) {
            (Source::Cache, _) | (Source::Default, true) => Ok(true),
            (Source::Server, true) => Err(StoreError::Unavailable(format!(
                "server unreachable reading {path}"
            ))),
            (Source::Default, false) | (Source::Server, false) => Ok(false),
        }
    }

    async fn read_document(
        &self,
        doc: &DocumentReference,
        source: Source,
    ) -> Result<DocumentSnapshot> {
        let path = doc.path();
        let from_cache = self.resolve_source(source, path).await?;

        if from_cache {
            let state = self.state.read().await;
            if !state.cached.contains(path) {
                return Err(StoreError::Unavailable(format!(
                    "document {path} is not in the local cache"
                )));
            }
            return Ok(DocumentSnapshot::new(
                doc.clone(),
                state.documents.get(path).cloned(),
                SnapshotMetadata::cache(),
            ));
        }

        let mut state = self.state.write().await;
        state.cached.insert(path.to_string());
        Ok(DocumentSnapshot::new(
            doc.clone(),
            state.documents.get(path).cloned(),
            SnapshotMetadata::server(),
        ))
    }

    async fn run_query(&self, query: &Query, source: Source) -> Result<QuerySnapshot> {
        let from_cache = self.resolve_source(source, query.path()).await?;
        let metadata = if from_cache {
            SnapshotMetadata::cache()
        } else {
            SnapshotMetadata::server()
        };

        let mut state = self.state.write().await;
        let matching: Vec<(String, Map<String, Value>)> = state
            .documents
            .iter()
            .filter(|(path, data)| {
                parent_of(path) == query.path()
                    && query.matches(data)
                    && (!from_cache || state.cached.contains(path.as_str()))
            })
            .take(query.max_results().unwrap_or(usize::MAX))
            .map(|(path, data)| (path.clone(), data.clone()))
            .collect();

        if !from_cache {
            state
                .cached
                .extend(matching.iter().map(|(path, _)| path.clone()));
        }

        let documents = matching
            .into_iter()
            .map(|(path, data)| {
                DocumentSnapshot::new(DocumentReference::new(path), Some(data), metadata)
            })
            .collect();
        Ok(QuerySnapshot::new(documents, metadata))
    }

    fn notify(&self, path: &str) {
        // No receivers simply means no active listeners.
        let _ = self.changes.send(path.to_string());
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn into_fields(data: Value) -> Map<String, Value> {
    match data {
        Value::Object(fields) => fields,
        other => {
            let mut fields = Map::new();
            fields.insert("value".to_string(), other);
            fields
        }
    }
}

/// Registration backed by a watch channel shared with the listener stream.
struct WatchRegistration {
    cancel: Arc<watch::Sender<bool>>,
}

impl ListenerRegistration for WatchRegistration {
    fn remove(&self) {
        self.cancel.send_replace(true);
    }
}

type ReadFuture<S> = Pin<Box<dyn Future<Output = Result<S>> + Send>>;

/// Per-listener state driven by `stream::unfold`.
struct ListenState<S> {
    inner: Arc<Inner>,
    /// Sources still to be read before waiting on changes.
    initial: Vec<Source>,
    changes: broadcast::Receiver<String>,
    /// Held so `cancelled` stays open after the registration is dropped.
    _cancel: Arc<watch::Sender<bool>>,
    cancelled: watch::Receiver<bool>,
    affected: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    read: Arc<dyn Fn(Arc<Inner>, Source) -> ReadFuture<S> + Send + Sync>,
    done: bool,
}

impl<S: Send + 'static> ListenState<S> {
    async fn next(mut self) -> Option<(Result<S>, Self)> {
        loop {
            if self.done || *self.cancelled.borrow() {
                return None;
            }

            if let Some(source) = self.initial.pop() {
                let result = (self.read)(Arc::clone(&self.inner), source).await;
                // A cold cache skips the local snapshot, not the listener.
                if source == Source::Cache && result.is_err() {
                    continue;
                }
                self.done = result.is_err();
                return Some((result, self));
            }

            tokio::select! {
                changed = self.changes.recv() => match changed {
                    Ok(path) if (self.affected)(&path) => {
                        let result = (self.read)(Arc::clone(&self.inner), Source::Default).await;
                        self.done = result.is_err();
                        return Some((result, self));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Listener lagged, resynchronizing");
                        let result = (self.read)(Arc::clone(&self.inner), Source::Default).await;
                        self.done = result.is_err();
                        return Some((result, self));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.cancelled.changed() => {}
            }
        }
    }
}

/// Mock document store that keeps documents in memory.
pub struct MockDocumentStore {
    inner: Arc<Inner>,
}

impl Default for MockDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(StoreState::default()),
                changes,
                fail_on_get: RwLock::new(false),
                offline: RwLock::new(false),
                reads: AtomicUsize::new(0),
            }),
        }
    }

    /// Fail every read and listener delivery with `Unavailable`.
    pub async fn set_fail_on_get(&self, fail: bool) {
        *self.inner.fail_on_get.write().await = fail;
    }

    /// Simulate losing the server connection.
    ///
    /// Offline, default-source reads fall back to the cache and
    /// server-only reads fail.
    pub async fn set_offline(&self, offline: bool) {
        *self.inner.offline.write().await = offline;
    }

    /// Write a document, replacing any existing data.
    ///
    /// Non-object values are stored under a `value` field.
    pub async fn set_document(&self, path: &str, data: Value) {
        {
            let mut state = self.inner.state.write().await;
            state.documents.insert(path.to_string(), into_fields(data));
            state.cached.insert(path.to_string());
        }
        debug!(path, "Document written");
        self.inner.notify(path);
    }

    /// Write a document under a generated id in `collection`.
    pub async fn add_document(&self, collection: &str, data: Value) -> DocumentReference {
        let doc = DocumentReference::new(format!("{collection}/{}", Uuid::new_v4().simple()));
        self.set_document(doc.path(), data).await;
        doc
    }

    /// Delete a document. Returns whether it existed.
    pub async fn delete_document(&self, path: &str) -> bool {
        let existed = {
            let mut state = self.inner.state.write().await;
            let existed = state.documents.remove(path).is_some();
            if existed {
                state.cached.insert(path.to_string());
            }
            existed
        };
        if existed {
            debug!(path, "Document deleted");
            self.inner.notify(path);
        }
        existed
    }

    /// Drop every document from the local cache.
    pub async fn clear_cache(&self) {
        self.inner.state.write().await.cached.clear();
    }

    /// Number of documents currently stored.
    pub async fn document_count(&self) -> usize {
        self.inner.state.read().await.documents.len()
    }

    /// Number of reads served so far, including listener deliveries.
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::Relaxed)
    }

    fn listen<S: Send + 'static>(
        &self,
        include_metadata_changes: bool,
        affected: Arc<dyn Fn(&str) -> bool + Send + Sync>,
        read: Arc<dyn Fn(Arc<Inner>, Source) -> ReadFuture<S> + Send + Sync>,
    ) -> Listener<S> {
        let (cancel, cancelled) = watch::channel(false);
        let cancel = Arc::new(cancel);
        // Popped from the back: cache first, then the default source.
        let initial = if include_metadata_changes {
            vec![Source::Default, Source::Cache]
        } else {
            vec![Source::Default]
        };

        let state = ListenState {
            inner: Arc::clone(&self.inner),
            initial,
            changes: self.inner.changes.subscribe(),
            _cancel: Arc::clone(&cancel),
            cancelled,
            affected,
            read,
            done: false,
        };

        let updates = stream::unfold(state, ListenState::next).boxed();
        Listener::new(updates, Box::new(WatchRegistration { cancel }))
    }

    fn listen_doc(
        &self,
        doc: &DocumentReference,
        include_metadata_changes: bool,
    ) -> Listener<DocumentSnapshot> {
        let watched = doc.path().to_string();
        let doc = doc.clone();
        self.listen(
            include_metadata_changes,
            Arc::new(move |path: &str| path == watched),
            Arc::new(move |inner: Arc<Inner>, source: Source| {
                let doc = doc.clone();
                Box::pin(async move { inner.read_document(&doc, source).await })
                    as ReadFuture<DocumentSnapshot>
            }),
        )
    }

    fn listen_collection(
        &self,
        query: &Query,
        include_metadata_changes: bool,
    ) -> Listener<QuerySnapshot> {
        let collection = query.path().to_string();
        let query = query.clone();
        self.listen(
            include_metadata_changes,
            Arc::new(move |path: &str| parent_of(path) == collection),
            Arc::new(move |inner: Arc<Inner>, source: Source| {
                let query = query.clone();
                Box::pin(async move { inner.run_query(&query, source).await })
                    as ReadFuture<QuerySnapshot>
            }),
        )
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn get_document(&self, doc: &DocumentReference) -> Result<DocumentSnapshot> {
        self.inner.read_document(doc, Source::Default).await
    }

    async fn get_document_from(
        &self,
        doc: &DocumentReference,
        source: Source,
    ) -> Result<DocumentSnapshot> {
        self.inner.read_document(doc, source).await
    }

    fn listen_document(&self, doc: &DocumentReference) -> Listener<DocumentSnapshot> {
        self.listen_doc(doc, false)
    }

    fn listen_document_with_metadata(
        &self,
        doc: &DocumentReference,
        include_metadata_changes: bool,
    ) -> Listener<DocumentSnapshot> {
        self.listen_doc(doc, include_metadata_changes)
    }

    async fn get_documents(&self, query: &Query) -> Result<QuerySnapshot> {
        self.inner.run_query(query, Source::Default).await
    }

    async fn get_documents_from(&self, query: &Query, source: Source) -> Result<QuerySnapshot> {
        self.inner.run_query(query, source).await
    }

    fn listen_query(&self, query: &Query) -> Listener<QuerySnapshot> {
        self.listen_collection(query, false)
    }

    fn listen_query_with_metadata(
        &self,
        query: &Query,
        include_metadata_changes: bool,
    ) -> Listener<QuerySnapshot> {
        self.listen_collection(query, include_metadata_changes)
    }
}
