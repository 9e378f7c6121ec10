//! Document store client interface.
//!
//! The store exposes two read shapes: one-shot fetches returning a
//! snapshot, and listeners delivering a stream of snapshots until
//! removed. Each shape exists for single documents and for queries over
//! a collection, giving 8 read-producing entry points in total.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors reported by the underlying store.
///
/// The instrumentation layer treats all of these as an opaque
/// "read failed" outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Where a read should be served from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Source {
    /// Server when reachable, local cache otherwise.
    #[default]
    Default,
    /// Server only; fails when offline.
    Server,
    /// Local cache only.
    Cache,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Default => "default",
            Source::Server => "server",
            Source::Cache => "cache",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a single document by resource path (`"users/1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    path: String,
}

impl DocumentReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Full resource path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path of the collection containing this document.
    ///
    /// Empty for a path without a separator.
    pub fn parent(&self) -> &str {
        self.path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Query over the documents of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<(String, Value)>,
    limit: Option<usize>,
}

impl Query {
    /// Query matching every document of `collection`.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Restrict results to documents whose `field` equals `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Cap the number of returned documents.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Path of the queried collection.
    pub fn path(&self) -> &str {
        &self.collection
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Whether a document with the given data satisfies every filter.
    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| data.get(field) == Some(expected))
    }
}

/// Metadata attached to every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotMetadata {
    /// Served from the local cache rather than confirmed by the server.
    pub from_cache: bool,
    /// Contains local writes not yet acknowledged by the server.
    pub has_pending_writes: bool,
}

impl SnapshotMetadata {
    pub fn server() -> Self {
        Self::default()
    }

    pub fn cache() -> Self {
        Self {
            from_cache: true,
            has_pending_writes: false,
        }
    }
}

/// Result of reading one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub reference: DocumentReference,
    /// `None` when the document does not exist.
    pub data: Option<Map<String, Value>>,
    pub metadata: SnapshotMetadata,
}

impl DocumentSnapshot {
    pub fn new(
        reference: DocumentReference,
        data: Option<Map<String, Value>>,
        metadata: SnapshotMetadata,
    ) -> Self {
        Self {
            reference,
            data,
            metadata,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn path(&self) -> &str {
        self.reference.path()
    }

    pub fn from_cache(&self) -> bool {
        self.metadata.from_cache
    }

    /// Value of a top-level field, if the document exists and has it.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(field))
    }
}

/// Result of running a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub documents: Vec<DocumentSnapshot>,
    pub metadata: SnapshotMetadata,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<DocumentSnapshot>, metadata: SnapshotMetadata) -> Self {
        Self {
            documents,
            metadata,
        }
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    /// Number of documents in the result set.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn from_cache(&self) -> bool {
        self.metadata.from_cache
    }
}

/// Stream of snapshots delivered by a listener.
pub type SnapshotStream<S> = BoxStream<'static, Result<S>>;

/// Cancellation handle of a listener.
///
/// Removing a registration ends the associated stream. Dropping the
/// handle does not.
pub trait ListenerRegistration: Send + Sync {
    fn remove(&self);
}

/// An active listener: its update stream plus the handle cancelling it.
pub struct Listener<S> {
    pub updates: SnapshotStream<S>,
    pub registration: Box<dyn ListenerRegistration>,
}

impl<S> Listener<S> {
    pub fn new(updates: SnapshotStream<S>, registration: Box<dyn ListenerRegistration>) -> Self {
        Self {
            updates,
            registration,
        }
    }

    /// Cancel the listener.
    pub fn remove(&self) {
        self.registration.remove();
    }

    pub fn into_parts(self) -> (SnapshotStream<S>, Box<dyn ListenerRegistration>) {
        (self.updates, self.registration)
    }
}

impl<S> fmt::Debug for Listener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}

/// Interface for the read side of a document store client.
///
/// Implementations:
/// - `MockDocumentStore`: In-memory store for testing and demos
/// - `Instrumented`: Counting decorator over another implementation
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document from the default source.
    async fn get_document(&self, doc: &DocumentReference) -> Result<DocumentSnapshot>;

    /// Fetch a document from an explicit source.
    async fn get_document_from(
        &self,
        doc: &DocumentReference,
        source: Source,
    ) -> Result<DocumentSnapshot>;

    /// Listen to a document.
    fn listen_document(&self, doc: &DocumentReference) -> Listener<DocumentSnapshot>;

    /// Listen to a document, optionally including metadata-only changes.
    fn listen_document_with_metadata(
        &self,
        doc: &DocumentReference,
        include_metadata_changes: bool,
    ) -> Listener<DocumentSnapshot>;

    /// Run a query against the default source.
    async fn get_documents(&self, query: &Query) -> Result<QuerySnapshot>;

    /// Run a query against an explicit source.
    async fn get_documents_from(&self, query: &Query, source: Source) -> Result<QuerySnapshot>;

    /// Listen to a query.
    fn listen_query(&self, query: &Query) -> Listener<QuerySnapshot>;

    /// Listen to a query, optionally including metadata-only changes.
    fn listen_query_with_metadata(
        &self,
        query: &Query,
        include_metadata_changes: bool,
    ) -> Listener<QuerySnapshot>;

    /// Whether reads through this client are already being counted.
    fn is_instrumented(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get_document(&self, doc: &DocumentReference) -> Result<DocumentSnapshot> {
        (**self).get_document(doc).await
    }

    async fn get_document_from(
        &self,
        doc: &DocumentReference,
        source: Source,
    ) -> Result<DocumentSnapshot> {
        (**self).get_document_from(doc, source).await
    }

    fn listen_document(&self, doc: &DocumentReference) -> Listener<DocumentSnapshot> {
        (**self).listen_document(doc)
    }

    fn listen_document_with_metadata(
        &self,
        doc: &DocumentReference,
        include_metadata_changes: bool,
    ) -> Listener<DocumentSnapshot> {
        (**self).listen_document_with_metadata(doc, include_metadata_changes)
    }

    async fn get_documents(&self, query: &Query) -> Result<QuerySnapshot> {
        (**self).get_documents(query).await
    }

    async fn get_documents_from(&self, query: &Query, source: Source) -> Result<QuerySnapshot> {
        (**self).get_documents_from(query, source).await
    }

    fn listen_query(&self, query: &Query) -> Listener<QuerySnapshot> {
        (**self).listen_query(query)
    }

    fn listen_query_with_metadata(
        &self,
        query: &Query,
        include_metadata_changes: bool,
    ) -> Listener<QuerySnapshot> {
        (**self).listen_query_with_metadata(query, include_metadata_changes)
    }

    fn is_instrumented(&self) -> bool {
        (**self).is_instrumented()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_reference_segments() {
        let doc = DocumentReference::new("users/1/posts/42");
        assert_eq!(doc.id(), "42");
        assert_eq!(doc.parent(), "users/1/posts");

        let root = DocumentReference::new("orphan");
        assert_eq!(root.id(), "orphan");
        assert_eq!(root.parent(), "");
    }

    #[test]
    fn test_query_matches_all_filters() {
        let query = Query::collection("users")
            .where_eq("role", "admin")
            .where_eq("active", true);

        let mut data = Map::new();
        data.insert("role".into(), json!("admin"));
        data.insert("active".into(), json!(true));
        assert!(query.matches(&data));

        data.insert("active".into(), json!(false));
        assert!(!query.matches(&data));
    }

    #[test]
    fn test_snapshot_origin_accessors() {
        let doc = DocumentSnapshot::new(
            DocumentReference::new("users/1"),
            None,
            SnapshotMetadata::cache(),
        );
        assert!(doc.from_cache());
        assert!(!doc.exists());

        let query = QuerySnapshot::new(vec![doc], SnapshotMetadata::server());
        assert!(!query.from_cache());
        assert_eq!(query.len(), 1);
    }
}
