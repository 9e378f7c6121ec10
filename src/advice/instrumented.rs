//! Read-counting advice.
//!
//! Wraps a [`DocumentStore`] so every read it serves is tallied by a
//! [`Monitoring`] context without modifying the wrapped client.

use std::fmt;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use crate::interfaces::document_store::Result;
use crate::interfaces::{
    DocumentReference, DocumentSnapshot, DocumentStore, Listener, Query, QuerySnapshot, Source,
};
use crate::monitoring::Monitoring;
use crate::sink::ReadKind;

/// The read-producing entry points of a [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    GetDocument,
    GetDocumentFrom,
    ListenDocument,
    ListenDocumentWithMetadata,
    GetDocuments,
    GetDocumentsFrom,
    ListenQuery,
    ListenQueryWithMetadata,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 8] = [
        EntryPoint::GetDocument,
        EntryPoint::GetDocumentFrom,
        EntryPoint::ListenDocument,
        EntryPoint::ListenDocumentWithMetadata,
        EntryPoint::GetDocuments,
        EntryPoint::GetDocumentsFrom,
        EntryPoint::ListenQuery,
        EntryPoint::ListenQueryWithMetadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::GetDocument => "get_document",
            EntryPoint::GetDocumentFrom => "get_document_from",
            EntryPoint::ListenDocument => "listen_document",
            EntryPoint::ListenDocumentWithMetadata => "listen_document_with_metadata",
            EntryPoint::GetDocuments => "get_documents",
            EntryPoint::GetDocumentsFrom => "get_documents_from",
            EntryPoint::ListenQuery => "listen_query",
            EntryPoint::ListenQueryWithMetadata => "listen_query_with_metadata",
        }
    }

    /// Aggregator the entry point reports to.
    pub fn kind(&self) -> ReadKind {
        match self {
            EntryPoint::GetDocument
            | EntryPoint::GetDocumentFrom
            | EntryPoint::ListenDocument
            | EntryPoint::ListenDocumentWithMetadata => ReadKind::Document,
            EntryPoint::GetDocuments
            | EntryPoint::GetDocumentsFrom
            | EntryPoint::ListenQuery
            | EntryPoint::ListenQueryWithMetadata => ReadKind::Collection,
        }
    }

    pub fn is_listener(&self) -> bool {
        matches!(
            self,
            EntryPoint::ListenDocument
                | EntryPoint::ListenDocumentWithMetadata
                | EntryPoint::ListenQuery
                | EntryPoint::ListenQueryWithMetadata
        )
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualifier passed alongside a read.
#[derive(Debug, Clone, Copy)]
enum Qualifier {
    None,
    Source(Source),
    IncludeMetadataChanges(bool),
}

/// Wrapper that counts every read served by the inner client.
///
/// Results, errors and listener registrations are returned exactly as the
/// inner client produced them. Listener deliveries are counted as the
/// caller receives them, one tally per delivered snapshot.
///
/// Built through [`Monitoring::instrument`], which refuses to wrap a
/// client that is already instrumented.
///
/// # Example
///
/// ```ignore
/// let monitoring = Monitoring::new(Options::default());
/// let store = monitoring.instrument(client)?;
///
/// let listener = store.listen_query(&Query::collection("users"));
/// ```
pub struct Instrumented<T> {
    inner: T,
    monitoring: Monitoring,
}

impl<T> Instrumented<T> {
    pub(crate) fn new(inner: T, monitoring: Monitoring) -> Self {
        Self { inner, monitoring }
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Consume the wrapper and return the inner client.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Context receiving this client's counts.
    pub fn monitoring(&self) -> &Monitoring {
        &self.monitoring
    }

    fn trace(&self, entry_point: EntryPoint, path: &str, qualifier: Qualifier) {
        if !self.monitoring.options().show_logs {
            return;
        }
        let label = match entry_point.kind() {
            ReadKind::Document => "Document",
            ReadKind::Collection => "Collection",
        };
        match qualifier {
            Qualifier::None => info!(
                entry_point = %entry_point,
                path,
                "[Monitoring:{}] {} path: {}",
                label,
                entry_point,
                path
            ),
            Qualifier::Source(source) => info!(
                entry_point = %entry_point,
                path,
                source = %source,
                "[Monitoring:{}] {} path: {} source: {}",
                label,
                entry_point,
                path,
                source
            ),
            Qualifier::IncludeMetadataChanges(include) => info!(
                entry_point = %entry_point,
                path,
                include_metadata_changes = include,
                "[Monitoring:{}] {} path: {} include_metadata_changes: {}",
                label,
                entry_point,
                path,
                include
            ),
        }
    }

    fn count_document_listener(
        &self,
        path: String,
        listener: Listener<DocumentSnapshot>,
    ) -> Listener<DocumentSnapshot> {
        let (updates, registration) = listener.into_parts();
        let monitoring = self.monitoring.clone();
        let updates = updates
            .inspect(move |result| monitoring.documents().record_result(&path, result))
            .boxed();
        Listener::new(updates, registration)
    }

    fn count_query_listener(&self, listener: Listener<QuerySnapshot>) -> Listener<QuerySnapshot> {
        let (updates, registration) = listener.into_parts();
        let monitoring = self.monitoring.clone();
        let updates = updates
            .inspect(move |result| monitoring.collections().record_result(result))
            .boxed();
        Listener::new(updates, registration)
    }
}

impl<T> fmt::Debug for Instrumented<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("monitoring", &self.monitoring)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: DocumentStore> DocumentStore for Instrumented<T> {
    async fn get_document(&self, doc: &DocumentReference) -> Result<DocumentSnapshot> {
        let path = doc.path();
        self.trace(EntryPoint::GetDocument, path, Qualifier::None);

        let result = self.inner.get_document(doc).await;

        self.monitoring.documents().record_result(path, &result);
        result
    }

    async fn get_document_from(
        &self,
        doc: &DocumentReference,
        source: Source,
    ) -> Result<DocumentSnapshot> {
        let path = doc.path();
        self.trace(EntryPoint::GetDocumentFrom, path, Qualifier::Source(source));

        let result = self.inner.get_document_from(doc, source).await;

        self.monitoring.documents().record_result(path, &result);
        result
    }

    fn listen_document(&self, doc: &DocumentReference) -> Listener<DocumentSnapshot> {
        let path = doc.path().to_string();
        self.trace(EntryPoint::ListenDocument, &path, Qualifier::None);

        let listener = self.inner.listen_document(doc);
        self.count_document_listener(path, listener)
    }

    fn listen_document_with_metadata(
        &self,
        doc: &DocumentReference,
        include_metadata_changes: bool,
    ) -> Listener<DocumentSnapshot> {
        let path = doc.path().to_string();
        self.trace(
            EntryPoint::ListenDocumentWithMetadata,
            &path,
            Qualifier::IncludeMetadataChanges(include_metadata_changes),
        );

        let listener = self
            .inner
            .listen_document_with_metadata(doc, include_metadata_changes);
        self.count_document_listener(path, listener)
    }

    async fn get_documents(&self, query: &Query) -> Result<QuerySnapshot> {
        self.trace(EntryPoint::GetDocuments, query.path(), Qualifier::None);

        let result = self.inner.get_documents(query).await;

        self.monitoring.collections().record_result(&result);
        result
    }

    async fn get_documents_from(&self, query: &Query, source: Source) -> Result<QuerySnapshot> {
        self.trace(
            EntryPoint::GetDocumentsFrom,
            query.path(),
            Qualifier::Source(source),
        );

        let result = self.inner.get_documents_from(query, source).await;

        self.monitoring.collections().record_result(&result);
        result
    }

    fn listen_query(&self, query: &Query) -> Listener<QuerySnapshot> {
        self.trace(EntryPoint::ListenQuery, query.path(), Qualifier::None);

        let listener = self.inner.listen_query(query);
        self.count_query_listener(listener)
    }

    fn listen_query_with_metadata(
        &self,
        query: &Query,
        include_metadata_changes: bool,
    ) -> Listener<QuerySnapshot> {
        self.trace(
            EntryPoint::ListenQueryWithMetadata,
            query.path(),
            Qualifier::IncludeMetadataChanges(include_metadata_changes),
        );

        let listener = self
            .inner
            .listen_query_with_metadata(query, include_metadata_changes);
        self.count_query_listener(listener)
    }

    fn is_instrumented(&self) -> bool {
        true
    }
}
