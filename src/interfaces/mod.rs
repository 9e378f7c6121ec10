//! Abstract interfaces for docstore-monitoring components.
//!
//! These traits define the contracts for:
//! - The document store client being observed (read entry points)

pub mod document_store;

pub use document_store::{
    DocumentReference, DocumentSnapshot, DocumentStore, Listener, ListenerRegistration, Query,
    QuerySnapshot, SnapshotMetadata, SnapshotStream, Source, StoreError,
};
