//! docstore-monitoring - read counting for document store clients
//!
//! Wraps a document store client so every document and query read,
//! whether a one-shot fetch or a listener delivery, is counted by origin
//! (server or local cache) and outcome (success or error), per path.
//!
//! ```ignore
//! let monitoring = Monitoring::new(Options::default());
//! let store = monitoring.instrument(client)?;
//!
//! store.get_documents(&Query::collection("users")).await?;
//! println!("{:?}", monitoring.snapshot());
//! ```

pub mod advice;
pub mod config;
pub mod counters;
pub mod interfaces;
pub mod monitoring;
pub mod sink;
pub mod storage;
pub mod utils;

pub use advice::{EntryPoint, Instrumented};
pub use config::{ConfigError, Options};
pub use counters::{
    CollectionCounters, CollectionReadCounts, DocumentCounters, DocumentReadCounts,
    ReadCountsSnapshot,
};
pub use interfaces::{
    DocumentReference, DocumentSnapshot, DocumentStore, Listener, ListenerRegistration, Query,
    QuerySnapshot, SnapshotMetadata, SnapshotStream, Source, StoreError,
};
pub use monitoring::{Monitoring, MonitoringError};
pub use sink::{
    CounterSink, NoopSink, ReadEvent, ReadKind, ReadOutcome, ReadTotals, RecordingSink, TracingSink,
};
