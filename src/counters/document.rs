//! Counters for single-document reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::{bump, lock};
use crate::interfaces::{DocumentSnapshot, StoreError};
use crate::sink::{CounterSink, ReadEvent, ReadKind, ReadOutcome, ReadTotals};

/// Tallies of document reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentReadCounts {
    pub count_from_server: u64,
    pub count_from_cache: u64,
    pub error_count: u64,
    /// Server-origin reads per path.
    pub count_of_each_path: HashMap<String, u64>,
    /// Cache-origin reads per path.
    pub count_of_each_path_from_cache: HashMap<String, u64>,
    /// Failed reads per path.
    pub errors: HashMap<String, u64>,
}

impl DocumentReadCounts {
    pub fn totals(&self) -> ReadTotals {
        ReadTotals {
            count_from_server: self.count_from_server,
            count_from_cache: self.count_from_cache,
            error_count: self.error_count,
        }
    }
}

/// Aggregator for document-shaped reads.
pub struct DocumentCounters {
    counts: Mutex<DocumentReadCounts>,
    sink: Arc<dyn CounterSink>,
}

impl DocumentCounters {
    pub fn new(sink: Arc<dyn CounterSink>) -> Self {
        Self {
            counts: Mutex::new(DocumentReadCounts::default()),
            sink,
        }
    }

    /// Record one completed document read.
    ///
    /// An error wins over a snapshot. A completion carrying neither is
    /// counted as a server read.
    pub fn record(
        &self,
        path: &str,
        snapshot: Option<&DocumentSnapshot>,
        error: Option<&StoreError>,
    ) {
        let outcome = if error.is_some() {
            ReadOutcome::Error
        } else if snapshot.is_some_and(DocumentSnapshot::from_cache) {
            ReadOutcome::Cache { documents: 1 }
        } else {
            ReadOutcome::Server { documents: 1 }
        };

        let totals = {
            let mut counts = lock(&self.counts);
            match outcome {
                ReadOutcome::Error => {
                    counts.error_count += 1;
                    bump(&mut counts.errors, path);
                }
                ReadOutcome::Cache { .. } => {
                    counts.count_from_cache += 1;
                    bump(&mut counts.count_of_each_path_from_cache, path);
                }
                ReadOutcome::Server { .. } => {
                    counts.count_from_server += 1;
                    bump(&mut counts.count_of_each_path, path);
                }
            }
            counts.totals()
        };

        self.sink.record(&ReadEvent {
            kind: ReadKind::Document,
            outcome,
            path: Some(path),
            totals,
        });
    }

    /// Record the outcome of a fetch or a listener delivery.
    pub fn record_result(&self, path: &str, result: &Result<DocumentSnapshot, StoreError>) {
        self.record(path, result.as_ref().ok(), result.as_ref().err());
    }

    /// Copy of the current tallies.
    pub fn snapshot(&self) -> DocumentReadCounts {
        lock(&self.counts).clone()
    }

    pub fn totals(&self) -> ReadTotals {
        lock(&self.counts).totals()
    }
}

impl std::fmt::Debug for DocumentCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCounters")
            .field("counts", &self.snapshot())
            .finish_non_exhaustive()
    }
}
