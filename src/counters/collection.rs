//! Counters for query reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::{bump, lock};
use crate::interfaces::{QuerySnapshot, StoreError};
use crate::sink::{CounterSink, ReadEvent, ReadKind, ReadOutcome, ReadTotals};

/// Tallies of query reads.
///
/// Aggregates count documents, not queries. Errors are not attributed
/// to a path since a failed query has no documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReadCounts {
    pub count_from_server: u64,
    pub count_from_cache: u64,
    pub error_count: u64,
    pub count_of_each_path: HashMap<String, u64>,
    pub count_of_each_path_from_cache: HashMap<String, u64>,
}

impl CollectionReadCounts {
    pub fn totals(&self) -> ReadTotals {
        ReadTotals {
            count_from_server: self.count_from_server,
            count_from_cache: self.count_from_cache,
            error_count: self.error_count,
        }
    }
}

/// Aggregator for query-shaped reads.
pub struct CollectionCounters {
    counts: Mutex<CollectionReadCounts>,
    sink: Arc<dyn CounterSink>,
}

impl CollectionCounters {
    pub fn new(sink: Arc<dyn CounterSink>) -> Self {
        Self {
            counts: Mutex::new(CollectionReadCounts::default()),
            sink,
        }
    }

    /// Record one completed query read.
    ///
    /// A completion carrying neither snapshot nor error leaves the
    /// tallies untouched.
    pub fn record(&self, snapshot: Option<&QuerySnapshot>, error: Option<&StoreError>) {
        let (outcome, totals) = {
            let mut guard = lock(&self.counts);
            let counts = &mut *guard;
            let outcome = match (error, snapshot) {
                (Some(_), _) => {
                    counts.error_count += 1;
                    ReadOutcome::Error
                }
                (None, Some(snapshot)) => {
                    let documents = snapshot.len() as u64;
                    let (total, per_path) = if snapshot.from_cache() {
                        (
                            &mut counts.count_from_cache,
                            &mut counts.count_of_each_path_from_cache,
                        )
                    } else {
                        (&mut counts.count_from_server, &mut counts.count_of_each_path)
                    };
                    *total += documents;
                    for doc in snapshot.documents() {
                        bump(per_path, doc.path());
                    }
                    if snapshot.from_cache() {
                        ReadOutcome::Cache { documents }
                    } else {
                        ReadOutcome::Server { documents }
                    }
                }
                (None, None) => ReadOutcome::Server { documents: 0 },
            };
            (outcome, counts.totals())
        };

        self.sink.record(&ReadEvent {
            kind: ReadKind::Collection,
            outcome,
            path: None,
            totals,
        });
    }

    /// Record the outcome of a fetch or a listener delivery.
    pub fn record_result(&self, result: &Result<QuerySnapshot, StoreError>) {
        self.record(result.as_ref().ok(), result.as_ref().err());
    }

    /// Copy of the current tallies.
    pub fn snapshot(&self) -> CollectionReadCounts {
        lock(&self.counts).clone()
    }

    pub fn totals(&self) -> ReadTotals {
        lock(&self.counts).totals()
    }
}

impl std::fmt::Debug for CollectionCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCounters")
            .field("counts", &self.snapshot())
            .finish_non_exhaustive()
    }
}
