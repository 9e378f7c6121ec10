//! Read counters.
//!
//! Two independent aggregators: [`DocumentCounters`] for single-document
//! reads and [`CollectionCounters`] for query reads. Each tally lives
//! behind a mutex so completions arriving concurrently from many
//! in-flight reads never lose an update.
//!
//! Per-path maps follow a first-seen-is-zero rule: the first completion
//! for a path inserts `0`, every later one adds `1`. Aggregate scalars
//! count every completion.

mod collection;
mod document;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

pub use collection::{CollectionCounters, CollectionReadCounts};
pub use document::{DocumentCounters, DocumentReadCounts};

/// Copy of both aggregators at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadCountsSnapshot {
    pub documents: DocumentReadCounts,
    pub collections: CollectionReadCounts,
}

/// Bump the tally for `path`, inserting 0 if it has not been seen yet.
fn bump(map: &mut HashMap<String, u64>, path: &str) {
    match map.get_mut(path) {
        Some(count) => *count += 1,
        None => {
            map.insert(path.to_string(), 0);
        }
    }
}

/// Lock a tally, recovering the data from a poisoned mutex.
///
/// Updates are plain integer and map writes, so a panic elsewhere
/// cannot leave a tally half-applied.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
