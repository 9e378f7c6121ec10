//! Observability hooks for counter updates.
//!
//! Every `record` call on a counter produces one [`ReadEvent`], handed to
//! the configured [`CounterSink`] after the tally has been updated.
//!
//! # Available Sinks
//!
//! - [`TracingSink`] - One-line `tracing` summary per update (default)
//! - [`RecordingSink`] - Keeps events in memory
//! - [`NoopSink`] - Discards events
//! - `OtelSink` - OpenTelemetry counters (feature `otel`)

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

#[cfg(feature = "otel")]
mod otel;

#[cfg(feature = "otel")]
pub use otel::OtelSink;

/// Which aggregator produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadKind {
    Document,
    Collection,
}

impl ReadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadKind::Document => "document",
            ReadKind::Collection => "collection",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReadKind::Document => "Document",
            ReadKind::Collection => "Collection",
        }
    }
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one recorded completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOutcome {
    /// Successful read confirmed by the server.
    Server { documents: u64 },
    /// Successful read served from the local cache.
    Cache { documents: u64 },
    /// The underlying read failed.
    Error,
}

impl ReadOutcome {
    pub fn origin(&self) -> &'static str {
        match self {
            ReadOutcome::Server { .. } => "server",
            ReadOutcome::Cache { .. } => "cache",
            ReadOutcome::Error => "error",
        }
    }
}

/// Aggregate scalars of one counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadTotals {
    pub count_from_server: u64,
    pub count_from_cache: u64,
    pub error_count: u64,
}

/// Event handed to a sink after a counter update.
#[derive(Debug, Clone, Copy)]
pub struct ReadEvent<'a> {
    pub kind: ReadKind,
    pub outcome: ReadOutcome,
    /// Document path, for document reads.
    pub path: Option<&'a str>,
    /// Totals after the update was applied.
    pub totals: ReadTotals,
}

/// Receiver of counter updates.
pub trait CounterSink: Send + Sync {
    fn record(&self, event: &ReadEvent<'_>);
}

/// Emits a one-line summary per update through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl CounterSink for TracingSink {
    fn record(&self, event: &ReadEvent<'_>) {
        let totals = event.totals;
        info!(
            kind = %event.kind,
            origin = event.outcome.origin(),
            count_from_server = totals.count_from_server,
            count_from_cache = totals.count_from_cache,
            error_count = totals.error_count,
            "[Monitoring:{}] Count from Server: {} | Count from Cache: {} | Error count: {}",
            event.kind.label(),
            totals.count_from_server,
            totals.count_from_cache,
            totals.error_count
        );
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl CounterSink for NoopSink {
    fn record(&self, _event: &ReadEvent<'_>) {}
}

/// Owned copy of a [`ReadEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub kind: ReadKind,
    pub outcome: ReadOutcome,
    pub path: Option<String>,
    pub totals: ReadTotals,
}

impl From<&ReadEvent<'_>> for RecordedEvent {
    fn from(event: &ReadEvent<'_>) -> Self {
        Self {
            kind: event.kind,
            outcome: event.outcome,
            path: event.path.map(str::to_string),
            totals: event.totals,
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CounterSink for RecordingSink {
    fn record(&self, event: &ReadEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(path: &str) -> ReadEvent<'_> {
        ReadEvent {
            kind: ReadKind::Document,
            outcome: ReadOutcome::Server { documents: 1 },
            path: Some(path),
            totals: ReadTotals {
                count_from_server: 1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record(&event("users/1"));
        sink.record(&event("users/2"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].path.as_deref(), Some("users/1"));
        assert_eq!(events[1].path.as_deref(), Some("users/2"));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.record(&event("users/1"));
    }

    #[test]
    fn test_outcome_origin_labels() {
        assert_eq!(ReadOutcome::Server { documents: 3 }.origin(), "server");
        assert_eq!(ReadOutcome::Cache { documents: 0 }.origin(), "cache");
        assert_eq!(ReadOutcome::Error.origin(), "error");
    }
}
