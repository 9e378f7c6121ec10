//! OpenTelemetry export of read counts.
//!
//! Naming follows OTel semantic conventions (dot-separated).

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{global, KeyValue};

use super::{CounterSink, ReadEvent, ReadOutcome};

/// Sink that mirrors every counter update into OTel counters.
///
/// - `docstore.reads.documents` - Documents read (by kind, origin)
/// - `docstore.reads.errors` - Failed reads (by kind)
pub struct OtelSink {
    documents: Counter<u64>,
    errors: Counter<u64>,
}

impl OtelSink {
    /// Build instruments on the global meter provider.
    pub fn new() -> Self {
        Self::with_meter(&global::meter("docstore-monitoring"))
    }

    pub fn with_meter(meter: &Meter) -> Self {
        Self {
            documents: meter
                .u64_counter("docstore.reads.documents")
                .with_description("Documents read through instrumented clients")
                .build(),
            errors: meter
                .u64_counter("docstore.reads.errors")
                .with_description("Failed reads through instrumented clients")
                .build(),
        }
    }
}

impl Default for OtelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSink for OtelSink {
    fn record(&self, event: &ReadEvent<'_>) {
        let kind = KeyValue::new("kind", event.kind.as_str());
        match event.outcome {
            ReadOutcome::Server { documents } | ReadOutcome::Cache { documents } => {
                self.documents.add(
                    documents,
                    &[kind, KeyValue::new("origin", event.outcome.origin())],
                );
            }
            ReadOutcome::Error => self.errors.add(1, &[kind]),
        }
    }
}
