//! Monitoring context.
//!
//! [`Monitoring`] owns the options and both read counters. It is the only
//! way to build an [`Instrumented`] client, so every instrumented client
//! created from one context feeds the same tallies.
//!
//! ```ignore
//! let monitoring = Monitoring::new(Options::with_logs());
//! let store = monitoring.instrument(client)?;
//!
//! store.get_document(&DocumentReference::new("users/1")).await?;
//! assert_eq!(monitoring.document_counts().count_from_server, 1);
//! ```
//!
//! A lazily created process-wide instance is available through
//! [`Monitoring::global`].

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::advice::Instrumented;
use crate::config::{ConfigError, Options};
use crate::counters::{
    CollectionCounters, CollectionReadCounts, DocumentCounters, DocumentReadCounts,
    ReadCountsSnapshot,
};
use crate::interfaces::DocumentStore;
use crate::sink::{CounterSink, ReadTotals, TracingSink};

static GLOBAL: LazyLock<Monitoring> = LazyLock::new(|| {
    debug!("Global monitoring context created");
    Monitoring::new(Options::default())
});

/// Errors raised by the monitoring context.
#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("Client is already instrumented; wrapping it again would count every read twice")]
    AlreadyInstrumented,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

struct MonitoringState {
    options: RwLock<Options>,
    documents: DocumentCounters,
    collections: CollectionCounters,
}

/// Shared handle to options and read counters.
///
/// Cloning is cheap; clones observe and update the same state.
#[derive(Clone)]
pub struct Monitoring {
    state: Arc<MonitoringState>,
}

impl Monitoring {
    /// Create a context reporting counter updates through `tracing`.
    pub fn new(options: Options) -> Self {
        Self::with_sink(options, Arc::new(TracingSink))
    }

    /// Create a context reporting counter updates to `sink`.
    pub fn with_sink(options: Options, sink: Arc<dyn CounterSink>) -> Self {
        Self {
            state: Arc::new(MonitoringState {
                options: RwLock::new(options),
                documents: DocumentCounters::new(Arc::clone(&sink)),
                collections: CollectionCounters::new(sink),
            }),
        }
    }

    /// Create a context from file and environment configuration.
    pub fn from_config(path: Option<&str>) -> Result<Self, MonitoringError> {
        Ok(Self::new(Options::load(path)?))
    }

    /// The process-wide context.
    pub fn global() -> &'static Monitoring {
        &GLOBAL
    }

    /// Configuration entry point for the process-wide context.
    ///
    /// Replaces the global options when `options` is provided; passing
    /// `None` only reads.
    pub fn monitoring(options: Option<Options>) -> &'static Monitoring {
        let monitoring = Self::global();
        monitoring.configure(options);
        monitoring
    }

    /// Replace the options when provided, returning the options in effect.
    pub fn configure(&self, options: Option<Options>) -> Options {
        match options {
            Some(options) => {
                *self
                    .state
                    .options
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = options;
                options
            }
            None => self.options(),
        }
    }

    /// Current options.
    pub fn options(&self) -> Options {
        *self
            .state
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wrap `client` so its reads are counted by this context.
    ///
    /// Fails if `client` is itself an instrumented client.
    pub fn instrument<T: DocumentStore>(&self, client: T) -> Result<Instrumented<T>, MonitoringError> {
        if client.is_instrumented() {
            return Err(MonitoringError::AlreadyInstrumented);
        }
        Ok(Instrumented::new(client, self.clone()))
    }

    pub(crate) fn documents(&self) -> &DocumentCounters {
        &self.state.documents
    }

    pub(crate) fn collections(&self) -> &CollectionCounters {
        &self.state.collections
    }

    pub fn document_counts(&self) -> DocumentReadCounts {
        self.state.documents.snapshot()
    }

    pub fn collection_counts(&self) -> CollectionReadCounts {
        self.state.collections.snapshot()
    }

    pub fn document_totals(&self) -> ReadTotals {
        self.state.documents.totals()
    }

    pub fn collection_totals(&self) -> ReadTotals {
        self.state.collections.totals()
    }

    /// Copy of both aggregators.
    pub fn snapshot(&self) -> ReadCountsSnapshot {
        ReadCountsSnapshot {
            documents: self.document_counts(),
            collections: self.collection_counts(),
        }
    }
}

impl std::fmt::Debug for Monitoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitoring")
            .field("options", &self.options())
            .finish_non_exhaustive()
    }
}
