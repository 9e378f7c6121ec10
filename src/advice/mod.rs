//! Aspect-oriented advice for cross-cutting concerns.
//!
//! This module provides wrapper types that add orthogonal behavior
//! (read counting, tracing) without touching the wrapped client.
//!
//! # Architecture
//!
//! Advice is applied at composition time, not in implementations:
//!
//! ```ignore
//! // Core client - plain store access
//! let client = MockDocumentStore::new();
//!
//! // Apply advice layers
//! let store = monitoring.instrument(client)?;
//!
//! // Use as normal - counting is transparent
//! store.get_document(&DocumentReference::new("users/1")).await?;
//! ```
//!
//! # Available Advice
//!
//! - [`Instrumented`] - Counts every document and query read

mod instrumented;

pub use instrumented::{EntryPoint, Instrumented};
