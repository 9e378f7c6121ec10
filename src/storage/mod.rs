//! Store implementations.
//!
//! Real clients live outside this crate and only need to implement
//! [`crate::interfaces::DocumentStore`]; the mock here backs tests and
//! the demo binary.

pub mod mock;

pub use mock::MockDocumentStore;
