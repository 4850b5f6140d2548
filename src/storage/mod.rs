//! Storage layer abstraction.
//!
//! The graph repository port and its adapters. Engine services depend only
//! on [`GraphRepository`]; the adapters decide how members and
//! relationships are persisted.

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod graph;
pub mod traits;

pub use graph::{InMemoryGraphRepository, SqliteGraphRepository};
pub use traits::{ChangeSet, GraphRepository};
