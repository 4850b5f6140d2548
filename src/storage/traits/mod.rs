//! Storage backend traits.

mod graph;

pub use graph::{ChangeSet, GraphRepository};
