//! Graph repository adapters.
//!
//! # Available Repositories
//!
//! | Repository | Use Case | Features |
//! |------------|----------|----------|
//! | [`SqliteGraphRepository`] | Default; embedded | Transactional change sets, foreign keys |
//! | [`InMemoryGraphRepository`] | Testing | Fast, no persistence |
//!
//! # Example
//!
//! ```rust
//! use kinship::models::{FamilyId, Gender, Member};
//! use kinship::storage::graph::SqliteGraphRepository;
//! use kinship::storage::GraphRepository;
//!
//! # fn main() -> kinship::Result<()> {
//! let repository = SqliteGraphRepository::in_memory()?;
//! let member = Member::new(FamilyId::new("f1"), "Ann", Gender::Female);
//! repository.save_member(&member)?;
//! assert!(repository.get_member(&member.id)?.is_some());
//! # Ok(())
//! # }
//! ```

mod memory;
mod sqlite;

pub use memory::InMemoryGraphRepository;
pub use sqlite::SqliteGraphRepository;

pub use crate::storage::traits::{ChangeSet, GraphRepository};
