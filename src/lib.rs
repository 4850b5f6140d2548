//! # Kinship
//!
//! Family relationship graph engine.
//!
//! Kinship keeps a family graph of members and typed relationships
//! consistent and derives lineage facts from it.
//!
//! ## Components
//!
//! - Graph repository port with in-memory and `SQLite` adapters
//! - Relationship invariant validator (self-edges, duplicates, parent and
//!   spouse caps, acyclicity)
//! - Ancestry queries over the parent/child sub-graph
//! - Generation depth calculation with documented fallbacks for corrupted data
//! - Consistency repair of the denormalized parent/spouse fields
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kinship::models::{FamilyId, Gender, Member, Relationship, RelationshipType};
//! use kinship::services::FamilyGraphService;
//! use kinship::storage::graph::InMemoryGraphRepository;
//!
//! # fn main() -> kinship::Result<()> {
//! let family = FamilyId::new("smith");
//! let service = FamilyGraphService::new(Arc::new(InMemoryGraphRepository::new()));
//!
//! let father = Member::new(family.clone(), "John", Gender::Male);
//! let child = Member::new(family.clone(), "Jane", Gender::Female);
//! service.add_member(&father)?;
//! service.add_member(&child)?;
//!
//! let edge = Relationship::new(
//!     family.clone(),
//!     father.id.clone(),
//!     child.id.clone(),
//!     RelationshipType::Father,
//! );
//! assert!(service.create_relationship(&edge)?.is_accepted());
//! assert_eq!(service.generations().compute_generation_depth(&family)?, 2);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::KinshipConfig;
pub use models::{
    FamilyId, Gender, Member, MemberId, Relationship, RelationshipId, RelationshipType,
    ValidationOutcome,
};
pub use services::{
    AncestryService, CancellationToken, ConsistencyRepairer, FamilyGraphService,
    GenerationCalculator, RelationshipValidator,
};
pub use storage::GraphRepository;

/// Error type for kinship operations.
///
/// Relationship rule violations are not errors: they are reported as
/// [`ValidationOutcome::Rejected`] values.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown gender/relationship strings, empty names, bad CLI input |
/// | `NotFound` | A command targets a member or relationship that does not exist |
/// | `OperationFailed` | `SQLite` errors, lock poisoning, config file I/O or parse errors |
/// | `Cancelled` | A [`CancellationToken`] fired during a traversal or scan |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record ("member", "relationship").
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail or a referenced row violates a foreign key
    /// - The in-memory repository lock is poisoned
    /// - A configuration or log file cannot be read or parsed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The operation was cancelled through its cancellation token.
    #[error("operation '{operation}' was cancelled")]
    Cancelled {
        /// The operation that observed the cancellation.
        operation: &'static str,
    },
}

impl Error {
    /// Builds a not-found error for a member.
    #[must_use]
    pub fn member_not_found(id: &MemberId) -> Self {
        Self::NotFound {
            kind: "member",
            id: id.to_string(),
        }
    }

    /// Builds a not-found error for a relationship.
    #[must_use]
    pub fn relationship_not_found(id: &RelationshipId) -> Self {
        Self::NotFound {
            kind: "relationship",
            id: id.to_string(),
        }
    }
}

/// Result type alias for kinship operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}
