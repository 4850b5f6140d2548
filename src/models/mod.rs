//! Data models.
//!
//! Core types for the family graph: members, relationship edges, their
//! temporal bounds, and the result types produced by the engine services.

mod generation;
mod member;
mod relationship;
mod repair;
mod temporal;
mod validation;

pub use generation::{FamilyStats, GenerationReport, RootStrategy};
pub use member::{FamilyId, Gender, Member, MemberId};
pub use relationship::{Relationship, RelationshipId, RelationshipType};
pub use repair::{RepairAction, RepairDetail, RepairReport, SkippedMember};
pub use temporal::ValidTimeRange;
pub use validation::{Rejection, RejectionReason, ValidationOutcome};
