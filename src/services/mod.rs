//! Engine services.
//!
//! Services are synchronous and hold no mutable state; each one reads what
//! it needs through a shared [`GraphRepository`](crate::storage::GraphRepository).
//!
//! | Service | Role |
//! |---------|------|
//! | [`RelationshipValidator`] | Accepts or rejects a proposed relationship |
//! | [`AncestryService`] | Ancestor and descendant queries |
//! | [`GenerationCalculator`] | Generation depth of a family |
//! | [`ConsistencyRepairer`] | Fixes inconsistent parent/spouse links |
//! | [`MemberProjector`] | Derives member links from relationship edges |
//! | [`FamilyGraphService`] | Command facade combining the above |

mod ancestry;
mod cancellation;
mod generation;
mod graph;
mod projection;
mod repair;
mod validator;

pub use ancestry::AncestryService;
pub use cancellation::CancellationToken;
pub use generation::{GenerationCalculator, generation_report};
pub use graph::FamilyGraphService;
pub use projection::MemberProjector;
pub use repair::ConsistencyRepairer;
pub use validator::RelationshipValidator;
