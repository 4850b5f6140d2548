//! Generation and family statistics results.

use crate::models::member::MemberId;
use crate::models::relationship::RelationshipType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the roots of a generation walk were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootStrategy {
    /// Members with no recorded Father/Mother edge at all.
    NoParents,
    /// Members with no Father/Mother edge coming from another loaded member.
    NoIncomingEdges,
    /// A single member picked because no other rule found a root.
    ///
    /// The resulting depth is an approximation.
    ArbitraryMember,
}

impl RootStrategy {
    /// Returns true if the depth computed with this strategy is approximate.
    #[must_use]
    pub const fn is_approximation(&self) -> bool {
        matches!(self, Self::ArbitraryMember)
    }
}

/// Result of a generation calculation over one family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Number of generational layers (0 for an empty family).
    pub depth: u32,
    /// Members the walks started from, sorted.
    pub roots: Vec<MemberId>,
    /// Root selection rule used; None for an empty family.
    pub strategy: Option<RootStrategy>,
    /// Generation layer (1-based) of every member reachable from a root.
    pub layers: BTreeMap<MemberId, u32>,
    /// True if a walk met a member already on its current path.
    pub cycle_detected: bool,
}

impl GenerationReport {
    /// Returns true if the depth should be treated as a best-effort figure.
    #[must_use]
    pub fn is_approximate(&self) -> bool {
        self.cycle_detected || self.strategy.is_some_and(|s| s.is_approximation())
    }
}

/// Summary statistics for a family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyStats {
    /// Number of members.
    pub member_count: usize,
    /// Members recorded as male.
    pub male_count: usize,
    /// Members recorded as female.
    pub female_count: usize,
    /// Members with unknown gender.
    pub unknown_gender_count: usize,
    /// Number of relationships.
    pub relationship_count: usize,
    /// Number of relationships by type.
    pub relationships_by_type: BTreeMap<RelationshipType, usize>,
    /// Active marriage edges.
    pub active_couples: usize,
    /// Number of roots used for the generation walk.
    pub root_count: usize,
    /// Generation depth.
    pub generation_depth: u32,
}
