//! Typed relationship edges between members.
//!
//! # Relationship Types
//!
//! | Type | Direction | Meaning |
//! |------|-----------|---------|
//! | `Father` | source → target | source is the father of target |
//! | `Mother` | source → target | source is the mother of target |
//! | `Parent` | source → target | source is a parent of target (role unspecified) |
//! | `Child` | source → target | source is a child of target |
//! | `Husband` | source → target | source is the husband of target |
//! | `Wife` | source → target | source is the wife of target |
//! | `Spouse` | symmetric | the two members are married |
//! | `Sibling` | symmetric | the two members are siblings |
//!
//! Only `Father`, `Mother` and `Parent` edges form the parent set used by
//! ancestry and cardinality rules.

use crate::models::member::{FamilyId, MemberId};
use crate::models::temporal::ValidTimeRange;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(String);

impl RelationshipId {
    /// Creates a relationship ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique relationship ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("rel_{}", Uuid::new_v4().simple()))
    }

    /// Returns the relationship ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RelationshipId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kind of relationship between two members.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    /// Source is the father of target.
    Father,
    /// Source is the mother of target.
    Mother,
    /// Source is the husband of target.
    Husband,
    /// Source is the wife of target.
    Wife,
    /// Source is a parent of target.
    Parent,
    /// Source is a child of target.
    Child,
    /// Symmetric marriage.
    Spouse,
    /// Symmetric sibling link.
    Sibling,
}

impl RelationshipType {
    /// Returns all relationship type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Father,
            Self::Mother,
            Self::Husband,
            Self::Wife,
            Self::Parent,
            Self::Child,
            Self::Spouse,
            Self::Sibling,
        ]
    }

    /// Returns the relationship type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Father => "father",
            Self::Mother => "mother",
            Self::Husband => "husband",
            Self::Wife => "wife",
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Spouse => "spouse",
            Self::Sibling => "sibling",
        }
    }

    /// Parses a relationship type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "father" => Some(Self::Father),
            "mother" => Some(Self::Mother),
            "husband" => Some(Self::Husband),
            "wife" => Some(Self::Wife),
            "parent" => Some(Self::Parent),
            "child" => Some(Self::Child),
            "spouse" | "partner" => Some(Self::Spouse),
            "sibling" => Some(Self::Sibling),
            _ => None,
        }
    }

    /// Returns true for types whose source and target are interchangeable.
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        matches!(self, Self::Spouse | Self::Sibling)
    }

    /// Returns true for types that assign the source as a parent of the target.
    #[must_use]
    pub const fn is_parent_link(&self) -> bool {
        matches!(self, Self::Father | Self::Mother | Self::Parent)
    }

    /// Returns true for marriage types.
    #[must_use]
    pub const fn is_spouse_link(&self) -> bool {
        matches!(self, Self::Husband | Self::Wife | Self::Spouse)
    }

    /// Returns true for the two parent slots with a fixed role.
    #[must_use]
    pub const fn is_gendered_parent(&self) -> bool {
        matches!(self, Self::Father | Self::Mother)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown relationship type: {s}")))
    }
}

/// A typed edge between two members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier.
    pub id: RelationshipId,
    /// Owning family.
    pub family_id: FamilyId,
    /// Source member (the parent for parent types).
    pub source_member_id: MemberId,
    /// Target member (the child for parent types).
    pub target_member_id: MemberId,
    /// Relationship type.
    pub relationship_type: RelationshipType,
    /// Optional ordering value, e.g. birth order among siblings.
    pub order: Option<i32>,
    /// Temporal bounds; spouse relationships end by closing this range.
    pub valid_time: ValidTimeRange,
    /// Free-text description.
    pub description: Option<String>,
}

impl Relationship {
    /// Creates a relationship with a generated ID and unbounded validity.
    #[must_use]
    pub fn new(
        family_id: FamilyId,
        source: MemberId,
        target: MemberId,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: RelationshipId::generate(),
            family_id,
            source_member_id: source,
            target_member_id: target,
            relationship_type,
            order: None,
            valid_time: ValidTimeRange::unbounded(),
            description: None,
        }
    }

    /// Sets the relationship ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RelationshipId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the ordering value.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the temporal bounds.
    #[must_use]
    pub const fn with_valid_time(mut self, valid_time: ValidTimeRange) -> Self {
        self.valid_time = valid_time;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if the member is either endpoint.
    #[must_use]
    pub fn involves(&self, member: &MemberId) -> bool {
        self.source_member_id == *member || self.target_member_id == *member
    }

    /// Returns the endpoint opposite to `member`, if `member` is an endpoint.
    #[must_use]
    pub fn other_end(&self, member: &MemberId) -> Option<&MemberId> {
        if self.source_member_id == *member {
            Some(&self.target_member_id)
        } else if self.target_member_id == *member {
            Some(&self.source_member_id)
        } else {
            None
        }
    }

    /// Returns true if both relationships connect the same members.
    ///
    /// The pair is ordered for directional types and unordered for
    /// symmetric ones. The relationship type of `other` is not compared.
    #[must_use]
    pub fn connects_same_pair(&self, other: &Self) -> bool {
        let same_order = self.source_member_id == other.source_member_id
            && self.target_member_id == other.target_member_id;
        if same_order {
            return true;
        }
        self.relationship_type.is_symmetric()
            && self.source_member_id == other.target_member_id
            && self.target_member_id == other.source_member_id
    }

    /// Returns the parent and child of a parent-type edge.
    #[must_use]
    pub fn parent_link(&self) -> Option<(&MemberId, &MemberId)> {
        self.relationship_type
            .is_parent_link()
            .then_some((&self.source_member_id, &self.target_member_id))
    }

    /// Returns true if the relationship has not ended at `timestamp`.
    #[must_use]
    pub const fn is_active_at(&self, timestamp: i64) -> bool {
        self.valid_time.is_active_at(timestamp)
    }

    /// Returns true if the relationship has not ended.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.valid_time.is_active()
    }
}
