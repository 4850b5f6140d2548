//! Family members.
//!
//! A [`Member`] is a person within a family. Besides its own attributes it
//! carries four denormalized back-links (`father_id`, `mother_id`,
//! `husband_id`, `wife_id`) that project the canonical relationship edges
//! for readers that do not want to walk the graph.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Creates a member ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique member ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("mem_{}", Uuid::new_v4().simple()))
    }

    /// Returns the member ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MemberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(String);

impl FamilyId {
    /// Creates a family ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the family ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FamilyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Recorded gender of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not recorded.
    #[default]
    Unknown,
}

impl Gender {
    /// Returns the gender as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a gender from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            "unknown" | "u" | "" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown gender: {s}")))
    }
}

/// A person within a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier.
    pub id: MemberId,
    /// Owning family.
    pub family_id: FamilyId,
    /// Display name.
    pub name: String,
    /// Recorded gender.
    pub gender: Gender,
    /// Projection of the member's Father edge.
    pub father_id: Option<MemberId>,
    /// Projection of the member's Mother edge.
    pub mother_id: Option<MemberId>,
    /// Projection of the member's active husband.
    pub husband_id: Option<MemberId>,
    /// Projection of the member's active wife.
    pub wife_id: Option<MemberId>,
}

impl Member {
    /// Creates a member with a generated ID and no links.
    #[must_use]
    pub fn new(family_id: FamilyId, name: impl Into<String>, gender: Gender) -> Self {
        Self {
            id: MemberId::generate(),
            family_id,
            name: name.into(),
            gender,
            father_id: None,
            mother_id: None,
            husband_id: None,
            wife_id: None,
        }
    }

    /// Sets the member ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MemberId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the father link.
    #[must_use]
    pub fn with_father(mut self, father: MemberId) -> Self {
        self.father_id = Some(father);
        self
    }

    /// Sets the mother link.
    #[must_use]
    pub fn with_mother(mut self, mother: MemberId) -> Self {
        self.mother_id = Some(mother);
        self
    }

    /// Sets the husband link.
    #[must_use]
    pub fn with_husband(mut self, husband: MemberId) -> Self {
        self.husband_id = Some(husband);
        self
    }

    /// Sets the wife link.
    #[must_use]
    pub fn with_wife(mut self, wife: MemberId) -> Self {
        self.wife_id = Some(wife);
        self
    }

    /// Clears all four denormalized links.
    pub fn clear_links(&mut self) {
        self.father_id = None;
        self.mother_id = None;
        self.husband_id = None;
        self.wife_id = None;
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
