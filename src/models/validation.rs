//! Validation outcomes for proposed relationships.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable reason a relationship was rejected.
///
/// Variants are listed in the order the validator evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Source and target are the same member.
    SelfRelationship,
    /// One of the endpoints does not exist.
    MemberNotFound,
    /// An equivalent relationship already exists.
    Duplicate,
    /// The child already has its parent slot (or both parents) filled.
    ParentCardinality,
    /// One of the members already has an active spouse.
    SpouseCardinality,
    /// The proposed child is already an ancestor of the proposed parent.
    Cycle,
}

impl RejectionReason {
    /// Returns the stable reason code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SelfRelationship => "self_relationship",
            Self::MemberNotFound => "member_not_found",
            Self::Duplicate => "duplicate",
            Self::ParentCardinality => "parent_cardinality",
            Self::SpouseCardinality => "spouse_cardinality",
            Self::Cycle => "cycle",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rejection with its reason code and a message for the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Which rule failed.
    pub reason: RejectionReason,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Result of validating a proposed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// All rules passed.
    Accepted,
    /// A rule failed.
    Rejected(Rejection),
}

impl ValidationOutcome {
    /// Builds a rejection outcome.
    #[must_use]
    pub fn rejected(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self::Rejected(Rejection {
            reason,
            message: message.into(),
        })
    }

    /// Returns true if the relationship was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns the rejection reason, if rejected.
    #[must_use]
    pub const fn reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(rejection) => Some(rejection.reason),
        }
    }
}
