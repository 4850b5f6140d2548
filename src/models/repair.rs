//! Repair reports.

use crate::models::member::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of correction considered by the consistency repairer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Female father and male mother were swapped.
    SwappedParents,
    /// A female father was moved to the mother slot.
    FatherReclassifiedAsMother,
    /// A male mother was moved to the father slot.
    MotherReclassifiedAsFather,
    /// The mother's husband was assigned as father.
    InferredFather,
    /// The father's wife was assigned as mother.
    InferredMother,
    /// An empty reciprocal spouse field was filled.
    ReciprocalSpouse,
    /// A Father or Mother edge was rewritten to match a repaired member.
    SyncedParentEdge,
}

impl RepairAction {
    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SwappedParents => "swapped_parents",
            Self::FatherReclassifiedAsMother => "father_reclassified_as_mother",
            Self::MotherReclassifiedAsFather => "mother_reclassified_as_father",
            Self::InferredFather => "inferred_father",
            Self::InferredMother => "inferred_mother",
            Self::ReciprocalSpouse => "reciprocal_spouse",
            Self::SyncedParentEdge => "synced_parent_edge",
        }
    }
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One correction, applied or left unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairDetail {
    /// Member whose fields were (or would be) changed.
    pub member_id: MemberId,
    /// The correction.
    pub action: RepairAction,
    /// False when the correction was blocked and left for manual review.
    pub applied: bool,
    /// Human-readable description.
    pub message: String,
}

/// A member the scan could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMember {
    /// The member.
    pub member_id: MemberId,
    /// Why it was skipped.
    pub cause: String,
}

/// Outcome of repairing a family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Number of applied corrections.
    pub fixed_count: usize,
    /// Applied and unresolved corrections, in scan order.
    pub details: Vec<RepairDetail>,
    /// Members skipped because of repository faults.
    pub skipped: Vec<SkippedMember>,
}

impl RepairReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an applied correction.
    pub fn record_fix(&mut self, member_id: MemberId, action: RepairAction, message: String) {
        self.fixed_count += 1;
        self.details.push(RepairDetail {
            member_id,
            action,
            applied: true,
            message,
        });
    }

    /// Records a correction that was not applied.
    pub fn record_unresolved(&mut self, member_id: MemberId, action: RepairAction, message: String) {
        self.details.push(RepairDetail {
            member_id,
            action,
            applied: false,
            message,
        });
    }

    /// Returns the members touched by applied corrections.
    #[must_use]
    pub fn affected_members(&self) -> BTreeSet<MemberId> {
        self.details
            .iter()
            .filter(|d| d.applied)
            .map(|d| d.member_id.clone())
            .collect()
    }

    /// Returns true if nothing was changed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.fixed_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_applied_details_count() {
        let mut report = RepairReport::new();
        report.record_fix(
            MemberId::new("c1"),
            RepairAction::SwappedParents,
            "swapped".to_string(),
        );
        report.record_unresolved(
            MemberId::new("c2"),
            RepairAction::FatherReclassifiedAsMother,
            "mother slot taken".to_string(),
        );

        assert_eq!(report.fixed_count, 1);
        assert_eq!(report.details.len(), 2);
        assert!(!report.is_clean());
        assert_eq!(
            report.affected_members().into_iter().collect::<Vec<_>>(),
            vec![MemberId::new("c1")]
        );
    }
}
