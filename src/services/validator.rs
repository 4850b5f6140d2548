//! Relationship invariant validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Self-relationship
//! 2. Both members exist
//! 3. Duplicate edge
//! 4. Parent cardinality (one Father, one Mother, two parents at most)
//! 5. Spouse cardinality (one active spouse per member)
//! 6. Acyclicity of the parent sub-graph
//!
//! A proposed relationship whose ID is already stored is an update: the
//! stored version is ignored by checks 3 to 5 so that re-submitting an edge
//! does not collide with itself.

use crate::Result;
use crate::models::{
    MemberId, Relationship, RelationshipType, RejectionReason, ValidationOutcome,
};
use crate::services::ancestry::AncestryService;
use crate::services::cancellation::CancellationToken;
use crate::storage::traits::GraphRepository;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Number of parent edges a member may have.
const MAX_PARENTS: usize = 2;

/// Decides whether a proposed relationship keeps the graph consistent.
///
/// The validator never writes. Persisting an accepted relationship is the
/// caller's job (see [`FamilyGraphService`](crate::services::FamilyGraphService)).
pub struct RelationshipValidator<R: GraphRepository + ?Sized> {
    repository: Arc<R>,
    ancestry: AncestryService<R>,
}

impl<R: GraphRepository + ?Sized> RelationshipValidator<R> {
    /// Creates a new validator.
    #[must_use]
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            ancestry: AncestryService::new(Arc::clone(&repository)),
            repository,
        }
    }

    /// Attaches a cancellation token used by the cycle check.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ancestry = self.ancestry.with_cancellation(token);
        self
    }

    /// Validates a proposed relationship.
    ///
    /// # Errors
    ///
    /// Returns an error only for repository faults or cancellation. Rule
    /// violations are returned as [`ValidationOutcome::Rejected`].
    #[instrument(
        skip(self, proposed),
        fields(
            relationship_id = %proposed.id,
            relationship_type = %proposed.relationship_type,
            source = %proposed.source_member_id,
            target = %proposed.target_member_id
        )
    )]
    pub fn validate(&self, proposed: &Relationship) -> Result<ValidationOutcome> {
        let outcome = self.evaluate(proposed)?;
        let label = outcome.reason().map_or("accepted", |r| r.as_str());
        metrics::counter!("kinship_validations_total", "outcome" => label).increment(1);
        debug!(outcome = label, "Relationship validated");
        Ok(outcome)
    }

    fn evaluate(&self, proposed: &Relationship) -> Result<ValidationOutcome> {
        let source = &proposed.source_member_id;
        let target = &proposed.target_member_id;

        if source == target {
            return Ok(ValidationOutcome::rejected(
                RejectionReason::SelfRelationship,
                format!("member {source} cannot be related to themselves"),
            ));
        }

        for endpoint in [source, target] {
            if self.repository.get_member(endpoint)?.is_none() {
                return Ok(ValidationOutcome::rejected(
                    RejectionReason::MemberNotFound,
                    format!("member {endpoint} does not exist"),
                ));
            }
        }

        let source_edges = self.existing_edges(source, proposed)?;
        let target_edges = self.existing_edges(target, proposed)?;

        if let Some(existing) = source_edges.iter().find(|e| {
            e.relationship_type == proposed.relationship_type
                && e.family_id == proposed.family_id
                && proposed.connects_same_pair(e)
        }) {
            return Ok(ValidationOutcome::rejected(
                RejectionReason::Duplicate,
                format!(
                    "{} relationship between {source} and {target} already exists ({})",
                    proposed.relationship_type, existing.id
                ),
            ));
        }

        if proposed.relationship_type.is_parent_link()
            && let Some(outcome) = check_parent_slots(proposed, &target_edges)
        {
            return Ok(outcome);
        }

        if proposed.relationship_type.is_spouse_link() && proposed.is_active() {
            let now = crate::current_timestamp();
            for (member, edges) in [(source, &source_edges), (target, &target_edges)] {
                if let Some(existing) = edges
                    .iter()
                    .find(|e| e.relationship_type.is_spouse_link() && e.is_active_at(now))
                {
                    return Ok(ValidationOutcome::rejected(
                        RejectionReason::SpouseCardinality,
                        format!(
                            "member {member} already has an active spouse ({})",
                            existing.id
                        ),
                    ));
                }
            }
        }

        if proposed.relationship_type.is_parent_link() && self.ancestry.is_ancestor(target, source)? {
            return Ok(ValidationOutcome::rejected(
                RejectionReason::Cycle,
                format!("{target} is already an ancestor of {source}"),
            ));
        }

        Ok(ValidationOutcome::Accepted)
    }

    /// Loads a member's edges, minus the stored version of `proposed`.
    fn existing_edges(&self, member: &MemberId, proposed: &Relationship) -> Result<Vec<Relationship>> {
        let mut edges = self.repository.get_relationships_for_member(member)?;
        edges.retain(|e| e.id != proposed.id);
        Ok(edges)
    }
}

fn check_parent_slots(
    proposed: &Relationship,
    target_edges: &[Relationship],
) -> Option<ValidationOutcome> {
    let child = &proposed.target_member_id;
    let parent_edges: Vec<&Relationship> = target_edges
        .iter()
        .filter(|e| e.parent_link().is_some_and(|(_, c)| c == child))
        .collect();

    if proposed.relationship_type.is_gendered_parent()
        && let Some(existing) = parent_edges
            .iter()
            .find(|e| e.relationship_type == proposed.relationship_type)
    {
        let slot = match proposed.relationship_type {
            RelationshipType::Father => "father",
            _ => "mother",
        };
        return Some(ValidationOutcome::rejected(
            RejectionReason::ParentCardinality,
            format!(
                "member {child} already has a {slot} ({})",
                existing.source_member_id
            ),
        ));
    }

    if parent_edges.len() >= MAX_PARENTS {
        return Some(ValidationOutcome::rejected(
            RejectionReason::ParentCardinality,
            format!("member {child} already has {MAX_PARENTS} parents"),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FamilyId, Gender, Member, ValidTimeRange};
    use crate::storage::graph::InMemoryGraphRepository;
    use test_case::test_case;

    fn member(id: &str, gender: Gender) -> Member {
        Member::new(FamilyId::new("f1"), id, gender).with_id(id)
    }

    fn edge(id: &str, source: &str, target: &str, kind: RelationshipType) -> Relationship {
        Relationship::new(
            FamilyId::new("f1"),
            MemberId::new(source),
            MemberId::new(target),
            kind,
        )
        .with_id(id)
    }

    /// A (male) and B (female) are the parents of C. D and E are unlinked.
    fn validator() -> RelationshipValidator<InMemoryGraphRepository> {
        let repository = InMemoryGraphRepository::with_snapshot(
            vec![
                member("a", Gender::Male),
                member("b", Gender::Female),
                member("c", Gender::Male),
                member("d", Gender::Male),
                member("e", Gender::Female),
            ],
            vec![
                edge("r_father", "a", "c", RelationshipType::Father),
                edge("r_mother", "b", "c", RelationshipType::Mother),
                edge("r_marriage", "a", "b", RelationshipType::Husband),
            ],
        )
        .unwrap();
        RelationshipValidator::new(Arc::new(repository))
    }

    fn reason(proposed: &Relationship) -> Option<RejectionReason> {
        validator().validate(proposed).unwrap().reason()
    }

    #[test_case(RelationshipType::Father; "father")]
    #[test_case(RelationshipType::Mother; "mother")]
    #[test_case(RelationshipType::Husband; "husband")]
    #[test_case(RelationshipType::Wife; "wife")]
    #[test_case(RelationshipType::Parent; "parent")]
    #[test_case(RelationshipType::Child; "child")]
    #[test_case(RelationshipType::Spouse; "spouse")]
    #[test_case(RelationshipType::Sibling; "sibling")]
    fn test_self_relationship_rejected(kind: RelationshipType) {
        let proposed = edge("new", "m1", "m1", kind);
        assert_eq!(reason(&proposed), Some(RejectionReason::SelfRelationship));
    }

    #[test]
    fn test_missing_member_rejected() {
        let proposed = edge("new", "a", "ghost", RelationshipType::Father);
        assert_eq!(reason(&proposed), Some(RejectionReason::MemberNotFound));
    }

    #[test]
    fn test_duplicate_rejected() {
        let proposed = edge("new", "a", "c", RelationshipType::Father);
        assert_eq!(reason(&proposed), Some(RejectionReason::Duplicate));
    }

    #[test]
    fn test_symmetric_duplicate_matches_either_direction() {
        let repository = InMemoryGraphRepository::with_snapshot(
            vec![member("c", Gender::Male), member("d", Gender::Male)],
            vec![edge("r1", "c", "d", RelationshipType::Sibling)],
        )
        .unwrap();
        let validator = RelationshipValidator::new(Arc::new(repository));

        let reversed = edge("new", "d", "c", RelationshipType::Sibling);
        assert_eq!(
            validator.validate(&reversed).unwrap().reason(),
            Some(RejectionReason::Duplicate)
        );
    }

    #[test]
    fn test_directional_reverse_is_not_duplicate() {
        let proposed = edge("new", "c", "d", RelationshipType::Child);
        assert!(validator().validate(&proposed).unwrap().is_accepted());
    }

    #[test]
    fn test_second_father_rejected() {
        let proposed = edge("new", "d", "c", RelationshipType::Father);
        assert_eq!(reason(&proposed), Some(RejectionReason::ParentCardinality));
    }

    #[test]
    fn test_third_parent_of_any_kind_rejected() {
        let proposed = edge("new", "e", "c", RelationshipType::Parent);
        assert_eq!(reason(&proposed), Some(RejectionReason::ParentCardinality));
    }

    #[test]
    fn test_resubmitting_existing_mother_is_an_update() {
        let proposed = edge("r_mother", "b", "c", RelationshipType::Mother).with_order(1);
        assert!(validator().validate(&proposed).unwrap().is_accepted());
    }

    #[test]
    fn test_replacing_father_through_update_is_accepted() {
        let proposed = edge("r_father", "d", "c", RelationshipType::Father);
        assert!(validator().validate(&proposed).unwrap().is_accepted());
    }

    #[test]
    fn test_active_spouse_rejected_for_source_and_target() {
        let from_married = edge("new", "a", "e", RelationshipType::Husband);
        assert_eq!(reason(&from_married), Some(RejectionReason::SpouseCardinality));

        let to_married = edge("new", "d", "b", RelationshipType::Husband);
        assert_eq!(reason(&to_married), Some(RejectionReason::SpouseCardinality));
    }

    #[test]
    fn test_ended_marriages_do_not_count() {
        let repository = InMemoryGraphRepository::with_snapshot(
            vec![
                member("a", Gender::Male),
                member("b", Gender::Female),
                member("e", Gender::Female),
            ],
            vec![
                edge("old", "a", "b", RelationshipType::Husband)
                    .with_valid_time(ValidTimeRange::between(100, 200)),
            ],
        )
        .unwrap();
        let validator = RelationshipValidator::new(Arc::new(repository));

        let proposed = edge("new", "a", "e", RelationshipType::Husband);
        assert!(validator.validate(&proposed).unwrap().is_accepted());
    }

    #[test]
    fn test_ended_spouse_edge_skips_cardinality() {
        let proposed = edge("new", "a", "e", RelationshipType::Spouse)
            .with_valid_time(ValidTimeRange::between(10, 20));
        assert!(validator().validate(&proposed).unwrap().is_accepted());
    }

    #[test]
    fn test_cycle_rejected() {
        let proposed = edge("new", "c", "a", RelationshipType::Father);
        assert_eq!(reason(&proposed), Some(RejectionReason::Cycle));
    }

    #[test]
    fn test_rejection_message_is_readable() {
        let outcome = validator()
            .validate(&edge("new", "d", "c", RelationshipType::Father))
            .unwrap();
        assert!(matches!(
            &outcome,
            ValidationOutcome::Rejected(rejection) if rejection.message.contains("already has a father")
        ));
    }
}
