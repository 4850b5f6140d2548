//! Property-based tests for the family graph.
//!
//! Uses proptest to drive random relationship proposals through the
//! service and check that every accepted graph keeps its invariants:
//! - At most one active Father and one active Mother edge per member
//! - At most one active spouse edge per member
//! - No child is an ancestor of its own parent
//! - Repair is idempotent
//! - Self-relationships are always rejected

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use kinship::models::{
    FamilyId, Gender, Member, MemberId, RejectionReason, Relationship, RelationshipType,
};
use kinship::services::FamilyGraphService;
use kinship::storage::GraphRepository;
use kinship::storage::graph::InMemoryGraphRepository;
use proptest::prelude::*;
use std::sync::Arc;

const MEMBERS: usize = 8;

fn family() -> FamilyId {
    FamilyId::new("prop")
}

fn member_id(index: usize) -> MemberId {
    MemberId::new(format!("m{index}"))
}

fn gender_strategy() -> impl Strategy<Value = Gender> {
    prop_oneof![
        Just(Gender::Male),
        Just(Gender::Female),
        Just(Gender::Unknown)
    ]
}

fn type_strategy() -> impl Strategy<Value = RelationshipType> {
    proptest::sample::select(RelationshipType::all().to_vec())
}

/// A proposal as (source index, target index, type).
fn proposals() -> impl Strategy<Value = Vec<(usize, usize, RelationshipType)>> {
    prop::collection::vec((0..MEMBERS, 0..MEMBERS, type_strategy()), 0..40)
}

/// Builds a family from random genders and submits every proposal.
fn build(
    genders: &[Gender],
    proposals: &[(usize, usize, RelationshipType)],
) -> FamilyGraphService<InMemoryGraphRepository> {
    let service = FamilyGraphService::new(Arc::new(InMemoryGraphRepository::new()));
    for (index, gender) in genders.iter().enumerate() {
        let member = Member::new(family(), format!("member {index}"), *gender)
            .with_id(member_id(index));
        service.add_member(&member).unwrap();
    }
    for (source, target, kind) in proposals {
        let relationship = Relationship::new(family(), member_id(*source), member_id(*target), *kind);
        service.create_relationship(&relationship).unwrap();
    }
    service
}

fn incoming(relationships: &[Relationship], member: &MemberId, kind: RelationshipType) -> usize {
    relationships
        .iter()
        .filter(|r| r.relationship_type == kind && r.target_member_id == *member && r.is_active())
        .count()
}

// ============================================================================
// Invariants of accepted graphs
// ============================================================================

proptest! {
    /// Property: no member ends up with two active fathers or two active mothers.
    #[test]
    fn prop_parent_slots_hold_one_member(
        genders in prop::collection::vec(gender_strategy(), MEMBERS),
        proposals in proposals(),
    ) {
        let service = build(&genders, &proposals);
        let relationships = service.repository().get_relationships_by_family(&family()).unwrap();

        for index in 0..MEMBERS {
            let id = member_id(index);
            prop_assert!(incoming(&relationships, &id, RelationshipType::Father) <= 1);
            prop_assert!(incoming(&relationships, &id, RelationshipType::Mother) <= 1);
            let parents = relationships
                .iter()
                .filter(|r| r.parent_link().is_some_and(|(_, child)| *child == id))
                .count();
            prop_assert!(parents <= 2);
        }
    }

    /// Property: no member has more than one active spouse edge.
    #[test]
    fn prop_one_active_spouse(
        genders in prop::collection::vec(gender_strategy(), MEMBERS),
        proposals in proposals(),
    ) {
        let service = build(&genders, &proposals);
        let relationships = service.repository().get_relationships_by_family(&family()).unwrap();

        for index in 0..MEMBERS {
            let id = member_id(index);
            let spouses = relationships
                .iter()
                .filter(|r| r.relationship_type.is_spouse_link() && r.is_active() && r.involves(&id))
                .count();
            prop_assert!(spouses <= 1, "member {} has {} spouses", id, spouses);
        }
    }

    /// Property: the accepted parent graph is acyclic.
    #[test]
    fn prop_no_child_is_ancestor_of_its_parent(
        genders in prop::collection::vec(gender_strategy(), MEMBERS),
        proposals in proposals(),
    ) {
        let service = build(&genders, &proposals);
        let relationships = service.repository().get_relationships_by_family(&family()).unwrap();
        let ancestry = service.ancestry();

        for (parent, child) in relationships.iter().filter_map(Relationship::parent_link) {
            prop_assert!(
                !ancestry.is_ancestor(child, parent).unwrap(),
                "{} is both child and ancestor of {}", child, parent
            );
        }
        let report = service.generations().compute_generations(&family()).unwrap();
        prop_assert!(!report.cycle_detected);
    }

    /// Property: a second repair run finds nothing to fix.
    #[test]
    fn prop_repair_is_idempotent(
        genders in prop::collection::vec(gender_strategy(), MEMBERS),
        proposals in proposals(),
        sync_edges in any::<bool>(),
    ) {
        let service = build(&genders, &proposals);

        service.repair_family(&family(), sync_edges).unwrap();
        let second = service.repair_family(&family(), sync_edges).unwrap();
        prop_assert_eq!(second.fixed_count, 0);
    }

    /// Property: a generation report covers no more layers than members.
    #[test]
    fn prop_depth_bounded_by_member_count(
        genders in prop::collection::vec(gender_strategy(), MEMBERS),
        proposals in proposals(),
    ) {
        let service = build(&genders, &proposals);
        let report = service.generations().compute_generations(&family()).unwrap();

        prop_assert!(report.depth >= 1);
        prop_assert!(report.depth as usize <= MEMBERS);
        prop_assert!(!report.cycle_detected);
    }

    /// Property: a self-relationship is rejected whatever its type.
    #[test]
    fn prop_self_relationship_rejected(
        index in 0..MEMBERS,
        kind in type_strategy(),
        gender in gender_strategy(),
    ) {
        let service = build(&[gender; MEMBERS], &[]);
        let looped = Relationship::new(family(), member_id(index), member_id(index), kind);

        let outcome = service.validate_relationship(&looped).unwrap();
        prop_assert_eq!(outcome.reason(), Some(RejectionReason::SelfRelationship));
    }
}
