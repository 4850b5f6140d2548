//! Family Graph Engine Integration Tests
//!
//! Runs the engine end to end against a file-backed `SQLite` store:
//! validation rules, lineage queries, generation depth, repair and the
//! maintenance CLI.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use clap::Parser;
use kinship::cli::{Cli, CommandStatus, execute};
use kinship::models::{
    FamilyId, Gender, Member, MemberId, RejectionReason, Relationship, RelationshipId,
    RelationshipType, RootStrategy, ValidTimeRange,
};
use kinship::services::FamilyGraphService;
use kinship::storage::GraphRepository;
use kinship::storage::graph::SqliteGraphRepository;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

const FAMILY: &str = "smith";

/// Helper to create a service over a database in `temp_dir`.
fn create_service(temp_dir: &TempDir) -> FamilyGraphService<SqliteGraphRepository> {
    let db_path = temp_dir.path().join("family.db");
    let repository = SqliteGraphRepository::new(&db_path).expect("Failed to open database");
    FamilyGraphService::new(Arc::new(repository))
}

fn family() -> FamilyId {
    FamilyId::new(FAMILY)
}

fn add(service: &FamilyGraphService<SqliteGraphRepository>, id: &str, gender: Gender) -> MemberId {
    let member = Member::new(family(), id, gender).with_id(id);
    service.add_member(&member).unwrap();
    member.id
}

fn edge(id: &str, source: &str, target: &str, kind: RelationshipType) -> Relationship {
    Relationship::new(family(), MemberId::new(source), MemberId::new(target), kind).with_id(id)
}

/// Builds A (male) and B (female) with child C.
fn parents_and_child(service: &FamilyGraphService<SqliteGraphRepository>) {
    add(service, "a", Gender::Male);
    add(service, "b", Gender::Female);
    add(service, "c", Gender::Unknown);
    for relationship in [
        edge("r_father", "a", "c", RelationshipType::Father),
        edge("r_mother", "b", "c", RelationshipType::Mother),
    ] {
        assert!(service.create_relationship(&relationship).unwrap().is_accepted());
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_duplicate_and_reversed_parent_edges_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    parents_and_child(&service);

    let duplicate = edge("r_again", "a", "c", RelationshipType::Father);
    let outcome = service.create_relationship(&duplicate).unwrap();
    assert_eq!(outcome.reason(), Some(RejectionReason::Duplicate));

    let reversed = edge("r_reversed", "c", "a", RelationshipType::Father);
    let outcome = service.create_relationship(&reversed).unwrap();
    assert_eq!(outcome.reason(), Some(RejectionReason::Cycle));

    let stored = service.repository().get_relationships_by_family(&family()).unwrap();
    assert_eq!(stored.len(), 2);
}

#[test]
fn test_third_parent_rejected_but_resubmitted_mother_accepted() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    parents_and_child(&service);
    add(&service, "f2", Gender::Male);

    let third = edge("r_f2", "f2", "c", RelationshipType::Father);
    let outcome = service.create_relationship(&third).unwrap();
    assert_eq!(outcome.reason(), Some(RejectionReason::ParentCardinality));

    let resubmitted =
        edge("r_mother", "b", "c", RelationshipType::Mother).with_description("birth mother");
    assert!(service.update_relationship(&resubmitted).unwrap().is_accepted());

    let stored = service
        .repository()
        .get_relationship(&RelationshipId::new("r_mother"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.description.as_deref(), Some("birth mother"));
}

#[test]
fn test_self_relationship_and_missing_member() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    add(&service, "m1", Gender::Female);

    let looped = edge("r1", "m1", "m1", RelationshipType::Sibling);
    assert_eq!(
        service.validate_relationship(&looped).unwrap().reason(),
        Some(RejectionReason::SelfRelationship)
    );

    let dangling = edge("r2", "m1", "ghost", RelationshipType::Mother);
    assert_eq!(
        service.validate_relationship(&dangling).unwrap().reason(),
        Some(RejectionReason::MemberNotFound)
    );
}

#[test]
fn test_second_active_spouse_rejected_until_first_ends() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    add(&service, "h", Gender::Male);
    add(&service, "w1", Gender::Female);
    add(&service, "w2", Gender::Female);

    let first = edge("m1", "h", "w1", RelationshipType::Husband)
        .with_valid_time(ValidTimeRange::from(1_000));
    assert!(service.create_relationship(&first).unwrap().is_accepted());

    let second = edge("m2", "h", "w2", RelationshipType::Husband);
    assert_eq!(
        service.create_relationship(&second).unwrap().reason(),
        Some(RejectionReason::SpouseCardinality)
    );

    service
        .end_relationship(&RelationshipId::new("m1"), 2_000)
        .unwrap();
    assert!(service.create_relationship(&second).unwrap().is_accepted());

    let husband = service.repository().get_member(&MemberId::new("h")).unwrap().unwrap();
    assert_eq!(husband.wife_id, Some(MemberId::new("w2")));
}

// ============================================================================
// Lineage and generations
// ============================================================================

#[test]
fn test_ancestry_and_member_projection() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    parents_and_child(&service);
    add(&service, "d", Gender::Male);
    let link = edge("r_d", "c", "d", RelationshipType::Parent);
    assert!(service.create_relationship(&link).unwrap().is_accepted());

    let ancestry = service.ancestry();
    let expected: HashSet<MemberId> = ["a", "b", "c"].into_iter().map(MemberId::new).collect();
    assert_eq!(ancestry.get_ancestors(&MemberId::new("d")).unwrap(), expected);
    assert!(ancestry.is_ancestor(&MemberId::new("a"), &MemberId::new("d")).unwrap());
    assert!(!ancestry.is_ancestor(&MemberId::new("d"), &MemberId::new("a")).unwrap());
    assert!(!ancestry.is_ancestor(&MemberId::new("a"), &MemberId::new("a")).unwrap());

    let child = service.repository().get_member(&MemberId::new("c")).unwrap().unwrap();
    assert_eq!(child.father_id, Some(MemberId::new("a")));
    assert_eq!(child.mother_id, Some(MemberId::new("b")));
}

#[test]
fn test_generation_depth() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    let generations = service.generations();

    add(&service, "root", Gender::Male);
    assert_eq!(generations.compute_generation_depth(&family()).unwrap(), 1);

    add(&service, "child", Gender::Female);
    add(&service, "grandchild", Gender::Unknown);
    for relationship in [
        edge("g1", "root", "child", RelationshipType::Father),
        edge("g2", "child", "grandchild", RelationshipType::Mother),
    ] {
        assert!(service.create_relationship(&relationship).unwrap().is_accepted());
    }

    let report = generations.compute_generations(&family()).unwrap();
    assert_eq!(report.depth, 3);
    assert_eq!(report.strategy, Some(RootStrategy::NoParents));
    assert_eq!(report.roots, vec![MemberId::new("root")]);
    assert!(!report.is_approximate());
}

// ============================================================================
// Repair
// ============================================================================

#[test]
fn test_repair_fixes_links_and_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);
    let repository = service.repository();

    // Imported data: a one-sided marriage and a mother stored as father.
    let husband = Member::new(family(), "a", Gender::Male)
        .with_id("a")
        .with_wife(MemberId::new("b"));
    let wife = Member::new(family(), "b", Gender::Female).with_id("b");
    let child = Member::new(family(), "c", Gender::Unknown)
        .with_id("c")
        .with_father(MemberId::new("b"));
    for member in [husband, wife, child] {
        repository.save_member(&member).unwrap();
    }

    let first = service.repair_family(&family(), true).unwrap();
    assert_eq!(first.fixed_count, 3);

    let child = repository.get_member(&MemberId::new("c")).unwrap().unwrap();
    assert_eq!(child.father_id, Some(MemberId::new("a")));
    assert_eq!(child.mother_id, Some(MemberId::new("b")));
    let wife = repository.get_member(&MemberId::new("b")).unwrap().unwrap();
    assert_eq!(wife.husband_id, Some(MemberId::new("a")));

    let parents = service.ancestry().get_ancestors(&MemberId::new("c")).unwrap();
    assert_eq!(parents.len(), 2);

    let second = service.repair_family(&family(), true).unwrap();
    assert_eq!(second.fixed_count, 0);
    assert!(second.is_clean());
}

// ============================================================================
// Persistence and CLI
// ============================================================================

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let service = create_service(&temp_dir);
        parents_and_child(&service);
    }

    let service = create_service(&temp_dir);
    let stats = service.family_stats(&family()).unwrap();
    assert_eq!(stats.member_count, 3);
    assert_eq!(stats.relationship_count, 2);
    assert_eq!(stats.generation_depth, 2);
}

#[test]
fn test_cli_commands_against_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(&temp_dir);

    let run = |args: &[&str]| {
        let cli = Cli::try_parse_from(std::iter::once("kinship").chain(args.iter().copied()))
            .unwrap();
        let mut out = Vec::new();
        let status = execute(cli.command, &service, true, &mut out).unwrap();
        (status, String::from_utf8(out).unwrap())
    };

    run(&["member", "add", "--family", FAMILY, "--name", "Ann", "--gender", "female", "--id", "ann"]);
    run(&["member", "add", "--family", FAMILY, "--name", "Bo", "--id", "bo"]);

    let (status, _) = run(&["link", "--family", FAMILY, "--source", "ann", "--target", "bo", "--type", "mother"]);
    assert_eq!(status, CommandStatus::Success);

    let (status, output) = run(&["link", "--family", FAMILY, "--source", "bo", "--target", "ann", "--type", "parent"]);
    assert_eq!(status, CommandStatus::Negative);
    assert!(output.contains("cycle"));

    let (_, output) = run(&["descendants", "ann", "--format", "json"]);
    let ids: Vec<String> = serde_json::from_str(&output).unwrap();
    assert_eq!(ids, vec!["bo".to_string()]);

    let (_, output) = run(&["repair", "--family", FAMILY, "--format", "json"]);
    let report: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(report["fixed_count"], 0);
}
