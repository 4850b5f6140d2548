//! Family graph service.
//!
//! Command-handler facade over the engine components. Every mutation of a
//! relationship is validated first and then persisted together with the
//! re-projected links of the members it touches, as one [`ChangeSet`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kinship::models::{FamilyId, Gender, Member, Relationship, RelationshipType};
//! use kinship::services::FamilyGraphService;
//! use kinship::storage::graph::SqliteGraphRepository;
//! use kinship::GraphRepository;
//!
//! # fn main() -> kinship::Result<()> {
//! let family = FamilyId::new("doe");
//! let service = FamilyGraphService::new(Arc::new(SqliteGraphRepository::in_memory()?));
//!
//! let mother = Member::new(family.clone(), "Mary", Gender::Female);
//! let child = Member::new(family.clone(), "Tom", Gender::Male);
//! service.add_member(&mother)?;
//! service.add_member(&child)?;
//!
//! let edge = Relationship::new(family, mother.id.clone(), child.id.clone(), RelationshipType::Mother);
//! service.create_relationship(&edge)?;
//!
//! let stored = service.repository().get_member(&child.id)?;
//! assert_eq!(stored.and_then(|m| m.mother_id), Some(mother.id));
//! # Ok(())
//! # }
//! ```

use crate::models::{
    FamilyId, FamilyStats, Gender, Member, MemberId, Relationship, RelationshipId,
    RelationshipType, RepairAction, RepairReport, ValidationOutcome,
};
use crate::services::ancestry::AncestryService;
use crate::services::cancellation::CancellationToken;
use crate::services::generation::{GenerationCalculator, generation_report};
use crate::services::projection::MemberProjector;
use crate::services::repair::ConsistencyRepairer;
use crate::services::validator::RelationshipValidator;
use crate::storage::traits::{ChangeSet, GraphRepository};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// High-level service for family graph commands and queries.
///
/// # Thread Safety
///
/// The service holds no mutable state of its own. It is as thread-safe as
/// the repository, and both bundled repositories are. Concurrent commands
/// on the same members can still interleave between validation and write;
/// use a repository whose `apply` is transactional to keep each write
/// consistent.
pub struct FamilyGraphService<R: GraphRepository + ?Sized> {
    repository: Arc<R>,
    cancellation: Option<CancellationToken>,
}

impl<R: GraphRepository + ?Sized> FamilyGraphService<R> {
    /// Creates a new service over a shared repository.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            cancellation: None,
        }
    }

    /// Attaches a cancellation token passed to every component.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the underlying repository.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Returns an ancestry query service.
    #[must_use]
    pub fn ancestry(&self) -> AncestryService<R> {
        let service = AncestryService::new(Arc::clone(&self.repository));
        match &self.cancellation {
            Some(token) => service.with_cancellation(token.clone()),
            None => service,
        }
    }

    /// Returns a generation calculator.
    #[must_use]
    pub fn generations(&self) -> GenerationCalculator<R> {
        let calculator = GenerationCalculator::new(Arc::clone(&self.repository));
        match &self.cancellation {
            Some(token) => calculator.with_cancellation(token.clone()),
            None => calculator,
        }
    }

    /// Returns a relationship validator.
    #[must_use]
    pub fn validator(&self) -> RelationshipValidator<R> {
        let validator = RelationshipValidator::new(Arc::clone(&self.repository));
        match &self.cancellation {
            Some(token) => validator.with_cancellation(token.clone()),
            None => validator,
        }
    }

    /// Returns a consistency repairer.
    #[must_use]
    pub fn repairer(&self) -> ConsistencyRepairer<R> {
        let repairer = ConsistencyRepairer::new(Arc::clone(&self.repository));
        match &self.cancellation {
            Some(token) => repairer.with_cancellation(token.clone()),
            None => repairer,
        }
    }

    /// Returns a member projector.
    #[must_use]
    pub fn projector(&self) -> MemberProjector<R> {
        MemberProjector::new(Arc::clone(&self.repository))
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Adds a new member to its family.
    ///
    /// The parent and spouse links of the stored member start empty; they
    /// are filled as relationships are created.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the name is blank or the ID is taken.
    #[instrument(skip(self, member), fields(member_id = %member.id, family_id = %member.family_id))]
    pub fn add_member(&self, member: &Member) -> Result<()> {
        if member.name.trim().is_empty() {
            return Err(Error::InvalidInput("member name cannot be empty".to_string()));
        }
        if self.repository.get_member(&member.id)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "member {} already exists",
                member.id
            )));
        }

        let mut stored = member.clone();
        stored.clear_links();
        self.repository.save_member(&stored)?;
        metrics::counter!("kinship_members_added_total").increment(1);
        Ok(())
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    /// Validates a relationship without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub fn validate_relationship(&self, proposed: &Relationship) -> Result<ValidationOutcome> {
        self.validator().validate(proposed)
    }

    /// Validates and stores a new relationship.
    ///
    /// Returns the validation outcome; nothing is written when it is a
    /// rejection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a relationship with the same ID exists, or
    /// an error if the repository fails.
    #[instrument(skip(self, relationship), fields(relationship_id = %relationship.id))]
    pub fn create_relationship(&self, relationship: &Relationship) -> Result<ValidationOutcome> {
        if self.repository.get_relationship(&relationship.id)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "relationship {} already exists",
                relationship.id
            )));
        }

        let outcome = self.validator().validate(relationship)?;
        if !outcome.is_accepted() {
            return Ok(outcome);
        }

        let affected = endpoints([relationship]);
        let members = self.project_after(&affected, Some(relationship), None)?;
        self.repository.apply(&ChangeSet {
            members,
            relationships: vec![relationship.clone()],
            deleted_relationships: Vec::new(),
        })?;

        info!(
            relationship_type = %relationship.relationship_type,
            "Relationship created"
        );
        Ok(outcome)
    }

    /// Re-validates and stores a changed relationship.
    ///
    /// The stored version is not counted against the new one, so an edge
    /// can be re-submitted with a different order, description or end.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the relationship does not exist, or an error if
    /// the repository fails.
    #[instrument(skip(self, relationship), fields(relationship_id = %relationship.id))]
    pub fn update_relationship(&self, relationship: &Relationship) -> Result<ValidationOutcome> {
        let existing = self
            .repository
            .get_relationship(&relationship.id)?
            .ok_or_else(|| Error::relationship_not_found(&relationship.id))?;

        let outcome = self.validator().validate(relationship)?;
        if !outcome.is_accepted() {
            return Ok(outcome);
        }

        let affected = endpoints([&existing, relationship]);
        let members = self.project_after(&affected, Some(relationship), None)?;
        self.repository.apply(&ChangeSet {
            members,
            relationships: vec![relationship.clone()],
            deleted_relationships: Vec::new(),
        })?;
        Ok(outcome)
    }

    /// Deletes a relationship and re-projects its endpoints.
    ///
    /// Returns `false` if the relationship did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    #[instrument(skip(self), fields(relationship_id = %id))]
    pub fn remove_relationship(&self, id: &RelationshipId) -> Result<bool> {
        let Some(existing) = self.repository.get_relationship(id)? else {
            return Ok(false);
        };

        let affected = endpoints([&existing]);
        let members = self.project_after(&affected, None, Some(id))?;
        self.repository.apply(&ChangeSet {
            members,
            relationships: Vec::new(),
            deleted_relationships: vec![id.clone()],
        })?;
        Ok(true)
    }

    /// Ends a spouse relationship at `end` and re-projects both spouses.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the relationship does not exist and
    /// `InvalidInput` if it is not a spouse relationship or `end` precedes
    /// its start.
    #[instrument(skip(self), fields(relationship_id = %id))]
    pub fn end_relationship(&self, id: &RelationshipId, end: i64) -> Result<Relationship> {
        let existing = self
            .repository
            .get_relationship(id)?
            .ok_or_else(|| Error::relationship_not_found(id))?;

        if !existing.relationship_type.is_spouse_link() {
            return Err(Error::InvalidInput(format!(
                "only spouse relationships can end, {id} is {}",
                existing.relationship_type
            )));
        }
        if existing.valid_time.start.is_some_and(|start| end < start) {
            return Err(Error::InvalidInput(format!(
                "end {end} is before the start of {id}"
            )));
        }

        let mut ended = existing;
        ended.valid_time = ended.valid_time.close_at(end);

        let affected = endpoints([&ended]);
        let members = self.project_after(&affected, Some(&ended), None)?;
        self.repository.apply(&ChangeSet {
            members,
            relationships: vec![ended.clone()],
            deleted_relationships: Vec::new(),
        })?;
        Ok(ended)
    }

    /// Projects the members as they will look once `upsert` is stored and
    /// `delete` removed. Only members whose links change are returned.
    fn project_after(
        &self,
        members: &BTreeSet<MemberId>,
        upsert: Option<&Relationship>,
        delete: Option<&RelationshipId>,
    ) -> Result<Vec<Member>> {
        let projector = self.projector();
        let mut changed = Vec::new();

        for id in members {
            let member = self
                .repository
                .get_member(id)?
                .ok_or_else(|| Error::member_not_found(id))?;

            let mut edges = self.repository.get_relationships_for_member(id)?;
            edges.retain(|e| Some(&e.id) != upsert.map(|u| &u.id) && Some(&e.id) != delete);
            if let Some(edge) = upsert.filter(|u| u.involves(id)) {
                edges.push(edge.clone());
            }

            let projected = projector.project_with(&member, &edges)?;
            if projected != member {
                changed.push(projected);
            }
        }

        Ok(changed)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Repairs a family's member links.
    ///
    /// With `sync_edges`, the Father and Mother edges of every repaired
    /// member are then rewritten to match its repaired links. Each written
    /// edge is validated first; a rejected edge is left out and reported as
    /// unresolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the scan is cancelled.
    #[instrument(skip(self), fields(family_id = %family_id))]
    pub fn repair_family(&self, family_id: &FamilyId, sync_edges: bool) -> Result<RepairReport> {
        let mut report = self.repairer().repair_family(family_id)?;
        if sync_edges {
            for member_id in report.affected_members() {
                let changes = self.parent_edge_changes(&member_id, &mut report)?;
                if !changes.is_empty() {
                    self.repository.apply(&changes)?;
                }
            }
        }
        Ok(report)
    }

    /// Computes the Father/Mother edge writes that make a member's edges
    /// agree with its `father_id` and `mother_id`.
    fn parent_edge_changes(
        &self,
        member_id: &MemberId,
        report: &mut RepairReport,
    ) -> Result<ChangeSet> {
        let mut changes = ChangeSet::new();
        let Some(member) = self.repository.get_member(member_id)? else {
            return Ok(changes);
        };
        let edges = self.repository.get_relationships_for_member(member_id)?;

        for (kind, slot) in [
            (RelationshipType::Father, &member.father_id),
            (RelationshipType::Mother, &member.mother_id),
        ] {
            let mut slot_edges: Vec<&Relationship> = edges
                .iter()
                .filter(|e| e.relationship_type == kind && e.target_member_id == *member_id)
                .collect();
            slot_edges.sort_by(|a, b| a.id.cmp(&b.id));

            let Some(parent) = slot else {
                changes
                    .deleted_relationships
                    .extend(slot_edges.iter().map(|e| e.id.clone()));
                continue;
            };

            let satisfied = edges.iter().any(|e| {
                e.source_member_id == *parent
                    && e.target_member_id == *member_id
                    && (e.relationship_type == kind
                        || e.relationship_type == RelationshipType::Parent)
            });
            let stale = slot_edges.iter().filter(|e| e.source_member_id != *parent);

            if satisfied {
                changes
                    .deleted_relationships
                    .extend(stale.map(|e| e.id.clone()));
                continue;
            }

            if self.repository.get_member(parent)?.is_none() {
                warn!(member_id = %member_id, parent = %parent, "Linked parent does not exist, edge not synced");
                continue;
            }

            let mut stale = stale;
            let synced = match stale.next() {
                Some(first) => {
                    let mut moved = (*first).clone();
                    moved.source_member_id = parent.clone();
                    moved
                },
                None => Relationship::new(
                    member.family_id.clone(),
                    parent.clone(),
                    member_id.clone(),
                    kind,
                ),
            };

            if let ValidationOutcome::Rejected(rejection) = self.validator().validate(&synced)? {
                warn!(
                    member_id = %member_id,
                    parent = %parent,
                    reason = %rejection.reason,
                    "Synced parent edge rejected, edge left unchanged"
                );
                report.record_unresolved(
                    member_id.clone(),
                    RepairAction::SyncedParentEdge,
                    format!("{kind} edge {parent} -> {member_id} not written: {rejection}"),
                );
                continue;
            }

            changes.relationships.push(synced);
            changes
                .deleted_relationships
                .extend(stale.map(|e| e.id.clone()));
        }

        Ok(changes)
    }

    /// Computes summary statistics for a family.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the walk is cancelled.
    #[instrument(skip(self), fields(family_id = %family_id))]
    pub fn family_stats(&self, family_id: &FamilyId) -> Result<FamilyStats> {
        let members = self.repository.get_members_by_family(family_id)?;
        let relationships = self.repository.get_relationships_by_family(family_id)?;
        let generations = generation_report(&members, &relationships, self.cancellation.as_ref())?;
        let now = crate::current_timestamp();

        let mut stats = FamilyStats {
            member_count: members.len(),
            relationship_count: relationships.len(),
            root_count: generations.roots.len(),
            generation_depth: generations.depth,
            ..FamilyStats::default()
        };
        for member in &members {
            match member.gender {
                Gender::Male => stats.male_count += 1,
                Gender::Female => stats.female_count += 1,
                Gender::Unknown => stats.unknown_gender_count += 1,
            }
        }
        for relationship in &relationships {
            *stats
                .relationships_by_type
                .entry(relationship.relationship_type)
                .or_default() += 1;
            if relationship.relationship_type.is_spouse_link() && relationship.is_active_at(now) {
                stats.active_couples += 1;
            }
        }

        Ok(stats)
    }
}

fn endpoints<'a>(relationships: impl IntoIterator<Item = &'a Relationship>) -> BTreeSet<MemberId> {
    relationships
        .into_iter()
        .flat_map(|r| [r.source_member_id.clone(), r.target_member_id.clone()])
        .collect()
}
