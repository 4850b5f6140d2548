//! Projection of relationship edges onto member fields.
//!
//! Relationship edges are canonical. The `father_id`, `mother_id`,
//! `husband_id` and `wife_id` fields of a [`Member`] are recomputed from the
//! member's active edges whenever one of those edges changes.

use crate::Result;
use crate::models::{Gender, Member, MemberId, Relationship, RelationshipType};
use crate::storage::traits::GraphRepository;
use std::sync::Arc;

/// Derives a member's convenience links from its edges.
pub struct MemberProjector<R: GraphRepository + ?Sized> {
    repository: Arc<R>,
}

impl<R: GraphRepository + ?Sized> MemberProjector<R> {
    /// Creates a new projector.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Returns a copy of `member` with its four links derived from `edges`.
    ///
    /// `edges` should be every relationship that involves the member.
    /// Ended edges are ignored. Generic Parent and Spouse edges fill the
    /// slot matching the other member's gender and are skipped when the
    /// gender is unknown or the slot is already filled.
    ///
    /// # Errors
    ///
    /// Returns an error if the other end of a generic edge cannot be loaded.
    pub fn project_with(&self, member: &Member, edges: &[Relationship]) -> Result<Member> {
        let mut projected = member.clone();
        projected.clear_links();
        let now = crate::current_timestamp();
        let id = &member.id;

        let mut ordered: Vec<&Relationship> = edges
            .iter()
            .filter(|e| e.involves(id) && e.is_active_at(now))
            .collect();
        // Gendered edges first so that generic ones only fill gaps.
        ordered.sort_by(|a, b| {
            (!is_gendered(a.relationship_type), &a.id).cmp(&(!is_gendered(b.relationship_type), &b.id))
        });

        for edge in ordered {
            let is_source = edge.source_member_id == *id;
            let other = if is_source {
                &edge.target_member_id
            } else {
                &edge.source_member_id
            };

            match (edge.relationship_type, is_source) {
                (RelationshipType::Father, false) => {
                    set_once(&mut projected.father_id, other);
                },
                (RelationshipType::Mother, false) => {
                    set_once(&mut projected.mother_id, other);
                },
                (RelationshipType::Parent, false) => match self.gender_of(other)? {
                    Gender::Male => set_once(&mut projected.father_id, other),
                    Gender::Female => set_once(&mut projected.mother_id, other),
                    Gender::Unknown => {},
                },
                (RelationshipType::Husband, true) | (RelationshipType::Wife, false) => {
                    set_once(&mut projected.wife_id, other);
                },
                (RelationshipType::Husband, false) | (RelationshipType::Wife, true) => {
                    set_once(&mut projected.husband_id, other);
                },
                (RelationshipType::Spouse, _) => match self.gender_of(other)? {
                    Gender::Male => set_once(&mut projected.husband_id, other),
                    Gender::Female => set_once(&mut projected.wife_id, other),
                    Gender::Unknown => {},
                },
                _ => {},
            }
        }

        Ok(projected)
    }

    /// Loads the member's edges and projects them.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub fn project(&self, member: &Member) -> Result<Member> {
        let edges = self.repository.get_relationships_for_member(&member.id)?;
        self.project_with(member, &edges)
    }

    fn gender_of(&self, id: &MemberId) -> Result<Gender> {
        Ok(self
            .repository
            .get_member(id)?
            .map_or(Gender::Unknown, |m| m.gender))
    }
}

const fn is_gendered(kind: RelationshipType) -> bool {
    matches!(
        kind,
        RelationshipType::Father
            | RelationshipType::Mother
            | RelationshipType::Husband
            | RelationshipType::Wife
    )
}

fn set_once(slot: &mut Option<MemberId>, value: &MemberId) {
    if slot.is_none() {
        *slot = Some(value.clone());
    }
}
