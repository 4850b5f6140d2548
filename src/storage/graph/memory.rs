//! In-memory graph repository for testing.
//!
//! Provides a fast, non-persistent implementation of [`GraphRepository`] for
//! use in unit tests and embedding scenarios.

use crate::models::{FamilyId, Member, MemberId, Relationship, RelationshipId};
use crate::storage::traits::{ChangeSet, GraphRepository};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory graph repository.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs. Both maps are ordered by ID so
/// listings are deterministic.
///
/// # Example
///
/// ```rust
/// use kinship::storage::graph::InMemoryGraphRepository;
///
/// let repository = InMemoryGraphRepository::new();
/// assert_eq!(repository.member_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphRepository {
    members: RwLock<BTreeMap<MemberId, Member>>,
    relationships: RwLock<BTreeMap<RelationshipId, Relationship>>,
}

fn poisoned(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "Lock poisoned".to_string(),
    }
}

impl InMemoryGraphRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with members and relationships.
    ///
    /// # Errors
    ///
    /// Returns an error if a relationship references a missing member.
    pub fn with_snapshot(members: Vec<Member>, relationships: Vec<Relationship>) -> Result<Self> {
        let repository = Self::new();
        repository.apply(&ChangeSet {
            members,
            relationships,
            deleted_relationships: Vec::new(),
        })?;
        Ok(repository)
    }

    /// Returns the number of members stored.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns the number of relationships stored.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.read().map(|r| r.len()).unwrap_or(0)
    }

    fn read_members(&self, operation: &str) -> Result<RwLockReadGuard<'_, BTreeMap<MemberId, Member>>> {
        self.members.read().map_err(|_| poisoned(operation))
    }

    fn read_relationships(
        &self,
        operation: &str,
    ) -> Result<RwLockReadGuard<'_, BTreeMap<RelationshipId, Relationship>>> {
        self.relationships.read().map_err(|_| poisoned(operation))
    }

    fn write_relationships(
        &self,
        operation: &str,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<RelationshipId, Relationship>>> {
        self.relationships.write().map_err(|_| poisoned(operation))
    }

    fn check_endpoints(
        members: &BTreeMap<MemberId, Member>,
        relationship: &Relationship,
    ) -> Result<()> {
        for endpoint in [&relationship.source_member_id, &relationship.target_member_id] {
            if !members.contains_key(endpoint) {
                return Err(Error::member_not_found(endpoint));
            }
        }
        Ok(())
    }
}

impl GraphRepository for InMemoryGraphRepository {
    fn get_member(&self, id: &MemberId) -> Result<Option<Member>> {
        let members = self.read_members("get_member")?;
        Ok(members.get(id).cloned())
    }

    fn get_members_by_family(&self, family_id: &FamilyId) -> Result<Vec<Member>> {
        let members = self.read_members("get_members_by_family")?;
        Ok(members
            .values()
            .filter(|m| m.family_id == *family_id)
            .cloned()
            .collect())
    }

    fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        let relationships = self.read_relationships("get_relationship")?;
        Ok(relationships.get(id).cloned())
    }

    fn get_relationships_by_family(&self, family_id: &FamilyId) -> Result<Vec<Relationship>> {
        let relationships = self.read_relationships("get_relationships_by_family")?;
        Ok(relationships
            .values()
            .filter(|r| r.family_id == *family_id)
            .cloned()
            .collect())
    }

    fn get_relationships_for_member(&self, member_id: &MemberId) -> Result<Vec<Relationship>> {
        let relationships = self.read_relationships("get_relationships_for_member")?;
        Ok(relationships
            .values()
            .filter(|r| r.involves(member_id))
            .cloned()
            .collect())
    }

    fn save_member(&self, member: &Member) -> Result<()> {
        let mut members = self
            .members
            .write()
            .map_err(|_| poisoned("save_member"))?;
        members.insert(member.id.clone(), member.clone());
        Ok(())
    }

    fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        let members = self.read_members("save_relationship")?;
        Self::check_endpoints(&members, relationship)?;
        drop(members);

        let mut relationships = self.write_relationships("save_relationship")?;
        relationships.insert(relationship.id.clone(), relationship.clone());
        Ok(())
    }

    fn delete_relationship(&self, id: &RelationshipId) -> Result<bool> {
        let mut relationships = self.write_relationships("delete_relationship")?;
        Ok(relationships.remove(id).is_some())
    }

    fn apply(&self, changes: &ChangeSet) -> Result<()> {
        // Lock order: members, then relationships.
        let mut members = self.members.write().map_err(|_| poisoned("apply"))?;
        let mut relationships = self.write_relationships("apply")?;

        let mut staged_members = members.clone();
        for member in &changes.members {
            staged_members.insert(member.id.clone(), member.clone());
        }
        let mut staged_relationships = relationships.clone();
        for relationship in &changes.relationships {
            Self::check_endpoints(&staged_members, relationship)?;
            staged_relationships.insert(relationship.id.clone(), relationship.clone());
        }
        for id in &changes.deleted_relationships {
            staged_relationships.remove(id);
        }

        *members = staged_members;
        *relationships = staged_relationships;
        Ok(())
    }
}
