//! Graph repository trait.
//!
//! The repository is the only component that owns persistence. Engine
//! services read snapshots through it and never hold references across
//! calls.
//!
//! # Available Implementations
//!
//! | Repository | Use Case | Features |
//! |------------|----------|----------|
//! | `SqliteGraphRepository` | Default; embedded | Transactional change sets |
//! | `InMemoryGraphRepository` | Testing | Fast, no persistence |
//!
//! # Error Modes and Guarantees
//!
//! All repositories return `Result<T>` with faults propagated via
//! [`crate::Error`]. A missing record is `Ok(None)` / an empty list, never
//! an error, except when saving a relationship whose endpoints do not
//! exist.

use crate::Result;
use crate::models::{FamilyId, Member, MemberId, Relationship, RelationshipId};

/// Trait for graph persistence backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn GraphRepository>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `save_*` methods upsert by ID
/// - Override [`GraphRepository::apply`] when the store supports transactions
pub trait GraphRepository: Send + Sync {
    /// Retrieves a member by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_member(&self, id: &MemberId) -> Result<Option<Member>>;

    /// Lists the members of a family, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_members_by_family(&self, family_id: &FamilyId) -> Result<Vec<Member>>;

    /// Retrieves a relationship by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>>;

    /// Lists the relationships owned by a family, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_relationships_by_family(&self, family_id: &FamilyId) -> Result<Vec<Relationship>>;

    /// Lists every relationship where the member is source or target.
    ///
    /// Cross-family edges are included.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_relationships_for_member(&self, member_id: &MemberId) -> Result<Vec<Relationship>>;

    /// Stores a member, replacing any member with the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn save_member(&self, member: &Member) -> Result<()>;

    /// Stores a relationship, replacing any relationship with the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails or if either member
    /// referenced by the relationship does not exist.
    fn save_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Deletes a relationship.
    ///
    /// Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn delete_relationship(&self, id: &RelationshipId) -> Result<bool>;

    /// Applies a change set as one unit of work.
    ///
    /// Members are saved first, then relationships, then deletions. The
    /// default implementation applies them one by one and is not atomic.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    fn apply(&self, changes: &ChangeSet) -> Result<()> {
        for member in &changes.members {
            self.save_member(member)?;
        }
        for relationship in &changes.relationships {
            self.save_relationship(relationship)?;
        }
        for id in &changes.deleted_relationships {
            self.delete_relationship(id)?;
        }
        Ok(())
    }
}

/// A group of writes persisted together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Members to upsert.
    pub members: Vec<Member>,
    /// Relationships to upsert.
    pub relationships: Vec<Relationship>,
    /// Relationships to delete.
    pub deleted_relationships: Vec<RelationshipId>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member upsert.
    #[must_use]
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Adds a relationship upsert.
    #[must_use]
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Adds a relationship deletion.
    #[must_use]
    pub fn with_deletion(mut self, id: RelationshipId) -> Self {
        self.deleted_relationships.push(id);
        self
    }

    /// Returns true if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
            && self.relationships.is_empty()
            && self.deleted_relationships.is_empty()
    }
}
