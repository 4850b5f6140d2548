//! Ancestry queries over the parent/child sub-graph.
//!
//! Parent edges are Father, Mother and Parent relationships, where the
//! source is the parent and the target the child. Queries walk breadth
//! first and keep a visited set, so they terminate even if the stored
//! graph contains a cycle.
//!
//! | Query | Direction | Stops |
//! |-------|-----------|-------|
//! | [`AncestryService::is_ancestor`] | upward from the descendant | when the candidate is reached |
//! | [`AncestryService::get_ancestors`] | upward | when exhausted |
//! | [`AncestryService::get_descendants`] | downward | when exhausted |

use crate::Result;
use crate::models::{MemberId, Relationship};
use crate::services::cancellation::{CancellationToken, checkpoint};
use crate::storage::traits::GraphRepository;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::instrument;

/// Answers lineage questions about members.
pub struct AncestryService<R: GraphRepository + ?Sized> {
    repository: Arc<R>,
    cancellation: Option<CancellationToken>,
}

impl<R: GraphRepository + ?Sized> AncestryService<R> {
    /// Creates a new ancestry service.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            cancellation: None,
        }
    }

    /// Attaches a cancellation token checked once per visited member.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns true if `candidate` is a (transitive) parent of `descendant`.
    ///
    /// A member is never its own ancestor, and a member that does not exist
    /// is nobody's ancestor.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the walk is cancelled.
    #[instrument(skip(self), fields(candidate = %candidate, descendant = %descendant))]
    pub fn is_ancestor(&self, candidate: &MemberId, descendant: &MemberId) -> Result<bool> {
        if candidate == descendant {
            return Ok(false);
        }

        let mut visited = HashSet::from([descendant.clone()]);
        let mut queue = VecDeque::from([descendant.clone()]);

        while let Some(current) = queue.pop_front() {
            checkpoint(self.cancellation.as_ref(), "is_ancestor")?;
            for parent in self.parents_of(&current)? {
                if parent == *candidate {
                    return Ok(true);
                }
                if visited.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(false)
    }

    /// Returns every ancestor of a member.
    ///
    /// The member itself is not included, even when a cycle leads back to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the walk is cancelled.
    #[instrument(skip(self), fields(member_id = %member_id))]
    pub fn get_ancestors(&self, member_id: &MemberId) -> Result<HashSet<MemberId>> {
        self.collect(member_id, "get_ancestors", Self::parents_of)
    }

    /// Returns every descendant of a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the walk is cancelled.
    #[instrument(skip(self), fields(member_id = %member_id))]
    pub fn get_descendants(&self, member_id: &MemberId) -> Result<HashSet<MemberId>> {
        self.collect(member_id, "get_descendants", Self::children_of)
    }

    fn collect(
        &self,
        start: &MemberId,
        operation: &'static str,
        step: fn(&Self, &MemberId) -> Result<Vec<MemberId>>,
    ) -> Result<HashSet<MemberId>> {
        let mut visited = HashSet::from([start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(current) = queue.pop_front() {
            checkpoint(self.cancellation.as_ref(), operation)?;
            for next in step(self, &current)? {
                if visited.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }

        visited.remove(start);
        Ok(visited)
    }

    fn parents_of(&self, child: &MemberId) -> Result<Vec<MemberId>> {
        let edges = self.repository.get_relationships_for_member(child)?;
        Ok(edges
            .iter()
            .filter_map(Relationship::parent_link)
            .filter(|(_, c)| *c == child)
            .map(|(parent, _)| parent.clone())
            .collect())
    }

    fn children_of(&self, parent: &MemberId) -> Result<Vec<MemberId>> {
        let edges = self.repository.get_relationships_for_member(parent)?;
        Ok(edges
            .iter()
            .filter_map(Relationship::parent_link)
            .filter(|(p, _)| *p == parent)
            .map(|(_, child)| child.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::{FamilyId, Gender, Member, RelationshipType};
    use crate::storage::graph::InMemoryGraphRepository;

    fn member(id: &str) -> Member {
        Member::new(FamilyId::new("f1"), id, Gender::Unknown).with_id(id)
    }

    fn edge(source: &str, target: &str, kind: RelationshipType) -> Relationship {
        Relationship::new(
            FamilyId::new("f1"),
            MemberId::new(source),
            MemberId::new(target),
            kind,
        )
    }

    /// g -> p -> c, m -> c, plus an unrelated Child edge c -> x.
    fn service() -> AncestryService<InMemoryGraphRepository> {
        let repository = InMemoryGraphRepository::with_snapshot(
            ["g", "p", "m", "c", "x"].into_iter().map(member).collect(),
            vec![
                edge("g", "p", RelationshipType::Father),
                edge("p", "c", RelationshipType::Parent),
                edge("m", "c", RelationshipType::Mother),
                edge("c", "x", RelationshipType::Child),
            ],
        )
        .unwrap();
        AncestryService::new(Arc::new(repository))
    }

    fn ids(values: &[&str]) -> HashSet<MemberId> {
        values.iter().map(|v| MemberId::new(*v)).collect()
    }

    #[test]
    fn test_is_ancestor_transitive() {
        let service = service();
        assert!(service.is_ancestor(&MemberId::new("g"), &MemberId::new("c")).unwrap());
        assert!(service.is_ancestor(&MemberId::new("m"), &MemberId::new("c")).unwrap());
        assert!(!service.is_ancestor(&MemberId::new("c"), &MemberId::new("g")).unwrap());
    }

    #[test]
    fn test_member_is_not_own_ancestor() {
        let service = service();
        assert!(!service.is_ancestor(&MemberId::new("c"), &MemberId::new("c")).unwrap());
    }

    #[test]
    fn test_missing_member_is_not_an_ancestor() {
        let service = service();
        assert!(!service.is_ancestor(&MemberId::new("ghost"), &MemberId::new("c")).unwrap());
        assert!(!service.is_ancestor(&MemberId::new("g"), &MemberId::new("ghost")).unwrap());
    }

    #[test]
    fn test_child_edges_are_not_parent_links() {
        let service = service();
        assert!(!service.is_ancestor(&MemberId::new("x"), &MemberId::new("c")).unwrap());
        assert!(!service.is_ancestor(&MemberId::new("c"), &MemberId::new("x")).unwrap());
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let service = service();
        assert_eq!(
            service.get_ancestors(&MemberId::new("c")).unwrap(),
            ids(&["g", "p", "m"])
        );
        assert_eq!(
            service.get_descendants(&MemberId::new("g")).unwrap(),
            ids(&["p", "c"])
        );
        assert!(service.get_descendants(&MemberId::new("c")).unwrap().is_empty());
    }

    #[test]
    fn test_walk_terminates_on_cycle() {
        let repository = InMemoryGraphRepository::with_snapshot(
            vec![member("a"), member("b")],
            vec![
                edge("a", "b", RelationshipType::Father),
                edge("b", "a", RelationshipType::Father),
            ],
        )
        .unwrap();
        let service = AncestryService::new(Arc::new(repository));

        assert_eq!(service.get_ancestors(&MemberId::new("a")).unwrap(), ids(&["b"]));
        assert!(!service.is_ancestor(&MemberId::new("z"), &MemberId::new("a")).unwrap());
    }

    #[test]
    fn test_cycle_makes_child_an_ancestor_of_its_parent() {
        let edges = vec![
            edge("a", "b", RelationshipType::Father),
            edge("b", "c", RelationshipType::Mother),
            edge("c", "a", RelationshipType::Parent),
        ];
        let members = ["a", "b", "c"].into_iter().map(member).collect();
        let repository = InMemoryGraphRepository::with_snapshot(members, edges.clone()).unwrap();
        let service = AncestryService::new(Arc::new(repository));

        for (parent, child) in edges.iter().filter_map(Relationship::parent_link) {
            assert!(service.is_ancestor(child, parent).unwrap());
        }
    }

    #[test]
    fn test_cancelled_walk() {
        let token = CancellationToken::new();
        token.cancel();
        let service = service().with_cancellation(token);

        let result = service.get_ancestors(&MemberId::new("c"));
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                operation: "get_ancestors"
            })
        ));
    }
}
