//! Generation depth calculation.
//!
//! The calculator never fails on malformed data. Rootless families and
//! cycles are resolved by fallback rules and reported on the
//! [`GenerationReport`] instead of being rejected:
//!
//! | Situation | Handling |
//! |-----------|----------|
//! | Members without a Father/Mother edge exist | they are the roots ([`RootStrategy::NoParents`]) |
//! | Every member has a parent edge | members with no parent among the loaded members ([`RootStrategy::NoIncomingEdges`]) |
//! | Still no root | the first member by ID ([`RootStrategy::ArbitraryMember`], approximate) |
//! | A walk meets a member already on its path | that branch contributes 0, `cycle_detected` is set |

use crate::Result;
use crate::models::{
    FamilyId, GenerationReport, Member, MemberId, Relationship, RelationshipType, RootStrategy,
};
use crate::services::cancellation::{CancellationToken, checkpoint};
use crate::storage::traits::GraphRepository;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Computes the number of generational layers in a family.
pub struct GenerationCalculator<R: GraphRepository + ?Sized> {
    repository: Arc<R>,
    cancellation: Option<CancellationToken>,
}

impl<R: GraphRepository + ?Sized> GenerationCalculator<R> {
    /// Creates a new calculator.
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

    /// Returns the generation depth of a family (0 when it has no members).
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the walk is cancelled.
    pub fn compute_generation_depth(&self, family_id: &FamilyId) -> Result<u32> {
        Ok(self.compute_generations(family_id)?.depth)
    }

    /// Computes the full generation report of a family.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the walk is cancelled.
    #[instrument(skip(self), fields(family_id = %family_id))]
    pub fn compute_generations(&self, family_id: &FamilyId) -> Result<GenerationReport> {
        let members = self.repository.get_members_by_family(family_id)?;
        let relationships = self.repository.get_relationships_by_family(family_id)?;
        let report = generation_report(&members, &relationships, self.cancellation.as_ref())?;

        if report.strategy == Some(RootStrategy::ArbitraryMember) {
            warn!(
                family_id = %family_id,
                root = ?report.roots.first(),
                "Family has no root member, generation depth is approximate"
            );
            metrics::counter!("kinship_generation_anomalies_total", "kind" => "rootless")
                .increment(1);
        }
        if report.cycle_detected {
            warn!(family_id = %family_id, "Parent cycle encountered while counting generations");
            metrics::counter!("kinship_generation_anomalies_total", "kind" => "cycle").increment(1);
        }

        Ok(report)
    }
}

/// Computes a generation report over an already-loaded snapshot.
///
/// Only Father and Mother edges whose endpoints are both in `members` form
/// the tree.
///
/// # Errors
///
/// Returns an error only if `cancellation` fires.
pub fn generation_report(
    members: &[Member],
    relationships: &[Relationship],
    cancellation: Option<&CancellationToken>,
) -> Result<GenerationReport> {
    let tree = FamilyTree::build(members, relationships);
    let Some((strategy, roots)) = tree.roots() else {
        return Ok(GenerationReport::default());
    };

    let mut cycle_detected = false;
    let mut depth = 0;
    for root in &roots {
        let mut walk = DepthWalk {
            tree: &tree,
            cancellation,
            on_path: HashSet::new(),
            memo: HashMap::new(),
            cycle_detected: false,
        };
        depth = depth.max(walk.depth(*root)?);
        cycle_detected |= walk.cycle_detected;
    }

    let mut layers = BTreeMap::new();
    for root in &roots {
        tree.assign_layers(*root, &mut layers, cancellation)?;
    }

    Ok(GenerationReport {
        depth,
        roots: roots.into_iter().cloned().collect(),
        strategy: Some(strategy),
        layers: layers
            .into_iter()
            .map(|(id, layer)| (id.clone(), layer))
            .collect(),
        cycle_detected,
    })
}

/// Father/Mother adjacency restricted to the loaded members.
struct FamilyTree<'a> {
    members: BTreeSet<&'a MemberId>,
    children: HashMap<&'a MemberId, Vec<&'a MemberId>>,
    /// Members targeted by any Father/Mother edge.
    with_parent_edge: HashSet<&'a MemberId>,
    /// Members targeted by a Father/Mother edge from a loaded member.
    with_loaded_parent: HashSet<&'a MemberId>,
}

impl<'a> FamilyTree<'a> {
    fn build(members: &'a [Member], relationships: &'a [Relationship]) -> Self {
        let ids: BTreeSet<&MemberId> = members.iter().map(|m| &m.id).collect();
        let mut children: HashMap<&MemberId, Vec<&MemberId>> = HashMap::new();
        let mut with_parent_edge = HashSet::new();
        let mut with_loaded_parent = HashSet::new();

        for edge in relationships.iter().filter(|r| {
            matches!(
                r.relationship_type,
                RelationshipType::Father | RelationshipType::Mother
            )
        }) {
            let (parent, child) = (&edge.source_member_id, &edge.target_member_id);
            with_parent_edge.insert(child);
            if ids.contains(parent) && ids.contains(child) {
                with_loaded_parent.insert(child);
                children.entry(parent).or_default().push(child);
            }
        }
        for list in children.values_mut() {
            list.sort();
            list.dedup();
        }

        Self {
            members: ids,
            children,
            with_parent_edge,
            with_loaded_parent,
        }
    }

    fn roots(&self) -> Option<(RootStrategy, Vec<&'a MemberId>)> {
        let first = *self.members.first()?;

        let parentless: Vec<_> = self
            .members
            .iter()
            .filter(|id| !self.with_parent_edge.contains(*id))
            .copied()
            .collect();
        if !parentless.is_empty() {
            return Some((RootStrategy::NoParents, parentless));
        }

        let unreached: Vec<_> = self
            .members
            .iter()
            .filter(|id| !self.with_loaded_parent.contains(*id))
            .copied()
            .collect();
        if !unreached.is_empty() {
            return Some((RootStrategy::NoIncomingEdges, unreached));
        }

        Some((RootStrategy::ArbitraryMember, vec![first]))
    }

    fn children_of(&self, id: &MemberId) -> &[&'a MemberId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Assigns each reachable member the longest root distance seen so far.
    fn assign_layers(
        &self,
        root: &'a MemberId,
        layers: &mut BTreeMap<&'a MemberId, u32>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<()> {
        let mut on_path = HashSet::new();
        let mut stack: Vec<Frame<'a>> = Vec::new();
        let mut pending = Some((root, 1));

        loop {
            if let Some((id, layer)) = pending.take() {
                checkpoint(cancellation, "compute_generations")?;
                if !layers.get(id).is_some_and(|existing| *existing >= layer) {
                    layers.insert(id, layer);
                    on_path.insert(id);
                    stack.push(Frame::new(id, layer));
                }
            }

            let Some(frame) = stack.last_mut() else {
                break;
            };
            let id = frame.id;
            match self.children_of(id).get(frame.next) {
                Some(child) => {
                    frame.next += 1;
                    if !on_path.contains(*child) {
                        pending = Some((*child, frame.value + 1));
                    }
                },
                None => {
                    on_path.remove(id);
                    stack.pop();
                },
            }
        }
        Ok(())
    }
}

/// One member on an explicit walk stack.
///
/// `value` is the member's layer while assigning layers, and the deepest
/// child depth seen so far while measuring depth.
#[derive(Clone, Copy)]
struct Frame<'a> {
    id: &'a MemberId,
    next: usize,
    value: u32,
}

impl<'a> Frame<'a> {
    const fn new(id: &'a MemberId, value: u32) -> Self {
        Self { id, next: 0, value }
    }
}

/// Depth-first walk from one root.
struct DepthWalk<'t, 'a> {
    tree: &'t FamilyTree<'a>,
    cancellation: Option<&'t CancellationToken>,
    on_path: HashSet<&'a MemberId>,
    memo: HashMap<&'a MemberId, u32>,
    cycle_detected: bool,
}

impl<'a> DepthWalk<'_, 'a> {
    fn depth(&mut self, root: &'a MemberId) -> Result<u32> {
        if let Some(depth) = self.enter(root)? {
            return Ok(depth);
        }

        let tree = self.tree;
        let mut stack = vec![Frame::new(root, 0)];
        let mut depth = 0;
        while let Some(frame) = stack.last_mut() {
            if let Some(child) = tree.children_of(frame.id).get(frame.next).copied() {
                frame.next += 1;
                match self.enter(child)? {
                    Some(known) => frame.value = frame.value.max(known),
                    None => stack.push(Frame::new(child, 0)),
                }
                continue;
            }

            let done = *frame;
            stack.pop();
            self.on_path.remove(done.id);
            depth = done.value + 1;
            self.memo.insert(done.id, depth);
            if let Some(parent) = stack.last_mut() {
                parent.value = parent.value.max(depth);
            }
        }
        Ok(depth)
    }

    /// Returns the depth of an already-resolved member, or puts it on the path.
    fn enter(&mut self, id: &'a MemberId) -> Result<Option<u32>> {
        checkpoint(self.cancellation, "compute_generations")?;
        if self.on_path.contains(id) {
            self.cycle_detected = true;
            return Ok(Some(0));
        }
        if let Some(depth) = self.memo.get(id) {
            return Ok(Some(*depth));
        }
        self.on_path.insert(id);
        Ok(None)
    }
}
