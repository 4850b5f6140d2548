//! Consistency repair of the denormalized member links.
//!
//! A repair scan runs in two phases over the family's members, in ID order:
//!
//! 1. Spouse links: an empty reciprocal spouse field is filled
//!    (`A.husband_id = H` and `H.wife_id` empty gives `H.wife_id = A`).
//! 2. Parent links, per member, first matching rule wins:
//!    - female father and male mother are swapped
//!    - a female father moves to the mother slot
//!    - a male mother moves to the father slot
//!
//!    then a missing father is inferred from the mother's husband, or a
//!    missing mother from the father's wife.
//!
//! A reclassified parent takes the target slot even when another member
//! holds it; the displaced occupant is logged. Inference only fills empty
//! slots. Phase 2 reads only spouse fields and genders, which phase 2 never
//! changes, so a second scan over repaired data finds nothing to fix.

use crate::models::{FamilyId, Gender, Member, MemberId, RepairAction, RepairReport, SkippedMember};
use crate::services::cancellation::{CancellationToken, checkpoint};
use crate::storage::traits::GraphRepository;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Scans a family and corrects inconsistent parent and spouse fields.
pub struct ConsistencyRepairer<R: GraphRepository + ?Sized> {
    repository: Arc<R>,
    cancellation: Option<CancellationToken>,
}

impl<R: GraphRepository + ?Sized> ConsistencyRepairer<R> {
    /// Creates a new repairer.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            cancellation: None,
        }
    }

    /// Attaches a cancellation token checked before each member.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Repairs every member of a family.
    ///
    /// Faults on individual members are recorded in
    /// [`RepairReport::skipped`] and do not stop the scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the member list cannot be loaded or the scan is
    /// cancelled.
    #[instrument(skip(self), fields(family_id = %family_id))]
    pub fn repair_family(&self, family_id: &FamilyId) -> Result<RepairReport> {
        let mut ids: Vec<MemberId> = self
            .repository
            .get_members_by_family(family_id)?
            .into_iter()
            .map(|m| m.id)
            .collect();
        ids.sort();

        let mut report = RepairReport::new();
        for id in &ids {
            checkpoint(self.cancellation.as_ref(), "repair_family")?;
            let outcome = self.repair_spouse_links(id, &mut report);
            Self::note_fault(id, outcome, &mut report)?;
        }
        for id in &ids {
            checkpoint(self.cancellation.as_ref(), "repair_family")?;
            let outcome = self.repair_parent_links(id, &mut report);
            Self::note_fault(id, outcome, &mut report)?;
        }

        for detail in report.details.iter().filter(|d| d.applied) {
            metrics::counter!("kinship_repairs_applied_total", "action" => detail.action.as_str())
                .increment(1);
        }
        info!(
            fixed = report.fixed_count,
            unresolved = report.details.len() - report.fixed_count,
            skipped = report.skipped.len(),
            "Family repair finished"
        );
        Ok(report)
    }

    fn note_fault(id: &MemberId, outcome: Result<()>, report: &mut RepairReport) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(e @ Error::Cancelled { .. }) => Err(e),
            Err(e) => {
                warn!(member_id = %id, error = %e, "Skipping member during repair");
                report.skipped.push(SkippedMember {
                    member_id: id.clone(),
                    cause: e.to_string(),
                });
                Ok(())
            },
        }
    }

    fn load(&self, id: Option<&MemberId>) -> Result<Option<Member>> {
        id.map_or(Ok(None), |id| self.repository.get_member(id))
    }

    fn repair_spouse_links(&self, id: &MemberId, report: &mut RepairReport) -> Result<()> {
        let Some(member) = self.repository.get_member(id)? else {
            return Ok(());
        };

        if let Some(husband_id) = member.husband_id.as_ref().filter(|h| *h != id)
            && let Some(mut husband) = self.repository.get_member(husband_id)?
        {
            match &husband.wife_id {
                None => {
                    husband.wife_id = Some(member.id.clone());
                    self.repository.save_member(&husband)?;
                    report.record_fix(
                        husband.id.clone(),
                        RepairAction::ReciprocalSpouse,
                        format!("wife of {} set to {}", husband.id, member.id),
                    );
                },
                Some(wife) if wife != id => report.record_unresolved(
                    husband.id.clone(),
                    RepairAction::ReciprocalSpouse,
                    format!(
                        "{} names {} as husband but {} is recorded as married to {wife}",
                        member.id, husband.id, husband.id
                    ),
                ),
                Some(_) => {},
            }
        }

        if let Some(wife_id) = member.wife_id.as_ref().filter(|w| *w != id)
            && let Some(mut wife) = self.repository.get_member(wife_id)?
        {
            match &wife.husband_id {
                None => {
                    wife.husband_id = Some(member.id.clone());
                    self.repository.save_member(&wife)?;
                    report.record_fix(
                        wife.id.clone(),
                        RepairAction::ReciprocalSpouse,
                        format!("husband of {} set to {}", wife.id, member.id),
                    );
                },
                Some(husband) if husband != id => report.record_unresolved(
                    wife.id.clone(),
                    RepairAction::ReciprocalSpouse,
                    format!(
                        "{} names {} as wife but {} is recorded as married to {husband}",
                        member.id, wife.id, wife.id
                    ),
                ),
                Some(_) => {},
            }
        }

        Ok(())
    }

    fn repair_parent_links(&self, id: &MemberId, report: &mut RepairReport) -> Result<()> {
        let Some(mut member) = self.repository.get_member(id)? else {
            return Ok(());
        };
        let father = self.load(member.father_id.as_ref())?;
        let mother = self.load(member.mother_id.as_ref())?;

        let mut changed = Self::fix_parent_genders(
            &mut member,
            father.as_ref().map(|f| f.gender),
            mother.as_ref().map(|m| m.gender),
            report,
        );
        changed |= self.infer_missing_parent(&mut member, report)?;

        if changed {
            debug!(member_id = %member.id, "Saving repaired member");
            self.repository.save_member(&member)?;
        }
        Ok(())
    }

    fn fix_parent_genders(
        member: &mut Member,
        father_gender: Option<Gender>,
        mother_gender: Option<Gender>,
        report: &mut RepairReport,
    ) -> bool {
        let female_father = father_gender == Some(Gender::Female);
        let male_mother = mother_gender == Some(Gender::Male);

        if female_father && male_mother {
            std::mem::swap(&mut member.father_id, &mut member.mother_id);
            report.record_fix(
                member.id.clone(),
                RepairAction::SwappedParents,
                format!("swapped father and mother of {}", member.id),
            );
            return true;
        }

        let (action, from_father) = if female_father {
            (RepairAction::FatherReclassifiedAsMother, true)
        } else if male_mother {
            (RepairAction::MotherReclassifiedAsFather, false)
        } else {
            return false;
        };

        let (from, to) = if from_father {
            (member.father_id.clone(), member.mother_id.clone())
        } else {
            (member.mother_id.clone(), member.father_id.clone())
        };
        let Some(parent) = from else {
            return false;
        };

        if let Some(occupant) = to.filter(|occupant| *occupant != parent) {
            warn!(
                member_id = %member.id,
                parent = %parent,
                occupant = %occupant,
                "Replacing parent slot occupant during reclassification"
            );
        }
        if from_father {
            member.father_id = None;
            member.mother_id = Some(parent.clone());
        } else {
            member.mother_id = None;
            member.father_id = Some(parent.clone());
        }
        report.record_fix(
            member.id.clone(),
            action,
            format!("{action} for {}: {parent}", member.id),
        );
        true
    }

    fn infer_missing_parent(&self, member: &mut Member, report: &mut RepairReport) -> Result<bool> {
        match (&member.father_id, &member.mother_id) {
            (None, Some(mother_id)) => {
                let candidate = self.spouse_candidate(
                    member,
                    mother_id,
                    |mother| mother.husband_id.as_ref(),
                    Gender::Female,
                )?;
                if let Some(father) = candidate {
                    report.record_fix(
                        member.id.clone(),
                        RepairAction::InferredFather,
                        format!("father of {} inferred as {father}", member.id),
                    );
                    member.father_id = Some(father);
                    return Ok(true);
                }
            },
            (Some(father_id), None) => {
                let candidate = self.spouse_candidate(
                    member,
                    father_id,
                    |father| father.wife_id.as_ref(),
                    Gender::Male,
                )?;
                if let Some(mother) = candidate {
                    report.record_fix(
                        member.id.clone(),
                        RepairAction::InferredMother,
                        format!("mother of {} inferred as {mother}", member.id),
                    );
                    member.mother_id = Some(mother);
                    return Ok(true);
                }
            },
            _ => {},
        }
        Ok(false)
    }

    /// Returns the recorded spouse of `parent_id` if it can fill the empty slot.
    fn spouse_candidate(
        &self,
        member: &Member,
        parent_id: &MemberId,
        spouse_of: fn(&Member) -> Option<&MemberId>,
        contradicting: Gender,
    ) -> Result<Option<MemberId>> {
        let Some(parent) = self.repository.get_member(parent_id)? else {
            return Ok(None);
        };
        let Some(spouse_id) = spouse_of(&parent).cloned() else {
            return Ok(None);
        };
        if spouse_id == member.id || spouse_id == *parent_id {
            return Ok(None);
        }
        match self.repository.get_member(&spouse_id)? {
            Some(spouse) if spouse.gender != contradicting => Ok(Some(spouse_id)),
            Some(_) => {
                debug!(member_id = %member.id, spouse = %spouse_id, "Spouse gender contradicts slot");
                Ok(None)
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepairDetail;
    use crate::storage::graph::InMemoryGraphRepository;

    fn member(id: &str, gender: Gender) -> Member {
        Member::new(FamilyId::new("f1"), id, gender).with_id(id)
    }

    fn repair(members: Vec<Member>) -> (Arc<InMemoryGraphRepository>, RepairReport) {
        let repository = Arc::new(InMemoryGraphRepository::with_snapshot(members, vec![]).unwrap());
        let repairer = ConsistencyRepairer::new(Arc::clone(&repository));
        let report = repairer.repair_family(&FamilyId::new("f1")).unwrap();
        (repository, report)
    }

    fn stored(repository: &InMemoryGraphRepository, id: &str) -> Member {
        repository.get_member(&MemberId::new(id)).unwrap().unwrap()
    }

    fn actions(details: &[RepairDetail]) -> Vec<(RepairAction, bool)> {
        details.iter().map(|d| (d.action, d.applied)).collect()
    }

    #[test]
    fn test_swaps_both_mismatched_parents() {
        let (repository, report) = repair(vec![
            member("f", Gender::Female),
            member("m", Gender::Male),
            member("c", Gender::Unknown)
                .with_father(MemberId::new("f"))
                .with_mother(MemberId::new("m")),
        ]);

        let child = stored(&repository, "c");
        assert_eq!(child.father_id, Some(MemberId::new("m")));
        assert_eq!(child.mother_id, Some(MemberId::new("f")));
        assert_eq!(report.fixed_count, 1);
        assert_eq!(
            actions(&report.details),
            vec![(RepairAction::SwappedParents, true)]
        );
    }

    #[test]
    fn test_female_father_moves_to_empty_mother_slot() {
        let (repository, report) = repair(vec![
            member("f", Gender::Female),
            member("c", Gender::Unknown).with_father(MemberId::new("f")),
        ]);

        let child = stored(&repository, "c");
        assert_eq!(child.father_id, None);
        assert_eq!(child.mother_id, Some(MemberId::new("f")));
        assert_eq!(report.fixed_count, 1);
    }

    #[test]
    fn test_male_mother_moves_to_empty_father_slot() {
        let (repository, report) = repair(vec![
            member("m", Gender::Male),
            member("c", Gender::Unknown).with_mother(MemberId::new("m")),
        ]);

        let child = stored(&repository, "c");
        assert_eq!(child.father_id, Some(MemberId::new("m")));
        assert_eq!(child.mother_id, None);
        assert_eq!(
            actions(&report.details),
            vec![(RepairAction::MotherReclassifiedAsFather, true)]
        );
    }

    #[test]
    fn test_female_father_replaces_female_mother() {
        let (repository, report) = repair(vec![
            member("f", Gender::Female),
            member("w", Gender::Female),
            member("c", Gender::Unknown)
                .with_father(MemberId::new("f"))
                .with_mother(MemberId::new("w")),
        ]);

        let child = stored(&repository, "c");
        assert_eq!(child.father_id, None);
        assert_eq!(child.mother_id, Some(MemberId::new("f")));
        assert_eq!(report.fixed_count, 1);
        assert_eq!(
            actions(&report.details),
            vec![(RepairAction::FatherReclassifiedAsMother, true)]
        );
    }

    #[test]
    fn test_male_mother_replaces_unknown_father() {
        let (repository, report) = repair(vec![
            member("u", Gender::Unknown),
            member("m", Gender::Male),
            member("c", Gender::Unknown)
                .with_father(MemberId::new("u"))
                .with_mother(MemberId::new("m")),
        ]);

        let child = stored(&repository, "c");
        assert_eq!(child.father_id, Some(MemberId::new("m")));
        assert_eq!(child.mother_id, None);
        assert_eq!(report.fixed_count, 1);
    }

    #[test]
    fn test_infers_father_from_mothers_husband() {
        let (repository, report) = repair(vec![
            member("h", Gender::Male).with_wife(MemberId::new("m")),
            member("m", Gender::Female).with_husband(MemberId::new("h")),
            member("c", Gender::Unknown).with_mother(MemberId::new("m")),
        ]);

        assert_eq!(stored(&repository, "c").father_id, Some(MemberId::new("h")));
        assert_eq!(
            actions(&report.details),
            vec![(RepairAction::InferredFather, true)]
        );
    }

    #[test]
    fn test_infers_mother_from_fathers_wife() {
        let (repository, _) = repair(vec![
            member("h", Gender::Male).with_wife(MemberId::new("w")),
            member("w", Gender::Female).with_husband(MemberId::new("h")),
            member("c", Gender::Unknown).with_father(MemberId::new("h")),
        ]);

        assert_eq!(stored(&repository, "c").mother_id, Some(MemberId::new("w")));
    }

    #[test]
    fn test_inference_skips_contradicting_gender() {
        let (repository, report) = repair(vec![
            member("x", Gender::Female).with_wife(MemberId::new("m")),
            member("m", Gender::Female).with_husband(MemberId::new("x")),
            member("c", Gender::Unknown).with_mother(MemberId::new("m")),
        ]);

        assert_eq!(stored(&repository, "c").father_id, None);
        assert!(report.is_clean());
    }

    #[test]
    fn test_fills_reciprocal_spouse_then_infers() {
        let (repository, report) = repair(vec![
            member("a", Gender::Unknown).with_mother(MemberId::new("m")),
            member("h", Gender::Male).with_wife(MemberId::new("m")),
            member("m", Gender::Female),
        ]);

        assert_eq!(stored(&repository, "m").husband_id, Some(MemberId::new("h")));
        assert_eq!(stored(&repository, "a").father_id, Some(MemberId::new("h")));
        assert_eq!(report.fixed_count, 2);
    }

    #[test]
    fn test_second_run_is_clean() {
        let repository = Arc::new(
            InMemoryGraphRepository::with_snapshot(
                vec![
                    member("f", Gender::Female),
                    member("m", Gender::Male).with_wife(MemberId::new("f")),
                    member("c", Gender::Unknown)
                        .with_father(MemberId::new("f"))
                        .with_mother(MemberId::new("m")),
                    member("d", Gender::Unknown).with_father(MemberId::new("m")),
                ],
                vec![],
            )
            .unwrap(),
        );
        let repairer = ConsistencyRepairer::new(Arc::clone(&repository));
        let family = FamilyId::new("f1");

        assert!(!repairer.repair_family(&family).unwrap().is_clean());
        assert!(repairer.repair_family(&family).unwrap().is_clean());
    }

    #[test]
    fn test_cancelled_scan() {
        let repository = Arc::new(
            InMemoryGraphRepository::with_snapshot(vec![member("a", Gender::Male)], vec![])
                .unwrap(),
        );
        let token = CancellationToken::new();
        token.cancel();
        let repairer = ConsistencyRepairer::new(repository).with_cancellation(token);

        assert!(matches!(
            repairer.repair_family(&FamilyId::new("f1")),
            Err(Error::Cancelled { .. })
        ));
    }
}
