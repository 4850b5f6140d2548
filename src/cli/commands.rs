//! Command handlers.

use super::output::{self, OutputFormat, write_err};
use super::{Command, MemberAction, RelationshipArgs};
use crate::models::{
    FamilyId, Gender, Member, MemberId, Relationship, RelationshipId, RelationshipType,
    ValidTimeRange, ValidationOutcome,
};
use crate::services::FamilyGraphService;
use crate::storage::traits::GraphRepository;
use crate::{Error, Result};
use std::io::Write;

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The command did what was asked.
    Success,
    /// A relationship was rejected, or a yes/no check answered no.
    Negative,
}

/// Runs a command against a service, writing results to `out`.
///
/// # Errors
///
/// Returns an error for invalid arguments, missing records, repository
/// faults, or if writing to `out` fails.
pub fn execute<R, W>(
    command: Command,
    service: &FamilyGraphService<R>,
    sync_edges: bool,
    out: &mut W,
) -> Result<CommandStatus>
where
    R: GraphRepository + ?Sized,
    W: Write,
{
    match command {
        Command::Member { action } => match action {
            MemberAction::Add {
                family,
                name,
                gender,
                id,
            } => cmd_member_add(service, &family, name, &gender, id, out),
            MemberAction::List { family, format } => {
                cmd_member_list(service, &FamilyId::new(family), format, out)
            },
        },
        Command::Link(args) => cmd_link(service, &args, out),
        Command::Validate(args) => {
            let outcome = service.validate_relationship(&build_relationship(&args)?)?;
            report_outcome(&outcome, "valid", out)
        },
        Command::Unlink { id } => {
            if service.remove_relationship(&RelationshipId::new(id.clone()))? {
                writeln!(out, "Removed relationship {id}").map_err(write_err)?;
                Ok(CommandStatus::Success)
            } else {
                Err(Error::relationship_not_found(&RelationshipId::new(id)))
            }
        },
        Command::End { id, at } => {
            let end = at.unwrap_or_else(crate::current_timestamp);
            let ended = service.end_relationship(&RelationshipId::new(id), end)?;
            writeln!(out, "Ended relationship {} at {end}", ended.id).map_err(write_err)?;
            Ok(CommandStatus::Success)
        },
        Command::Ancestors { member, format } => {
            let member = existing_member(service, member)?;
            let found = service.ancestry().get_ancestors(&member)?;
            print_ids(found.into_iter().collect(), format, out)
        },
        Command::Descendants { member, format } => {
            let member = existing_member(service, member)?;
            let found = service.ancestry().get_descendants(&member)?;
            print_ids(found.into_iter().collect(), format, out)
        },
        Command::IsAncestor {
            candidate,
            descendant,
        } => {
            let answer = service
                .ancestry()
                .is_ancestor(&MemberId::new(candidate), &MemberId::new(descendant))?;
            writeln!(out, "{answer}").map_err(write_err)?;
            Ok(if answer {
                CommandStatus::Success
            } else {
                CommandStatus::Negative
            })
        },
        Command::Depth { family, format } => {
            let report = service
                .generations()
                .compute_generations(&FamilyId::new(family))?;
            match format {
                OutputFormat::Json => output::json(out, &report)?,
                OutputFormat::Table => output::generations_table(out, &report)?,
            }
            Ok(CommandStatus::Success)
        },
        Command::Stats { family, format } => {
            let stats = service.family_stats(&FamilyId::new(family))?;
            match format {
                OutputFormat::Json => output::json(out, &stats)?,
                OutputFormat::Table => output::stats_table(out, &stats)?,
            }
            Ok(CommandStatus::Success)
        },
        Command::Repair {
            family,
            no_sync,
            format,
        } => {
            let report = service.repair_family(&FamilyId::new(family), sync_edges && !no_sync)?;
            match format {
                OutputFormat::Json => output::json(out, &report)?,
                OutputFormat::Table => output::repair_table(out, &report)?,
            }
            Ok(CommandStatus::Success)
        },
    }
}

fn cmd_member_add<R: GraphRepository + ?Sized, W: Write>(
    service: &FamilyGraphService<R>,
    family: &str,
    name: String,
    gender: &str,
    id: Option<String>,
    out: &mut W,
) -> Result<CommandStatus> {
    let gender: Gender = gender.parse()?;
    let mut member = Member::new(FamilyId::new(family), name, gender);
    if let Some(id) = id {
        member = member.with_id(id);
    }

    service.add_member(&member)?;
    writeln!(out, "{}", member.id).map_err(write_err)?;
    Ok(CommandStatus::Success)
}

fn cmd_member_list<R: GraphRepository + ?Sized, W: Write>(
    service: &FamilyGraphService<R>,
    family: &FamilyId,
    format: OutputFormat,
    out: &mut W,
) -> Result<CommandStatus> {
    let members = service.repository().get_members_by_family(family)?;
    match format {
        OutputFormat::Json => output::json(out, &members)?,
        OutputFormat::Table => output::members_table(out, &members)?,
    }
    Ok(CommandStatus::Success)
}

fn cmd_link<R: GraphRepository + ?Sized, W: Write>(
    service: &FamilyGraphService<R>,
    args: &RelationshipArgs,
    out: &mut W,
) -> Result<CommandStatus> {
    let relationship = build_relationship(args)?;
    let exists = service
        .repository()
        .get_relationship(&relationship.id)?
        .is_some();

    let outcome = if exists {
        service.update_relationship(&relationship)?
    } else {
        service.create_relationship(&relationship)?
    };
    let verb = if exists { "updated" } else { "created" };
    report_outcome(&outcome, &format!("{verb} {}", relationship.id), out)
}

fn report_outcome<W: Write>(
    outcome: &ValidationOutcome,
    accepted: &str,
    out: &mut W,
) -> Result<CommandStatus> {
    match outcome {
        ValidationOutcome::Accepted => {
            writeln!(out, "{accepted}").map_err(write_err)?;
            Ok(CommandStatus::Success)
        },
        ValidationOutcome::Rejected(rejection) => {
            writeln!(out, "rejected ({}): {}", rejection.reason, rejection.message)
                .map_err(write_err)?;
            Ok(CommandStatus::Negative)
        },
    }
}

fn build_relationship(args: &RelationshipArgs) -> Result<Relationship> {
    let relationship_type: RelationshipType = args.relationship_type.parse()?;
    if let (Some(start), Some(end)) = (args.start, args.end)
        && end < start
    {
        return Err(Error::InvalidInput(format!(
            "end {end} is before start {start}"
        )));
    }

    let mut relationship = Relationship::new(
        FamilyId::new(args.family.clone()),
        MemberId::new(args.source.clone()),
        MemberId::new(args.target.clone()),
        relationship_type,
    )
    .with_valid_time(ValidTimeRange {
        start: args.start,
        end: args.end,
    });
    if let Some(id) = &args.id {
        relationship = relationship.with_id(id.as_str());
    }
    if let Some(order) = args.order {
        relationship = relationship.with_order(order);
    }
    if let Some(description) = &args.description {
        relationship = relationship.with_description(description.clone());
    }
    Ok(relationship)
}

fn existing_member<R: GraphRepository + ?Sized>(
    service: &FamilyGraphService<R>,
    id: String,
) -> Result<MemberId> {
    let id = MemberId::new(id);
    if service.repository().get_member(&id)?.is_none() {
        return Err(Error::member_not_found(&id));
    }
    Ok(id)
}

fn print_ids<W: Write>(
    mut ids: Vec<MemberId>,
    format: OutputFormat,
    out: &mut W,
) -> Result<CommandStatus> {
    ids.sort();
    match format {
        OutputFormat::Json => output::json(out, &ids)?,
        OutputFormat::Table => output::ids_table(out, &ids)?,
    }
    Ok(CommandStatus::Success)
}
