//! Rendering of command results.

use crate::models::{FamilyStats, GenerationReport, Member, MemberId, RepairReport};
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain text.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

pub(crate) fn write_err(e: std::io::Error) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    }
}

pub(crate) fn json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })?;
    writeln!(out, "{rendered}").map_err(write_err)
}

pub(crate) fn members_table<W: Write>(out: &mut W, members: &[Member]) -> Result<()> {
    writeln!(
        out,
        "{:<24} {:<24} {:<8} {:<24} {:<24}",
        "ID", "NAME", "GENDER", "FATHER", "MOTHER"
    )
    .map_err(write_err)?;
    for member in members {
        writeln!(
            out,
            "{:<24} {:<24} {:<8} {:<24} {:<24}",
            member.id,
            member.name,
            member.gender,
            display_opt(member.father_id.as_ref()),
            display_opt(member.mother_id.as_ref()),
        )
        .map_err(write_err)?;
    }
    Ok(())
}

pub(crate) fn ids_table<W: Write>(out: &mut W, ids: &[MemberId]) -> Result<()> {
    if ids.is_empty() {
        return writeln!(out, "(none)").map_err(write_err);
    }
    for id in ids {
        writeln!(out, "{id}").map_err(write_err)?;
    }
    Ok(())
}

pub(crate) fn generations_table<W: Write>(out: &mut W, report: &GenerationReport) -> Result<()> {
    writeln!(out, "Generation depth: {}", report.depth).map_err(write_err)?;
    if let Some(strategy) = report.strategy {
        writeln!(out, "Root selection:   {strategy:?}").map_err(write_err)?;
    }
    writeln!(
        out,
        "Roots:            {}",
        report
            .roots
            .iter()
            .map(MemberId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    )
    .map_err(write_err)?;
    if report.is_approximate() {
        writeln!(out, "Note: depth is approximate (corrupted or cyclic data)").map_err(write_err)?;
    }
    for (id, layer) in &report.layers {
        writeln!(out, "  {layer:>3}  {id}").map_err(write_err)?;
    }
    Ok(())
}

pub(crate) fn stats_table<W: Write>(out: &mut W, stats: &FamilyStats) -> Result<()> {
    let rows = [
        ("Members", stats.member_count.to_string()),
        ("  male", stats.male_count.to_string()),
        ("  female", stats.female_count.to_string()),
        ("  unknown", stats.unknown_gender_count.to_string()),
        ("Relationships", stats.relationship_count.to_string()),
        ("Active couples", stats.active_couples.to_string()),
        ("Roots", stats.root_count.to_string()),
        ("Generation depth", stats.generation_depth.to_string()),
    ];
    for (label, value) in rows {
        writeln!(out, "{label:<18} {value}").map_err(write_err)?;
    }
    for (kind, count) in &stats.relationships_by_type {
        writeln!(out, "  {:<16} {count}", kind.as_str()).map_err(write_err)?;
    }
    Ok(())
}

pub(crate) fn repair_table<W: Write>(out: &mut W, report: &RepairReport) -> Result<()> {
    writeln!(out, "Fixed: {}", report.fixed_count).map_err(write_err)?;
    for detail in &report.details {
        let marker = if detail.applied { "fixed" } else { "unresolved" };
        writeln!(
            out,
            "  [{marker}] {} {}: {}",
            detail.member_id, detail.action, detail.message
        )
        .map_err(write_err)?;
    }
    for skipped in &report.skipped {
        writeln!(out, "  [skipped] {}: {}", skipped.member_id, skipped.cause).map_err(write_err)?;
    }
    Ok(())
}

fn display_opt(id: Option<&MemberId>) -> &str {
    id.map_or("-", MemberId::as_str)
}
