//! Maintenance command-line interface.
//!
//! Clap definitions and handlers for the `kinship` binary. Handlers run
//! against any [`GraphRepository`](crate::storage::GraphRepository) and write
//! their output to a caller-supplied writer, so the binary decides where
//! output goes.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `member add` | Add a member to a family |
//! | `member list` | List the members of a family |
//! | `link` | Validate and store a relationship |
//! | `validate` | Validate a relationship without storing it |
//! | `unlink` | Delete a relationship |
//! | `end` | End a spouse relationship |
//! | `ancestors` | List a member's ancestors |
//! | `descendants` | List a member's descendants |
//! | `is-ancestor` | Check whether one member is an ancestor of another |
//! | `depth` | Show a family's generation report |
//! | `stats` | Show family statistics |
//! | `repair` | Repair a family's member links |
//!
//! # Example Usage
//!
//! ```bash
//! kinship member add --family smith --name "John" --gender male --id john
//! kinship member add --family smith --name "Jane" --gender female --id jane
//! kinship link --family smith --source john --target jane --type father
//! kinship depth --family smith --format json
//! ```

mod commands;
mod output;

pub use commands::{CommandStatus, execute};
pub use output::OutputFormat;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Kinship - family relationship graph maintenance.
#[derive(Debug, Parser)]
#[command(name = "kinship")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides configuration).
    #[arg(long, global = true, env = "KINSHIP_DATABASE")]
    pub database: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage members.
    Member {
        /// Member subcommand.
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Validate and store a relationship.
    Link(RelationshipArgs),

    /// Validate a relationship without storing it.
    Validate(RelationshipArgs),

    /// Delete a relationship.
    Unlink {
        /// Relationship ID.
        id: String,
    },

    /// End a spouse relationship.
    End {
        /// Relationship ID.
        id: String,

        /// End timestamp (Unix seconds, default now).
        #[arg(long)]
        at: Option<i64>,
    },

    /// List a member's ancestors.
    Ancestors {
        /// Member ID.
        member: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List a member's descendants.
    Descendants {
        /// Member ID.
        member: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Check whether CANDIDATE is an ancestor of DESCENDANT.
    IsAncestor {
        /// Candidate ancestor ID.
        candidate: String,

        /// Descendant ID.
        descendant: String,
    },

    /// Show a family's generation report.
    Depth {
        /// Family ID.
        #[arg(long)]
        family: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show family statistics.
    Stats {
        /// Family ID.
        #[arg(long)]
        family: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Repair a family's parent and spouse links.
    Repair {
        /// Family ID.
        #[arg(long)]
        family: String,

        /// Leave relationship edges untouched.
        #[arg(long)]
        no_sync: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

/// Member subcommands.
#[derive(Debug, Subcommand)]
pub enum MemberAction {
    /// Add a member.
    Add {
        /// Family ID.
        #[arg(long)]
        family: String,

        /// Display name.
        #[arg(long)]
        name: String,

        /// Gender: male, female, or unknown.
        #[arg(long, default_value = "unknown")]
        gender: String,

        /// Member ID (generated if omitted).
        #[arg(long)]
        id: Option<String>,
    },

    /// List the members of a family.
    List {
        /// Family ID.
        #[arg(long)]
        family: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

/// Arguments describing a relationship.
#[derive(Debug, Clone, Args)]
pub struct RelationshipArgs {
    /// Family ID.
    #[arg(long)]
    pub family: String,

    /// Source member ID (the parent for parent types).
    #[arg(long)]
    pub source: String,

    /// Target member ID (the child for parent types).
    #[arg(long)]
    pub target: String,

    /// Relationship type: father, mother, husband, wife, parent, child, spouse, sibling.
    #[arg(long = "type")]
    pub relationship_type: String,

    /// Relationship ID (generated if omitted; an existing ID updates it).
    #[arg(long)]
    pub id: Option<String>,

    /// Ordering value, e.g. birth order.
    #[arg(long)]
    pub order: Option<i32>,

    /// Start of validity (Unix seconds).
    #[arg(long)]
    pub start: Option<i64>,

    /// End of validity (Unix seconds).
    #[arg(long)]
    pub end: Option<i64>,

    /// Free-text description.
    #[arg(long)]
    pub description: Option<String>,
}
