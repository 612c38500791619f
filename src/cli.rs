//! Command-line interface definitions and parsing
//!
//! This module defines the complete CLI structure for bidsman using the
//! `clap` crate, plus the small parsers for replace specs (`OLD:NEW`) and
//! entity assignments (`KEY=VALUE`).
//!
//! # Commands
//!
//! - **rename**: entity-aware batch renaming with collision checks
//! - **import**: copy events/physio recordings next to their bold run
//! - **json**: edit JSON sidecar fields across the dataset
//! - **scrub**: zero out gzip header metadata

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::BidsmanError;
use crate::config::Modality;

#[derive(Parser, Debug)]
#[command(
    name = "bidsman",
    about = "Entity-aware file management for BIDS datasets",
    version
)]
pub struct Cli {
    /// Show detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Preview changes without touching files
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rename structured files with entity-aware transformations
    Rename(RenameArgs),
    /// Copy events/physio recordings into the matching scan directories
    Import(ImportArgs),
    /// Edit JSON sidecar fields across the dataset
    Json(JsonArgs),
    /// Zero out gzip header metadata (MTIME, embedded filename)
    Scrub(ScrubArgs),
}

/// Filters shared by tree-walking commands.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Only touch files from a specific session (plain or zero-padded)
    #[arg(long = "ses")]
    pub session: Option<String>,

    /// Restrict to a particular modality folder
    #[arg(long, value_enum)]
    pub modality: Option<Modality>,

    /// Glob pattern applied to filenames
    #[arg(long = "file")]
    pub filename: Option<String>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Path to the dataset root
    #[arg(short, long)]
    pub root: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Remove exact substrings from filenames before validation
    #[arg(long = "remove-substring", value_name = "TEXT")]
    pub remove_substrings: Vec<String>,

    /// String replacements in OLD:NEW form (applied before entity ops)
    #[arg(long = "replace", value_name = "OLD:NEW")]
    pub replacements: Vec<String>,

    /// Set or add entity values in KEY=VALUE form
    #[arg(long = "set-entity", value_name = "KEY=VALUE")]
    pub set_entities: Vec<String>,

    /// Remove entire entities (e.g. acq)
    #[arg(long = "remove-entity", value_name = "KEY")]
    pub remove_entities: Vec<String>,

    /// Disable copying originals to sourcedata/backup before renaming
    #[arg(long)]
    pub no_backup: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory containing new events/physio files
    #[arg(short, long)]
    pub source: PathBuf,

    /// Path to the dataset root
    #[arg(short, long)]
    pub root: PathBuf,

    /// Include *_events.tsv[.gz] (enabled by default if no type is given)
    #[arg(long)]
    pub events: bool,

    /// Include *_physio.tsv[.gz]
    #[arg(long)]
    pub physio: bool,

    /// Additional glob filter applied to filenames
    #[arg(long)]
    pub pattern: Option<String>,

    /// Session filter (e.g. 1 or 01)
    #[arg(long = "ses")]
    pub session: Option<String>,

    /// Subject filter (e.g. 01 or sub-01)
    #[arg(long = "sub")]
    pub subject: Option<String>,

    /// Minimum number of lines required for events files
    #[arg(long = "min-lines", default_value_t = crate::import::DEFAULT_MIN_EVENT_LINES)]
    pub min_lines: usize,

    /// Overwrite existing files at the target
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    /// Path to the dataset root
    #[arg(short, long)]
    pub root: PathBuf,

    /// Glob pattern selecting sidecar files
    #[arg(short, long, default_value = "*.json")]
    pub pattern: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Disable the .json.bak backup before saving
    #[arg(long)]
    pub no_backup: bool,

    #[command(subcommand)]
    pub command: JsonCommands,
}

#[derive(Subcommand, Debug)]
pub enum JsonCommands {
    /// Add a field to matching sidecars
    Add {
        /// Field name to add
        #[arg(long)]
        field: String,
        /// Field value (JSON, falling back to plain string)
        #[arg(long)]
        value: String,
        /// Replace the field if it already exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Remove a field from matching sidecars
    Remove {
        /// Field name to remove
        #[arg(long)]
        field: String,
    },
    /// Modify the value of an existing field
    Modify {
        /// Field name to modify
        #[arg(long)]
        field: String,
        /// New field value (JSON, falling back to plain string)
        #[arg(long)]
        value: String,
        /// Create the field when it is missing
        #[arg(long)]
        create: bool,
    },
    /// Replace a substring inside string values of a field
    Replace {
        /// Field name to search in
        #[arg(long)]
        field: String,
        /// String to search for
        #[arg(long)]
        search: String,
        /// Replacement string
        #[arg(long)]
        replace: String,
    },
    /// List all unique field names
    List,
    /// Check that every matching sidecar parses
    Validate,
}

#[derive(Args, Debug)]
pub struct ScrubArgs {
    /// Path to the dataset root (searched recursively)
    #[arg(short, long)]
    pub root: PathBuf,

    /// Modality folder to restrict scrubbing to
    #[arg(long, value_enum, default_value = "func")]
    pub modality: Modality,
}

/// Parse a `OLD:NEW` replacement spec.
///
/// # Errors
/// Returns `BidsmanError::InvalidInput` when the `:` separator is missing.
pub fn parse_replace_spec(raw: &str) -> Result<(String, String), BidsmanError> {
    raw.split_once(':')
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .ok_or_else(|| {
            BidsmanError::InvalidInput(format!(
                "Invalid replace specification '{raw}'. Use OLD:NEW format"
            ))
        })
}

/// Parse a `KEY=VALUE` entity assignment.
///
/// # Errors
/// Returns `BidsmanError::InvalidInput` when the `=` separator is missing.
pub fn parse_entity_assignment(raw: &str) -> Result<(String, String), BidsmanError> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| {
            BidsmanError::InvalidInput(format!(
                "Invalid entity assignment '{raw}'. Use KEY=VALUE format"
            ))
        })
}
