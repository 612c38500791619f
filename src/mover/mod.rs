//! Collision-checked execution of planned file moves
//!
//! Batches are validated as a whole before anything touches the filesystem;
//! execution is then one file at a time with independent success/failure and
//! no rollback of already-moved files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::output::{OpSummary, Reporter};

/// Relative directory that receives pre-move copies of originals.
pub const BACKUP_DIR: &str = "sourcedata/backup";

/// Batch validation and execution failures
#[derive(Debug, Error)]
pub enum MoveError {
    /// Two distinct sources want the same destination
    #[error("multiple files want to move to {}", .target.display())]
    DuplicateTarget { target: PathBuf },
    /// A destination already exists on disk
    #[error("target {} already exists", .target.display())]
    TargetExists { target: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One source → destination pair, both relative to the dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl PlannedMove {
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.source == self.dest
    }
}

/// Validate a whole batch before any filesystem mutation.
///
/// # Errors
/// * `MoveError::DuplicateTarget` when two distinct sources share a
///   destination.
/// * `MoveError::TargetExists` when a destination exists on disk and is not
///   that move's own source (the exemption covers case-insensitive
///   filesystems, where a case-only rename sees itself at the target).
pub fn verify_batch(root: &Path, moves: &[PlannedMove]) -> Result<(), MoveError> {
    let mut targets: HashMap<&Path, &Path> = HashMap::new();
    for mv in moves.iter().filter(|m| !m.is_noop()) {
        if let Some(previous) = targets.insert(mv.dest.as_path(), mv.source.as_path())
            && previous != mv.source.as_path()
        {
            return Err(MoveError::DuplicateTarget {
                target: mv.dest.clone(),
            });
        }
    }

    for mv in moves.iter().filter(|m| !m.is_noop()) {
        let target = root.join(&mv.dest);
        if target.exists() && root.join(&mv.source) != target {
            return Err(MoveError::TargetExists {
                target: mv.dest.clone(),
            });
        }
    }

    Ok(())
}

/// Execute a validated batch one move at a time.
///
/// A failing move is recorded and execution continues; already-moved files
/// stay moved. With `backup` set, each original is copied under
/// [`BACKUP_DIR`] (mirroring its relative path) before the move.
pub fn execute_batch(
    root: &Path,
    moves: &[PlannedMove],
    backup: bool,
    reporter: &Reporter,
    summary: &mut OpSummary,
) {
    let pending: Vec<&PlannedMove> = moves.iter().filter(|m| !m.is_noop()).collect();
    if pending.is_empty() {
        reporter.info("No files needed renaming");
        return;
    }

    for mv in pending {
        if reporter.is_dry_run() {
            reporter.info(format!(
                "Would rename {} -> {}",
                mv.source.display(),
                mv.dest.display()
            ));
            summary.add_processed();
            continue;
        }

        match move_one(root, mv, backup) {
            Ok(()) => {
                summary.add_processed();
                reporter.info(format!(
                    "Renamed {} -> {}",
                    mv.source.display(),
                    mv.dest.display()
                ));
            }
            Err(err) => {
                reporter.error(format!("Failed to rename {}: {err}", mv.source.display()));
                summary.add_error(mv.source.clone(), err.to_string());
            }
        }
    }
}

fn move_one(root: &Path, mv: &PlannedMove, backup: bool) -> Result<(), MoveError> {
    let source = root.join(&mv.source);
    let dest = root.join(&mv.dest);

    if backup {
        backup_file(root, &mv.source)?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&source, &dest)?;
    Ok(())
}

/// Copy one original into the backup area, mirroring its relative path.
///
/// # Errors
/// Propagates filesystem errors from directory creation or the copy.
pub fn backup_file(root: &Path, relative: &Path) -> Result<(), MoveError> {
    let backup_path = root.join(BACKUP_DIR).join(relative);
    if let Some(parent) = backup_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(root.join(relative), backup_path)?;
    Ok(())
}

/// Outcome of a single-file placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The file was copied (or would be, in dry-run mode)
    Copied,
    /// The target already exists and overwrite was off
    SkippedExisting,
}

/// Place one file at an absolute target path, honoring overwrite and
/// dry-run. Used by flows whose destinations are keyed by unique source
/// attributes and therefore need no batch-wide collision check.
///
/// # Errors
/// Propagates filesystem errors from stale-target removal, directory
/// creation, or the copy.
pub fn copy_into_place(
    source: &Path,
    target: &Path,
    overwrite: bool,
    reporter: &Reporter,
) -> Result<CopyOutcome, MoveError> {
    if target.exists() && !overwrite {
        return Ok(CopyOutcome::SkippedExisting);
    }

    if reporter.is_dry_run() {
        reporter.info(format!(
            "Would copy {} -> {}",
            source.display(),
            target.display()
        ));
        return Ok(CopyOutcome::Copied);
    }

    if target.exists() {
        fs::remove_file(target)?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    reporter.info(format!(
        "Copied {} -> {}",
        source.display(),
        target.display()
    ));
    Ok(CopyOutcome::Copied)
}
