//! Console reporting for CLI operations
//!
//! This module provides the reporter sink used by every command (message,
//! severity, dry-run prefix) and the summary structure that collects
//! per-file outcomes for the final report.

use colored::Colorize;
use std::path::{Path, PathBuf};

/// Message severity for console reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Console sink for progress messages.
///
/// Info messages are only shown in verbose mode and carry a `[DRY-RUN]`
/// prefix while previewing; warnings and errors are always shown on stderr.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    verbose: bool,
    dry_run: bool,
}

impl Reporter {
    #[must_use]
    pub const fn new(verbose: bool, dry_run: bool) -> Self {
        Self { verbose, dry_run }
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Emit a message at the given severity.
    pub fn log(&self, message: &str, level: Level) {
        match level {
            Level::Info => {
                if !self.verbose {
                    return;
                }
                if self.dry_run {
                    println!("{} {message}", "[DRY-RUN]".yellow());
                } else {
                    println!("{message}");
                }
            }
            Level::Warning => eprintln!("{} {message}", "[WARNING]".yellow()),
            Level::Error => eprintln!("{} {message}", "[ERROR]".red()),
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(message.as_ref(), Level::Info);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(message.as_ref(), Level::Warning);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(message.as_ref(), Level::Error);
    }
}

/// Outcome counts for one top-level operation.
///
/// Skips and errors keep the offending path and a reason so callers can
/// build any presentation they need from the raw collections.
#[derive(Debug, Default)]
pub struct OpSummary {
    pub processed: usize,
    pub skipped: Vec<(PathBuf, String)>,
    pub errors: Vec<(PathBuf, String)>,
}

impl OpSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn add_processed(&mut self) {
        self.processed += 1;
    }

    pub fn add_skip(&mut self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.skipped.push((path.into(), reason.into()));
    }

    pub fn add_error(&mut self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.errors.push((path.into(), reason.into()));
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Print the summary block in the standard format.
    pub fn print(&self, operation: &str, dry_run: bool) {
        println!("\n{}", format!("=== {operation} Summary ===").bold());
        println!("  {} {}", "✓ Processed:".green(), self.processed);
        if !self.skipped.is_empty() {
            println!("  {} {}", "⊘ Skipped:".yellow(), self.skipped.len());
            for (path, reason) in &self.skipped {
                println!("    - {}: {reason}", display_name(path));
            }
        }
        if !self.errors.is_empty() {
            println!("  {} {}", "✗ Errors:".red(), self.errors.len());
            for (path, reason) in &self.errors {
                println!("    - {}: {reason}", display_name(path));
            }
        }
        if dry_run {
            println!("  {}", "(dry-run mode: no files were changed)".yellow());
        }
    }
}

fn display_name(path: &Path) -> String {
    path.display().to_string()
}
