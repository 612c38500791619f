//! JSON sidecar editing
//!
//! Sidecars are flat string-keyed JSON objects next to the data files they
//! describe. Editing is plain dictionary mutation; no entity semantics are
//! involved beyond the shared dataset filters used for discovery.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::BidsmanError;
use crate::config::{DatasetFilter, RunConfig};
use crate::output::{OpSummary, Reporter};

/// Discovery and save settings for sidecar operations.
#[derive(Debug, Clone)]
pub struct SidecarOptions {
    /// Filename pattern for discovery, `*.json` by default.
    pub pattern: Pattern,
    /// Move the original aside as `.json.bak` before saving.
    pub backup: bool,
}

impl Default for SidecarOptions {
    fn default() -> Self {
        Self {
            pattern: Pattern::new("*.json").expect("static pattern"),
            backup: true,
        }
    }
}

/// One dictionary mutation applied to every discovered sidecar.
#[derive(Debug, Clone)]
pub enum SidecarOp {
    /// Add a field, skipping files where it already exists unless
    /// overwriting
    Add {
        field: String,
        value: String,
        overwrite: bool,
    },
    /// Remove a field; absent fields are skips
    Remove { field: String },
    /// Change an existing field; absent fields are skips unless `create`
    Modify {
        field: String,
        value: String,
        create: bool,
    },
    /// Substring replacement inside string and string-array values
    ReplaceString {
        field: String,
        search: String,
        replace: String,
    },
}

/// What applying an op to one document amounted to.
enum Applied {
    Changed,
    Skipped(String),
}

/// Interpret a CLI value: JSON first, plain string as fallback.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Find sidecar files beneath the root, honoring the discovery pattern and
/// dataset filters, in sorted order.
fn find_sidecars(root: &Path, filter: &DatasetFilter, pattern: &Pattern) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        })
        .filter(|e| {
            e.path()
                .strip_prefix(root)
                .is_ok_and(|relative| filter.matches(relative))
        })
        .map(|e| e.into_path())
        .collect()
}

fn load(path: &Path) -> Result<Map<String, Value>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Error reading file: {e}"))?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid JSON: {e}"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("Not a JSON object".to_string()),
    }
}

fn save(
    path: &Path,
    data: &Map<String, Value>,
    backup: bool,
    reporter: &Reporter,
) -> Result<(), String> {
    if reporter.is_dry_run() {
        reporter.info(format!("Would save changes to {}", path.display()));
        return Ok(());
    }

    if backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        fs::rename(path, &backup_path).map_err(|e| format!("Error creating backup: {e}"))?;
    }
    let text =
        serde_json::to_string_pretty(data).map_err(|e| format!("Error serializing: {e}"))?;
    fs::write(path, text).map_err(|e| format!("Error saving file: {e}"))
}

fn apply(op: &SidecarOp, data: &mut Map<String, Value>, reporter: &Reporter, path: &Path) -> Applied {
    match op {
        SidecarOp::Add {
            field,
            value,
            overwrite,
        } => {
            if data.contains_key(field) && !overwrite {
                return Applied::Skipped(format!(
                    "field '{field}' already exists (use --overwrite to replace)"
                ));
            }
            let parsed = parse_value(value);
            reporter.info(format!(
                "Setting '{field}' to {parsed} in {}",
                path.display()
            ));
            data.insert(field.clone(), parsed);
            Applied::Changed
        }
        SidecarOp::Remove { field } => match data.shift_remove(field) {
            Some(old) => {
                reporter.info(format!(
                    "Removing '{field}' (was {old}) from {}",
                    path.display()
                ));
                Applied::Changed
            }
            None => Applied::Skipped(format!("field '{field}' not found")),
        },
        SidecarOp::Modify {
            field,
            value,
            create,
        } => {
            if !data.contains_key(field) && !create {
                return Applied::Skipped(format!(
                    "field '{field}' not found (use --create to add missing fields)"
                ));
            }
            let parsed = parse_value(value);
            reporter.info(format!(
                "Setting '{field}' to {parsed} in {}",
                path.display()
            ));
            data.insert(field.clone(), parsed);
            Applied::Changed
        }
        SidecarOp::ReplaceString {
            field,
            search,
            replace,
        } => {
            let Some(value) = data.get_mut(field) else {
                return Applied::Skipped(format!("field '{field}' not found"));
            };
            let mut changed = false;
            match value {
                Value::String(text) => {
                    let updated = text.replace(search.as_str(), replace);
                    if updated != *text {
                        *text = updated;
                        changed = true;
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::String(text) = item {
                            let updated = text.replace(search.as_str(), replace);
                            if updated != *text {
                                *text = updated;
                                changed = true;
                            }
                        }
                    }
                }
                _ => {}
            }
            if changed {
                Applied::Changed
            } else {
                Applied::Skipped(format!("no occurrence of '{search}' in '{field}'"))
            }
        }
    }
}

/// Apply one mutation across every matching sidecar.
///
/// # Errors
/// Returns `BidsmanError::InvalidInput` when the root does not exist;
/// per-file load/save failures are recorded in the summary instead.
pub fn edit_sidecars(
    root: &Path,
    op: &SidecarOp,
    filter: &DatasetFilter,
    options: &SidecarOptions,
    config: RunConfig,
) -> Result<OpSummary, BidsmanError> {
    if !root.is_dir() {
        return Err(BidsmanError::InvalidInput(format!(
            "Directory not found: {}",
            root.display()
        )));
    }

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut summary = OpSummary::new();

    for path in find_sidecars(root, filter, &options.pattern) {
        let mut data = match load(&path) {
            Ok(data) => data,
            Err(reason) => {
                reporter.error(format!("{}: {reason}", path.display()));
                summary.add_error(path, reason);
                continue;
            }
        };

        match apply(op, &mut data, &reporter, &path) {
            Applied::Changed => match save(&path, &data, options.backup, &reporter) {
                Ok(()) => summary.add_processed(),
                Err(reason) => {
                    reporter.error(format!("{}: {reason}", path.display()));
                    summary.add_error(path, reason);
                }
            },
            Applied::Skipped(reason) => {
                reporter.info(format!("Skipping {}: {reason}", path.display()));
                summary.add_skip(path, reason);
            }
        }
    }

    Ok(summary)
}

/// Collect the sorted set of field names across every matching sidecar.
///
/// # Errors
/// Returns `BidsmanError::InvalidInput` when the root does not exist.
pub fn list_fields(
    root: &Path,
    filter: &DatasetFilter,
    options: &SidecarOptions,
    config: RunConfig,
) -> Result<BTreeSet<String>, BidsmanError> {
    if !root.is_dir() {
        return Err(BidsmanError::InvalidInput(format!(
            "Directory not found: {}",
            root.display()
        )));
    }

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut fields = BTreeSet::new();
    for path in find_sidecars(root, filter, &options.pattern) {
        match load(&path) {
            Ok(data) => fields.extend(data.keys().cloned()),
            Err(reason) => reporter.error(format!("{}: {reason}", path.display())),
        }
    }
    Ok(fields)
}

/// Parse-check every matching sidecar: valid files count as processed,
/// failures as errors.
///
/// # Errors
/// Returns `BidsmanError::InvalidInput` when the root does not exist.
pub fn validate_sidecars(
    root: &Path,
    filter: &DatasetFilter,
    options: &SidecarOptions,
    config: RunConfig,
) -> Result<OpSummary, BidsmanError> {
    if !root.is_dir() {
        return Err(BidsmanError::InvalidInput(format!(
            "Directory not found: {}",
            root.display()
        )));
    }

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut summary = OpSummary::new();
    for path in find_sidecars(root, filter, &options.pattern) {
        match load(&path) {
            Ok(_) => summary.add_processed(),
            Err(reason) => {
                reporter.error(format!("{}: {reason}", path.display()));
                summary.add_error(path, reason);
            }
        }
    }
    Ok(summary)
}
