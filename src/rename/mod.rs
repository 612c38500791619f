//! Entity-aware batch renaming
//!
//! Renaming works on base names, never on individual files: all
//! extension-sharing siblings of one base (a data file and its sidecars)
//! are grouped and renamed as a unit so they keep the identical new base.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{DatasetFilter, RunConfig};
use crate::entity::{self, EntityError};
use crate::mover::{self, PlannedMove};
use crate::output::{OpSummary, Reporter};

/// Requested transformations, applied in a fixed phase order: raw substring
/// removals, raw replacements, entity removals, entity assignments.
#[derive(Debug, Clone, Default)]
pub struct RenameRequest {
    pub remove_substrings: Vec<String>,
    pub replacements: Vec<(String, String)>,
    pub remove_entities: Vec<String>,
    pub set_entities: Vec<(String, String)>,
}

impl RenameRequest {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove_substrings.is_empty()
            && self.replacements.is_empty()
            && self.remove_entities.is_empty()
            && self.set_entities.is_empty()
    }

    /// Reject configuration mistakes up front, before any file is touched.
    /// These would fail identically on every file, so they abort the run
    /// rather than producing one error per group.
    ///
    /// # Errors
    /// * `EntityError::ProtectedEntity` when `sub` is slated for removal.
    /// * `EntityError::EmptyValue` for a blank assignment value.
    /// * `EntityError::InvalidValue` for a non-alphanumeric assignment value.
    pub fn validate(&self) -> Result<(), EntityError> {
        if self.remove_entities.iter().any(|e| e == "sub") {
            return Err(EntityError::ProtectedEntity);
        }
        for (key, value) in &self.set_entities {
            let mut probe = entity::EntityMap::new();
            probe.set(key, value)?;
        }
        Ok(())
    }

    /// Apply the full mutation pipeline to one base name and return the
    /// normalized result.
    ///
    /// # Errors
    /// Propagates parse and rebuild failures from the codec; the final name
    /// is re-validated end-to-end.
    pub fn transform(&self, base: &str) -> Result<String, EntityError> {
        let mut updated = base.to_string();
        for removal in &self.remove_substrings {
            updated = updated.replace(removal.as_str(), "");
        }
        for (old, new) in &self.replacements {
            updated = updated.replace(old.as_str(), new.as_str());
        }

        let (mut entities, suffix) = entity::parse_base(&updated)?;
        for name in &self.remove_entities {
            entities.remove(name)?;
        }
        for (name, value) in &self.set_entities {
            entities.set(name, value)?;
        }

        let rebuilt = entity::build_base(&entities, &suffix)?;
        let normalized = entity::normalize_base(&rebuilt);
        entity::validate_base(&normalized)?;
        Ok(normalized)
    }
}

/// Extension-sharing siblings of one base name in one directory.
type FileGroups = BTreeMap<(PathBuf, String), Vec<PathBuf>>;

/// Walk the tree and group candidate files by (parent, stripped base).
/// The backup area is never touched.
fn find_file_groups(root: &Path, filter: &DatasetFilter) -> FileGroups {
    let mut groups = FileGroups::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    for entry in walker {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if relative.starts_with(mover::BACKUP_DIR) {
            continue;
        }
        if !filter.matches(relative) {
            continue;
        }
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let (base, _) = entity::split_extensions(name);
        let parent = relative.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        groups
            .entry((parent, base.to_string()))
            .or_default()
            .push(relative.to_path_buf());
    }

    groups
}

/// Compute the rename batch for one tree. Per-group transformation
/// failures are recorded in the summary and planning continues.
pub fn plan_renames(
    root: &Path,
    request: &RenameRequest,
    filter: &DatasetFilter,
    reporter: &Reporter,
    summary: &mut OpSummary,
) -> Vec<PlannedMove> {
    let groups = find_file_groups(root, filter);
    let total_files: usize = groups.values().map(Vec::len).sum();
    reporter.info(format!(
        "Identified {} base groups covering {total_files} files",
        groups.len()
    ));

    let mut moves = Vec::new();
    for ((parent, base), files) in &groups {
        let new_base = match request.transform(base) {
            Ok(name) => name,
            Err(err) => {
                let group_path = parent.join(base);
                reporter.error(format!("Skipping {}: {err}", group_path.display()));
                summary.add_error(group_path, err.to_string());
                continue;
            }
        };

        if new_base == *base {
            continue;
        }

        for relative in files {
            let name = relative
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let (_, extensions) = entity::split_extensions(name);
            moves.push(PlannedMove::new(
                relative.clone(),
                parent.join(format!("{new_base}{extensions}")),
            ));
        }
    }

    moves
}

/// Plan, collision-check, and execute a rename over one dataset tree.
///
/// # Errors
/// * `crate::BidsmanError::InvalidInput` when the root does not exist.
/// * Request validation failures ([`RenameRequest::validate`]).
/// * Batch collision failures from [`mover::verify_batch`]; the batch is
///   aborted before any filesystem mutation.
pub fn rename_tree(
    root: &Path,
    request: &RenameRequest,
    filter: &DatasetFilter,
    backup: bool,
    config: RunConfig,
) -> Result<OpSummary, crate::BidsmanError> {
    if !root.is_dir() {
        return Err(crate::BidsmanError::InvalidInput(format!(
            "Directory not found: {}",
            root.display()
        )));
    }
    request.validate()?;

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut summary = OpSummary::new();
    let moves = plan_renames(root, request, filter, &reporter, &mut summary);
    mover::verify_batch(root, &moves)?;
    mover::execute_batch(root, &moves, backup, &reporter, &mut summary);
    Ok(summary)
}
