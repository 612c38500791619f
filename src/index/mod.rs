//! Reference indexing of functional scans
//!
//! Scans a dataset tree for bold runs and builds the two lookup structures
//! the match resolver works against: an exact `(sub, ses, task, run)` index
//! and a relaxed per-task index that keeps every run in scan order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entity::split_extensions;
use crate::output::Reporter;

/// Trailing suffix of a primary scan's base name.
pub const BOLD_SUFFIX: &str = "_bold";
/// Extension chain of a primary scan.
pub const BOLD_EXTENSION: &str = ".nii.gz";

/// One functional scan discovered under the dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Base name with the trailing `_bold` suffix removed; auxiliary files
    /// matched to this scan are named `<base>_<suffix>.<ext>`.
    pub base: String,
    /// Directory holding the scan, where auxiliary files belong.
    pub target_dir: PathBuf,
}

/// Full lookup key: subject, session, task, run (session/run optional).
pub type ExactKey = (String, Option<String>, String, Option<String>);
/// Relaxed lookup key: subject, session, task.
pub type TaskKey = (String, Option<String>, String);

/// Lookup structures for every bold run under one dataset root.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    exact: HashMap<ExactKey, ReferenceEntry>,
    by_task: HashMap<TaskKey, Vec<(Option<String>, ReferenceEntry)>>,
}

impl ReferenceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the dataset root and index every `*_bold.nii.gz` file.
    ///
    /// Scans without a task entity or a `sub-*` path component are skipped
    /// silently. Duplicate exact keys are surfaced as a warning; the
    /// last-scanned entry wins.
    #[must_use]
    pub fn scan(dataset_root: &Path, reporter: &Reporter) -> Self {
        let mut index = Self::new();

        let walker = WalkDir::new(dataset_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file());

        for entry in walker {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !name.ends_with("_bold.nii.gz") {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dataset_root) else {
                continue;
            };
            if relative.components().count() < 3 {
                continue;
            }

            let parts: Vec<&str> = relative
                .iter()
                .filter_map(|part| part.to_str())
                .collect();
            let Some(subject) = parts
                .iter()
                .find_map(|part| part.strip_prefix("sub-"))
            else {
                continue;
            };
            let session_dir = parts.iter().find_map(|part| part.strip_prefix("ses-"));

            let (base, _) = split_extensions(name);
            let entities = lenient_entities(base);
            let Some(task) = entities.get("task") else {
                continue;
            };

            let session = normalize_label(
                entities
                    .get("ses")
                    .map(String::as_str)
                    .or(session_dir),
            );
            let run = normalize_label(entities.get("run").map(String::as_str));

            let reference = ReferenceEntry {
                base: base.strip_suffix(BOLD_SUFFIX).unwrap_or(base).to_string(),
                target_dir: entry.path().parent().unwrap_or(dataset_root).to_path_buf(),
            };

            index.insert(
                subject.to_string(),
                session,
                task.clone(),
                run,
                reference,
                reporter,
            );
        }

        index
    }

    /// Record one reference under both lookup structures.
    pub fn insert(
        &mut self,
        subject: String,
        session: Option<String>,
        task: String,
        run: Option<String>,
        reference: ReferenceEntry,
        reporter: &Reporter,
    ) {
        let exact_key = (subject.clone(), session.clone(), task.clone(), run.clone());
        if let Some(previous) = self.exact.insert(exact_key, reference.clone()) {
            reporter.warn(format!(
                "duplicate bold reference for subject {subject}, session {}, task {task}, run {}: \
                 keeping {}, discarding {}",
                session.as_deref().unwrap_or("N/A"),
                run.as_deref().unwrap_or("N/A"),
                reference.base,
                previous.base,
            ));
        }

        self.by_task
            .entry((subject, session, task))
            .or_default()
            .push((run, reference));
    }

    #[must_use]
    pub fn exact(&self, key: &ExactKey) -> Option<&ReferenceEntry> {
        self.exact.get(key)
    }

    #[must_use]
    pub fn task_candidates(&self, key: &TaskKey) -> Option<&[(Option<String>, ReferenceEntry)]> {
        self.by_task.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }

    /// Number of indexed scans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_task.values().map(Vec::len).sum()
    }
}

/// Entity extraction that tolerates stray segments; used only for reference
/// scans, which are trusted input.
fn lenient_entities(base: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    for segment in base.split('_') {
        if let Some((key, value)) = segment.split_once('-')
            && !key.is_empty()
            && !value.is_empty()
        {
            entities.insert(key.to_string(), value.to_string());
        }
    }
    entities
}

/// Map zero-padded numeric labels to their unpadded form so `01` and `1`
/// compare equal. Non-numeric labels pass through unchanged.
#[must_use]
pub fn normalize_label(value: Option<&str>) -> Option<String> {
    value.map(|label| {
        if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
            let trimmed = label.trim_start_matches('0');
            if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        } else {
            label.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_numeric_labels() {
        assert_eq!(normalize_label(Some("01")), Some("1".to_string()));
        assert_eq!(normalize_label(Some("000")), Some("0".to_string()));
        assert_eq!(normalize_label(Some("12")), Some("12".to_string()));
        assert_eq!(normalize_label(Some("pre")), Some("pre".to_string()));
        assert_eq!(normalize_label(None), None);
    }

    #[test]
    fn lenient_extraction_skips_stray_segments() {
        let entities = lenient_entities("sub-01_task-rest_sbref_bold");
        assert_eq!(entities.get("task"), Some(&"rest".to_string()));
        assert!(!entities.contains_key("sbref"));
    }

    #[test]
    fn insert_populates_both_structures() {
        let reporter = Reporter::new(false, false);
        let mut index = ReferenceIndex::new();
        let entry = ReferenceEntry {
            base: "sub-01_task-rest_run-1".into(),
            target_dir: PathBuf::from("sub-01/func"),
        };
        index.insert(
            "01".into(),
            None,
            "rest".into(),
            Some("1".into()),
            entry.clone(),
            &reporter,
        );

        let exact_key = ("01".to_string(), None, "rest".to_string(), Some("1".to_string()));
        assert_eq!(index.exact(&exact_key), Some(&entry));
        let task_key = ("01".to_string(), None, "rest".to_string());
        assert_eq!(index.task_candidates(&task_key).unwrap().len(), 1);
        assert_eq!(index.len(), 1);
    }
}
