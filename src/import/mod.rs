//! Import of auxiliary recordings into a dataset
//!
//! Copies events and physio files from a staging directory into the
//! modality directory of the functional scan they describe, matched through
//! the reference index and the tiered resolver.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use glob::Pattern;
use thiserror::Error;
use walkdir::WalkDir;

use flate2::read::GzDecoder;

use crate::config::{RunConfig, session_variants};
use crate::entity::{self, EntityError, EntityMap};
use crate::index::{ReferenceIndex, normalize_label};
use crate::mover::{self, CopyOutcome};
use crate::output::{OpSummary, Reporter};
use crate::resolve::{self, AuxKey};

/// Minimum data lines an events file must carry to be worth importing.
pub const DEFAULT_MIN_EVENT_LINES: usize = 6;

/// Category of an auxiliary recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKind {
    Events,
    Physio,
}

impl AuxKind {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Physio => "physio",
        }
    }
}

/// Classification failures for candidate files
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The trailing suffix names neither an events nor a physio recording
    #[error("not an events or physio file")]
    UnsupportedSuffix { suffix: String },
    /// The events or physio file lacks the task entity
    #[error("filename is missing required 'task' entity")]
    MissingTask,
    #[error(transparent)]
    Name(#[from] EntityError),
}

/// A parsed auxiliary file waiting for placement.
#[derive(Debug, Clone)]
pub struct AuxFile {
    pub path: PathBuf,
    pub kind: AuxKind,
    pub entities: EntityMap,
    pub gzipped: bool,
}

impl AuxFile {
    /// Normalized lookup key for the resolver.
    #[must_use]
    pub fn key(&self) -> AuxKey {
        AuxKey {
            subject: self.entities.get("sub").unwrap_or_default().to_string(),
            session: normalize_label(self.entities.get("ses")),
            task: self.entities.get("task").unwrap_or_default().to_string(),
            run: normalize_label(self.entities.get("run")),
        }
    }
}

/// Import settings beyond the shared run configuration.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub include_events: bool,
    pub include_physio: bool,
    pub pattern: Option<Pattern>,
    pub session: Option<String>,
    pub subject: Option<String>,
    pub min_event_lines: usize,
    pub overwrite: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            include_events: true,
            include_physio: false,
            pattern: None,
            session: None,
            subject: None,
            min_event_lines: DEFAULT_MIN_EVENT_LINES,
            overwrite: false,
        }
    }
}

/// Classify one candidate file by name.
///
/// # Errors
/// * Codec failures from the strict parse.
/// * `ImportError::UnsupportedSuffix` for any suffix other than
///   `events`/`physio`.
/// * `ImportError::MissingTask` when the task entity is absent.
pub fn describe(path: &Path) -> Result<AuxFile, ImportError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let (base, extensions) = entity::split_extensions(name);
    let (entities, suffix) = entity::parse_base(base)?;

    let kind = match suffix.as_str() {
        "events" => AuxKind::Events,
        "physio" => AuxKind::Physio,
        _ => return Err(ImportError::UnsupportedSuffix { suffix }),
    };
    if !entities.contains("task") {
        return Err(ImportError::MissingTask);
    }

    Ok(AuxFile {
        path: path.to_path_buf(),
        kind,
        entities,
        gzipped: extensions.ends_with(".gz"),
    })
}

/// True when the file holds at least `min` lines; gzip-aware. Unreadable
/// files count as too short.
#[must_use]
pub fn has_min_lines(path: &Path, min: usize) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut count = 0;
    for chunk in BufReader::new(reader).split(b'\n') {
        if chunk.is_err() {
            return false;
        }
        count += 1;
        if count >= min {
            return true;
        }
    }
    false
}

/// Gather candidate files beneath the staging directory, sorted and
/// deduplicated, honoring the kind switches and the filename pattern.
fn collect_candidates(source: &Path, options: &ImportOptions) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let Some(name) = e.file_name().to_str() else {
                return false;
            };
            let events = name.ends_with("_events.tsv") || name.ends_with("_events.tsv.gz");
            let physio = name.ends_with("_physio.tsv") || name.ends_with("_physio.tsv.gz");
            (options.include_events && events) || (options.include_physio && physio)
        })
        .map(|e| e.into_path())
        .collect();
    candidates.sort();
    candidates.dedup();

    if let Some(pattern) = &options.pattern {
        candidates.retain(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| pattern.matches(name))
        });
    }
    candidates
}

/// True when the described file passes the subject/session filters. The
/// subject filter tolerates a `sub-` prefix.
fn passes_filters(file: &AuxFile, options: &ImportOptions) -> bool {
    if let Some(subject) = &options.subject {
        let wanted = subject.strip_prefix("sub-").unwrap_or(subject);
        if file.entities.get("sub") != Some(wanted) {
            return false;
        }
    }
    if let Some(session) = &options.session {
        let variants = session_variants(session);
        let matched = file
            .entities
            .get("ses")
            .is_some_and(|label| variants.iter().any(|v| v == label));
        if !matched {
            return false;
        }
    }
    true
}

/// Import every matching auxiliary file from `source` into `dataset_root`.
///
/// Per-file classification and resolution failures are recorded in the
/// summary and the loop continues; one bad file never aborts an import.
///
/// # Errors
/// Returns `crate::BidsmanError::InvalidInput` when either directory is
/// missing.
pub fn import_tree(
    source: &Path,
    dataset_root: &Path,
    options: &ImportOptions,
    config: RunConfig,
) -> Result<OpSummary, crate::BidsmanError> {
    for dir in [source, dataset_root] {
        if !dir.is_dir() {
            return Err(crate::BidsmanError::InvalidInput(format!(
                "Directory not found: {}",
                dir.display()
            )));
        }
    }

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut summary = OpSummary::new();

    let candidates = collect_candidates(source, options);
    if candidates.is_empty() {
        reporter.info("No matching files found in source directory");
        return Ok(summary);
    }
    reporter.info(format!("Found {} candidate files to import", candidates.len()));

    let index = ReferenceIndex::scan(dataset_root, &reporter);

    for path in candidates {
        let file = match describe(&path) {
            Ok(file) => file,
            Err(err) => {
                reporter.error(format!(
                    "Skipping {}: {err}",
                    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
                ));
                summary.add_error(path, err.to_string());
                continue;
            }
        };

        if !passes_filters(&file, options) {
            continue;
        }

        if file.kind == AuxKind::Events && !has_min_lines(&path, options.min_event_lines) {
            reporter.warn(format!(
                "Skipping {}: fewer than {} rows",
                path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
                options.min_event_lines
            ));
            summary.add_skip(path, "events file too short");
            continue;
        }

        let reference = match resolve::resolve(&index, &file.key(), &reporter) {
            Ok(reference) => reference,
            Err(err) => {
                reporter.error(format!(
                    "Skipping {}: {err}",
                    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
                ));
                summary.add_error(path, err.to_string());
                continue;
            }
        };

        let mut target_name = format!("{}_{}.tsv", reference.base, file.kind.suffix());
        if file.gzipped {
            target_name.push_str(".gz");
        }
        let target = reference.target_dir.join(&target_name);

        match mover::copy_into_place(&path, &target, options.overwrite, &reporter) {
            Ok(CopyOutcome::Copied) => summary.add_processed(),
            Ok(CopyOutcome::SkippedExisting) => {
                reporter.info(format!(
                    "Skipping {target_name}: target already exists (use --overwrite)"
                ));
                summary.add_skip(path.clone(), "already exists");
                continue;
            }
            Err(err) => {
                summary.add_error(path.clone(), err.to_string());
                continue;
            }
        }

        if file.kind == AuxKind::Physio {
            copy_physio_sidecar(&file, &reference.target_dir, &reference.base, options, &reporter);
        }
    }

    Ok(summary)
}

/// Copy the JSON companion of a physio recording alongside it, when one
/// exists next to the source file.
fn copy_physio_sidecar(
    file: &AuxFile,
    target_dir: &Path,
    base: &str,
    options: &ImportOptions,
    reporter: &Reporter,
) {
    let name = file
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let (source_base, _) = entity::split_extensions(name);
    let sidecar = file
        .path
        .with_file_name(format!("{source_base}.json"));

    if !sidecar.exists() {
        reporter.warn(format!("No JSON sidecar found for {name}"));
        return;
    }

    let target = target_dir.join(format!("{base}_physio.json"));
    match mover::copy_into_place(&sidecar, &target, options.overwrite, reporter) {
        Ok(CopyOutcome::Copied) => {}
        Ok(CopyOutcome::SkippedExisting) => reporter.info(format!(
            "Skipping JSON sidecar {}: target already exists",
            target.file_name().and_then(|n| n.to_str()).unwrap_or_default()
        )),
        Err(err) => reporter.error(format!("Failed to copy JSON sidecar for {name}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn describe_classifies_events_and_physio() {
        let events = describe(Path::new("sub-01_task-rest_run-1_events.tsv")).unwrap();
        assert_eq!(events.kind, AuxKind::Events);
        assert!(!events.gzipped);
        assert_eq!(events.entities.get("run"), Some("1"));

        let physio = describe(Path::new("sub-01_task-rest_physio.tsv.gz")).unwrap();
        assert_eq!(physio.kind, AuxKind::Physio);
        assert!(physio.gzipped);
    }

    #[test]
    fn describe_rejects_unrelated_and_incomplete_names() {
        assert!(matches!(
            describe(Path::new("sub-01_task-rest_bold.nii.gz")),
            Err(ImportError::UnsupportedSuffix { .. })
        ));
        assert!(matches!(
            describe(Path::new("sub-01_run-1_events.tsv")),
            Err(ImportError::MissingTask)
        ));
        assert!(matches!(
            describe(Path::new("task-rest_events.tsv")),
            Err(ImportError::Name(EntityError::MissingEntity { .. }))
        ));
    }

    #[test]
    fn aux_key_normalizes_session_and_run() {
        let file = describe(Path::new("sub-01_ses-02_task-rest_run-01_events.tsv")).unwrap();
        let key = file.key();
        assert_eq!(key.session.as_deref(), Some("2"));
        assert_eq!(key.run.as_deref(), Some("1"));
    }

    #[test]
    fn line_gate_counts_plain_and_gzipped_files() {
        let dir = TempDir::new().unwrap();

        let plain = dir.path().join("sub-01_task-a_events.tsv");
        std::fs::write(&plain, "onset\tduration\n1\t2\n3\t4\n").unwrap();
        assert!(has_min_lines(&plain, 3));
        assert!(!has_min_lines(&plain, 4));

        let gzipped = dir.path().join("sub-01_task-a_events.tsv.gz");
        let mut encoder = GzEncoder::new(
            std::fs::File::create(&gzipped).unwrap(),
            Compression::default(),
        );
        encoder.write_all(b"onset\n1\n2\n3\n4\n5\n").unwrap();
        encoder.finish().unwrap();
        assert!(has_min_lines(&gzipped, 6));
        assert!(!has_min_lines(&gzipped, 7));

        assert!(!has_min_lines(&dir.path().join("absent.tsv"), 1));
    }

    #[test]
    fn subject_filter_accepts_prefixed_spelling() {
        let file = describe(Path::new("sub-07_task-rest_events.tsv")).unwrap();
        let mut options = ImportOptions {
            subject: Some("sub-07".into()),
            ..Default::default()
        };
        assert!(passes_filters(&file, &options));
        options.subject = Some("07".into());
        assert!(passes_filters(&file, &options));
        options.subject = Some("08".into());
        assert!(!passes_filters(&file, &options));
    }
}
