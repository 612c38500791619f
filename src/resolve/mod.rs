//! Tiered matching of auxiliary files to their functional scan
//!
//! Resolution policy, in order: an exact `(sub, ses, task, run)` hit is
//! authoritative; a unique per-task candidate is a convenience default when
//! no run was given; a unique run-less candidate is a warned fallback for
//! datasets that never labeled runs.

use thiserror::Error;

use crate::index::{ReferenceEntry, ReferenceIndex};
use crate::output::Reporter;

/// Placeholder shown for candidates that carry no run label.
pub const NO_RUN_LABEL: &str = "<none>";

/// Resolution failures, each carrying enough context to fix the input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(
        "no bold reference found for subject {subject}, session {}, task {task}",
        .session.as_deref().unwrap_or("N/A")
    )]
    NoReference {
        subject: String,
        session: Option<String>,
        task: String,
    },
    #[error(
        "multiple runs found; include run-<label> in the filename. Available runs: {}",
        .runs.join(", ")
    )]
    AmbiguousRun { runs: Vec<String> },
    #[error(
        "no bold reference with run {run} found for subject {subject}, session {}, task {task}",
        .session.as_deref().unwrap_or("N/A")
    )]
    NoRunMatch {
        subject: String,
        session: Option<String>,
        task: String,
        run: String,
    },
}

/// Normalized lookup key of one auxiliary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxKey {
    pub subject: String,
    pub session: Option<String>,
    pub task: String,
    pub run: Option<String>,
}

/// Locate the reference scan an auxiliary file belongs to.
///
/// # Errors
/// * `ResolveError::NoReference` when no scan shares the subject/session/task.
/// * `ResolveError::AmbiguousRun` when no run was given but several runs exist.
/// * `ResolveError::NoRunMatch` when the requested run matches nothing and no
///   unique run-less fallback exists.
pub fn resolve<'a>(
    index: &'a ReferenceIndex,
    key: &AuxKey,
    reporter: &Reporter,
) -> Result<&'a ReferenceEntry, ResolveError> {
    if let Some(run) = &key.run {
        let exact_key = (
            key.subject.clone(),
            key.session.clone(),
            key.task.clone(),
            Some(run.clone()),
        );
        if let Some(entry) = index.exact(&exact_key) {
            return Ok(entry);
        }
    }

    let task_key = (key.subject.clone(), key.session.clone(), key.task.clone());
    let candidates = index
        .task_candidates(&task_key)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ResolveError::NoReference {
            subject: key.subject.clone(),
            session: key.session.clone(),
            task: key.task.clone(),
        })?;

    let Some(run) = &key.run else {
        if let [(_, only)] = candidates {
            return Ok(only);
        }
        return Err(ResolveError::AmbiguousRun {
            runs: candidates
                .iter()
                .map(|(r, _)| r.clone().unwrap_or_else(|| NO_RUN_LABEL.to_string()))
                .collect(),
        });
    };

    if let Some((_, entry)) = candidates.iter().find(|(r, _)| r.as_deref() == Some(run)) {
        return Ok(entry);
    }

    let mut run_less = candidates.iter().filter(|(r, _)| r.is_none());
    match (run_less.next(), run_less.next()) {
        (Some((_, entry)), None) => {
            reporter.warn(format!(
                "using bold reference without run label for run {run}; \
                 consider relabelling the dataset"
            ));
            Ok(entry)
        }
        _ => Err(ResolveError::NoRunMatch {
            subject: key.subject.clone(),
            session: key.session.clone(),
            task: key.task.clone(),
            run: run.clone(),
        }),
    }
}
