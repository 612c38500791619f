//! Run configuration shared by all commands
//!
//! All settings are immutable values built from CLI flags and passed down
//! explicitly; there is no global state and no configuration file.

use clap::ValueEnum;
use glob::{Pattern, PatternError};
use std::path::Path;

/// Per-invocation settings threaded through every component.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    pub verbose: bool,
    pub dry_run: bool,
}

impl RunConfig {
    #[must_use]
    pub const fn new(verbose: bool, dry_run: bool) -> Self {
        Self { verbose, dry_run }
    }
}

/// Modality directories recognized inside a dataset.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Anat,
    Func,
    Dwi,
    Fmap,
    Perf,
    Meg,
    Eeg,
    Ieeg,
    Beh,
    Pet,
}

impl Modality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anat => "anat",
            Self::Func => "func",
            Self::Dwi => "dwi",
            Self::Fmap => "fmap",
            Self::Perf => "perf",
            Self::Meg => "meg",
            Self::Eeg => "eeg",
            Self::Ieeg => "ieeg",
            Self::Beh => "beh",
            Self::Pet => "pet",
        }
    }
}

/// Narrows an operation to a subset of the dataset tree.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    session: Option<String>,
    modality: Option<Modality>,
    filename: Option<Pattern>,
}

impl DatasetFilter {
    /// Build a filter from CLI arguments.
    ///
    /// # Errors
    /// Returns `PatternError` when the filename pattern does not compile.
    pub fn new(
        session: Option<String>,
        modality: Option<Modality>,
        filename: Option<&str>,
    ) -> Result<Self, PatternError> {
        let filename = filename.map(Pattern::new).transpose()?;
        Ok(Self {
            session,
            modality,
            filename,
        })
    }

    /// Check a dataset-relative path against every active filter.
    #[must_use]
    pub fn matches(&self, rel_path: &Path) -> bool {
        if let Some(session) = &self.session {
            let variants = session_variants(session);
            let found = rel_path.components().any(|part| {
                part.as_os_str()
                    .to_str()
                    .and_then(|p| p.strip_prefix("ses-"))
                    .is_some_and(|label| variants.iter().any(|v| v == label))
            });
            if !found {
                return false;
            }
        }

        if let Some(modality) = self.modality {
            let found = rel_path
                .components()
                .any(|part| part.as_os_str().to_str() == Some(modality.as_str()));
            if !found {
                return false;
            }
        }

        if let Some(pattern) = &self.filename {
            let name = rel_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !pattern.matches(name) {
                return false;
            }
        }

        true
    }
}

/// Plain and zero-padded spellings of a session label, so `1` matches
/// `ses-01` directories and vice versa.
#[must_use]
pub fn session_variants(session: &str) -> Vec<String> {
    let mut variants = vec![session.to_string()];
    if let Ok(number) = session.parse::<u32>() {
        let padded = format!("{number:02}");
        if !variants.contains(&padded) {
            variants.push(padded);
        }
    }
    variants
}
