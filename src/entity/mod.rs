//! Structured filename codec
//!
//! BIDS filenames are a `_`-separated list of `key-value` entity pairs
//! followed by a suffix and an extension chain, e.g.
//! `sub-01_ses-02_task-rest_run-1_bold.nii.gz`. This module parses such
//! names into an ordered [`EntityMap`], rebuilds them after mutation, and
//! normalizes separator runs so a rebuilt name always re-parses.

pub mod error;
mod map;

pub use error::EntityError;
pub use map::{CANONICAL_ENTITY_ORDER, EntityMap, order_index};

use regex::Regex;
use std::sync::LazyLock;

static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static pattern"));
static SEPARATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static pattern"));

pub(crate) fn is_alphanumeric(text: &str) -> bool {
    ALPHANUMERIC.is_match(text)
}

/// Split a filename into its base name and full extension chain, e.g.
/// `sub-01_bold.nii.gz` into `("sub-01_bold", ".nii.gz")`. Leading dots
/// belong to the base name.
#[must_use]
pub fn split_extensions(name: &str) -> (&str, &str) {
    let stem = name.trim_start_matches('.');
    let offset = name.len() - stem.len();
    match stem.find('.') {
        Some(dot) => name.split_at(offset + dot),
        None => (name, ""),
    }
}

/// Parse a base name (extensions already stripped) into its entity map and
/// trailing suffix. The source order of entities is preserved.
///
/// # Errors
/// * `EntityError::EmptyName` when nothing remains after splitting.
/// * `EntityError::MissingSeparator` when a non-final segment has no `-`.
/// * `EntityError::InvalidPair` when a key or value is empty.
/// * `EntityError::MissingEntity` when the `sub` entity is absent.
pub fn parse_base(base: &str) -> Result<(EntityMap, String), EntityError> {
    let segments: Vec<&str> = base.split('_').filter(|s| !s.is_empty()).collect();
    let Some((suffix, entity_segments)) = segments.split_last() else {
        return Err(EntityError::EmptyName);
    };

    let mut pairs = Vec::with_capacity(entity_segments.len());
    for segment in entity_segments {
        let Some((key, value)) = segment.split_once('-') else {
            return Err(EntityError::MissingSeparator {
                segment: (*segment).to_string(),
            });
        };
        if key.is_empty() || value.is_empty() {
            return Err(EntityError::InvalidPair {
                segment: (*segment).to_string(),
            });
        }
        pairs.push((key.to_string(), value.to_string()));
    }

    let entities = EntityMap::from_parsed(pairs);
    if !entities.contains("sub") {
        return Err(EntityError::MissingEntity {
            entity: "sub".to_string(),
        });
    }
    Ok((entities, (*suffix).to_string()))
}

/// Rebuild a base name from an entity map and suffix, validating every key,
/// value, and the suffix against the alphanumeric pattern.
///
/// # Errors
/// Returns `EntityError::InvalidKey`, `EntityError::InvalidValue`, or
/// `EntityError::InvalidSuffix` when a component fails the pattern.
pub fn build_base(entities: &EntityMap, suffix: &str) -> Result<String, EntityError> {
    if !is_alphanumeric(suffix) {
        return Err(EntityError::InvalidSuffix {
            suffix: suffix.to_string(),
        });
    }

    let mut segments = Vec::with_capacity(entities.len() + 1);
    for (key, value) in entities.iter() {
        if !is_alphanumeric(key) {
            return Err(EntityError::InvalidKey {
                key: key.to_string(),
            });
        }
        if !is_alphanumeric(value) {
            return Err(EntityError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        segments.push(format!("{key}-{value}"));
    }
    segments.push(suffix.to_string());
    Ok(segments.join("_"))
}

/// Collapse separator runs and trim leading/trailing separators, so any
/// mutated name stays canonical and re-parseable.
#[must_use]
pub fn normalize_base(base: &str) -> String {
    SEPARATOR_RUN
        .replace_all(base, "_")
        .trim_matches('_')
        .to_string()
}

/// End-to-end validation of a finished base name: it must parse and every
/// component must satisfy the alphanumeric pattern.
///
/// # Errors
/// Propagates the first parse or pattern failure found.
pub fn validate_base(base: &str) -> Result<(), EntityError> {
    let (entities, suffix) = parse_base(base)?;
    build_base(&entities, &suffix).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_extension_chain() {
        assert_eq!(
            split_extensions("sub-01_task-rest_bold.nii.gz"),
            ("sub-01_task-rest_bold", ".nii.gz")
        );
        assert_eq!(split_extensions("sub-01_events.tsv"), ("sub-01_events", ".tsv"));
        assert_eq!(split_extensions("no_extension"), ("no_extension", ""));
        assert_eq!(split_extensions(".hidden"), (".hidden", ""));
    }

    #[test]
    fn parses_entities_and_suffix() {
        let (entities, suffix) = parse_base("sub-01_ses-02_task-rest_bold").unwrap();
        assert_eq!(suffix, "bold");
        assert_eq!(entities.get("sub"), Some("01"));
        assert_eq!(entities.get("ses"), Some("02"));
        assert_eq!(entities.get("task"), Some("rest"));
    }

    #[test]
    fn parse_rejects_malformed_names() {
        assert_eq!(parse_base(""), Err(EntityError::EmptyName));
        assert_eq!(parse_base("___"), Err(EntityError::EmptyName));
        assert!(matches!(
            parse_base("sub-01_nodash_bold"),
            Err(EntityError::MissingSeparator { .. })
        ));
        assert!(matches!(
            parse_base("sub-01_acq-_bold"),
            Err(EntityError::InvalidPair { .. })
        ));
        assert!(matches!(
            parse_base("ses-01_task-rest_bold"),
            Err(EntityError::MissingEntity { .. })
        ));
    }

    #[test]
    fn parse_ignores_collapsed_separators() {
        let (entities, suffix) = parse_base("sub-01__task-rest__bold").unwrap();
        assert_eq!(suffix, "bold");
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn build_validates_components() {
        let (entities, _) = parse_base("sub-01_task-rest_bold").unwrap();
        assert!(matches!(
            build_base(&entities, "bold.nii"),
            Err(EntityError::InvalidSuffix { .. })
        ));

        let (bad, suffix) = parse_base("sub-0;1_task-rest_bold").unwrap();
        assert!(matches!(
            build_base(&bad, &suffix),
            Err(EntityError::InvalidValue { .. })
        ));
    }

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize_base("_sub-01__task-rest_bold_"), "sub-01_task-rest_bold");
        assert_eq!(normalize_base("sub-01_bold"), "sub-01_bold");
    }

    #[test]
    fn round_trip_is_stable() {
        for name in [
            "sub-01_ses-02_task-rest_run-1_bold",
            "sub-01_task-nback_events",
            "sub-9_recording-cardiac_physio",
            "sub-01__task-rest_bold",
        ] {
            let (entities, suffix) = parse_base(name).unwrap();
            let rebuilt = build_base(&entities, &suffix).unwrap();
            assert_eq!(normalize_base(&rebuilt), normalize_base(name));
        }
    }

    #[test]
    fn validate_flags_invalid_characters_anywhere() {
        assert!(validate_base("sub-01_task-rest_bold").is_ok());
        assert!(validate_base("sub-01_task-re.st_bold").is_err());
        assert!(validate_base("nodash").is_err());
    }
}
