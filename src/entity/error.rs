use thiserror::Error;

/// Errors produced while parsing, mutating, or rebuilding structured names
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// Nothing left after stripping extensions and separators
    #[error("empty filename")]
    EmptyName,
    /// A non-final segment has no key-value separator
    #[error("segment '{segment}' is missing '-' separator")]
    MissingSeparator { segment: String },
    /// A segment splits into an empty key or value
    #[error("invalid entity expression '{segment}'")]
    InvalidPair { segment: String },
    /// A required entity is absent
    #[error("filename is missing required '{entity}' entity")]
    MissingEntity { entity: String },
    /// An entity value fails the alphanumeric pattern
    #[error("entity '{key}' value '{value}' contains invalid characters")]
    InvalidValue { key: String, value: String },
    /// An entity key fails the alphanumeric pattern
    #[error("entity key '{key}' contains invalid characters")]
    InvalidKey { key: String },
    /// The trailing suffix fails the alphanumeric pattern
    #[error("suffix '{suffix}' contains invalid characters")]
    InvalidSuffix { suffix: String },
    /// Attempt to remove the mandatory subject entity
    #[error("cannot remove mandatory 'sub' entity")]
    ProtectedEntity,
    /// An entity assignment with a blank value
    #[error("entity '{entity}' requires a non-empty value")]
    EmptyValue { entity: String },
}
