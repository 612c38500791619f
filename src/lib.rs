//! Bidsman - entity-aware file management for BIDS neuroimaging datasets
//!
//! This library parses BIDS-style structured filenames into ordered entity
//! maps, matches auxiliary recordings (events, physio) to the functional
//! scan they describe, and plans and executes collision-checked batches of
//! file moves. Around that core it carries the dataset chores the
//! command-line tool exposes: JSON sidecar editing and gzip header
//! scrubbing.

use thiserror::Error;

pub mod cli;
pub mod config;
pub mod entity;
pub mod import;
pub mod index;
pub mod mover;
pub mod output;
pub mod rename;
pub mod resolve;
pub mod scrub;
pub mod sidecar;

/// Error enum, contains all failure states of the program
#[derive(Debug, Error)]
pub enum BidsmanError {
    /// Structured-name parse or rebuild failure
    #[error("Name error: {0}")]
    Name(#[from] entity::EntityError),
    /// Auxiliary file could not be matched to a reference scan
    #[error("Match error: {0}")]
    Resolve(#[from] resolve::ResolveError),
    /// Batch validation or execution failure
    #[error("Move error: {0}")]
    Move(#[from] mover::MoveError),
    /// Gzip header parse failure
    #[error("Scrub error: {0}")]
    Scrub(#[from] scrub::ScrubError),
    /// Invalid glob pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Represents an I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
