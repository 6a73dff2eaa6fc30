//! Core types shared across the splice-hook library
//!
//! This module defines the error type, the crate-wide `Result` alias and the
//! small value types that flow between the event bus, the cache store and the
//! interception controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Result type for splice-hook operations
pub type Result<T> = std::result::Result<T, SpliceError>;

/// Errors that can occur inside the pipeline
///
/// Duplicate suppression in the cache is NOT an error; it is reported through
/// [`CacheOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Marker must not be empty")]
    EmptyMarker,

    #[error("Host unavailable: {0}")]
    HostUnavailable(String),
}

impl SpliceError {
    /// Wrap an I/O error together with the path it occurred on
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpliceError::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Result of trying to add a script to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheOutcome {
    /// Script persisted and recorded in memory
    Stored,
    /// A script with the same index is already cached for the resource
    DuplicateIndex,
    /// An existing script at another index already contains this payload
    DuplicatePayload,
}

impl CacheOutcome {
    /// Boolean view: true only when the script was newly stored
    pub fn is_stored(&self) -> bool {
        matches!(self, CacheOutcome::Stored)
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOutcome::Stored => write!(f, "stored"),
            CacheOutcome::DuplicateIndex => write!(f, "duplicate index"),
            CacheOutcome::DuplicatePayload => write!(f, "duplicate payload"),
        }
    }
}

/// Lifecycle phase of a resource as seen by the interception controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourcePhase {
    /// No event observed yet
    Unseen,
    /// Still inside the framework-internal loads that precede user content
    BeforeOffset,
    /// Eligible for caching and injection
    Active,
    /// The global injection already happened; only caching and filtering remain
    Done,
}

impl fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePhase::Unseen => write!(f, "Unseen"),
            ResourcePhase::BeforeOffset => write!(f, "BeforeOffset"),
            ResourcePhase::Active => write!(f, "Active"),
            ResourcePhase::Done => write!(f, "Done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_outcome_bool_view() {
        assert!(CacheOutcome::Stored.is_stored());
        assert!(!CacheOutcome::DuplicateIndex.is_stored());
        assert!(!CacheOutcome::DuplicatePayload.is_stored());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CacheOutcome::DuplicatePayload), "duplicate payload");
        assert_eq!(format!("{}", ResourcePhase::BeforeOffset), "BeforeOffset");
        let err = SpliceError::HostUnavailable("no resources".to_string());
        assert_eq!(err.to_string(), "Host unavailable: no resources");
    }
}
