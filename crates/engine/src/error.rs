//! Error types for source-state loading and reconciliation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors from reading a source tree or reconciling it against a
/// destination.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Two source paths resolve to the same target path.
    #[error("{target_name}: duplicate target ({}, {})", .first.display(), .second.display())]
    DuplicateTarget {
        /// The contested target path.
        target_name: String,
        /// The source path catalogued first.
        first: PathBuf,
        /// The source path encountered second.
        second: PathBuf,
    },

    /// Snapshotting a path failed or found an unsupported file type.
    #[error(transparent)]
    State(#[from] state::StateError),

    /// Applying a target entry failed.
    #[error(transparent)]
    Apply(#[from] state::ApplyError),

    /// A lazy contents or linkname producer failed.
    #[error(transparent)]
    Contents(#[from] state::ContentsError),

    /// A template failed to parse or render.
    #[error("{}: {source}", .path.display())]
    Template {
        /// The template's source path.
        path: PathBuf,
        /// The engine failure.
        #[source]
        source: Box<minijinja::Error>,
    },

    /// A `.chezmoiversion` file did not hold a valid semantic version.
    #[error("{}: {source}", .path.display())]
    Version {
        /// The version file's path.
        path: PathBuf,
        /// The parse failure.
        #[source]
        source: semver::Error,
    },

    /// A source file that must be text was not valid UTF-8.
    #[error("{}: not valid UTF-8", .path.display())]
    NotUtf8 {
        /// The offending path.
        path: PathBuf,
    },

    /// A source file is marked encrypted but no encryption is configured.
    #[error("{}: encrypted source but no encryption configured", .path.display())]
    EncryptionUnavailable {
        /// The encrypted source path.
        path: PathBuf,
    },

    /// The filesystem failed underneath an engine operation.
    #[error("{}: {source}", .path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn template(path: impl Into<PathBuf>, source: minijinja::Error) -> Self {
        Self::Template {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
