//! Error types shared by the state machinery.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// A memoisable error from a contents or linkname producer.
///
/// Producers run at most once, so their failure has to be returned on every
/// subsequent access; the shared allocation makes the cached error cheap to
/// clone.
#[derive(Clone, Debug)]
pub struct ContentsError {
    inner: Arc<dyn Error + Send + Sync + 'static>,
}

impl ContentsError {
    /// Wraps an arbitrary error.
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::new(PathIoError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Display for ContentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl Error for ContentsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }
}

/// An I/O error annotated with the offending path.
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct PathIoError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

/// Errors from snapshotting a destination path.
#[derive(Debug, Error)]
pub enum StateError {
    /// The path exists but is neither a regular file, a directory, nor a
    /// symlink.
    #[error("{}: unsupported file type (mode 0o{raw_mode:o})", .path.display())]
    UnsupportedFileType {
        /// The offending path.
        path: PathBuf,
        /// The raw platform mode word.
        raw_mode: u32,
    },
    /// The underlying filesystem failed.
    #[error(transparent)]
    Io(#[from] PathIoError),
}

impl StateError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io(PathIoError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors from applying or comparing a target entry.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A filesystem mutation or read failed.
    #[error(transparent)]
    Io(#[from] PathIoError),
    /// A contents or linkname producer failed.
    #[error(transparent)]
    Contents(#[from] ContentsError),
}

impl ApplyError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io(PathIoError {
            path: path.to_path_buf(),
            source,
        })
    }
}
