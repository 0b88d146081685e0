#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `vfs` abstracts the filesystem operations that dotsync's reconciler
//! performs, splitting them into a read-only capability ([`Reader`]) and a
//! mutating capability ([`Mutator`]). The reconciler is written once against
//! [`Mutator`]; swapping the concrete adapter turns the same pass into a real
//! apply, a dry run, a diff, or a TAR archive.
//!
//! # Design
//!
//! The adapter tower is a set of value-holding wrappers, not a class
//! hierarchy:
//!
//! - [`OsFs`] performs real filesystem operations, writing files atomically
//!   through a same-directory temporary and a rename.
//! - [`DryRun`] passes reads through and turns every mutation into a
//!   successful no-op.
//! - [`EmptyReader`] answers every read with "does not exist"; it anchors
//!   adapters whose reads are meaningless.
//! - [`TarWriter`] emits a TAR header per mutation instead of touching disk.
//! - [`Canary`] delegates everything and records whether any mutating call
//!   was made.
//! - [`DebugFs`] delegates everything, logging each call and its duration.
//! - [`Verbose`] delegates everything, printing a shell-like line per
//!   mutation and a unified diff for textual file writes.
//!
//! # Invariants
//!
//! - `write_file` leaves the destination with exactly the requested mode,
//!   whether or not the file previously existed.
//! - `remove_all` is recursive and succeeds on an absent path.
//! - `read_dir` returns entries sorted by name so traversal order is
//!   deterministic across platforms.
//!
//! # Errors
//!
//! All operations surface [`std::io::Error`]. Adapters that reject a call
//! outright (for example [`TarWriter::chmod`](Mutator::chmod)) report
//! [`std::io::ErrorKind::PermissionDenied`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

mod canary;
mod debug;
mod dry_run;
mod empty;
mod os;
mod quote;
mod tar_writer;
mod verbose;

pub use canary::Canary;
pub use debug::DebugFs;
pub use dry_run::DryRun;
pub use empty::EmptyReader;
pub use os::OsFs;
pub use tar_writer::{TarHeaderTemplate, TarWriter};
pub use verbose::Verbose;

/// The kind of filesystem object a metadata snapshot describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    /// A regular file.
    File,
    /// A directory.
    Dir,
    /// A symbolic link.
    Symlink,
    /// Anything else (socket, device, fifo, …).
    Other,
}

/// A point-in-time snapshot of one path's metadata.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntryMetadata {
    /// What kind of object the path is.
    pub file_type: FileType,
    /// The 9-bit permission word.
    pub permissions: u32,
    /// Length in bytes (meaningful for regular files).
    pub len: u64,
    /// The raw platform mode word, for diagnostics. Zero where the platform
    /// has none.
    pub raw_mode: u32,
}

impl EntryMetadata {
    /// Builds a snapshot from standard-library metadata.
    #[must_use]
    pub fn from_std(metadata: &std::fs::Metadata) -> Self {
        let file_type = {
            let ft = metadata.file_type();
            if ft.is_file() {
                FileType::File
            } else if ft.is_dir() {
                FileType::Dir
            } else if ft.is_symlink() {
                FileType::Symlink
            } else {
                FileType::Other
            }
        };
        #[cfg(unix)]
        let (permissions, raw_mode) = {
            use std::os::unix::fs::MetadataExt;
            (metadata.mode() & 0o777, metadata.mode())
        };
        #[cfg(not(unix))]
        let (permissions, raw_mode) = {
            let perm = if metadata.permissions().readonly() {
                0o444
            } else {
                0o666
            };
            (perm, 0)
        };
        Self {
            file_type,
            permissions,
            len: metadata.len(),
            raw_mode,
        }
    }
}

/// A directory child as reported by [`Reader::read_dir`].
#[derive(Clone, Debug)]
pub struct DirEntry {
    /// The child's base name.
    pub file_name: String,
    /// The child's metadata, taken without following symlinks.
    pub metadata: EntryMetadata,
}

/// Read-only filesystem capability.
pub trait Reader {
    /// Returns metadata for `path` without following a final symlink, or
    /// `None` if the path does not exist.
    fn symlink_metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>>;

    /// Returns metadata for `path`, following symlinks, or `None` if the path
    /// does not exist.
    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>>;

    /// Returns the children of the directory at `path`, sorted by name.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Returns the contents of the file at `path`.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Returns the target of the symlink at `path`.
    fn read_link(&self, path: &Path) -> io::Result<String>;

    /// Expands a shell-style glob pattern against the filesystem, returning
    /// matching paths sorted lexicographically.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;
}

/// Mutating filesystem capability.
///
/// Everything the reconciler needs to drive a destination towards a target
/// state. Implementations may record, simulate, or describe mutations instead
/// of performing them.
pub trait Mutator: Reader {
    /// Sets the permissions of `path` to exactly `mode`.
    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()>;

    /// Creates the directory at `path` with exactly `mode`.
    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()>;

    /// Removes `path` and, if it is a directory, everything beneath it.
    /// Succeeds if `path` does not exist.
    fn remove_all(&mut self, path: &Path) -> io::Result<()>;

    /// Renames `from` to `to`.
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()>;

    /// Writes `data` to `path` with exactly `mode`, replacing any existing
    /// file. `prev_data` carries the previous contents for the benefit of
    /// diff-emitting wrappers; implementations must not rely on its accuracy.
    fn write_file(
        &mut self,
        path: &Path,
        data: &[u8],
        mode: u32,
        prev_data: Option<&[u8]>,
    ) -> io::Result<()>;

    /// Creates or replaces the symlink at `path` pointing at `target`.
    fn write_symlink(&mut self, target: &str, path: &Path) -> io::Result<()>;

    /// Runs `command` to completion with inherited stdio, failing on a
    /// non-zero exit status.
    fn run_command(&mut self, command: &mut Command) -> io::Result<()>;

    /// Runs `command` and captures its stdout. The command is assumed to be
    /// side-effect free; observing wrappers may treat it as a read.
    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>>;
}
