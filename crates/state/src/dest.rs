//! Snapshots of what the destination filesystem currently holds.

use std::path::{Path, PathBuf};

use vfs::{FileType, Mutator, Reader};

use crate::error::StateError;
use crate::{ApplyError, ContentsError, LazyContents, LazyLinkname, Sha256Sum};

/// The destination state of one path: what is actually on disk right now.
///
/// Built from a single `symlink_metadata` call; file contents and symlink
/// targets are fetched through the reader only when asked for and cached
/// thereafter.
#[derive(Debug)]
pub enum DestEntry {
    /// Nothing exists at the path.
    Absent {
        /// The absent path.
        path: PathBuf,
    },
    /// A directory.
    Dir {
        /// The directory's path.
        path: PathBuf,
        /// Its 9-bit permissions.
        mode: u32,
    },
    /// A regular file.
    File(DestFile),
    /// A symbolic link.
    Symlink(DestSymlink),
}

/// A regular file in the destination state.
#[derive(Debug)]
pub struct DestFile {
    path: PathBuf,
    mode: u32,
    contents: LazyContents<'static>,
}

/// A symlink in the destination state.
#[derive(Debug)]
pub struct DestSymlink {
    path: PathBuf,
    linkname: LazyLinkname<'static>,
}

impl DestEntry {
    /// Snapshots `path` through `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnsupportedFileType`] if the path holds
    /// something other than a regular file, directory, or symlink.
    pub fn read<R: Reader>(reader: &R, path: &Path) -> Result<Self, StateError> {
        let Some(metadata) = reader
            .symlink_metadata(path)
            .map_err(|error| StateError::io(path, error))?
        else {
            return Ok(Self::Absent {
                path: path.to_path_buf(),
            });
        };
        match metadata.file_type {
            FileType::File => Ok(Self::File(DestFile {
                path: path.to_path_buf(),
                mode: metadata.permissions,
                contents: LazyContents::new_unfilled(),
            })),
            FileType::Dir => Ok(Self::Dir {
                path: path.to_path_buf(),
                mode: metadata.permissions,
            }),
            FileType::Symlink => Ok(Self::Symlink(DestSymlink {
                path: path.to_path_buf(),
                linkname: LazyLinkname::new_unfilled(),
            })),
            FileType::Other => Err(StateError::UnsupportedFileType {
                path: path.to_path_buf(),
                raw_mode: metadata.raw_mode,
            }),
        }
    }

    /// The path this entry describes.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Absent { path } | Self::Dir { path, .. } => path,
            Self::File(file) => &file.path,
            Self::Symlink(symlink) => &symlink.path,
        }
    }

    /// Removes the entry from the destination. Removing an absent entry is a
    /// no-op.
    pub fn remove<M: Mutator>(&self, mutator: &mut M) -> Result<(), ApplyError> {
        match self {
            Self::Absent { .. } => Ok(()),
            _ => mutator
                .remove_all(self.path())
                .map_err(|error| ApplyError::io(self.path(), error)),
        }
    }
}

impl DestFile {
    /// The file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's 9-bit permissions at snapshot time.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// The file's contents, read through `reader` on first access.
    pub fn contents<R: Reader>(&mut self, reader: &R) -> Result<&[u8], ContentsError> {
        let Self { path, contents, .. } = self;
        contents.contents_with(|| {
            reader
                .read_file(path)
                .map_err(|error| ContentsError::io(path, error))
        })
    }

    /// The SHA-256 of the file's contents, read through `reader` on first
    /// access.
    pub fn contents_sha256<R: Reader>(&mut self, reader: &R) -> Result<Sha256Sum, ContentsError> {
        let Self { path, contents, .. } = self;
        contents.sha256_with(|| {
            reader
                .read_file(path)
                .map_err(|error| ContentsError::io(path, error))
        })
    }
}

impl DestSymlink {
    /// The symlink's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The symlink's target, read through `reader` on first access.
    pub fn linkname<R: Reader>(&mut self, reader: &R) -> Result<&str, ContentsError> {
        let Self { path, linkname } = self;
        linkname.linkname_with(|| {
            reader
                .read_link(path)
                .map_err(|error| ContentsError::io(path, error))
        })
    }
}
