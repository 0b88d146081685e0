//! A reader over nothing at all.

use std::io;
use std::path::{Path, PathBuf};

use crate::{DirEntry, EntryMetadata, Reader};

/// A [`Reader`] that reports every path as absent.
///
/// Adapters whose reads are meaningless, such as [`TarWriter`](crate::TarWriter),
/// embed this so a reconciliation pass sees an empty destination and emits a
/// creation for every catalogued target.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyReader;

impl EmptyReader {
    /// Creates a new empty reader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn not_exist(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
}

impl Reader for EmptyReader {
    fn symlink_metadata(&self, _path: &Path) -> io::Result<Option<EntryMetadata>> {
        Ok(None)
    }

    fn metadata(&self, _path: &Path) -> io::Result<Option<EntryMetadata>> {
        Ok(None)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        Err(not_exist(path))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        Err(not_exist(path))
    }

    fn read_link(&self, path: &Path) -> io::Result<String> {
        Err(not_exist(path))
    }

    fn glob(&self, _pattern: &str) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_absent() {
        let reader = EmptyReader::new();
        assert!(reader.symlink_metadata(Path::new("/x")).unwrap().is_none());
        assert!(reader.metadata(Path::new("/x")).unwrap().is_none());
        assert!(reader.read_file(Path::new("/x")).is_err());
        assert!(reader.read_dir(Path::new("/x")).is_err());
        assert!(reader.read_link(Path::new("/x")).is_err());
        assert!(reader.glob("/x/*").unwrap().is_empty());
    }
}
