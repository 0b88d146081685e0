//! A mutator that pretends every write succeeded.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{DirEntry, EntryMetadata, Mutator, Reader};

/// A [`Mutator`] that passes reads through to the wrapped filesystem and
/// turns every mutation into a successful no-op.
///
/// `symlink_metadata` resolves through the wrapped filesystem's `metadata`,
/// so a path that is a symlink reports what it points at, emulating the state
/// the destination would be in had earlier writes actually happened.
#[derive(Debug)]
pub struct DryRun<M> {
    inner: M,
}

impl<M> DryRun<M> {
    /// Wraps `inner` in a dry-run shell.
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    /// Unwraps the adapter, returning the wrapped filesystem.
    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: Reader> Reader for DryRun<M> {
    fn symlink_metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        self.inner.metadata(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        self.inner.metadata(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<String> {
        self.inner.read_link(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        self.inner.glob(pattern)
    }
}

impl<M: Mutator> Mutator for DryRun<M> {
    fn chmod(&mut self, _path: &Path, _mode: u32) -> io::Result<()> {
        Ok(())
    }

    fn create_dir(&mut self, _path: &Path, _mode: u32) -> io::Result<()> {
        Ok(())
    }

    fn remove_all(&mut self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn rename(&mut self, _from: &Path, _to: &Path) -> io::Result<()> {
        Ok(())
    }

    fn write_file(
        &mut self,
        _path: &Path,
        _data: &[u8],
        _mode: u32,
        _prev_data: Option<&[u8]>,
    ) -> io::Result<()> {
        Ok(())
    }

    fn write_symlink(&mut self, _target: &str, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn run_command(&mut self, _command: &mut Command) -> io::Result<()> {
        Ok(())
    }

    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>> {
        self.inner.idempotent_command_output(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OsFs;
    use std::fs;

    #[test]
    fn mutations_leave_the_filesystem_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file");
        fs::write(&path, b"before").unwrap();

        let mut dry = DryRun::new(OsFs::new());
        dry.write_file(&path, b"after", 0o644, None).unwrap();
        dry.remove_all(&path).unwrap();
        dry.create_dir(&dir.path().join("new"), 0o755).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"before");
        assert!(!dir.path().join("new").exists());
    }

    #[test]
    fn reads_pass_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file");
        fs::write(&path, b"data").unwrap();

        let dry = DryRun::new(OsFs::new());
        assert_eq!(dry.read_file(&path).unwrap(), b"data");
        assert!(dry.symlink_metadata(&path).unwrap().is_some());
    }
}
