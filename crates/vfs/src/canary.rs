//! A mutation detector.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{DirEntry, EntryMetadata, Mutator, Reader};

/// A [`Mutator`] wrapper that records whether any mutating call was made.
///
/// Wrapping an apply pass in a canary answers "did this change anything?"
/// without inspecting the filesystem afterwards; a second apply over an
/// already-reconciled destination must leave the canary untripped.
#[derive(Debug)]
pub struct Canary<M> {
    inner: M,
    mutated: bool,
}

impl<M> Canary<M> {
    /// Wraps `inner` with an untripped canary.
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            mutated: false,
        }
    }

    /// Reports whether any mutating method has been called.
    #[must_use]
    pub const fn mutated(&self) -> bool {
        self.mutated
    }

    /// Unwraps the adapter, returning the wrapped filesystem.
    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: Reader> Reader for Canary<M> {
    fn symlink_metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        self.inner.symlink_metadata(path)
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

impl<M: Mutator> Mutator for Canary<M> {
    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        self.mutated = true;
        self.inner.chmod(path, mode)
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        self.mutated = true;
        self.inner.create_dir(path, mode)
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        self.mutated = true;
        self.inner.remove_all(path)
    }

    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        self.mutated = true;
        self.inner.rename(from, to)
    }

    fn write_file(
        &mut self,
        path: &Path,
        data: &[u8],
        mode: u32,
        prev_data: Option<&[u8]>,
    ) -> io::Result<()> {
        self.mutated = true;
        self.inner.write_file(path, data, mode, prev_data)
    }

    fn write_symlink(&mut self, target: &str, path: &Path) -> io::Result<()> {
        self.mutated = true;
        self.inner.write_symlink(target, path)
    }

    fn run_command(&mut self, command: &mut Command) -> io::Result<()> {
        self.mutated = true;
        self.inner.run_command(command)
    }

    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>> {
        self.inner.idempotent_command_output(command)
    }
}
