//! A call-logging wrapper.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::quote::command_line;
use crate::{DirEntry, EntryMetadata, Mutator, Reader};

const SLOW_CALL: Duration = Duration::from_secs(1);

/// A [`Mutator`] wrapper that logs every call, its outcome, and its duration
/// through [`tracing`].
///
/// Calls that take longer than one second are reported at `warn` level.
#[derive(Debug)]
pub struct DebugFs<M> {
    inner: M,
}

impl<M> DebugFs<M> {
    /// Wraps `inner` in a logging shell.
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    /// Unwraps the adapter, returning the wrapped filesystem.
    pub fn into_inner(self) -> M {
        self.inner
    }
}

fn logged<T>(call: &str, f: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    match &result {
        Ok(_) => debug!(target: "dotsync::fs", %call, ?elapsed),
        Err(error) => debug!(target: "dotsync::fs", %call, ?elapsed, %error),
    }
    if elapsed > SLOW_CALL {
        warn!(target: "dotsync::fs", %call, ?elapsed, "slow filesystem call");
    }
    result
}

impl<M: Reader> Reader for DebugFs<M> {
    fn symlink_metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        logged(&format!("symlink_metadata({})", path.display()), || {
            self.inner.symlink_metadata(path)
        })
    }

    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        logged(&format!("metadata({})", path.display()), || {
            self.inner.metadata(path)
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        logged(&format!("read_dir({})", path.display()), || {
            self.inner.read_dir(path)
        })
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        logged(&format!("read_file({})", path.display()), || {
            self.inner.read_file(path)
        })
    }

    fn read_link(&self, path: &Path) -> io::Result<String> {
        logged(&format!("read_link({})", path.display()), || {
            self.inner.read_link(path)
        })
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        logged(&format!("glob({pattern})"), || self.inner.glob(pattern))
    }
}

impl<M: Mutator> Mutator for DebugFs<M> {
    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        logged(&format!("chmod({}, 0o{mode:o})", path.display()), || {
            self.inner.chmod(path, mode)
        })
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        logged(&format!("create_dir({}, 0o{mode:o})", path.display()), || {
            self.inner.create_dir(path, mode)
        })
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        logged(&format!("remove_all({})", path.display()), || {
            self.inner.remove_all(path)
        })
    }

    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        logged(
            &format!("rename({}, {})", from.display(), to.display()),
            || self.inner.rename(from, to),
        )
    }

    fn write_file(
        &mut self,
        path: &Path,
        data: &[u8],
        mode: u32,
        prev_data: Option<&[u8]>,
    ) -> io::Result<()> {
        logged(
            &format!("write_file({}, {}B, 0o{mode:o})", path.display(), data.len()),
            || self.inner.write_file(path, data, mode, prev_data),
        )
    }

    fn write_symlink(&mut self, target: &str, path: &Path) -> io::Result<()> {
        logged(
            &format!("write_symlink({target}, {})", path.display()),
            || self.inner.write_symlink(target, path),
        )
    }

    fn run_command(&mut self, command: &mut Command) -> io::Result<()> {
        logged(&format!("run_command({})", command_line(command)), || {
            self.inner.run_command(command)
        })
    }

    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>> {
        logged(
            &format!("idempotent_command_output({})", command_line(command)),
            || self.inner.idempotent_command_output(command),
        )
    }
}
