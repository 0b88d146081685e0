//! A diff-emitting wrapper.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use similar::TextDiff;

use crate::quote::{command_line, quote_path, shell_quote};
use crate::{DirEntry, EntryMetadata, Mutator, Reader};

/// A [`Mutator`] wrapper that narrates mutations as pseudo shell commands.
///
/// `write_file` additionally prints a unified diff of the previous contents
/// against the new contents when both sides are text and neither exceeds the
/// configured size threshold. Reads pass through silently.
pub struct Verbose<M, W> {
    inner: M,
    out: W,
    max_diff_len: usize,
}

impl<M, W: Write> Verbose<M, W> {
    /// Wraps `inner`, narrating into `out`. `max_diff_len` bounds the size of
    /// file contents that still get a printed diff; zero disables the bound.
    #[must_use]
    pub fn new(inner: M, out: W, max_diff_len: usize) -> Self {
        Self {
            inner,
            out,
            max_diff_len,
        }
    }

    /// Unwraps the adapter, returning the wrapped filesystem and the writer.
    pub fn into_parts(self) -> (M, W) {
        (self.inner, self.out)
    }

    fn narrate(&mut self, action: &str, result: &io::Result<()>) {
        match result {
            Ok(()) => {
                let _ = writeln!(self.out, "{action}");
            }
            Err(error) => {
                let _ = writeln!(self.out, "{action}: {error}");
            }
        }
    }

    fn print_diff(&mut self, path: &Path, prev_data: &[u8], data: &[u8]) {
        if self.max_diff_len != 0
            && (prev_data.len() > self.max_diff_len || data.len() > self.max_diff_len)
        {
            return;
        }
        let (Ok(old), Ok(new)) = (std::str::from_utf8(prev_data), std::str::from_utf8(data))
        else {
            return;
        };
        if old.contains('\0') || new.contains('\0') {
            return;
        }
        let relative = path
            .strip_prefix(Path::new("/"))
            .unwrap_or(path)
            .to_path_buf();
        let diff = TextDiff::from_lines(old, new);
        let _ = write!(
            self.out,
            "{}",
            diff.unified_diff()
                .context_radius(3)
                .header(
                    &Path::new("a").join(&relative).display().to_string(),
                    &Path::new("b").join(&relative).display().to_string(),
                )
        );
    }
}

impl<M: Reader, W> Reader for Verbose<M, W> {
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

impl<M: Mutator, W: Write> Mutator for Verbose<M, W> {
    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        let action = format!("chmod {mode:o} {}", quote_path(path));
        let result = self.inner.chmod(path, mode);
        self.narrate(&action, &result);
        result
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        let action = format!("mkdir -m {mode:o} {}", quote_path(path));
        let result = self.inner.create_dir(path, mode);
        self.narrate(&action, &result);
        result
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        let action = format!("rm -rf {}", quote_path(path));
        let result = self.inner.remove_all(path);
        self.narrate(&action, &result);
        result
    }

    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        let action = format!("mv {} {}", quote_path(from), quote_path(to));
        let result = self.inner.rename(from, to);
        self.narrate(&action, &result);
        result
    }

    fn write_file(
        &mut self,
        path: &Path,
        data: &[u8],
        mode: u32,
        prev_data: Option<&[u8]>,
    ) -> io::Result<()> {
        let action = format!("install -m {mode:o} /dev/null {}", quote_path(path));
        let result = self.inner.write_file(path, data, mode, prev_data);
        self.narrate(&action, &result);
        if result.is_ok() {
            self.print_diff(path, prev_data.unwrap_or_default(), data);
        }
        result
    }

    fn write_symlink(&mut self, target: &str, path: &Path) -> io::Result<()> {
        let action = format!("ln -sf {} {}", shell_quote(target), quote_path(path));
        let result = self.inner.write_symlink(target, path);
        self.narrate(&action, &result);
        result
    }

    fn run_command(&mut self, command: &mut Command) -> io::Result<()> {
        let action = command_line(command);
        let result = self.inner.run_command(command);
        self.narrate(&action, &result);
        result
    }

    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>> {
        let action = command_line(command);
        let result = self.inner.idempotent_command_output(command);
        if let Err(error) = &result {
            let _ = writeln!(self.out, "{action}: {error}");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DryRun, OsFs};

    fn verbose() -> Verbose<DryRun<OsFs>, Vec<u8>> {
        Verbose::new(DryRun::new(OsFs::new()), Vec::new(), 0)
    }

    #[test]
    fn mutations_are_narrated() {
        let mut fs_impl = verbose();
        fs_impl.chmod(Path::new("/tmp/f"), 0o644).unwrap();
        fs_impl.remove_all(Path::new("/tmp/g h")).unwrap();
        let (_, out) = fs_impl.into_parts();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("chmod 644 /tmp/f"));
        assert!(out.contains("rm -rf '/tmp/g h'"));
    }

    #[test]
    fn text_writes_print_a_unified_diff() {
        let mut fs_impl = verbose();
        fs_impl
            .write_file(
                Path::new("/home/user/.profile"),
                b"one\ntwo changed\nthree\n",
                0o644,
                Some(b"one\ntwo\nthree\n"),
            )
            .unwrap();
        let (_, out) = fs_impl.into_parts();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("--- a/home/user/.profile"));
        assert!(out.contains("+++ b/home/user/.profile"));
        assert!(out.contains("-two"));
        assert!(out.contains("+two changed"));
    }

    #[test]
    fn binary_writes_skip_the_diff() {
        let mut fs_impl = verbose();
        fs_impl
            .write_file(Path::new("/f"), &[0u8, 159, 146], 0o644, Some(b"text"))
            .unwrap();
        let (_, out) = fs_impl.into_parts();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("install -m 644"));
        assert!(!out.contains("+++"));
    }

    #[test]
    fn oversized_writes_skip_the_diff() {
        let mut fs_impl = Verbose::new(DryRun::new(OsFs::new()), Vec::new(), 4);
        fs_impl
            .write_file(Path::new("/f"), b"longer than four", 0o644, Some(b"hi"))
            .unwrap();
        let (_, out) = fs_impl.into_parts();
        assert!(!String::from_utf8(out).unwrap().contains("+++"));
    }
}
