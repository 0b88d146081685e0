//! The real-filesystem mutator.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use globset::GlobBuilder;

use crate::{DirEntry, EntryMetadata, FileType, Mutator, Reader};

/// A [`Mutator`] backed by the operating system's filesystem.
///
/// File writes go through a temporary file created in the destination's
/// parent directory, so the final rename stays on one filesystem and replaces
/// the destination atomically. Symlink replacement uses the same
/// temp-then-rename scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFs;

impl OsFs {
    /// Creates a new OS-backed filesystem.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn not_found_to_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

fn utf8_name(path: &Path, name: &std::ffi::OsStr) -> io::Result<String> {
    name.to_str().map(str::to_owned).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: non-UTF-8 file name", path.display()),
        )
    })
}

/// Splits a glob pattern into its literal directory prefix and the remainder
/// that actually contains metacharacters.
fn glob_static_prefix(pattern: &str) -> PathBuf {
    let meta = pattern.find(['*', '?', '[']).unwrap_or(pattern.len());
    match pattern[..meta].rfind('/') {
        Some(slash) => PathBuf::from(&pattern[..slash.max(1)]),
        None => PathBuf::from("."),
    }
}

impl Reader for OsFs {
    fn symlink_metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        Ok(not_found_to_none(fs::symlink_metadata(path))?
            .map(|metadata| EntryMetadata::from_std(&metadata)))
    }

    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        Ok(not_found_to_none(fs::metadata(path))?
            .map(|metadata| EntryMetadata::from_std(&metadata)))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            entries.push(DirEntry {
                file_name: utf8_name(path, &entry.file_name())?,
                metadata: EntryMetadata::from_std(&entry.metadata()?),
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<String> {
        let target = fs::read_link(path)?;
        utf8_name(path, target.as_os_str())
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?
            .compile_matcher();

        let root = glob_static_prefix(pattern);
        if fs::symlink_metadata(&root).is_err() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in walkdir::WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(io::Error::other)?;
            if matcher.is_match(entry.path()) {
                matches.push(entry.path().to_path_buf());
            }
        }
        matches.sort();
        Ok(matches)
    }
}

impl Mutator for OsFs {
    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            Ok(())
        }
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        fs::create_dir(path)?;
        // create_dir honours the process umask; set the mode explicitly so
        // the directory ends up with exactly the requested permissions.
        self.chmod(path, mode)
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        match self.symlink_metadata(path)? {
            None => Ok(()),
            Some(metadata) if metadata.file_type == FileType::Dir => fs::remove_dir_all(path),
            Some(_) => fs::remove_file(path),
        }
    }

    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn write_file(
        &mut self,
        path: &Path,
        data: &[u8],
        mode: u32,
        _prev_data: Option<&[u8]>,
    ) -> io::Result<()> {
        use std::io::Write;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".dotsync-tmp-")
            .tempfile_in(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|error| error.error)?;
        Ok(())
    }

    #[cfg(unix)]
    fn write_symlink(&mut self, target: &str, path: &Path) -> io::Result<()> {
        // rename replaces files and symlinks atomically but refuses to
        // replace a directory.
        if let Some(metadata) = self.symlink_metadata(path)? {
            if metadata.file_type == FileType::Dir {
                self.remove_all(path)?;
            }
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".dotsync-tmp-")
            .make_in(parent, |temp_path| {
                std::os::unix::fs::symlink(target, temp_path)
            })?;
        temp.into_temp_path().persist(path)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn write_symlink(&mut self, _target: &str, _path: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symlinks are not supported on this platform",
        ))
    }

    fn run_command(&mut self, command: &mut Command) -> io::Result<()> {
        let status = command.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("command failed: {status}")))
        }
    }

    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>> {
        let output = command.output()?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(io::Error::other(format!(
                "command failed: {}",
                output.status
            )))
        }
    }
}
