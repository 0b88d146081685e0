//! Desired outcomes for destination paths, and how to get there.

use std::path::Path;
use std::process::Command;

use tracing::debug;
use vfs::Mutator;

use crate::{sha256, ApplyError, ContentsError, DestEntry, LazyContents, LazyLinkname};

/// The target state of one path: what the destination should look like after
/// an apply.
///
/// [`apply`](Self::apply) drives the destination towards this state with the
/// minimum mutations; applying to a destination that already matches does
/// nothing at all.
#[derive(Debug)]
pub enum TargetEntry<'a> {
    /// The path must not exist.
    Absent,
    /// The path must be a directory.
    Dir {
        /// The exact permissions the directory must carry.
        mode: u32,
    },
    /// The path must be a regular file.
    File(TargetFile<'a>),
    /// The entry is a script: it is run, never written to the destination.
    Script(TargetScript<'a>),
    /// The path must be a symlink.
    Symlink(TargetSymlink<'a>),
}

/// A regular file in the target state.
#[derive(Debug)]
pub struct TargetFile<'a> {
    /// The exact permissions the file must carry.
    pub mode: u32,
    /// The file's desired contents.
    pub contents: LazyContents<'a>,
    /// When `false`, empty contents mean the file must not exist; when
    /// `true`, a zero-byte file must exist.
    pub must_exist_when_empty: bool,
}

/// A script in the target state.
#[derive(Debug)]
pub struct TargetScript<'a> {
    /// The script's logical name; its basename is preserved on the temporary
    /// file so interpreter selection by extension keeps working.
    pub name: String,
    /// The script's contents.
    pub contents: LazyContents<'a>,
    /// Whether the script runs at most once per recorded digest.
    pub once: bool,
}

/// A symlink in the target state.
#[derive(Debug)]
pub struct TargetSymlink<'a> {
    /// The symlink's desired target.
    pub linkname: LazyLinkname<'a>,
}

impl<'a> TargetEntry<'a> {
    /// Applies this target state to `dest` through `mutator`.
    pub fn apply<M: Mutator>(
        &mut self,
        mutator: &mut M,
        dest: &mut DestEntry,
    ) -> Result<(), ApplyError> {
        match self {
            Self::Absent => match dest {
                DestEntry::Absent { .. } => Ok(()),
                _ => dest.remove(mutator),
            },
            Self::Dir { mode } => apply_dir(*mode, mutator, dest),
            Self::File(file) => file.apply(mutator, dest),
            Self::Script(_) => {
                // Scripts are run, not reconciled; the destination is left
                // untouched.
                Ok(())
            }
            Self::Symlink(symlink) => symlink.apply(mutator, dest),
        }
    }

    /// Reports whether `dest` already matches this target state.
    pub fn is_equal<R: vfs::Reader>(
        &mut self,
        reader: &R,
        dest: &mut DestEntry,
    ) -> Result<bool, ApplyError> {
        match (self, dest) {
            (Self::Absent, DestEntry::Absent { .. }) => Ok(true),
            (Self::Dir { mode }, DestEntry::Dir { mode: dest_mode, .. }) => {
                Ok(*mode == *dest_mode)
            }
            (Self::File(file), DestEntry::File(dest_file)) => {
                if file.mode != dest_file.mode() {
                    return Ok(false);
                }
                Ok(file.contents.contents_sha256()? == dest_file.contents_sha256(reader)?)
            }
            // Scripts are independent of the destination state.
            (Self::Script(_), _) => Ok(true),
            (Self::Symlink(symlink), DestEntry::Symlink(dest_symlink)) => {
                Ok(symlink.linkname.linkname()? == dest_symlink.linkname(reader)?)
            }
            _ => Ok(false),
        }
    }

    /// Forces any lazy contents or linkname, surfacing producer errors
    /// without touching the destination.
    pub fn evaluate(&mut self) -> Result<(), ContentsError> {
        match self {
            Self::Absent | Self::Dir { .. } => Ok(()),
            Self::File(file) => file.contents.contents_sha256().map(drop),
            Self::Script(script) => script.contents.contents_sha256().map(drop),
            Self::Symlink(symlink) => symlink.linkname.linkname().map(drop),
        }
    }
}

fn apply_dir<M: Mutator>(mode: u32, mutator: &mut M, dest: &mut DestEntry) -> Result<(), ApplyError> {
    if let DestEntry::Dir {
        path,
        mode: dest_mode,
    } = dest
    {
        if *dest_mode == mode {
            return Ok(());
        }
        return mutator
            .chmod(path, mode)
            .map_err(|error| ApplyError::io(path, error));
    }
    dest.remove(mutator)?;
    mutator
        .create_dir(dest.path(), mode)
        .map_err(|error| ApplyError::io(dest.path(), error))
}

impl TargetFile<'_> {
    fn apply<M: Mutator>(
        &mut self,
        mutator: &mut M,
        dest: &mut DestEntry,
    ) -> Result<(), ApplyError> {
        let contents_sha256 = self.contents.contents_sha256()?;

        let mut prev_data = None;
        let mut dest_is_file_with_same_mode = false;
        if let DestEntry::File(dest_file) = dest {
            if dest_file.contents_sha256(&*mutator)? == contents_sha256 {
                if dest_file.mode() == self.mode {
                    return Ok(());
                }
                let path = dest_file.path().to_path_buf();
                return mutator
                    .chmod(&path, self.mode)
                    .map_err(|error| ApplyError::io(&path, error));
            }
            dest_is_file_with_same_mode = dest_file.mode() == self.mode;
            prev_data = Some(dest_file.contents(&*mutator)?.to_vec());
        }

        if contents_sha256 == sha256(b"") && !self.must_exist_when_empty {
            return match dest {
                DestEntry::Absent { .. } => Ok(()),
                _ => dest.remove(mutator),
            };
        }

        // write_file guarantees the requested mode only on the file it
        // creates itself; replacing in place keeps the old permissions, so a
        // non-file destination or a mode mismatch forces a removal first.
        if !dest_is_file_with_same_mode {
            dest.remove(mutator)?;
        }
        let data = self.contents.contents()?;
        mutator
            .write_file(dest.path(), data, self.mode, prev_data.as_deref())
            .map_err(|error| ApplyError::io(dest.path(), error))
    }
}

impl TargetScript<'_> {
    /// Runs the script through `mutator` with inherited stdio.
    ///
    /// Whitespace-only contents are skipped. The contents are staged in a
    /// private (`0o700`) temporary file whose name ends with the script's
    /// basename; the file is removed when the run finishes, on success and
    /// failure alike.
    pub fn run<M: Mutator>(&mut self, mutator: &mut M) -> Result<(), ApplyError> {
        let contents = self.contents.contents()?;
        if contents.iter().all(u8::is_ascii_whitespace) {
            debug!(target: "dotsync::script", name = %self.name, "skipping empty script");
            return Ok(());
        }

        let basename = Path::new(&self.name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        let temp = stage_script(&basename, contents)
            .map_err(|error| ApplyError::io(Path::new(&basename), error))?;

        debug!(target: "dotsync::script", name = %self.name, "running script");
        let result = mutator.run_command(&mut Command::new(temp.path()));
        result.map_err(|error| ApplyError::io(temp.path(), error))
    }

    /// The SHA-256 of the script's contents, used to key run-once records.
    pub fn contents_sha256(&mut self) -> Result<crate::Sha256Sum, ContentsError> {
        self.contents.contents_sha256()
    }
}

fn stage_script(basename: &str, contents: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    use std::io::Write;

    let mut temp = tempfile::Builder::new()
        .suffix(&format!(".{basename}"))
        .tempfile()?;
    // Restrict permissions before the contents land in case they carry
    // secrets.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o700))?;
    }
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

impl TargetSymlink<'_> {
    fn apply<M: Mutator>(
        &mut self,
        mutator: &mut M,
        dest: &mut DestEntry,
    ) -> Result<(), ApplyError> {
        let linkname = self.linkname.linkname()?.to_owned();
        if let DestEntry::Symlink(dest_symlink) = dest {
            if dest_symlink.linkname(&*mutator)? == linkname {
                return Ok(());
            }
        }
        dest.remove(mutator)?;
        mutator
            .write_symlink(&linkname, dest.path())
            .map_err(|error| ApplyError::io(dest.path(), error))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use vfs::{Canary, OsFs};

    fn file_target(mode: u32, contents: &[u8], must_exist_when_empty: bool) -> TargetEntry<'_> {
        TargetEntry::File(TargetFile {
            mode,
            contents: LazyContents::from_bytes(contents.to_vec()),
            must_exist_when_empty,
        })
    }

    fn snapshot(path: &Path) -> DestEntry {
        DestEntry::read(&OsFs::new(), path).expect("snapshot")
    }

    fn apply(target: &mut TargetEntry<'_>, path: &Path) -> bool {
        let mut mutator = Canary::new(OsFs::new());
        let mut dest = snapshot(path);
        target.apply(&mut mutator, &mut dest).expect("apply");
        mutator.mutated()
    }

    #[test]
    fn absent_removes_present_entries_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("victim");
        fs::write(&path, b"x").unwrap();

        assert!(apply(&mut TargetEntry::Absent, &path));
        assert!(!path.exists());
        assert!(!apply(&mut TargetEntry::Absent, &path));
    }

    #[test]
    fn dir_is_created_then_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("d");

        assert!(apply(&mut TargetEntry::Dir { mode: 0o755 }, &path));
        assert!(path.is_dir());
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);

        assert!(!apply(&mut TargetEntry::Dir { mode: 0o755 }, &path));
    }

    #[test]
    fn dir_with_wrong_mode_is_chmodded_not_recreated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("d");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o700)).unwrap();

        assert!(apply(&mut TargetEntry::Dir { mode: 0o755 }, &path));
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);
        assert!(path.join("keep").exists());
    }

    #[test]
    fn file_over_dir_replaces_the_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("x");
        fs::create_dir(&path).unwrap();

        assert!(apply(&mut file_target(0o644, b"data", false), &path));
        assert_eq!(fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn identical_file_is_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f");
        fs::write(&path, b"same").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(!apply(&mut file_target(0o644, b"same", false), &path));
    }

    #[test]
    fn same_contents_different_mode_only_chmods() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f");
        fs::write(&path, b"same").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        assert!(apply(&mut file_target(0o644, b"same", false), &path));
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
        assert_eq!(fs::read(&path).unwrap(), b"same");
    }

    #[test]
    fn different_mode_and_contents_recreates_with_exact_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        assert!(apply(&mut file_target(0o444, b"new", false), &path));
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o444);
    }

    #[test]
    fn empty_contents_remove_a_divergent_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f");
        fs::write(&path, b"stale").unwrap();

        assert!(apply(&mut file_target(0o644, b"", false), &path));
        assert!(!path.exists());
        assert!(!apply(&mut file_target(0o644, b"", false), &path));
    }

    #[test]
    fn empty_contents_with_empty_policy_create_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f");

        assert!(apply(&mut file_target(0o644, b"", true), &path));
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap(), b"");

        assert!(!apply(&mut file_target(0o644, b"", true), &path));
    }

    #[test]
    fn symlink_is_written_and_stable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("l");
        let mut target = TargetEntry::Symlink(TargetSymlink {
            linkname: LazyLinkname::from_string("over/there".into()),
        });
        assert!(apply(&mut target, &path));
        assert_eq!(fs::read_link(&path).unwrap().to_str(), Some("over/there"));

        let mut target = TargetEntry::Symlink(TargetSymlink {
            linkname: LazyLinkname::from_string("over/there".into()),
        });
        assert!(!apply(&mut target, &path));
    }

    #[test]
    fn symlink_replaces_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("l");
        fs::write(&path, b"not a link").unwrap();

        let mut target = TargetEntry::Symlink(TargetSymlink {
            linkname: LazyLinkname::from_string("t".into()),
        });
        assert!(apply(&mut target, &path));
        assert!(fs::symlink_metadata(&path).unwrap().is_symlink());
    }

    #[test]
    fn script_apply_never_touches_the_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script");
        let mut target = TargetEntry::Script(TargetScript {
            name: "script".into(),
            contents: LazyContents::from_bytes(b"#!/bin/sh\nexit 1\n".to_vec()),
            once: false,
        });
        assert!(!apply(&mut target, &path));
        assert!(!path.exists());
    }

    #[test]
    fn whitespace_only_script_is_skipped() {
        let mut script = TargetScript {
            name: "noop".into(),
            contents: LazyContents::from_bytes(b" \n\t\n".to_vec()),
            once: false,
        };
        let mut mutator = Canary::new(OsFs::new());
        script.run(&mut mutator).unwrap();
        assert!(!mutator.mutated());
    }

    #[test]
    fn script_runs_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let witness = dir.path().join("witness");
        let mut script = TargetScript {
            name: "touch.sh".into(),
            contents: LazyContents::from_bytes(
                format!("#!/bin/sh\ntouch {}\n", witness.display()).into_bytes(),
            ),
            once: false,
        };
        let mut mutator = OsFs::new();
        script.run(&mut mutator).unwrap();
        assert!(witness.exists());
    }

    #[test]
    fn failing_script_reports_an_error() {
        let mut script = TargetScript {
            name: "fail.sh".into(),
            contents: LazyContents::from_bytes(b"#!/bin/sh\nexit 3\n".to_vec()),
            once: false,
        };
        let mut mutator = OsFs::new();
        assert!(script.run(&mut mutator).is_err());
    }

    #[test]
    fn equality_matches_apply_no_ops() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f");
        fs::write(&path, b"same").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let reader = OsFs::new();
        let mut dest = snapshot(&path);
        let mut target = file_target(0o644, b"same", false);
        assert!(target.is_equal(&reader, &mut dest).unwrap());

        let mut dest = snapshot(&path);
        let mut target = file_target(0o600, b"same", false);
        assert!(!target.is_equal(&reader, &mut dest).unwrap());
    }
}
