//! A mutator that archives the target state instead of applying it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use tar::{Builder, EntryType, Header};

use crate::{DirEntry, EmptyReader, EntryMetadata, Mutator, Reader};

/// Per-archive header defaults: ownership and timestamps stamped onto every
/// emitted entry.
#[derive(Clone, Debug, Default)]
pub struct TarHeaderTemplate {
    /// Numeric user id.
    pub uid: u64,
    /// Numeric group id.
    pub gid: u64,
    /// User name; empty is acceptable.
    pub username: String,
    /// Group name; empty is acceptable.
    pub groupname: String,
    /// Modification time as seconds since the epoch.
    pub mtime: u64,
}

impl TarHeaderTemplate {
    /// Builds a template for the current user and the current wall-clock
    /// time. Fields that cannot be determined stay at their zero defaults.
    #[must_use]
    pub fn for_current_user() -> Self {
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        #[cfg(unix)]
        let (uid, gid) = (
            u64::from(rustix::process::getuid().as_raw()),
            u64::from(rustix::process::getgid().as_raw()),
        );
        #[cfg(not(unix))]
        let (uid, gid) = (0, 0);
        Self {
            uid,
            gid,
            username: String::new(),
            groupname: String::new(),
            mtime,
        }
    }

    fn stamp(&self, header: &mut Header) -> io::Result<()> {
        header.set_uid(self.uid);
        header.set_gid(self.gid);
        header.set_mtime(self.mtime);
        if !self.username.is_empty() {
            header.set_username(&self.username)?;
        }
        if !self.groupname.is_empty() {
            header.set_groupname(&self.groupname)?;
        }
        Ok(())
    }
}

/// A [`Mutator`] that renders every mutation as a TAR archive entry.
///
/// Reads come from an embedded [`EmptyReader`], so replaying a reconciliation
/// pass against this adapter emits one archive entry per catalogued target.
/// Mutations with no archive representation (`chmod`, `remove_all`, `rename`)
/// fail with [`io::ErrorKind::PermissionDenied`].
pub struct TarWriter<W: Write> {
    builder: Builder<W>,
    reads: EmptyReader,
    template: TarHeaderTemplate,
    umask: u32,
}

impl<W: Write> TarWriter<W> {
    /// Creates a writer that streams archive bytes into `out`. `umask` is
    /// stripped from every entry's mode.
    #[must_use]
    pub fn new(out: W, template: TarHeaderTemplate, umask: u32) -> Self {
        Self {
            builder: Builder::new(out),
            reads: EmptyReader::new(),
            template,
            umask,
        }
    }

    /// Finishes the archive, writing the trailing zero blocks, and returns
    /// the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.builder.into_inner()
    }

    fn header(&self, entry_type: EntryType, mode: u32) -> io::Result<Header> {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode & !self.umask);
        self.template.stamp(&mut header)?;
        Ok(header)
    }

    fn read_only(op: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{op} is not supported when writing an archive"),
        )
    }
}

impl<W: Write> Reader for TarWriter<W> {
    fn symlink_metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        self.reads.symlink_metadata(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMetadata>> {
        self.reads.metadata(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.reads.read_dir(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reads.read_file(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<String> {
        self.reads.read_link(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        self.reads.glob(pattern)
    }
}

impl<W: Write> Mutator for TarWriter<W> {
    fn chmod(&mut self, _path: &Path, _mode: u32) -> io::Result<()> {
        Err(Self::read_only("chmod"))
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        let mut header = self.header(EntryType::Directory, mode)?;
        header.set_size(0);
        header.set_path(path)?;
        header.set_cksum();
        self.builder.append(&header, io::empty())
    }

    fn remove_all(&mut self, _path: &Path) -> io::Result<()> {
        Err(Self::read_only("remove_all"))
    }

    fn rename(&mut self, _from: &Path, _to: &Path) -> io::Result<()> {
        Err(Self::read_only("rename"))
    }

    fn write_file(
        &mut self,
        path: &Path,
        data: &[u8],
        mode: u32,
        _prev_data: Option<&[u8]>,
    ) -> io::Result<()> {
        let mut header = self.header(EntryType::Regular, mode)?;
        header.set_size(data.len() as u64);
        header.set_path(path)?;
        header.set_cksum();
        self.builder.append(&header, data)
    }

    fn write_symlink(&mut self, target: &str, path: &Path) -> io::Result<()> {
        let mut header = self.header(EntryType::Symlink, 0o777)?;
        header.set_size(0);
        header.set_path(path)?;
        header.set_link_name(target)?;
        header.set_cksum();
        self.builder.append(&header, io::empty())
    }

    fn run_command(&mut self, _command: &mut Command) -> io::Result<()> {
        // Scripts have no archive representation.
        Ok(())
    }

    fn idempotent_command_output(&mut self, command: &mut Command) -> io::Result<Vec<u8>> {
        let output = command.output()?;
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutations_become_archive_entries() {
        let mut writer = TarWriter::new(Vec::new(), TarHeaderTemplate::default(), 0o022);
        writer.create_dir(Path::new("dir"), 0o777).unwrap();
        writer
            .write_file(Path::new("dir/file"), b"contents", 0o666, None)
            .unwrap();
        writer.write_symlink("file", Path::new("dir/link")).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();

        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.header().entry_type(), EntryType::Directory);
        assert_eq!(entry.path().unwrap().to_str(), Some("dir"));
        assert_eq!(entry.header().mode().unwrap(), 0o755);

        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.header().entry_type(), EntryType::Regular);
        assert_eq!(entry.header().mode().unwrap(), 0o644);
        let mut contents = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, b"contents");

        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.header().entry_type(), EntryType::Symlink);
        assert_eq!(
            entry.link_name().unwrap().as_deref().and_then(Path::to_str),
            Some("file")
        );

        assert!(entries.next().is_none());
    }

    #[test]
    fn destructive_operations_are_rejected() {
        let mut writer = TarWriter::new(Vec::new(), TarHeaderTemplate::default(), 0);
        let error = writer.chmod(Path::new("x"), 0o644).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::PermissionDenied);
        let error = writer.remove_all(Path::new("x")).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::PermissionDenied);
        let error = writer.rename(Path::new("x"), Path::new("y")).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn reads_see_an_empty_destination() {
        let writer = TarWriter::new(Vec::new(), TarHeaderTemplate::default(), 0);
        assert!(writer.symlink_metadata(Path::new("/x")).unwrap().is_none());
    }
}
