//! Catalogued source entries and their projection to target state.

use std::path::{Path, PathBuf};

use attrs::{DirAttributes, FileAttributes};

/// One catalogued node of the source tree, keyed by its target path.
#[derive(Clone, Debug)]
pub enum SourceEntry {
    /// A source directory.
    Dir(SourceDir),
    /// A source file: a regular file, a script, or a symlink definition.
    File(SourceFile),
}

/// A directory in the source tree.
#[derive(Clone, Debug)]
pub struct SourceDir {
    pub(crate) path: PathBuf,
    pub(crate) attrs: DirAttributes,
}

/// A regular file in the source tree.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub(crate) path: PathBuf,
    pub(crate) attrs: FileAttributes,
}

impl SourceEntry {
    /// The entry's absolute source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Dir(dir) => &dir.path,
            Self::File(file) => &file.path,
        }
    }
}

impl SourceDir {
    /// The directory's parsed attributes.
    #[must_use]
    pub const fn attrs(&self) -> &DirAttributes {
        &self.attrs
    }

    /// The permissions the target directory must carry, before the umask is
    /// applied.
    #[must_use]
    pub const fn base_mode(&self) -> u32 {
        if self.attrs.private {
            0o700
        } else {
            0o777
        }
    }
}

impl SourceFile {
    /// The file's parsed attributes.
    #[must_use]
    pub const fn attrs(&self) -> &FileAttributes {
        &self.attrs
    }

    /// The permissions the target file must carry, before the umask is
    /// applied.
    #[must_use]
    pub const fn base_mode(&self) -> u32 {
        let mut mode = 0o666;
        if self.attrs.executable {
            mode |= 0o111;
        }
        if self.attrs.private {
            mode &= !0o077;
        }
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrs::SourceFileKind;

    fn file(attrs: FileAttributes) -> SourceFile {
        SourceFile {
            path: PathBuf::from("/src/x"),
            attrs,
        }
    }

    #[test]
    fn plain_file_mode() {
        let f = file(FileAttributes {
            name: "x".into(),
            ..Default::default()
        });
        assert_eq!(f.base_mode(), 0o666);
    }

    #[test]
    fn executable_file_mode() {
        let f = file(FileAttributes {
            name: "x".into(),
            executable: true,
            ..Default::default()
        });
        assert_eq!(f.base_mode(), 0o777);
    }

    #[test]
    fn private_strips_group_and_other() {
        let f = file(FileAttributes {
            name: "x".into(),
            private: true,
            ..Default::default()
        });
        assert_eq!(f.base_mode(), 0o600);

        let f = file(FileAttributes {
            name: "x".into(),
            private: true,
            executable: true,
            kind: SourceFileKind::File,
            ..Default::default()
        });
        assert_eq!(f.base_mode(), 0o700);
    }

    #[test]
    fn dir_modes() {
        let d = SourceDir {
            path: PathBuf::from("/src/d"),
            attrs: DirAttributes {
                name: "d".into(),
                ..Default::default()
            },
        };
        assert_eq!(d.base_mode(), 0o777);

        let d = SourceDir {
            path: PathBuf::from("/src/d"),
            attrs: DirAttributes {
                name: "d".into(),
                private: true,
                ..Default::default()
            },
        };
        assert_eq!(d.base_mode(), 0o700);
    }
}
