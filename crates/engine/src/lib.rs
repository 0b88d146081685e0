#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` reads a dotsync source tree into an in-memory catalog and drives
//! the reconciler over it. A [`SourceState`] maps target paths to source
//! entries; replaying the catalog against different
//! [`vfs::Mutator`] adapters turns one pass into an apply, a dry run, a
//! diff, or a TAR archive.
//!
//! # Design
//!
//! - [`SourceState::read`] walks the source tree through a [`vfs::Reader`]
//!   in sorted order, interpreting the attribute grammar from [`attrs`] and
//!   the control files `.chezmoiignore`, `.chezmoiremove`,
//!   `.chezmoitemplates/`, and `.chezmoiversion`.
//! - The catalog is a `BTreeMap` keyed by slash-separated target path, so
//!   every pass visits ancestors before descendants for free.
//! - Contents flow lazily: a target entry's bytes are read, decrypted, and
//!   template-rendered at most once, on first use.
//! - Templates use [`minijinja`] with strict undefined handling; every file
//!   under `.chezmoitemplates/` is registered as a named template reachable
//!   from any other template.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use engine::SourceState;
//! use vfs::OsFs;
//!
//! # fn main() -> Result<(), engine::SourceError> {
//! let fs = OsFs::new();
//! let mut source_state = SourceState::new();
//! source_state.read(&fs, Path::new("/home/user/.local/share/dotsync"))?;
//! source_state.verify(&fs, 0o022)?;
//! let mut mutator = OsFs::new();
//! source_state.apply_all(&fs, &mut mutator, 0o022, Path::new("/home/user"))?;
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - [`state`] for the target and destination entry types and the apply
//!   logic itself.
//! - [`vfs`] for the adapter tower the passes run against.

mod crypt;
mod entry;
mod error;
mod persist;
mod source;

pub use crypt::{Encryption, GpgEncryption};
pub use entry::{SourceDir, SourceEntry, SourceFile};
pub use error::{Result, SourceError};
pub use persist::{MemoryState, PersistentState, SCRIPT_BUCKET};
pub use source::{SourceState, SourceStateBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use vfs::{Canary, DryRun, OsFs};

    fn write_source(dir: &Path, files: &[(&str, &str)]) {
        for (name, contents) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
    }

    fn read_state(source_dir: &Path) -> SourceState {
        let mut source_state = SourceState::new();
        source_state.read(&OsFs::new(), source_dir).expect("read");
        source_state
    }

    #[test]
    fn reads_files_and_dirs_into_target_keys() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                ("dot_bashrc", "export PATH\n"),
                ("dot_config/git/config", "[user]\n"),
                ("private_dot_ssh/config", "Host *\n"),
            ],
        );

        let source_state = read_state(temp.path());
        let targets: Vec<_> = source_state.entries().map(|(name, _)| name).collect();
        assert_eq!(
            targets,
            [".bashrc", ".config", ".config/git", ".config/git/config", ".ssh", ".ssh/config"]
        );
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        write_source(temp.path(), &[("foo", "x"), ("foo.tmpl", "y")]);

        let mut source_state = SourceState::new();
        let error = source_state
            .read(&OsFs::new(), temp.path())
            .expect_err("duplicate");
        let SourceError::DuplicateTarget {
            target_name,
            first,
            second,
        } = error
        else {
            panic!("expected a duplicate-target error");
        };
        assert_eq!(target_name, "foo");
        assert_eq!(first, temp.path().join("foo"));
        assert_eq!(second, temp.path().join("foo.tmpl"));
    }

    #[test]
    fn ignored_targets_are_not_catalogued() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                (".chezmoiignore", "README.md\n"),
                ("README.md", "docs"),
                ("dot_profile", "x"),
            ],
        );

        let source_state = read_state(temp.path());
        assert!(!source_state.contains_target("README.md"));
        assert!(source_state.contains_target(".profile"));
    }

    #[test]
    fn ignore_patterns_are_scoped_to_their_directory() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                ("dot_config/.chezmoiignore", "ignored\n"),
                ("dot_config/ignored", "x"),
                ("dot_config/kept", "y"),
                ("ignored", "top-level survives"),
            ],
        );

        let source_state = read_state(temp.path());
        assert!(!source_state.contains_target(".config/ignored"));
        assert!(source_state.contains_target(".config/kept"));
        assert!(source_state.contains_target("ignored"));
    }

    #[test]
    fn ignore_files_are_templates() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                (".chezmoiignore", "{{ skip }}\n"),
                ("keep_me", "x"),
                ("drop_me", "y"),
            ],
        );

        let mut source_state = SourceState::builder()
            .template_data(minijinja::context! { skip => "drop_me" })
            .build();
        source_state.read(&OsFs::new(), temp.path()).unwrap();
        assert!(!source_state.contains_target("drop_me"));
        assert!(source_state.contains_target("keep_me"));
    }

    #[test]
    fn version_records_the_maximum_seen() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                (".chezmoiversion", "1.2.3\n"),
                ("dir/.chezmoiversion", "0.9.0\n"),
            ],
        );

        let source_state = read_state(temp.path());
        assert_eq!(
            source_state.min_version().map(ToString::to_string).as_deref(),
            Some("1.2.3")
        );
    }

    #[test]
    fn invalid_version_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        write_source(temp.path(), &[(".chezmoiversion", "not-a-version\n")]);

        let mut source_state = SourceState::new();
        assert!(matches!(
            source_state.read(&OsFs::new(), temp.path()),
            Err(SourceError::Version { .. })
        ));
    }

    #[test]
    fn templates_render_with_data_and_includes() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                (".chezmoitemplates/email", "{{ email }}"),
                ("dot_gitconfig.tmpl", "[user]\n\temail = {% include 'email' %}\n"),
            ],
        );

        let mut source_state = SourceState::builder()
            .template_data(minijinja::context! { email => "user@example.com" })
            .build();
        source_state.read(&OsFs::new(), temp.path()).unwrap();

        let home = tempfile::tempdir().unwrap();
        let mut mutator = OsFs::new();
        source_state
            .apply_all(&OsFs::new(), &mut mutator, 0o022, home.path())
            .unwrap();
        assert_eq!(
            fs::read_to_string(home.path().join(".gitconfig")).unwrap(),
            "[user]\n\temail = user@example.com\n"
        );
    }

    #[test]
    fn missing_template_keys_fail_verify() {
        let temp = tempfile::tempdir().unwrap();
        write_source(temp.path(), &[("dot_rc.tmpl", "{{ nope.missing }}")]);

        let source_state = read_state(temp.path());
        assert!(source_state.verify(&OsFs::new(), 0o022).is_err());
    }

    #[test]
    fn second_apply_is_a_no_op() {
        let temp = tempfile::tempdir().unwrap();
        write_source(
            temp.path(),
            &[
                ("dot_profile", "export EDITOR=vi\n"),
                ("executable_bin_tool", "#!/bin/sh\n"),
                ("dir/nested", "deep\n"),
                ("symlink_dot_link", "dir/nested"),
            ],
        );
        let source_state = read_state(temp.path());

        let home = tempfile::tempdir().unwrap();
        let mut mutator = OsFs::new();
        source_state
            .apply_all(&OsFs::new(), &mut mutator, 0o022, home.path())
            .unwrap();

        let mut canary = Canary::new(OsFs::new());
        source_state
            .apply_all(&OsFs::new(), &mut canary, 0o022, home.path())
            .unwrap();
        assert!(!canary.mutated());
    }

    #[test]
    fn dry_run_apply_changes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        write_source(temp.path(), &[("dot_profile", "contents\n")]);
        let source_state = read_state(temp.path());

        let home = tempfile::tempdir().unwrap();
        let mut mutator = DryRun::new(OsFs::new());
        source_state
            .apply_all(&OsFs::new(), &mut mutator, 0o022, home.path())
            .unwrap();
        assert!(!home.path().join(".profile").exists());
    }

    #[test]
    fn run_once_scripts_are_gated_by_the_digest() {
        let temp = tempfile::tempdir().unwrap();
        let witness_dir = tempfile::tempdir().unwrap();
        let witness = witness_dir.path().join("ran");
        write_source(
            temp.path(),
            &[(
                "run_once_setup.sh",
                &format!("#!/bin/sh\necho . >> {}\n", witness.display()),
            )],
        );
        let source_state = read_state(temp.path());

        let mut persistent = MemoryState::new();
        let mut mutator = OsFs::new();
        source_state
            .run_scripts(&OsFs::new(), &mut mutator, 0o022, &mut persistent)
            .unwrap();
        source_state
            .run_scripts(&OsFs::new(), &mut mutator, 0o022, &mut persistent)
            .unwrap();
        assert_eq!(fs::read_to_string(&witness).unwrap().trim(), ".");
    }

    #[test]
    fn encrypted_sources_without_an_oracle_fail() {
        let temp = tempfile::tempdir().unwrap();
        write_source(temp.path(), &[("encrypted_dot_secret", "ciphertext")]);

        let source_state = read_state(temp.path());
        assert!(source_state.verify(&OsFs::new(), 0o022).is_err());
    }

    #[test]
    fn encrypted_sources_pass_through_the_oracle() {
        struct Rot13;
        impl Encryption for Rot13 {
            fn encrypt(&self, _hint: &str, plaintext: &[u8]) -> std::io::Result<Vec<u8>> {
                Ok(plaintext.iter().map(|b| b.wrapping_add(13)).collect())
            }
            fn decrypt(&self, _hint: &str, ciphertext: &[u8]) -> std::io::Result<Vec<u8>> {
                Ok(ciphertext.iter().map(|b| b.wrapping_sub(13)).collect())
            }
        }

        let temp = tempfile::tempdir().unwrap();
        let ciphertext: Vec<u8> = b"secret".iter().map(|b| b.wrapping_add(13)).collect();
        fs::write(temp.path().join("encrypted_dot_secret"), &ciphertext).unwrap();

        let mut source_state = SourceState::builder().encryption(Box::new(Rot13)).build();
        source_state.read(&OsFs::new(), temp.path()).unwrap();

        let home = tempfile::tempdir().unwrap();
        let mut mutator = OsFs::new();
        source_state
            .apply_all(&OsFs::new(), &mut mutator, 0o022, home.path())
            .unwrap();
        assert_eq!(fs::read(home.path().join(".secret")).unwrap(), b"secret");
    }

    #[test]
    fn unsupported_source_entries_are_rejected() {
        #[cfg(unix)]
        {
            let temp = tempfile::tempdir().unwrap();
            std::os::unix::fs::symlink("elsewhere", temp.path().join("stray")).unwrap();

            let mut source_state = SourceState::new();
            assert!(matches!(
                source_state.read(&OsFs::new(), temp.path()),
                Err(SourceError::State(
                    state::StateError::UnsupportedFileType { .. }
                ))
            ));
        }
    }
}
