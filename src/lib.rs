#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `dotsync` manages a user's configuration files by reconciling three state
//! spaces: a versioned **source** tree of attribute-prefixed files and
//! templates, the **target** state derived from it, and the **destination**
//! state actually present in the user's home directory. One reconciler
//! drives the destination towards the target with the minimum set of
//! filesystem mutations; swapping the filesystem adapter turns the same pass
//! into an apply, a dry run, a diff, or a TAR archive.
//!
//! This crate is the facade over the workspace:
//!
//! - [`attrs`] — the attribute grammar on source names.
//! - [`patterns`] — include/exclude glob sets for ignore and remove rules.
//! - [`vfs`] — the filesystem interface and its adapter tower.
//! - [`state`] — target/destination entries and the apply logic.
//! - [`engine`] — the source-state catalog and reconciliation passes.
//!
//! # Examples
//!
//! Apply a source tree to a home directory:
//!
//! ```no_run
//! use std::path::Path;
//! use dotsync::engine::SourceState;
//! use dotsync::vfs::OsFs;
//!
//! # fn main() -> Result<(), dotsync::engine::SourceError> {
//! let fs = OsFs::new();
//! let mut source_state = SourceState::new();
//! source_state.read(&fs, Path::new("/home/user/.local/share/dotsync"))?;
//! source_state.verify(&fs, 0o022)?;
//! let mut mutator = OsFs::new();
//! source_state.apply_all(&fs, &mut mutator, 0o022, Path::new("/home/user"))?;
//! # Ok(())
//! # }
//! ```

pub use attrs;
pub use engine;
pub use patterns;
pub use state;
pub use vfs;
