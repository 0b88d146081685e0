#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `state` models the two state spaces the dotsync reconciler compares: the
//! **target state** ([`TargetEntry`]) describing what one destination path
//! should look like, and the **destination state** ([`DestEntry`])
//! describing what it currently looks like. The reconciler itself is
//! [`TargetEntry::apply`]: a double dispatch over (target variant,
//! destination variant) that emits the minimum mutations needed to make the
//! destination match.
//!
//! # Design
//!
//! - Both state families are closed sum types matched exhaustively; there is
//!   no open inheritance.
//! - File contents and symlink targets are held in [`LazyContents`] /
//!   [`LazyLinkname`] memo cells: the underlying bytes are produced at most
//!   once, their SHA-256 is cached, and comparisons work on digests so large
//!   files are not held twice.
//! - Destination entries read through a [`vfs::Reader`] supplied at access
//!   time, so a snapshot taken from a mutator can be interrogated while the
//!   same mutator applies changes.
//!
//! # Invariants
//!
//! - Applying a target entry to a destination it already equals performs no
//!   mutations.
//! - After a successful apply, re-snapshotting the destination yields an
//!   entry the target considers equal.
//! - A [`TargetFile`] with empty contents and a `must_exist_when_empty` of
//!   `false` never creates the destination file and removes a present one
//!   whose contents differ.
//!
//! # Errors
//!
//! Apply and comparison operations return [`ApplyError`]; snapshotting a
//! destination path of an unsupported kind returns
//! [`StateError::UnsupportedFileType`]. Producer failures are memoised as
//! [`ContentsError`] and returned verbatim on every subsequent access.

mod dest;
mod error;
mod lazy;
mod target;

pub use dest::{DestEntry, DestFile, DestSymlink};
pub use error::{ApplyError, ContentsError, PathIoError, StateError};
pub use lazy::{sha256, LazyContents, LazyLinkname, Sha256Sum};
pub use target::{TargetEntry, TargetFile, TargetScript, TargetSymlink};
