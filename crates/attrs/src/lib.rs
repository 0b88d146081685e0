#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `attrs` implements the attribute grammar carried by dotsync source names.
//! Every file and directory in a source tree encodes its target-state
//! attributes as ordered prefixes on its base name (`exact_`, `private_`,
//! `empty_`, `executable_`, `encrypted_`, `run_`, `once_`, `symlink_`,
//! `dot_`) plus an optional `.tmpl` suffix. Parsing a source name yields a
//! structured attribute value; emitting an attribute value yields the source
//! name back.
//!
//! # Design
//!
//! - [`DirAttributes::parse`] and [`FileAttributes::parse`] are pure, total
//!   functions on strings: any input produces a value, unknown prefixes are
//!   simply part of the name.
//! - [`DirAttributes::source_name`] and [`FileAttributes::source_name`] are
//!   the exact inverses for every value that parsing can produce.
//! - Prefixes are consumed in a fixed order, so `private_empty_foo` and
//!   `empty_private_foo` are *not* equivalent: only the first matches the
//!   grammar, the second leaves `private_foo` as the target name's tail.
//!
//! # Invariants
//!
//! - Round trip: for any string `s`, `parse(parse(s).source_name()) ==
//!   parse(s)`.
//! - `run_` is terminal: a script's remaining name is preserved verbatim, so
//!   `run_dot_foo` is a script whose target name is literally `dot_foo`.
//!
//! # Examples
//!
//! ```
//! use attrs::{FileAttributes, SourceFileKind};
//!
//! let fa = FileAttributes::parse("private_executable_dot_local.tmpl");
//! assert_eq!(fa.name, ".local");
//! assert_eq!(fa.kind, SourceFileKind::File);
//! assert!(fa.private && fa.executable && fa.template);
//! assert_eq!(fa.source_name(), "private_executable_dot_local.tmpl");
//! ```

const DOT_PREFIX: &str = "dot_";
const EMPTY_PREFIX: &str = "empty_";
const ENCRYPTED_PREFIX: &str = "encrypted_";
const EXACT_PREFIX: &str = "exact_";
const EXECUTABLE_PREFIX: &str = "executable_";
const ONCE_PREFIX: &str = "once_";
const PRIVATE_PREFIX: &str = "private_";
const RUN_PREFIX: &str = "run_";
const SYMLINK_PREFIX: &str = "symlink_";

/// Suffix marking a source file whose contents are a template.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Kind of entry a source file produces in the target state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SourceFileKind {
    /// A regular file.
    #[default]
    File,
    /// A script that is executed rather than written to the destination.
    Script,
    /// A symbolic link whose target is stored as the file's contents.
    Symlink,
}

/// Attributes parsed from a source directory name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DirAttributes {
    /// Target base name of the directory.
    pub name: String,
    /// Whether the directory's children are authoritative: anything else
    /// found under it in the destination is removed on apply.
    pub exact: bool,
    /// Whether group and other permission bits are stripped.
    pub private: bool,
}

impl DirAttributes {
    /// Parses a source directory base name.
    #[must_use]
    pub fn parse(source_name: &str) -> Self {
        let mut name = source_name;
        let exact = strip(&mut name, EXACT_PREFIX);
        let private = strip(&mut name, PRIVATE_PREFIX);
        Self {
            name: expand_dot(name),
            exact,
            private,
        }
    }

    /// Returns the source name that parses back to `self`.
    #[must_use]
    pub fn source_name(&self) -> String {
        let mut out = String::new();
        if self.exact {
            out.push_str(EXACT_PREFIX);
        }
        if self.private {
            out.push_str(PRIVATE_PREFIX);
        }
        push_dot(&mut out, &self.name);
        out
    }
}

/// Attributes parsed from a source file name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileAttributes {
    /// Target base name of the entry.
    pub name: String,
    /// What the source file produces.
    pub kind: SourceFileKind,
    /// Whether a zero-length target file should exist rather than be removed.
    pub empty: bool,
    /// Whether the source contents must be decrypted before use.
    pub encrypted: bool,
    /// Whether the executable bits are set on the target file.
    pub executable: bool,
    /// Whether a script runs at most once (scripts only).
    pub once: bool,
    /// Whether group and other permission bits are stripped.
    pub private: bool,
    /// Whether the contents are executed as a template.
    pub template: bool,
}

impl FileAttributes {
    /// Parses a source file base name.
    #[must_use]
    pub fn parse(source_name: &str) -> Self {
        let mut name = source_name;
        let mut attrs = Self::default();
        if strip(&mut name, RUN_PREFIX) {
            attrs.kind = SourceFileKind::Script;
            attrs.once = strip(&mut name, ONCE_PREFIX);
            // Scripts keep the rest of the name verbatim, including any
            // leading dot_.
            attrs.name = name.to_owned();
        } else if strip(&mut name, SYMLINK_PREFIX) {
            attrs.kind = SourceFileKind::Symlink;
            attrs.name = expand_dot(name);
        } else {
            attrs.encrypted = strip(&mut name, ENCRYPTED_PREFIX);
            attrs.private = strip(&mut name, PRIVATE_PREFIX);
            attrs.empty = strip(&mut name, EMPTY_PREFIX);
            attrs.executable = strip(&mut name, EXECUTABLE_PREFIX);
            attrs.name = expand_dot(name);
        }
        if attrs.name.ends_with(TEMPLATE_SUFFIX) {
            let stem_len = attrs.name.len() - TEMPLATE_SUFFIX.len();
            attrs.name.truncate(stem_len);
            attrs.template = true;
        }
        attrs
    }

    /// Returns the source name that parses back to `self`.
    #[must_use]
    pub fn source_name(&self) -> String {
        let mut out = String::new();
        match self.kind {
            SourceFileKind::File => {
                if self.encrypted {
                    out.push_str(ENCRYPTED_PREFIX);
                }
                if self.private {
                    out.push_str(PRIVATE_PREFIX);
                }
                if self.empty {
                    out.push_str(EMPTY_PREFIX);
                }
                if self.executable {
                    out.push_str(EXECUTABLE_PREFIX);
                }
                push_dot(&mut out, &self.name);
            }
            SourceFileKind::Script => {
                out.push_str(RUN_PREFIX);
                if self.once {
                    out.push_str(ONCE_PREFIX);
                }
                out.push_str(&self.name);
            }
            SourceFileKind::Symlink => {
                out.push_str(SYMLINK_PREFIX);
                push_dot(&mut out, &self.name);
            }
        }
        if self.template {
            out.push_str(TEMPLATE_SUFFIX);
        }
        out
    }
}

fn strip<'a>(name: &mut &'a str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => {
            *name = rest;
            true
        }
        None => false,
    }
}

fn expand_dot(name: &str) -> String {
    match name.strip_prefix(DOT_PREFIX) {
        Some(rest) => format!(".{rest}"),
        None => name.to_owned(),
    }
}

fn push_dot(out: &mut String, name: &str) {
    match name.strip_prefix('.') {
        Some(rest) => {
            out.push_str(DOT_PREFIX);
            out.push_str(rest);
        }
        None => out.push_str(name),
    }
}
