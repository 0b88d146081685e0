//! The source state: catalog construction and reconciliation passes.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use attrs::{DirAttributes, FileAttributes, SourceFileKind};
use minijinja::{Environment, UndefinedBehavior, Value};
use patterns::PatternSet;
use semver::Version;
use state::{
    ContentsError, DestEntry, LazyContents, LazyLinkname, StateError, TargetEntry, TargetFile,
    TargetScript, TargetSymlink,
};
use tracing::debug;
use vfs::{FileType, Mutator, Reader, TarHeaderTemplate, TarWriter};

use crate::crypt::Encryption;
use crate::entry::{SourceDir, SourceEntry, SourceFile};
use crate::error::{Result, SourceError};
use crate::persist::{PersistentState, SCRIPT_BUCKET};

const IGNORE_NAME: &str = ".chezmoiignore";
const REMOVE_NAME: &str = ".chezmoiremove";
const TEMPLATES_DIR_NAME: &str = ".chezmoitemplates";
const VERSION_NAME: &str = ".chezmoiversion";

/// Joins a target directory and a base name with `/`, keeping keys canonical
/// regardless of the host separator.
fn join_target(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}

/// Configures a [`SourceState`] before the source tree is read.
pub struct SourceStateBuilder {
    environment: Environment<'static>,
    template_data: Value,
    encryption: Option<Box<dyn Encryption>>,
}

impl Default for SourceStateBuilder {
    fn default() -> Self {
        let mut environment = Environment::new();
        // A key missing from the template data is an error, not silence.
        environment.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            environment,
            template_data: Value::UNDEFINED,
            encryption: None,
        }
    }
}

impl SourceStateBuilder {
    /// Creates a builder with strict template semantics and no encryption.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value exposed to templates as their render context.
    #[must_use]
    pub fn template_data(mut self, data: Value) -> Self {
        self.template_data = data;
        self
    }

    /// Replaces the template environment. Use this to register custom
    /// functions and filters or to relax undefined-variable handling.
    #[must_use]
    pub fn environment(mut self, environment: Environment<'static>) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the encryption oracle used for `encrypted_` source files.
    #[must_use]
    pub fn encryption(mut self, encryption: Box<dyn Encryption>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Finishes configuration.
    #[must_use]
    pub fn build(self) -> SourceState {
        SourceState {
            entries: BTreeMap::new(),
            ignore: PatternSet::new(),
            remove: PatternSet::new(),
            min_version: None,
            environment: self.environment,
            template_data: self.template_data,
            encryption: self.encryption,
        }
    }
}

/// An in-memory catalog of a source tree, keyed by target path.
///
/// Built by [`read`](Self::read), then replayed against a destination with
/// [`apply_all`](Self::apply_all), [`archive`](Self::archive),
/// [`verify`](Self::verify), [`remove`](Self::remove), and
/// [`run_scripts`](Self::run_scripts). A single instance is not meant to be
/// shared across threads; every pass runs sequentially.
pub struct SourceState {
    entries: BTreeMap<String, SourceEntry>,
    ignore: PatternSet,
    remove: PatternSet,
    min_version: Option<Version>,
    environment: Environment<'static>,
    template_data: Value,
    encryption: Option<Box<dyn Encryption>>,
}

impl fmt::Debug for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceState")
            .field("entries", &self.entries.len())
            .field("min_version", &self.min_version)
            .finish_non_exhaustive()
    }
}

impl Default for SourceState {
    fn default() -> Self {
        SourceStateBuilder::new().build()
    }
}

impl SourceState {
    /// Creates an empty source state with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts configuring a source state.
    #[must_use]
    pub fn builder() -> SourceStateBuilder {
        SourceStateBuilder::new()
    }

    /// The highest version declared by any `.chezmoiversion` file read so
    /// far. Callers refuse to operate when their own version is lower.
    #[must_use]
    pub fn min_version(&self) -> Option<&Version> {
        self.min_version.as_ref()
    }

    /// Iterates the catalogued entries in target-path order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Reports whether `target_name` is catalogued.
    #[must_use]
    pub fn contains_target(&self, target_name: &str) -> bool {
        self.entries.contains_key(target_name)
    }

    /// Reads the source tree rooted at `source_dir` into the catalog.
    ///
    /// Control files (`.chezmoiignore`, `.chezmoiremove`,
    /// `.chezmoitemplates/`, `.chezmoiversion`) are interpreted as they are
    /// encountered; all other dot-prefixed names are skipped. The walk fails
    /// fast on the first error.
    pub fn read<R: Reader>(&mut self, reader: &R, source_dir: &Path) -> Result<()> {
        debug!(target: "dotsync::source", source_dir = %source_dir.display(), "reading source state");
        self.walk_dir(reader, source_dir, "")
    }

    fn walk_dir<R: Reader>(&mut self, reader: &R, dir: &Path, target_dir: &str) -> Result<()> {
        let children = reader
            .read_dir(dir)
            .map_err(|error| SourceError::io(dir, error))?;
        for child in children {
            let name = child.file_name.as_str();
            let path = dir.join(name);
            if name == IGNORE_NAME {
                for (pattern, include) in self.parse_pattern_file(reader, &path, target_dir)? {
                    self.ignore.add(&pattern, include);
                }
            } else if name == REMOVE_NAME {
                for (pattern, include) in self.parse_pattern_file(reader, &path, target_dir)? {
                    self.remove.add(&pattern, include);
                }
            } else if name == TEMPLATES_DIR_NAME && child.metadata.file_type == FileType::Dir {
                self.walk_templates(reader, &path, "")?;
            } else if name == VERSION_NAME {
                self.read_version(reader, &path)?;
            } else if name.starts_with('.') {
                // Unrecognised dot names are not part of the source state;
                // for directories this skips the whole subtree.
            } else {
                match child.metadata.file_type {
                    FileType::Dir => {
                        let dir_attrs = DirAttributes::parse(name);
                        let target_name = join_target(target_dir, &dir_attrs.name);
                        if self.ignore.matches(&target_name) {
                            continue;
                        }
                        self.insert(
                            target_name.clone(),
                            SourceEntry::Dir(SourceDir {
                                path: path.clone(),
                                attrs: dir_attrs,
                            }),
                        )?;
                        self.walk_dir(reader, &path, &target_name)?;
                    }
                    FileType::File => {
                        let file_attrs = FileAttributes::parse(name);
                        let target_name = join_target(target_dir, &file_attrs.name);
                        if self.ignore.matches(&target_name) {
                            continue;
                        }
                        self.insert(
                            target_name,
                            SourceEntry::File(SourceFile {
                                path,
                                attrs: file_attrs,
                            }),
                        )?;
                    }
                    FileType::Symlink | FileType::Other => {
                        return Err(SourceError::State(StateError::UnsupportedFileType {
                            path,
                            raw_mode: child.metadata.raw_mode,
                        }));
                    }
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, target_name: String, entry: SourceEntry) -> Result<()> {
        if let Some(existing) = self.entries.get(&target_name) {
            return Err(SourceError::DuplicateTarget {
                first: existing.path().to_path_buf(),
                second: entry.path().to_path_buf(),
                target_name,
            });
        }
        self.entries.insert(target_name, entry);
        Ok(())
    }

    fn read_version<R: Reader>(&mut self, reader: &R, path: &Path) -> Result<()> {
        let data = reader
            .read_file(path)
            .map_err(|error| SourceError::io(path, error))?;
        let text = std::str::from_utf8(&data).map_err(|_| SourceError::NotUtf8 {
            path: path.to_path_buf(),
        })?;
        let version = Version::parse(text.trim()).map_err(|source| SourceError::Version {
            path: path.to_path_buf(),
            source,
        })?;
        if self.min_version.as_ref().map_or(true, |min| *min < version) {
            self.min_version = Some(version);
        }
        Ok(())
    }

    fn walk_templates<R: Reader>(&mut self, reader: &R, dir: &Path, prefix: &str) -> Result<()> {
        let children = reader
            .read_dir(dir)
            .map_err(|error| SourceError::io(dir, error))?;
        for child in children {
            let path = dir.join(&child.file_name);
            let template_name = join_target(prefix, &child.file_name);
            match child.metadata.file_type {
                FileType::Dir => self.walk_templates(reader, &path, &template_name)?,
                FileType::File => {
                    let data = reader
                        .read_file(&path)
                        .map_err(|error| SourceError::io(&path, error))?;
                    let source = String::from_utf8(data).map_err(|_| SourceError::NotUtf8 {
                        path: path.clone(),
                    })?;
                    self.environment
                        .add_template_owned(template_name, source)
                        .map_err(|error| SourceError::template(&path, error))?;
                }
                FileType::Symlink | FileType::Other => {
                    return Err(SourceError::State(StateError::UnsupportedFileType {
                        path,
                        raw_mode: child.metadata.raw_mode,
                    }));
                }
            }
        }
        Ok(())
    }

    /// Renders `data` as a template named after `path`, against the
    /// configured template data. Named templates from `.chezmoitemplates/`
    /// are reachable through `{% include %}`.
    pub fn execute_template(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(data).map_err(|_| SourceError::NotUtf8 {
            path: path.to_path_buf(),
        })?;
        let name = path.display().to_string();
        let rendered = self
            .environment
            .render_named_str(&name, source, &self.template_data)
            .map_err(|error| SourceError::template(path, error))?;
        Ok(rendered.into_bytes())
    }

    fn parse_pattern_file<R: Reader>(
        &self,
        reader: &R,
        path: &Path,
        scope: &str,
    ) -> Result<Vec<(String, bool)>> {
        let data = reader
            .read_file(path)
            .map_err(|error| SourceError::io(path, error))?;
        let rendered = self.execute_template(path, &data)?;
        let text = String::from_utf8(rendered).map_err(|_| SourceError::NotUtf8 {
            path: path.to_path_buf(),
        })?;

        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let (pattern, include) = match line.strip_prefix('!') {
                Some(rest) => (rest, false),
                None => (line, true),
            };
            patterns.push((join_target(scope, pattern), include));
        }
        Ok(patterns)
    }

    fn file_contents<R: Reader>(
        &self,
        reader: &R,
        file: &SourceFile,
    ) -> std::result::Result<Vec<u8>, ContentsError> {
        let path = &file.path;
        let mut data = reader
            .read_file(path)
            .map_err(|error| ContentsError::io(path, error))?;
        if file.attrs.encrypted {
            let Some(encryption) = &self.encryption else {
                return Err(ContentsError::new(SourceError::EncryptionUnavailable {
                    path: path.clone(),
                }));
            };
            let hint = path.file_name().map_or_else(
                || path.display().to_string(),
                |name| name.to_string_lossy().into_owned(),
            );
            data = encryption
                .decrypt(&hint, &data)
                .map_err(|error| ContentsError::io(path, error))?;
        }
        if file.attrs.template {
            data = self
                .execute_template(path, &data)
                .map_err(ContentsError::new)?;
        }
        Ok(data)
    }

    /// Projects a catalogued entry to its target state, with `umask` already
    /// applied to the permissions.
    pub fn target_entry<'s, R: Reader>(
        &'s self,
        reader: &'s R,
        entry: &'s SourceEntry,
        umask: u32,
    ) -> TargetEntry<'s> {
        match entry {
            SourceEntry::Dir(dir) => TargetEntry::Dir {
                mode: dir.base_mode() & !umask,
            },
            SourceEntry::File(file) => match file.attrs.kind {
                SourceFileKind::File => TargetEntry::File(TargetFile {
                    mode: file.base_mode() & !umask,
                    contents: LazyContents::new(move || self.file_contents(reader, file)),
                    must_exist_when_empty: file.attrs.empty,
                }),
                SourceFileKind::Script => TargetEntry::Script(TargetScript {
                    name: file.attrs.name.clone(),
                    contents: LazyContents::new(move || self.file_contents(reader, file)),
                    once: file.attrs.once,
                }),
                SourceFileKind::Symlink => TargetEntry::Symlink(TargetSymlink {
                    linkname: LazyLinkname::new(move || {
                        let bytes = self.file_contents(reader, file)?;
                        String::from_utf8(bytes).map_err(|_| {
                            ContentsError::new(SourceError::NotUtf8 {
                                path: file.path.clone(),
                            })
                        })
                    }),
                }),
            },
        }
    }

    /// Applies every catalogued entry to the destination rooted at
    /// `target_dir`, in lexicographic target-path order so ancestors are
    /// reconciled before their descendants.
    pub fn apply_all<R: Reader, M: Mutator>(
        &self,
        reader: &R,
        mutator: &mut M,
        umask: u32,
        target_dir: &Path,
    ) -> Result<()> {
        for (target_name, entry) in &self.entries {
            self.apply_one(reader, mutator, umask, target_dir, target_name, entry)?;
        }
        Ok(())
    }

    fn apply_one<R: Reader, M: Mutator>(
        &self,
        reader: &R,
        mutator: &mut M,
        umask: u32,
        target_dir: &Path,
        target_name: &str,
        entry: &SourceEntry,
    ) -> Result<()> {
        let target_path = target_dir.join(target_name);
        let mut dest = DestEntry::read(&*mutator, &target_path)?;
        let mut target = self.target_entry(reader, entry, umask);
        target.apply(mutator, &mut dest)?;

        if let SourceEntry::Dir(dir) = entry {
            if dir.attrs().exact {
                self.purge_extras(mutator, &target_path, target_name)?;
            }
        }
        Ok(())
    }

    /// Removes children of an `exact_` directory that the catalog does not
    /// account for. The directory listing arrives sorted, so removals are
    /// deterministic.
    fn purge_extras<M: Mutator>(
        &self,
        mutator: &mut M,
        target_path: &Path,
        target_name: &str,
    ) -> Result<()> {
        let children = match mutator.read_dir(target_path) {
            Ok(children) => children,
            // An archive or dry run may not materialise the directory.
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(SourceError::io(target_path, error)),
        };
        for child in children {
            if !self
                .entries
                .contains_key(&join_target(target_name, &child.file_name))
            {
                let extra = target_path.join(&child.file_name);
                debug!(target: "dotsync::apply", path = %extra.display(), "removing unexpected entry");
                mutator
                    .remove_all(&extra)
                    .map_err(|error| SourceError::io(&extra, error))?;
            }
        }
        Ok(())
    }

    /// Removes everything under `target_dir` that matches the remove pattern
    /// set, expanding include patterns against the live filesystem and
    /// re-filtering so excludes still veto.
    pub fn remove<M: Mutator>(&self, mutator: &mut M, target_dir: &Path) -> Result<()> {
        let mut to_remove = std::collections::BTreeSet::new();
        for include in self.remove.include_patterns() {
            let pattern = target_dir.join(include);
            let matches = mutator
                .glob(&pattern.display().to_string())
                .map_err(|error| SourceError::io(&pattern, error))?;
            for matched in matches {
                let relative = matched
                    .strip_prefix(target_dir)
                    .unwrap_or(&matched)
                    .to_string_lossy()
                    .replace('\\', "/");
                if !self.remove.matches(&relative) {
                    continue;
                }
                to_remove.insert(matched);
            }
        }
        for path in to_remove {
            debug!(target: "dotsync::remove", path = %path.display(), "removing");
            mutator
                .remove_all(&path)
                .map_err(|error| SourceError::io(&path, error))?;
        }
        Ok(())
    }

    /// Streams the target state as a TAR archive into `out`, reusing the
    /// reconciler against an adapter whose destination is always empty.
    /// Entry names are relative target paths.
    pub fn archive<R: Reader, W: Write>(&self, reader: &R, out: W, umask: u32) -> Result<W> {
        let mut tar = TarWriter::new(out, TarHeaderTemplate::for_current_user(), umask);
        self.apply_all(reader, &mut tar, umask, Path::new(""))?;
        tar.into_inner()
            .map_err(|error| SourceError::io(Path::new("<archive>"), error))
    }

    /// Forces every catalogued entry's lazy state, surfacing read, decrypt,
    /// and template errors before any mutation begins.
    pub fn verify<R: Reader>(&self, reader: &R, umask: u32) -> Result<()> {
        for entry in self.entries.values() {
            self.target_entry(reader, entry, umask).evaluate()?;
        }
        Ok(())
    }

    /// Runs every catalogued script in target-path order. `run_once_`
    /// scripts are recorded in `persistent` keyed by their content digest
    /// and skipped when already recorded.
    pub fn run_scripts<R: Reader, M: Mutator>(
        &self,
        reader: &R,
        mutator: &mut M,
        umask: u32,
        persistent: &mut dyn PersistentState,
    ) -> Result<()> {
        for entry in self.entries.values() {
            let TargetEntry::Script(mut script) = self.target_entry(reader, entry, umask) else {
                continue;
            };
            if script.once {
                let digest = script.contents_sha256()?;
                if persistent
                    .get(SCRIPT_BUCKET, &digest)
                    .map_err(|error| SourceError::io(entry.path(), error))?
                    .is_some()
                {
                    debug!(target: "dotsync::script", name = %script.name, "already ran, skipping");
                    continue;
                }
                script.run(mutator)?;
                persistent
                    .set(SCRIPT_BUCKET, &digest, &[])
                    .map_err(|error| SourceError::io(entry.path(), error))?;
            } else {
                script.run(mutator)?;
            }
        }
        Ok(())
    }
}
