//! File-set accumulation for distroless images.
//!
//! A [`FileSet`] is an ordered, append-only list of absolute paths that will
//! end up in the image. It is filled from several [`SourceKind`]s and then
//! handed to [`archive::assemble`]. The set is never deduplicated here; the
//! archive tolerates repeats.
//!
//! Inside a builder context the accumulate and archive steps are separate
//! process invocations, so the set can be backed by a flat file (one path per
//! line) via [`FileSet::open`]. [`FileSet::in_memory`] skips the file.

pub mod archive;
pub mod query;

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, IoContext, Result};
use query::{FileState, LinkerQuery, PackageManager};

pub use archive::{assemble, ArchiveSummary, ExclusionSet};

/// Default backing file of the `dl` subcommand.
pub const DEFAULT_DL_FILE: &str = "dl-file.list";

/// Where the sources of an [`FileSet::add`] call come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Paths or glob patterns.
    Literal,
    /// Text files with one path or pattern per line.
    FileList,
    /// Installed packages; their normal-state files.
    Package,
    /// Binaries; every library file of their closure.
    LibraryFiles,
    /// Binaries; every normal file of the packages owning their closure.
    LibraryPackages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Expand literal sources against the filesystem.
    pub glob: bool,
    /// Follow each appended symlink with its resolved target.
    pub follow_symlinks: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            glob: true,
            follow_symlinks: false,
        }
    }
}

/// The collaborators package and library sources are resolved with.
pub struct Queries<'a> {
    pub packages: &'a dyn PackageManager,
    pub linker: &'a dyn LinkerQuery,
}

#[derive(Debug, Default)]
pub struct FileSet {
    entries: Vec<String>,
    store: Option<PathBuf>,
}

impl FileSet {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed set, loading whatever a previous run accumulated.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(Self {
            entries,
            store: Some(path),
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    /// Forget everything accumulated so far. Safe to call repeatedly.
    pub fn reset(&mut self) -> Result<()> {
        self.entries.clear();
        if let Some(path) = &self.store {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(path, e)),
            }
        }
        Ok(())
    }

    /// Append the paths described by `sources`. Returns how many were added.
    ///
    /// Each source is persisted as soon as it resolves, so a failing query
    /// leaves the earlier sources on disk.
    pub fn add<S: AsRef<str>>(
        &mut self,
        sources: &[S],
        kind: SourceKind,
        options: AddOptions,
        queries: &Queries<'_>,
    ) -> Result<usize> {
        let mut added = 0;
        for source in sources {
            let source = source.as_ref();
            let paths = match kind {
                SourceKind::Literal => expand(source, options.glob)?,
                SourceKind::FileList => {
                    let text = fs::read_to_string(source).at_path(source)?;
                    let mut paths = Vec::new();
                    for line in text.lines().filter(|l| !l.trim().is_empty()) {
                        paths.extend(expand(line.trim_end(), options.glob)?);
                    }
                    paths
                }
                SourceKind::Package => package_files(source, queries.packages)?,
                SourceKind::LibraryFiles => queries.linker.libraries(source)?,
                SourceKind::LibraryPackages => {
                    let mut owners: Vec<String> = Vec::new();
                    for lib in queries.linker.libraries(source)? {
                        let owner = queries.packages.owner(&lib)?;
                        if !owners.contains(&owner) {
                            owners.push(owner);
                        }
                    }
                    let mut paths = Vec::new();
                    for owner in &owners {
                        paths.extend(package_files(owner, queries.packages)?);
                    }
                    paths
                }
            };

            let paths = if options.follow_symlinks {
                with_link_targets(paths)
            } else {
                paths
            };
            added += paths.len();
            self.push_all(paths)?;
        }
        Ok(added)
    }

    /// Append to memory and the store. The store is created even when
    /// `paths` is empty so that a later `tar` sees an empty set.
    fn push_all(&mut self, paths: Vec<String>) -> Result<()> {
        if let Some(store) = &self.store {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(store)
                .at_path(store)?;
            let mut writer = BufWriter::new(file);
            for path in &paths {
                writeln!(writer, "{}", path).at_path(store)?;
            }
            writer.flush().at_path(store)?;
        }
        self.entries.extend(paths);
        Ok(())
    }
}

/// Expand one literal source. A pattern that matches nothing yields nothing.
///
/// A source that is not a valid pattern is taken literally if it exists.
/// Unreadable directories met while matching are skipped.
fn expand(source: &str, glob: bool) -> Result<Vec<String>> {
    if !glob {
        return Ok(vec![source.to_string()]);
    }
    let matches = match glob::glob(source) {
        Ok(matches) => matches,
        Err(_) if fs::symlink_metadata(source).is_ok() => return Ok(vec![source.to_string()]),
        Err(_) => return Ok(Vec::new()),
    };
    let mut paths = Vec::new();
    for entry in matches {
        match entry {
            Ok(path) => paths.push(path.to_string_lossy().into_owned()),
            Err(e) => eprintln!("  [WARN] Skipping {}: {}", e.path().display(), e.error()),
        }
    }
    Ok(paths)
}

fn package_files(package: &str, packages: &dyn PackageManager) -> Result<Vec<String>> {
    Ok(packages
        .installed_files(package)?
        .into_iter()
        .filter(|f| f.state == FileState::Normal)
        .map(|f| f.path)
        .collect())
}

/// Insert the canonical target right after every symlink.
fn with_link_targets(paths: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let is_link = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        let target = if is_link {
            match fs::canonicalize(&path) {
                Ok(target) => Some(target.to_string_lossy().into_owned()),
                Err(e) => {
                    eprintln!("  [WARN] Dangling symlink {}: {}", path, e);
                    None
                }
            }
        } else {
            None
        };
        out.push(path);
        out.extend(target);
    }
    out
}
