//! Filtered, non-recursive tar assembly of a file set.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, IoContext, Result};

/// Compiled exclusion regexes, matched against `/` + relative path.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<Regex>,
}

impl ExclusionSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).map_err(|e| Error::parse(format!("exclude regex '{}'", p), e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if any pattern matches anywhere in the normalized path.
    pub fn is_excluded(&self, path: &str) -> bool {
        let normalized = format!("/{}", path.trim_start_matches('/'));
        self.patterns.iter().any(|re| re.is_match(&normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entries written, duplicates included
    pub entries: usize,
    pub excluded: usize,
    pub size: u64,
    /// Lowercase hex SHA-256 of the archive
    pub sha256: String,
}

/// Write `paths` to a tar archive at `out`.
///
/// Directories become bare directory entries and symlinks are stored as
/// links. The archive is built next to `out` and only moved into place when
/// every entry was written.
pub fn assemble<S: AsRef<str>>(
    paths: &[S],
    excludes: &ExclusionSet,
    out: &Path,
) -> Result<ArchiveSummary> {
    let partial = partial_path(out);
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).at_path(parent)?;
    }

    let written = write_entries(paths, excludes, &partial);
    let (entries, excluded) = match written {
        Ok(counts) => counts,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    fs::rename(&partial, out).at_path(out)?;

    let (size, sha256) = digest(out)?;
    Ok(ArchiveSummary {
        path: out.to_path_buf(),
        entries,
        excluded,
        size,
        sha256,
    })
}

fn write_entries<S: AsRef<str>>(
    paths: &[S],
    excludes: &ExclusionSet,
    partial: &Path,
) -> Result<(usize, usize)> {
    let file = File::create(partial).at_path(partial)?;
    let mut builder = tar::Builder::new(BufWriter::new(file));
    builder.follow_symlinks(false);

    let mut entries = 0;
    let mut excluded = 0;
    for path in paths {
        let path = path.as_ref();
        let name = entry_name(path);
        // the root itself has no entry name
        if name.is_empty() {
            continue;
        }
        if excludes.is_excluded(&name) {
            excluded += 1;
            continue;
        }
        builder.append_path_with_name(path, &name).at_path(path)?;
        entries += 1;
    }

    let writer = builder.into_inner().at_path(partial)?;
    writer
        .into_inner()
        .map_err(|e| Error::io(partial, e.into_error()))?
        .sync_all()
        .at_path(partial)?;
    Ok((entries, excluded))
}

/// Archive name of `path`: relative, with `.` and `..` resolved lexically.
fn entry_name(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().unwrap_or_default()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    parts.join("/")
}

fn partial_path(out: &Path) -> PathBuf {
    let mut name = OsString::from(out.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn digest(path: &Path) -> Result<(u64, String)> {
    let mut file = File::open(path).at_path(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher).at_path(path)?;
    let hash: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    Ok((size, hash))
}
