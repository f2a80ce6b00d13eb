//! Image definitions: discovery, references and distroless manifests.
//!
//! Definitions live in a two-level tree, `<org-dir>/<organization>/<image>/`.
//! Each image directory may hold a `Dockerfile.template` (rendered to
//! `Dockerfile`) and/or a `distroless.toml`.

pub mod manifest;
pub mod reference;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub use manifest::{Distroless, LibraryMode};
pub use reference::ImageRef;

pub const TEMPLATE_FILE: &str = "Dockerfile.template";
pub const RECIPE_FILE: &str = "Dockerfile";
pub const DISTROLESS_FILE: &str = "distroless.toml";

/// A buildable unit identified by `organization/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Image {
    pub canonical_name: String,
    /// Definition directory
    pub path: PathBuf,
}

impl Image {
    pub fn new(canonical_name: impl Into<String>, org_dir: &Path) -> Self {
        let canonical_name = canonical_name.into();
        let path = org_dir.join(&canonical_name);
        Self {
            canonical_name,
            path,
        }
    }

    pub fn organization(&self) -> &str {
        self.canonical_name
            .split_once('/')
            .map(|(org, _)| org)
            .unwrap_or("")
    }

    /// Name without the organization.
    pub fn base_name(&self) -> &str {
        self.canonical_name
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.canonical_name)
    }

    pub fn template(&self) -> PathBuf {
        self.path.join(TEMPLATE_FILE)
    }

    pub fn recipe(&self) -> PathBuf {
        self.path.join(RECIPE_FILE)
    }

    pub fn distroless_file(&self) -> PathBuf {
        self.path.join(DISTROLESS_FILE)
    }

    pub fn has_template(&self) -> bool {
        self.template().is_file()
    }

    pub fn is_distroless(&self) -> bool {
        self.distroless_file().is_file()
    }
}

/// Enumerates image definitions under an org directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    org_dir: PathBuf,
}

impl Catalog {
    pub fn new(org_dir: impl Into<PathBuf>) -> Self {
        Self {
            org_dir: org_dir.into(),
        }
    }

    pub fn org_dir(&self) -> &Path {
        &self.org_dir
    }

    /// Organization names, sorted.
    pub fn organizations(&self) -> Result<Vec<String>> {
        subdirs(&self.org_dir)
    }

    /// Images of one organization, sorted by name.
    pub fn images(&self, organization: &str) -> Result<Vec<Image>> {
        let names = subdirs(&self.org_dir.join(organization))?;
        Ok(names
            .into_iter()
            .map(|name| Image::new(format!("{}/{}", organization, name), &self.org_dir))
            .collect())
    }

    /// Every image of every organization.
    pub fn all_images(&self) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        for org in self.organizations()? {
            images.extend(self.images(&org)?);
        }
        Ok(images)
    }

    pub fn image(&self, canonical_name: &str) -> Image {
        Image::new(canonical_name, &self.org_dir)
    }
}

fn subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
