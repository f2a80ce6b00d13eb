//! Per-run side files: skip policy, tag overrides and task injection.
//!
//! All three are optional JSON documents keyed by canonical image name or
//! branch. A missing file behaves like an empty one.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, IoContext, Result};

pub const LATEST_TAG: &str = "latest";

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).at_path(path)?;
    serde_json::from_str(&text).map_err(|e| Error::parse(path.display().to_string(), e))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ImageInfo {
    #[serde(default)]
    skip_branches: Vec<String>,
    #[serde(default)]
    skip_arches: Vec<String>,
}

/// Static per-image skip configuration (`images-info.json`).
#[derive(Debug, Clone, Default)]
pub struct ImagesInfo {
    info: BTreeMap<String, ImageInfo>,
}

impl ImagesInfo {
    /// Load from `path`; a missing file yields an empty policy.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(Self {
            info: load_json(path)?,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let info = serde_json::from_str(text).map_err(|e| Error::parse("images info", e))?;
        Ok(Self { info })
    }

    pub fn skip_branch(&self, image: &str, branch: &str) -> bool {
        self.info
            .get(image)
            .is_some_and(|i| i.skip_branches.iter().any(|b| b == branch))
    }

    pub fn skip_arches(&self, image: &str) -> &[String] {
        self.info
            .get(image)
            .map(|i| i.skip_arches.as_slice())
            .unwrap_or_default()
    }

    /// Requested arches minus the image's skip-list, in request order.
    pub fn build_arches(&self, image: &str, requested: &[String]) -> Vec<String> {
        let skip = self.skip_arches(image);
        requested
            .iter()
            .filter(|a| !skip.contains(a))
            .cloned()
            .collect()
    }
}

/// Computes the Tag Set of an image on a branch.
#[derive(Debug, Clone)]
pub struct Tags {
    overrides: Option<BTreeMap<String, BTreeMap<String, Vec<String>>>>,
    latest: String,
}

impl Tags {
    pub fn new(latest: impl Into<String>) -> Self {
        Self {
            overrides: None,
            latest: latest.into(),
        }
    }

    /// Use explicit image -> branch -> tags overrides from a JSON file.
    pub fn with_overrides_file(mut self, path: &Path) -> Result<Self> {
        self.overrides = Some(load_json(path)?);
        Ok(self)
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, BTreeMap<String, Vec<String>>>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Primary tag first, then aliases. Never empty.
    pub fn tags(&self, branch: &str, image: &str) -> Vec<String> {
        let mut tags = self
            .overrides
            .as_ref()
            .and_then(|o| o.get(image))
            .and_then(|b| b.get(branch))
            .filter(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| vec![branch.to_string()]);
        if branch == self.latest && !tags.iter().any(|t| t == LATEST_TAG) {
            tags.push(LATEST_TAG.to_string());
        }
        tags
    }
}

/// Task repositories injected into rendered install commands.
///
/// `{ "<branch>": { "<task>": [] | ["<org>/<name>", ...] } }`; an empty list
/// applies the task to every image.
#[derive(Debug, Clone, Default)]
pub struct Tasks {
    tasks: Option<BTreeMap<String, BTreeMap<String, Vec<String>>>>,
}

impl Tasks {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            tasks: Some(load_json(path)?),
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let tasks = serde_json::from_str(text).map_err(|e| Error::parse("tasks", e))?;
        Ok(Self { tasks: Some(tasks) })
    }

    pub fn for_image(&self, branch: &str, image: &str) -> Vec<String> {
        let Some(branch_tasks) = self.tasks.as_ref().and_then(|t| t.get(branch)) else {
            return Vec::new();
        };
        branch_tasks
            .iter()
            .filter(|(_, images)| images.is_empty() || images.iter().any(|i| i == image))
            .map(|(task, _)| task.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_latest_branch() {
        let tags = Tags::new("p10");
        assert_eq!(tags.tags("p10", "alt/base"), vec!["p10", "latest"]);
        assert_eq!(tags.tags("sisyphus", "alt/base"), vec!["sisyphus"]);
    }

    #[test]
    fn test_tags_override() {
        let overrides = BTreeMap::from([(
            "alt/python".to_string(),
            BTreeMap::from([("p10".to_string(), vec!["3.9".to_string(), "3".to_string()])]),
        )]);
        let tags = Tags::new("p10").with_overrides(overrides);
        assert_eq!(tags.tags("p10", "alt/python"), vec!["3.9", "3", "latest"]);
        // No entry for this image/branch: branch name is the primary tag
        assert_eq!(tags.tags("p9", "alt/python"), vec!["p9"]);
        assert_eq!(tags.tags("p10", "alt/base"), vec!["p10", "latest"]);
    }

    #[test]
    fn test_skip_policy() {
        let info = ImagesInfo::from_json(
            r#"{"alt/nginx": {"skip-branches": ["p9"], "skip-arches": ["386", "arm"]}}"#,
        )
        .unwrap();
        assert!(info.skip_branch("alt/nginx", "p9"));
        assert!(!info.skip_branch("alt/nginx", "p10"));
        assert!(!info.skip_branch("alt/base", "p9"));

        let requested: Vec<String> = ["amd64", "386", "arm64", "arm"].map(String::from).to_vec();
        assert_eq!(info.build_arches("alt/nginx", &requested), vec!["amd64", "arm64"]);
        assert_eq!(info.build_arches("alt/base", &requested), requested);
    }

    #[test]
    fn test_missing_images_info_is_empty() {
        let info = ImagesInfo::load(Path::new("/nonexistent/images-info.json")).unwrap();
        assert!(info.skip_arches("alt/base").is_empty());
    }

    #[test]
    fn test_tasks_for_image() {
        let tasks = Tasks::from_json(r#"{"p10": {"311111": [], "322222": ["alt/nginx"]}}"#).unwrap();
        assert_eq!(tasks.for_image("p10", "alt/nginx"), vec!["311111", "322222"]);
        assert_eq!(tasks.for_image("p10", "alt/base"), vec!["311111"]);
        assert!(tasks.for_image("sisyphus", "alt/base").is_empty());
        assert!(Tasks::default().for_image("p10", "alt/base").is_empty());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            ImagesInfo::from_json("{not json"),
            Err(Error::Parse { .. })
        ));
    }
}
