//! Configuration management for distroforge.
//!
//! Reads defaults from environment variables (`main` loads `.env` first).
//! Command-line flags override whatever is loaded here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_REGISTRY: &str = "registry.altlinux.org";
pub const DEFAULT_LATEST: &str = "p10";
pub const DEFAULT_BUILDER_IMAGE: &str = "alt/distroless-builder";
pub const DEFAULT_ARCHIVE: &str = "/usr/src/distroless/distroless.tar";

pub const BRANCHES: &[&str] = &["p9", "p10", "sisyphus"];
pub const ARCHES: &[&str] = &["amd64", "386", "arm64", "arm", "ppc64le"];

/// distroforge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the `<organization>/<image>` definition tree (default: org)
    pub org_dir: PathBuf,
    /// Registry prefix; empty means local-only references
    pub registry: String,
    /// Branch that additionally gets the `latest` tag
    pub latest: String,
    /// Skip-policy file (default: images-info.json)
    pub images_info: PathBuf,
    /// Canonical name of the distroless builder helper image
    pub builder_image: String,
    /// Command that runs the file-set helper inside the builder context
    pub dl_command: String,
    /// Archive path produced inside the builder context
    pub archive: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load(base_dir: &Path) -> Self {
        Self::from_vars(base_dir, &std::env::vars().collect())
    }

    /// Build a configuration from an explicit variable map.
    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Self {
        let path = |key: &str, default: &str| {
            let path = PathBuf::from(vars.get(key).map(String::as_str).unwrap_or(default));
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };
        let string = |key: &str, default: &str| {
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            org_dir: path("DISTROFORGE_ORG_DIR", "org"),
            registry: string("DISTROFORGE_REGISTRY", DEFAULT_REGISTRY),
            latest: string("DISTROFORGE_LATEST", DEFAULT_LATEST),
            images_info: path("DISTROFORGE_IMAGES_INFO", "images-info.json"),
            builder_image: string("DISTROFORGE_BUILDER_IMAGE", DEFAULT_BUILDER_IMAGE),
            dl_command: string("DISTROFORGE_DL_COMMAND", "distroforge"),
            archive: string("DISTROFORGE_ARCHIVE", DEFAULT_ARCHIVE),
        }
    }

    /// Registry prefix with exactly one trailing slash, or empty.
    pub fn registry_prefix(&self) -> String {
        if self.registry.is_empty() {
            String::new()
        } else {
            format!("{}/", self.registry.trim_end_matches('/'))
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  ORG_DIR: {}", self.org_dir.display());
        println!("  REGISTRY: {}", self.registry);
        println!("  LATEST: {}", self.latest);
        println!("  IMAGES_INFO: {}", self.images_info.display());
        println!("  BUILDER_IMAGE: {}", self.builder_image);
        println!("  DL_COMMAND: {}", self.dl_command);
        println!("  ARCHIVE: {}", self.archive);
        if self.org_dir.is_dir() {
            println!("  Definitions: FOUND");
        } else {
            println!("  Definitions: NOT FOUND");
        }
    }
}
