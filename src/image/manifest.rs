//! Distroless manifest (`distroless.toml`).
//!
//! ```toml
//! from = "{{ registry }}{{ organization }}/base:{{ branch }}"
//! files = ["/etc/os-release", "/usr/share/zoneinfo/UTC"]
//! file-lists = ["nginx.list"]
//! packages = ["nginx"]
//! library-binaries = ["/usr/sbin/nginx"]
//! exclude-regexes = ["^/usr/share/doc/.*"]
//! entrypoint = "/usr/sbin/nginx"
//!
//! [copy]
//! "nginx.conf" = "/etc/nginx/nginx.conf"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, IoContext, Result};

/// How library closures of `library-binaries` are turned into paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryMode {
    /// Append each resolved library file.
    #[default]
    Files,
    /// Append every normal file of each library's owning package.
    Packages,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Distroless {
    /// Base reference of the target image, before rendering.
    pub from: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub file_lists: Vec<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub library_binaries: Vec<String>,
    #[serde(default)]
    pub library_mode: LibraryMode,
    #[serde(default)]
    pub exclude_regexes: Vec<String>,
    /// Packages reinstalled in the builder before collecting files.
    pub builder_install_packages: Option<Vec<String>>,
    pub timezone: Option<String>,
    /// Local path (relative to the definition dir) -> path in the image.
    #[serde(default)]
    pub copy: BTreeMap<String, String>,
    pub cmd: Option<String>,
    pub entrypoint: Option<String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    /// Older spelling of `workdir`; `workdir` wins when both are set.
    pub workingdir: Option<String>,
}

impl Distroless {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at_path(path)?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.workdir.as_deref().or(self.workingdir.as_deref())
    }

    pub fn from_toml(text: &str, what: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::parse(what, e))
    }

    /// `buildah config` flags for the image configuration.
    pub fn config_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        for (flag, value) in [
            ("cmd", self.cmd.as_deref()),
            ("entrypoint", self.entrypoint.as_deref()),
            ("user", self.user.as_deref()),
            ("workingdir", self.working_dir()),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                options.push(format!("--{}={}", flag, value));
            }
        }
        options
    }
}
