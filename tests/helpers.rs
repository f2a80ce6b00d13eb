//! Shared test utilities for distroforge tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use distroforge::config::Config;
use distroforge::dl::query::{FileState, LinkerQuery, PackageFile, PackageManager};
use distroforge::error::{Error, Result};
use distroforge::process::{Cmd, CommandResult, Executor};

/// Test environment with a temporary definition tree.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Base directory (project root simulation)
    pub base_dir: PathBuf,
    /// `<base>/org`
    pub org_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();
        let org_dir = base_dir.join("org");
        fs::create_dir_all(&org_dir).expect("Failed to create org dir");

        Self {
            _temp_dir: temp_dir,
            base_dir,
            org_dir,
        }
    }

    /// Configuration rooted at this environment, registry as given.
    pub fn config(&self, registry: &str) -> Config {
        let vars = HashMap::from([("DISTROFORGE_REGISTRY".to_string(), registry.to_string())]);
        Config::from_vars(&self.base_dir, &vars)
    }

    pub fn image_dir(&self, canonical_name: &str) -> PathBuf {
        let dir = self.org_dir.join(canonical_name);
        fs::create_dir_all(&dir).expect("Failed to create image dir");
        dir
    }

    /// Add an image with a `Dockerfile.template`.
    pub fn add_recipe(&self, canonical_name: &str, template: &str) -> PathBuf {
        let dir = self.image_dir(canonical_name);
        fs::write(dir.join("Dockerfile.template"), template).expect("Failed to write template");
        dir
    }

    /// Add an image with a `distroless.toml`.
    pub fn add_distroless(&self, canonical_name: &str, manifest: &str) -> PathBuf {
        let dir = self.image_dir(canonical_name);
        fs::write(dir.join("distroless.toml"), manifest).expect("Failed to write manifest");
        dir
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.base_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }
}

/// Records every command instead of running it.
#[derive(Default)]
pub struct Recorder {
    pub commands: RefCell<Vec<Cmd>>,
    /// Commands whose rendering contains this text fail
    pub fail_on: Option<String>,
}

impl Recorder {
    pub fn failing_on(text: &str) -> Self {
        Self {
            commands: RefCell::new(Vec::new()),
            fail_on: Some(text.to_string()),
        }
    }

    /// Rendered command lines, cleanup included.
    pub fn lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|c| c.to_string()).collect()
    }

    /// Rendered command lines that start with `prefix`.
    pub fn lines_starting(&self, prefix: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.starts_with(prefix))
            .collect()
    }
}

impl Executor for Recorder {
    fn execute(&self, cmd: Cmd) -> Result<CommandResult> {
        let line = cmd.to_string();
        self.commands.borrow_mut().push(cmd.clone());
        match &self.fail_on {
            Some(text) if line.contains(text.as_str()) && !cmd.is_allow_fail() => {
                Err(Error::ExternalTool {
                    command: line,
                    code: 1,
                    stderr: "simulated failure".to_string(),
                })
            }
            _ => Ok(CommandResult::ok("")),
        }
    }
}

/// In-memory package database.
#[derive(Default)]
pub struct FakeRpm {
    /// package -> (state, path)
    pub packages: BTreeMap<String, Vec<(String, String)>>,
    /// path -> owning package
    pub owners: BTreeMap<String, String>,
}

impl FakeRpm {
    pub fn package(mut self, name: &str, files: &[(&str, &str)]) -> Self {
        for (_, path) in files {
            self.owners.insert(path.to_string(), name.to_string());
        }
        self.packages.insert(
            name.to_string(),
            files
                .iter()
                .map(|(state, path)| (state.to_string(), path.to_string()))
                .collect(),
        );
        self
    }
}

impl PackageManager for FakeRpm {
    fn installed_files(&self, package: &str) -> Result<Vec<PackageFile>> {
        let files = self.packages.get(package).ok_or_else(|| Error::ExternalTool {
            command: format!("rpm -qls {}", package),
            code: 1,
            stderr: format!("package {} is not installed", package),
        })?;
        Ok(files
            .iter()
            .map(|(state, path)| PackageFile {
                state: FileState::parse(state),
                path: path.clone(),
            })
            .collect())
    }

    fn owner(&self, path: &str) -> Result<String> {
        self.owners.get(path).cloned().ok_or_else(|| Error::ExternalTool {
            command: format!("rpm -qf {}", path),
            code: 1,
            stderr: format!("file {} is not owned by any package", path),
        })
    }
}

/// Fixed library closures per binary.
#[derive(Default)]
pub struct FakeLdd {
    pub closures: BTreeMap<String, Vec<String>>,
}

impl FakeLdd {
    pub fn binary(mut self, binary: &str, libs: &[&str]) -> Self {
        self.closures.insert(
            binary.to_string(),
            libs.iter().map(|l| l.to_string()).collect(),
        );
        self
    }
}

impl LinkerQuery for FakeLdd {
    fn libraries(&self, binary: &str) -> Result<Vec<String>> {
        self.closures.get(binary).cloned().ok_or_else(|| Error::ExternalTool {
            command: format!("ldd {}", binary),
            code: 1,
            stderr: "not a regular file".to_string(),
        })
    }
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that a file does not exist.
pub fn assert_file_not_exists(path: &Path) {
    assert!(!path.exists(), "Expected file to NOT exist: {}", path.display());
}

/// Assert that file contains specific content.
pub fn assert_file_contains(path: &Path, content: &str) {
    let actual = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert!(
        actual.contains(content),
        "File {} should contain '{}'\nActual content:\n{}",
        path.display(),
        content,
        actual
    );
}

/// Index of `needle` in `haystack`, panicking with context if absent.
pub fn position(haystack: &[String], needle: &str) -> usize {
    haystack
        .iter()
        .position(|s| s == needle)
        .unwrap_or_else(|| panic!("{} not found in {:?}", needle, haystack))
}
