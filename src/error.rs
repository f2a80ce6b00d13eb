//! Error taxonomy for the library layer.
//!
//! The binary wraps these in `anyhow` for reporting; library code returns
//! [`Result`] so callers can tell a cycle from a failed tool invocation.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A manifest, side file or pattern is malformed.
    #[error("parse error in {what}: {reason}")]
    Parse { what: String, reason: String },

    /// The dependency graph has no valid build order.
    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit (or spawn failure) of buildah, podman, rpm or ldd.
    #[error("'{command}' failed (exit code {code}){}", fmt_stderr(.stderr))]
    ExternalTool {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to render {what}: {reason}")]
    Render { what: String, reason: String },
}

fn fmt_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{}", stderr)
    }
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// Attach a path to `std::io` results.
pub trait IoContext<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
