//! podman invocations: direct builds, aliases and pushes.

use std::path::Path;

use crate::error::Result;
use crate::process::{Cmd, Executor};

/// Forget a previous local image and manifest list of the same reference.
///
/// Both usually fail because nothing stale exists; that is not an error.
pub fn remove_stale(exec: &dyn Executor, manifest: &str) {
    for cmd in [
        Cmd::new("podman").args(["image", "rm", "--force", manifest]),
        Cmd::new("podman").args(["manifest", "rm", manifest]),
    ] {
        let _ = exec.execute(cmd.quiet());
    }
}

/// `--platform` value for a set of arches.
pub fn platforms(arches: &[String]) -> String {
    arches
        .iter()
        .map(|a| format!("linux/{}", a))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the rendered recipe in `image_dir` for every arch into `manifest`.
pub fn build(exec: &dyn Executor, image_dir: &Path, manifest: &str, arches: &[String]) -> Result<()> {
    exec.execute(
        Cmd::new("podman")
            .args(["build", "--rm", "--force-rm"])
            .arg(format!("--manifest={}", manifest))
            .arg(format!("--platform={}", platforms(arches)))
            .arg(".")
            .dir(image_dir)
            .stream(),
    )?;
    Ok(())
}

pub fn tag(exec: &dyn Executor, manifest: &str, alias: &str) -> Result<()> {
    exec.execute(Cmd::new("podman").args(["tag", manifest, alias]))?;
    Ok(())
}

pub fn push(exec: &dyn Executor, manifest: &str, sign: Option<&str>) -> Result<()> {
    println!("Push manifest {}", manifest);
    let mut cmd = Cmd::new("podman")
        .args(["manifest", "push", manifest])
        .arg(format!("docker://{}", manifest));
    if let Some(key) = sign {
        cmd = cmd.arg(format!("--sign-by={}", key));
    }
    exec.execute(cmd.stream())?;
    Ok(())
}
