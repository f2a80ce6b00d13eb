//! Preflight checks for distroforge builds.
//!
//! Validates host tools and the definition tree before touching any image.
//! Run with `distroforge preflight` to check everything is ready.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};

use crate::config::Config;

pub use types::{CheckResult, CheckStatus, PreflightReport, Scope};

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools());

    println!("Checking image definitions...");
    checks.extend(environment::check_definitions(config));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if anything blocks the build.
///
/// `strict` also treats warnings as blocking.
pub fn run_preflight_or_fail(config: &Config, strict: bool) -> Result<()> {
    let report = run_preflight(config);
    report.print();

    let blocking = report.blocking(strict);
    if !blocking.is_empty() {
        bail!(
            "Preflight failed for: {}. Fix the issues above before building.",
            blocking.join(", ")
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
