//! Preflight command - runs preflight checks.

use anyhow::Result;

use distroforge::config::Config;
use distroforge::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(config: &Config, strict: bool) -> Result<()> {
    if strict {
        preflight::run_preflight_or_fail(config, true)?;
    } else {
        let report = preflight::run_preflight(config);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to exit non-zero (warnings included).");
        }
    }
    Ok(())
}
