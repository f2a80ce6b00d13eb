//! Host tool availability checks.

use crate::process;

use super::types::{CheckResult, Scope};

/// Tools the host runs directly, with package hints.
const REQUIRED_TOOLS: &[(&str, &str, &str)] = &[
    ("buildah", "buildah", "Required for distroless assembly"),
    ("podman", "podman", "Required to build, tag and push manifests"),
];

/// Tools `dl` runs; normally present only inside the builder image.
const BUILDER_TOOLS: &[(&str, &str, &str)] = &[
    ("rpm", "rpm", "Needed by `dl add -p` and `--library-packages`"),
    ("ldd", "glibc-utils", "Needed by `dl add -b`"),
];

pub fn check_host_tools() -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (tool, package, purpose) in REQUIRED_TOOLS {
        results.push(check_tool_exists(tool, package, purpose, true));
    }
    for (tool, package, purpose) in BUILDER_TOOLS {
        results.push(check_tool_exists(tool, package, purpose, false));
    }

    results
}

fn check_tool_exists(tool: &str, package: &str, purpose: &str, required: bool) -> CheckResult {
    match process::which(tool) {
        Some(path) => Scope::Host.pass_with(tool, path.display().to_string()),
        None => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                Scope::Host.fail(tool, msg)
            } else {
                Scope::Host.warn(tool, msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;

    #[test]
    fn test_missing_optional_tool_warns() {
        let result = check_tool_exists("nonexistent_tool_12345", "x", "", false);
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn test_missing_required_tool_fails() {
        let result = check_tool_exists("nonexistent_tool_12345", "x", "", true);
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.scope, Scope::Host);
        assert_eq!(result.subject, "nonexistent_tool_12345");
    }

    #[test]
    fn test_present_tool_passes_with_path() {
        let result = check_tool_exists("sh", "bash", "", true);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.details.is_some());
    }
}
