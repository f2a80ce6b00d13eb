//! Preflight check types and report.

use std::fmt;

/// What a check looks at. The report prints one section per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Tools on the machine running `distroforge build`.
    Host,
    /// The `<org-dir>` tree and its side files.
    Definitions,
}

impl Scope {
    pub fn pass(self, subject: &str) -> CheckResult {
        CheckResult::new(self, subject, CheckStatus::Pass, None)
    }

    pub fn pass_with(self, subject: &str, details: impl Into<String>) -> CheckResult {
        CheckResult::new(self, subject, CheckStatus::Pass, Some(details.into()))
    }

    pub fn fail(self, subject: &str, details: impl Into<String>) -> CheckResult {
        CheckResult::new(self, subject, CheckStatus::Fail, Some(details.into()))
    }

    pub fn warn(self, subject: &str, details: impl Into<String>) -> CheckResult {
        CheckResult::new(self, subject, CheckStatus::Warn, Some(details.into()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Host => write!(f, "Host tools"),
            Scope::Definitions => write!(f, "Image definitions"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    /// A build will fail.
    Fail,
    /// Usable, but something is missing or suspicious.
    Warn,
}

/// Outcome for one subject: a tool, a side file or an image.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub scope: Scope,
    pub subject: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn new(scope: Scope, subject: &str, status: CheckStatus, details: Option<String>) -> Self {
        Self {
            scope,
            subject: subject.to_string(),
            status,
            details,
        }
    }

    /// Stops a build. Under `strict`, warnings do too.
    pub fn is_blocking(&self, strict: bool) -> bool {
        match self.status {
            CheckStatus::Fail => true,
            CheckStatus::Warn => strict,
            CheckStatus::Pass => false,
        }
    }
}

/// Results of all preflight checks.
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// No check failed. Warnings are fine.
    pub fn all_passed(&self) -> bool {
        self.blocking(false).is_empty()
    }

    /// Subjects that stop a build, in check order.
    pub fn blocking(&self, strict: bool) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.is_blocking(strict))
            .map(|c| c.subject.as_str())
            .collect()
    }

    pub fn fail_count(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    pub fn warn_count(&self) -> usize {
        self.count(CheckStatus::Warn)
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn print(&self) {
        println!("=== Preflight Check Results ===");

        let mut scope = None;
        for check in &self.checks {
            if scope != Some(check.scope) {
                scope = Some(check.scope);
                println!("\n{}:", check.scope);
            }
            let icon = match check.status {
                CheckStatus::Pass => "✓",
                CheckStatus::Fail => "✗",
                CheckStatus::Warn => "⚠",
            };
            match &check.details {
                Some(details) => println!("  {} {}: {}", icon, check.subject, details),
                None => println!("  {} {}", icon, check.subject),
            }
        }

        println!();
        println!(
            "Summary: {}/{} passed, {} failed, {} warnings",
            self.count(CheckStatus::Pass),
            self.checks.len(),
            self.fail_count(),
            self.warn_count()
        );
    }
}
