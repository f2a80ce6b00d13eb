//! Image reference parsing.
//!
//! `[registry/][organization/]name[:tag]`, where a leading component is only a
//! registry if it looks like a host (contains `.` or `:`, or is `localhost`).

use regex::Regex;
use std::sync::OnceLock;

/// Name used by recipes that start from an empty filesystem.
pub const SCRATCH: &str = "scratch";

const REGISTRY: &str = r"(?P<registry>localhost(?::\d+)?|[\w-]+(?:[.:][\w-]+)+)";
const ORGANIZATION: &str = r"(?P<organization>\w+)";
const NAME: &str = r"(?P<name>[-.\w]+)";
const TAG: &str = r"(?P<tag>[\w.]+)";

fn reference_body() -> String {
    format!(r"(?:{REGISTRY}/)?(?:{ORGANIZATION}/)?{NAME}(?::{TAG})?")
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^{}$", reference_body())).expect("reference pattern is valid")
    })
}

fn from_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^\s*(?i:FROM)\s+(?:--platform=\S+\s+)?{}(?:\s+(?i:AS)\s+[-.\w]+)?\s*$",
            reference_body()
        ))
        .expect("FROM pattern is valid")
    })
}

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageRef {
    pub registry: Option<String>,
    pub organization: Option<String>,
    pub name: String,
    pub tag: Option<String>,
}

impl ImageRef {
    /// Parse a bare reference. Returns `None` when the text is not a reference.
    pub fn parse(text: &str) -> Option<Self> {
        Self::from_captures(reference_re().captures(text.trim())?)
    }

    /// Parse the base reference of a `FROM` line. Any other line yields `None`.
    pub fn from_instruction(line: &str) -> Option<Self> {
        Self::from_captures(from_re().captures(line)?)
    }

    fn from_captures(caps: regex::Captures<'_>) -> Option<Self> {
        let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
        Some(Self {
            registry: group("registry"),
            organization: group("organization"),
            name: group("name")?,
            tag: group("tag"),
        })
    }

    pub fn is_scratch(&self) -> bool {
        self.name == SCRATCH
    }

    /// `organization/name`, when the reference names an organization.
    pub fn canonical_name(&self) -> Option<String> {
        self.organization
            .as_ref()
            .map(|org| format!("{}/{}", org, self.name))
    }
}
