//! Image dependency graph.
//!
//! Maps every image of an organization to the set of images it is built
//! upon. Edges come from `FROM` lines of recipe templates or from the base
//! reference of a distroless manifest.

pub mod order;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use crate::error::{IoContext, Result};
use crate::image::{Distroless, Image, ImageRef};
use crate::render::Renderer;

pub use order::build_order;

/// canonical name -> required canonical names
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

/// Which recipe bases become edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyPolicy {
    /// Only bases of the organization under build; others are external leaves.
    #[default]
    SameOrganization,
    /// Every non-scratch base that names an organization.
    AllBases,
}

/// Everything needed to derive the edges of one organization's images.
pub struct GraphBuilder<'a> {
    pub organization: &'a str,
    pub distrolesses: &'a BTreeMap<String, Distroless>,
    /// Canonical name of the distroless builder helper image
    pub builder_image: &'a str,
    pub policy: DependencyPolicy,
}

impl GraphBuilder<'_> {
    /// Build the graph. Every image is a key, even with no requirements.
    pub fn build(&self, images: &[Image], renderer: &mut Renderer) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for image in images {
            let requires = self.requires(image, renderer)?;
            graph.insert(image.canonical_name.clone(), requires);
        }
        Ok(graph)
    }

    /// Required images of a single definition.
    pub fn requires(&self, image: &Image, renderer: &mut Renderer) -> Result<BTreeSet<String>> {
        let mut requires = BTreeSet::new();

        if image.has_template() {
            let path = image.template();
            let text = fs::read_to_string(&path).at_path(&path)?;
            for line in text.lines().filter(|l| introduces_base(l)) {
                let line = renderer.render(line, &path.display().to_string())?;
                let Some(base) = ImageRef::from_instruction(&line) else {
                    continue;
                };
                if base.is_scratch() {
                    continue;
                }
                let same_org = base.organization.as_deref() == Some(self.organization);
                if self.policy == DependencyPolicy::AllBases || same_org {
                    requires.extend(base.canonical_name());
                }
            }
        } else if let Some(distroless) = self.distrolesses.get(&image.canonical_name) {
            requires.insert(self.builder_image.to_string());
            let from = renderer.render(&distroless.from, &image.canonical_name)?;
            if let Some(base) = ImageRef::parse(&from).filter(|b| !b.is_scratch()) {
                requires.extend(base.canonical_name());
            }
        }

        Ok(requires)
    }
}

fn introduces_base(line: &str) -> bool {
    line.trim_start()
        .get(..4)
        .is_some_and(|kw| kw.eq_ignore_ascii_case("from"))
}
