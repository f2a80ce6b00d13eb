//! Order command - prints the resolved build order.

use anyhow::{Context, Result};

use distroforge::config::Config;
use distroforge::graph::{build_order, DependencyPolicy, GraphBuilder};
use distroforge::image::Catalog;
use distroforge::pipeline::load_distrolesses;
use distroforge::render::Renderer;

/// Execute the order command.
pub fn cmd_order(
    config: &Config,
    organizations: Vec<String>,
    branch: Option<String>,
    all_bases: bool,
    show_requires: bool,
) -> Result<()> {
    let catalog = Catalog::new(&config.org_dir);
    let organizations = if organizations.is_empty() {
        catalog.organizations()?
    } else {
        organizations
    };
    let branch = branch.unwrap_or_else(|| config.latest.clone());
    let policy = if all_bases {
        DependencyPolicy::AllBases
    } else {
        DependencyPolicy::SameOrganization
    };

    for organization in &organizations {
        let images = catalog.images(organization)?;
        let distrolesses = load_distrolesses(&images)?;
        let builder = GraphBuilder {
            organization,
            distrolesses: &distrolesses,
            builder_image: &config.builder_image,
            policy,
        };
        let mut renderer = Renderer::new(&config.registry_prefix(), &branch, organization);
        let graph = builder
            .build(&images, &mut renderer)
            .with_context(|| format!("Failed to build dependency graph of {}", organization))?;
        let order = build_order(&graph)
            .with_context(|| format!("No build order for {} on {}", organization, branch))?;

        println!("{} ({}):", organization, branch);
        for (n, name) in order.iter().enumerate() {
            match graph.get(name).filter(|r| show_requires && !r.is_empty()) {
                Some(requires) => {
                    let requires: Vec<&str> = requires.iter().map(String::as_str).collect();
                    println!("  {:>3}. {} <- {}", n + 1, name, requires.join(" "));
                }
                None => println!("  {:>3}. {}", n + 1, name),
            }
        }
    }

    Ok(())
}
