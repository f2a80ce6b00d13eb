//! Build command - builds, tags and pushes images.

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

use distroforge::config::Config;
use distroforge::graph::DependencyPolicy;
use distroforge::image::Catalog;
use distroforge::pipeline::{BuildOptions, Pipeline, Stage};
use distroforge::policy::{ImagesInfo, Tags, Tasks};
use distroforge::preflight;
use distroforge::process::System;

/// Selection and flags of a build run, as given on the command line.
pub struct BuildArgs {
    pub images: Vec<String>,
    pub organizations: Vec<String>,
    pub registry: Option<String>,
    pub overwrite_organization: Option<String>,
    pub latest: Option<String>,
    pub tasks: Option<PathBuf>,
    pub tags: Option<PathBuf>,
    pub dry_run: bool,
    pub sign: Option<String>,
    pub skip_images: Vec<String>,
    pub arches: Vec<String>,
    pub skip_arches: Vec<String>,
    pub branches: Vec<String>,
    pub skip_branches: Vec<String>,
    pub stages: Vec<Stage>,
    pub skip_stages: Vec<Stage>,
    pub all_bases: bool,
}

/// Execute the build command.
pub fn cmd_build(config: &Config, args: BuildArgs) -> Result<()> {
    let mut config = config.clone();
    if let Some(registry) = args.registry {
        config.registry = registry;
    }
    if let Some(latest) = args.latest {
        config.latest = latest;
    }

    let catalog = Catalog::new(&config.org_dir);
    let known: BTreeSet<String> = catalog
        .all_images()
        .with_context(|| format!("Failed to read definitions in {}", config.org_dir.display()))?
        .into_iter()
        .map(|i| i.canonical_name)
        .collect();

    let (organizations, mut images) = select(&catalog, &known, &args.images, &args.organizations)?;
    for skipped in &args.skip_images {
        images.remove(skipped);
    }

    let branches = without(&args.branches, &args.skip_branches);
    let arches = without(&args.arches, &args.skip_arches);
    let stages: BTreeSet<Stage> = args
        .stages
        .iter()
        .filter(|s| !args.skip_stages.contains(s))
        .copied()
        .collect();

    println!("=== distroforge build ===\n");
    println!("  Organizations: {}", organizations.join(" "));
    println!("  Branches:      {}", branches.join(" "));
    println!("  Arches:        {}", arches.join(" "));
    println!("  Images:        {}", images.len());
    if args.dry_run {
        println!("  Mode:          dry run");
    }
    println!();

    let touches_engine = stages.contains(&Stage::Build) || stages.contains(&Stage::Push);
    if !args.dry_run && touches_engine {
        preflight::run_preflight_or_fail(&config, false)?;
    }

    let images_info = ImagesInfo::load(&config.images_info)
        .with_context(|| format!("Failed to load {}", config.images_info.display()))?;
    let mut tags = Tags::new(config.latest.clone());
    if let Some(path) = &args.tags {
        tags = tags
            .with_overrides_file(path)
            .with_context(|| format!("Failed to load tags from {}", path.display()))?;
    }
    let tasks = match &args.tasks {
        Some(path) => Tasks::load(path)
            .with_context(|| format!("Failed to load tasks from {}", path.display()))?,
        None => Tasks::default(),
    };

    let options = BuildOptions {
        images,
        arches,
        stages,
        overwrite_organization: args.overwrite_organization,
        sign: args.sign,
        policy: if args.all_bases {
            DependencyPolicy::AllBases
        } else {
            DependencyPolicy::SameOrganization
        },
    };
    let exec = System::new(args.dry_run);
    let pipeline = Pipeline {
        config: &config,
        exec: &exec,
        images_info: &images_info,
        tags: &tags,
        tasks: &tasks,
        options: &options,
    };

    let report = pipeline.run(&organizations, &branches)?;
    println!();
    report.print();

    if !report.success() {
        bail!("{} image build(s) failed", report.failures.len());
    }
    Ok(())
}

/// Resolve `-i` / `-o` into organizations to walk and images to build.
fn select(
    catalog: &Catalog,
    known: &BTreeSet<String>,
    images: &[String],
    organizations: &[String],
) -> Result<(Vec<String>, BTreeSet<String>)> {
    if !images.is_empty() {
        let unknown: Vec<&str> = images
            .iter()
            .filter(|i| !known.contains(*i))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            bail!("Unknown image(s): {}", unknown.join(", "));
        }
        let organizations: BTreeSet<String> = images
            .iter()
            .filter_map(|i| i.split_once('/').map(|(org, _)| org.to_string()))
            .collect();
        return Ok((organizations.into_iter().collect(), images.iter().cloned().collect()));
    }

    let all_organizations = catalog.organizations()?;
    let organizations = if organizations.is_empty() {
        all_organizations
    } else {
        for org in organizations {
            if !all_organizations.contains(org) {
                bail!("Unknown organization: {}", org);
            }
        }
        organizations.to_vec()
    };
    let images = known
        .iter()
        .filter(|i| {
            organizations
                .iter()
                .any(|org| i.split_once('/').is_some_and(|(o, _)| o == org))
        })
        .cloned()
        .collect();
    Ok((organizations, images))
}

/// `values` minus `skip`, keeping order and dropping repeats.
fn without(values: &[String], skip: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !skip.contains(value) && !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}
