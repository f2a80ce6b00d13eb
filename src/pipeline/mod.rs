//! Multi-arch build orchestration.
//!
//! For every (organization, branch) pair the pipeline optionally refreshes
//! rendered recipes, loads distroless manifests once, resolves the build
//! order and then walks it: requested images are built per architecture
//! (distroless assembly or a direct `podman build`), tagged and pushed.
//!
//! Graph and order errors abort the run before any image is touched. A
//! failing image is recorded in the [`BuildReport`] and the walk continues.

pub mod distroless;
pub mod podman;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;

use crate::config::Config;
use crate::error::{Error, IoContext, Result};
use crate::graph::{self, DependencyPolicy, GraphBuilder};
use crate::image::{Catalog, Distroless, Image};
use crate::policy::{ImagesInfo, Tags, Tasks};
use crate::process::Executor;
use crate::render::Renderer;
use crate::timing::Timer;

/// Optional steps of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Delete previously rendered recipes.
    RemoveRecipes,
    /// Render every recipe template.
    RenderRecipes,
    Build,
    Push,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::RemoveRecipes,
        Stage::RenderRecipes,
        Stage::Build,
        Stage::Push,
    ];
}

/// What to build, independent of organization and branch.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Canonical names of the images to build; everything else is skipped.
    pub images: BTreeSet<String>,
    pub arches: Vec<String>,
    pub stages: BTreeSet<Stage>,
    /// Organization used in published references instead of the source one.
    pub overwrite_organization: Option<String>,
    /// Key id passed to `--sign-by` on push.
    pub sign: Option<String>,
    pub policy: DependencyPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            images: BTreeSet::new(),
            arches: Vec::new(),
            stages: Stage::ALL.into_iter().collect(),
            overwrite_organization: None,
            sign: None,
            policy: DependencyPolicy::default(),
        }
    }
}

/// An image that failed to build, tag or push.
#[derive(Debug)]
pub struct ImageFailure {
    pub image: String,
    pub branch: String,
    pub arch: Option<String>,
    pub error: Error,
}

impl fmt::Display for ImageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{} ({}, {}): {}", self.image, self.branch, arch, self.error),
            None => write!(f, "{} ({}): {}", self.image, self.branch, self.error),
        }
    }
}

/// Outcome of a run across all organizations and branches.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// `image@branch` of every image that went through its stages
    pub built: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<ImageFailure>,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn print(&self) {
        println!("=== Build Summary ===");
        println!("  Built:   {}", self.built.len());
        println!("  Skipped: {}", self.skipped.len());
        println!("  Failed:  {}", self.failures.len());
        for failure in &self.failures {
            println!("    {}", failure);
        }
    }
}

/// Shared collaborators and options of a run.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub exec: &'a dyn Executor,
    pub images_info: &'a ImagesInfo,
    pub tags: &'a Tags,
    pub tasks: &'a Tasks,
    pub options: &'a BuildOptions,
}

impl<'a> Pipeline<'a> {
    /// Run every organization on every branch.
    pub fn run(&self, organizations: &[String], branches: &[String]) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        for organization in organizations {
            for branch in branches {
                self.run_branch(organization, branch, &mut report)?;
            }
        }
        Ok(report)
    }

    /// Run one (organization, branch) pair, appending to `report`.
    pub fn run_branch(
        &self,
        organization: &str,
        branch: &str,
        report: &mut BuildReport,
    ) -> Result<()> {
        println!("\n=== {} ({}) ===", organization, branch);

        let catalog = Catalog::new(&self.config.org_dir);
        let mut ctx = RunContext {
            pipeline: self,
            organization,
            branch,
            images: catalog.images(organization)?,
            distrolesses: BTreeMap::new(),
        };

        let stages = &self.options.stages;
        if stages.contains(&Stage::RemoveRecipes) {
            ctx.remove_recipes()?;
        }
        if stages.contains(&Stage::RenderRecipes) {
            ctx.render_recipes()?;
        }

        ctx.distrolesses = load_distrolesses(&ctx.images)?;
        let order = ctx.build_order()?;
        println!("Build order: {}", order.join(" "));

        for name in &order {
            if !self.options.images.contains(name) {
                continue;
            }
            // Requirements outside this organization are never built here
            let Some(image) = ctx.image(name) else {
                continue;
            };
            ctx.process(image, report);
        }
        Ok(())
    }
}

/// Load the manifest of every distroless image, keyed by canonical name.
pub fn load_distrolesses(images: &[Image]) -> Result<BTreeMap<String, Distroless>> {
    let mut distrolesses = BTreeMap::new();
    for image in images.iter().filter(|i| i.is_distroless()) {
        let distroless = Distroless::load(&image.distroless_file())?;
        distrolesses.insert(image.canonical_name.clone(), distroless);
    }
    Ok(distrolesses)
}

/// State of one (organization, branch) run, handed to every stage.
pub struct RunContext<'a> {
    pub pipeline: &'a Pipeline<'a>,
    pub organization: &'a str,
    pub branch: &'a str,
    pub images: Vec<Image>,
    pub distrolesses: BTreeMap<String, Distroless>,
}

impl RunContext<'_> {
    pub fn exec(&self) -> &dyn Executor {
        self.pipeline.exec
    }

    pub fn config(&self) -> &Config {
        self.pipeline.config
    }

    pub fn image(&self, canonical_name: &str) -> Option<&Image> {
        self.images.iter().find(|i| i.canonical_name == canonical_name)
    }

    /// Organization that appears in published references.
    pub fn publish_organization(&self) -> &str {
        self.pipeline
            .options
            .overwrite_organization
            .as_deref()
            .unwrap_or(self.organization)
    }

    /// `<registry>/<organization>/<name>:<tag>` as pushed.
    pub fn full_tag(&self, base_name: &str, tag: &str) -> String {
        format!(
            "{}{}/{}:{}",
            self.config().registry_prefix(),
            self.publish_organization(),
            base_name,
            tag
        )
    }

    /// Reference of the builder helper image for this branch.
    pub fn builder_ref(&self) -> String {
        let builder = Image::new(self.config().builder_image.as_str(), &self.config().org_dir);
        let organization = self
            .pipeline
            .options
            .overwrite_organization
            .as_deref()
            .unwrap_or(builder.organization());
        format!(
            "{}{}/{}:{}",
            self.config().registry_prefix(),
            organization,
            builder.base_name(),
            self.branch
        )
    }

    /// Renderer for what gets built and published.
    pub fn recipe_renderer(&self, image: &Image) -> Renderer {
        let tasks = self.pipeline.tasks.for_image(self.branch, &image.canonical_name);
        Renderer::new(
            &self.config().registry_prefix(),
            self.branch,
            self.publish_organization(),
        )
        .with_tasks(tasks)
    }

    pub fn remove_recipes(&self) -> Result<()> {
        let mut removed = 0;
        for image in &self.images {
            let recipe = image.recipe();
            if recipe.exists() {
                fs::remove_file(&recipe).at_path(&recipe)?;
                removed += 1;
            }
        }
        println!("  Removed {} rendered recipe(s)", removed);
        Ok(())
    }

    pub fn render_recipes(&self) -> Result<()> {
        let mut rendered = 0;
        for image in self.images.iter().filter(|i| i.has_template()) {
            let template_path = image.template();
            let template = fs::read_to_string(&template_path).at_path(&template_path)?;
            let text = self
                .recipe_renderer(image)
                .render(&template, &template_path.display().to_string())?;
            let recipe = image.recipe();
            fs::write(&recipe, text + "\n").at_path(&recipe)?;
            rendered += 1;
        }
        println!("  Rendered {} recipe(s)", rendered);
        Ok(())
    }

    pub fn build_order(&self) -> Result<Vec<String>> {
        let builder = GraphBuilder {
            organization: self.organization,
            distrolesses: &self.distrolesses,
            builder_image: &self.config().builder_image,
            policy: self.pipeline.options.policy,
        };
        let mut renderer = Renderer::new(
            &self.config().registry_prefix(),
            self.branch,
            self.organization,
        );
        let graph = builder.build(&self.images, &mut renderer)?;
        graph::build_order(&graph)
    }

    /// Build, tag and push one image, recording the outcome.
    fn process(&self, image: &Image, report: &mut BuildReport) {
        let name = &image.canonical_name;
        let key = format!("{}@{}", name, self.branch);
        let info = self.pipeline.images_info;

        if !image.has_template() && !image.is_distroless() {
            eprintln!("  [WARN] Skipping {}: no recipe template or distroless manifest", name);
            report.skipped.push(key);
            return;
        }

        if info.skip_branch(name, self.branch) {
            println!("Skipping {}: disabled on {}", name, self.branch);
            report.skipped.push(key);
            return;
        }

        let tags = self.pipeline.tags.tags(self.branch, name);
        let manifest = self.full_tag(image.base_name(), &tags[0]);
        let stages = &self.pipeline.options.stages;

        if stages.contains(&Stage::Build) {
            let arches = info.build_arches(name, &self.pipeline.options.arches);
            if arches.is_empty() {
                eprintln!("  [WARN] {}: every requested arch is skipped", name);
                report.skipped.push(key);
                return;
            }
            if let Err(failure) = self.build(image, &manifest, &tags, &arches) {
                report.failures.push(failure);
                return;
            }
        }

        if stages.contains(&Stage::Push) {
            for tag in &tags {
                let reference = self.full_tag(image.base_name(), tag);
                let pushed = podman::push(
                    self.exec(),
                    &reference,
                    self.pipeline.options.sign.as_deref(),
                );
                if let Err(error) = pushed {
                    report.failures.push(self.failure(image, None, error));
                    return;
                }
            }
        }

        report.built.push(key);
    }

    fn build(
        &self,
        image: &Image,
        manifest: &str,
        tags: &[String],
        arches: &[String],
    ) -> std::result::Result<(), ImageFailure> {
        println!("Building image {} for {} arches", manifest, arches.join(","));
        let timer = Timer::start(manifest);

        podman::remove_stale(self.exec(), manifest);

        match self.distrolesses.get(&image.canonical_name) {
            Some(manifest_def) => {
                let from = self
                    .recipe_renderer(image)
                    .render(&manifest_def.from, &image.canonical_name)
                    .map_err(|e| self.failure(image, None, e))?;
                let builder_ref = self.builder_ref();
                for arch in arches {
                    let build = distroless::ArchBuild {
                        arch,
                        image_dir: &image.path,
                        builder_ref: &builder_ref,
                        from: &from,
                        manifest,
                        dl_command: &self.config().dl_command,
                        archive: &self.config().archive,
                        distroless: manifest_def,
                    };
                    build
                        .run(self.exec())
                        .map_err(|e| self.failure(image, Some(arch.as_str()), e))?;
                }
            }
            None => podman::build(self.exec(), &image.path, manifest, arches)
                .map_err(|e| self.failure(image, None, e))?,
        }

        for tag in &tags[1..] {
            let alias = self.full_tag(image.base_name(), tag);
            podman::tag(self.exec(), manifest, &alias)
                .map_err(|e| self.failure(image, None, e))?;
        }

        timer.finish();
        Ok(())
    }

    fn failure(&self, image: &Image, arch: Option<&str>, error: Error) -> ImageFailure {
        ImageFailure {
            image: image.canonical_name.clone(),
            branch: self.branch.to_string(),
            arch: arch.map(str::to_string),
            error,
        }
    }
}
