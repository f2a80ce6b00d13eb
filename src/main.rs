//! distroforge - multi-branch, multi-arch container image builder.
//!
//! Resolves the build order of image definitions, assembles distroless
//! root filesystems inside a builder container and publishes manifest lists.

mod commands;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use distroforge::config::{Config, ARCHES, BRANCHES};
use distroforge::dl::DEFAULT_DL_FILE;
use distroforge::pipeline::Stage;

#[derive(Parser)]
#[command(name = "distroforge")]
#[command(about = "Multi-branch, multi-arch container image builder")]
#[command(
    after_help = "QUICK START:\n  distroforge preflight           Check host tools and definitions\n  distroforge order               Print the build order\n  distroforge build -o alt --dry-run  Show what a build would run"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, tag and push images in dependency order
    #[command(group(ArgGroup::new("selection").required(true).args(["images", "organizations"])))]
    Build {
        /// Images to build (organization/name)
        #[arg(short, long, num_args = 1..)]
        images: Vec<String>,

        /// Build every image of these organizations
        #[arg(short, long, num_args = 1..)]
        organizations: Vec<String>,

        /// Registry prefix of references (empty for local-only)
        #[arg(short, long)]
        registry: Option<String>,

        /// Publish under this organization instead of the source one
        #[arg(long)]
        overwrite_organization: Option<String>,

        /// Branch that also gets the `latest` tag
        #[arg(short, long)]
        latest: Option<String>,

        /// Task injection file (JSON)
        #[arg(long)]
        tasks: Option<PathBuf>,

        /// Tag overrides file (JSON)
        #[arg(long)]
        tags: Option<PathBuf>,

        /// Print container engine commands instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Key id to sign pushed manifests with
        #[arg(long)]
        sign: Option<String>,

        #[arg(long, num_args = 1..)]
        skip_images: Vec<String>,

        #[arg(short, long, num_args = 1.., value_parser = clap::builder::PossibleValuesParser::new(ARCHES), default_values = ARCHES)]
        arches: Vec<String>,

        #[arg(long, num_args = 1.., value_parser = clap::builder::PossibleValuesParser::new(ARCHES))]
        skip_arches: Vec<String>,

        #[arg(short, long, num_args = 1.., value_parser = clap::builder::PossibleValuesParser::new(BRANCHES), default_values = BRANCHES)]
        branches: Vec<String>,

        #[arg(long, num_args = 1.., value_parser = clap::builder::PossibleValuesParser::new(BRANCHES))]
        skip_branches: Vec<String>,

        #[arg(long, num_args = 1.., value_enum, default_values = ["remove-recipes", "render-recipes", "build", "push"])]
        stages: Vec<StageArg>,

        #[arg(long, num_args = 1.., value_enum)]
        skip_stages: Vec<StageArg>,

        /// Record every base as a dependency, not only same-organization ones
        #[arg(long)]
        all_bases: bool,
    },

    /// Print the build order of organizations
    Order {
        /// Organizations (default: all)
        #[arg(short, long, num_args = 1..)]
        organizations: Vec<String>,

        /// Branch to render recipes for (default: the latest branch)
        #[arg(short, long)]
        branch: Option<String>,

        #[arg(long)]
        all_bases: bool,

        /// Also print what each image requires
        #[arg(long)]
        requires: bool,
    },

    /// Collect and archive a distroless file set (runs inside the builder)
    Dl {
        /// File set backing file
        #[arg(long, default_value = DEFAULT_DL_FILE)]
        dl_file: PathBuf,

        #[command(subcommand)]
        action: DlCommand,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Run preflight checks (verify host tools and definitions before build)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StageArg {
    RemoveRecipes,
    RenderRecipes,
    Build,
    Push,
}

impl From<StageArg> for Stage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::RemoveRecipes => Stage::RemoveRecipes,
            StageArg::RenderRecipes => Stage::RenderRecipes,
            StageArg::Build => Stage::Build,
            StageArg::Push => Stage::Push,
        }
    }
}

#[derive(Subcommand)]
enum DlCommand {
    /// Add paths to the file set
    Add {
        /// Remove the file set first
        #[arg(long)]
        clean: bool,

        /// Append literal paths without glob expansion
        #[arg(long)]
        noglob: bool,

        /// Append the resolved target after every symlink
        #[arg(long)]
        follow_symlinks: bool,

        #[arg(short, long, num_args = 1..)]
        files: Vec<String>,

        #[arg(short = 'l', long, num_args = 1..)]
        file_lists: Vec<String>,

        #[arg(short, long, num_args = 1..)]
        packages: Vec<String>,

        /// Binaries whose shared library closure is added
        #[arg(short = 'b', long, num_args = 1..)]
        library_binaries: Vec<String>,

        /// Add the owning packages of the closure instead of the library files
        #[arg(long)]
        library_packages: bool,
    },
    /// Create a tar archive from the file set
    Tar {
        #[arg(short, long, default_value = "distroless.tar")]
        outfile: PathBuf,

        /// Exclusion regexes; any match drops the entry
        #[arg(short, long, num_args = 1..)]
        regexes: Vec<String>,
    },
    /// Remove the file set
    Clean,
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// List image definitions
    Images,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_dir = std::env::current_dir()?;

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load(&base_dir);

    match cli.command {
        Commands::Build {
            images,
            organizations,
            registry,
            overwrite_organization,
            latest,
            tasks,
            tags,
            dry_run,
            sign,
            skip_images,
            arches,
            skip_arches,
            branches,
            skip_branches,
            stages,
            skip_stages,
            all_bases,
        } => {
            let args = commands::build::BuildArgs {
                images,
                organizations,
                registry,
                overwrite_organization,
                latest,
                tasks,
                tags,
                dry_run,
                sign,
                skip_images,
                arches,
                skip_arches,
                branches,
                skip_branches,
                stages: stages.into_iter().map(Stage::from).collect(),
                skip_stages: skip_stages.into_iter().map(Stage::from).collect(),
                all_bases,
            };
            commands::cmd_build(&config, args)?;
        }

        Commands::Order {
            organizations,
            branch,
            all_bases,
            requires,
        } => {
            commands::cmd_order(&config, organizations, branch, all_bases, requires)?;
        }

        Commands::Dl { dl_file, action } => {
            let action = match action {
                DlCommand::Add {
                    clean,
                    noglob,
                    follow_symlinks,
                    files,
                    file_lists,
                    packages,
                    library_binaries,
                    library_packages,
                } => commands::dl::DlAction::Add {
                    clean,
                    glob: !noglob,
                    follow_symlinks,
                    files,
                    file_lists,
                    packages,
                    library_binaries,
                    library_packages,
                },
                DlCommand::Tar { outfile, regexes } => {
                    commands::dl::DlAction::Tar { outfile, regexes }
                }
                DlCommand::Clean => commands::dl::DlAction::Clean,
            };
            commands::cmd_dl(&dl_file, action)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Images => commands::show::ShowTarget::Images,
            };
            commands::cmd_show(show_target, &config)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }
    }

    Ok(())
}
