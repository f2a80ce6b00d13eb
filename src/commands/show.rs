//! Show command - displays information.

use anyhow::Result;

use distroforge::config::Config;
use distroforge::image::Catalog;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// List image definitions and their kind
    Images,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Images => {
            let catalog = Catalog::new(&config.org_dir);
            for image in catalog.all_images()? {
                let kind = match (image.has_template(), image.is_distroless()) {
                    (true, _) => "recipe",
                    (false, true) => "distroless",
                    (false, false) => "empty",
                };
                println!("  {:<40} {}", image.canonical_name, kind);
            }
        }
    }
    Ok(())
}
