//! Definition tree checks (org dir, side files, manifests).

use crate::config::Config;
use crate::image::{Catalog, Distroless};
use crate::policy::ImagesInfo;

use super::types::{CheckResult, Scope};

pub fn check_definitions(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let catalog = Catalog::new(&config.org_dir);

    let images = match catalog.all_images() {
        Ok(images) if images.is_empty() => {
            results.push(Scope::Definitions.fail(
                "org dir",
                format!("{} contains no image definitions", config.org_dir.display()),
            ));
            return results;
        }
        Ok(images) => {
            results.push(Scope::Definitions.pass_with(
                "org dir",
                format!("{} images", images.len()),
            ));
            images
        }
        Err(e) => {
            results.push(Scope::Definitions.fail("org dir", e.to_string()));
            return results;
        }
    };

    if config.images_info.exists() {
        match ImagesInfo::load(&config.images_info) {
            Ok(_) => results.push(Scope::Definitions.pass("images info")),
            Err(e) => results.push(Scope::Definitions.fail("images info", e.to_string())),
        }
    } else {
        results.push(Scope::Definitions.pass_with("images info", "not present, nothing skipped"));
    }

    // Every manifest must parse, or graph construction aborts the run
    let mut distroless = 0;
    for image in images.iter().filter(|i| i.is_distroless()) {
        match Distroless::load(&image.distroless_file()) {
            Ok(_) => distroless += 1,
            Err(e) => results.push(Scope::Definitions.fail(&image.canonical_name, e.to_string())),
        }
    }
    if distroless > 0 {
        let has_builder = images.iter().any(|i| i.canonical_name == config.builder_image);
        if has_builder {
            results.push(Scope::Definitions.pass_with(
                "distroless manifests",
                format!("{} valid", distroless),
            ));
        } else {
            results.push(Scope::Definitions.warn(
                "distroless manifests",
                format!(
                    "{} valid, but builder image {} has no definition here",
                    distroless, config.builder_image
                ),
            ));
        }
    }

    results
}
