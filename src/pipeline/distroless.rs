//! Distroless assembly of one architecture.
//!
//! Two working containers are used: the builder helper, which owns the
//! package database and runs `dl` to collect and archive the file set, and
//! the target, which receives the archive on top of its base and is committed
//! into the manifest list.

use std::path::Path;

use crate::error::Result;
use crate::image::{Distroless, LibraryMode};
use crate::process::{Cmd, Executor};

/// Directory inside the builder that file-lists are copied to.
pub const FILE_LISTS_DIR: &str = "file-lists";

/// Everything needed to assemble a distroless image for one arch.
pub struct ArchBuild<'a> {
    pub arch: &'a str,
    /// Definition directory; local paths are relative to it
    pub image_dir: &'a Path,
    pub builder_ref: &'a str,
    /// Rendered base reference of the target
    pub from: &'a str,
    pub manifest: &'a str,
    pub dl_command: &'a str,
    /// Archive path inside the builder
    pub archive: &'a str,
    pub distroless: &'a Distroless,
}

impl ArchBuild<'_> {
    pub fn builder_container(&self) -> String {
        format!("distroless-builder-{}", self.arch)
    }

    pub fn target_container(&self) -> String {
        format!("distroless-new-{}", self.arch)
    }

    fn buildah<I, S>(&self, args: I) -> Cmd
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Cmd::new("buildah").args(args).dir(self.image_dir)
    }

    /// `buildah run <builder> <dl command> dl <args>`
    fn dl(&self, args: Vec<String>) -> Cmd {
        self.buildah(["run".to_string(), self.builder_container()])
            .args(self.dl_command.split_whitespace())
            .arg("dl")
            .args(args)
    }

    /// The assembly commands, in order, without the surrounding cleanup.
    pub fn commands(&self) -> Vec<Cmd> {
        let d = self.distroless;
        let builder = self.builder_container();
        let new = self.target_container();
        let mut cmds = Vec::new();

        cmds.push(self.buildah(["from", "--arch", self.arch, "--name", &builder, self.builder_ref]));
        cmds.push(self.buildah(["from", "--arch", self.arch, "--name", &new, self.from]));

        if let Some(packages) = d.builder_install_packages.as_ref().filter(|p| !p.is_empty()) {
            cmds.push(self.buildah(["run", &builder, "apt-get", "update"]));
            cmds.push(
                self.buildah(["run", &builder, "apt-get", "reinstall", "-y"])
                    .args(packages),
            );
        }

        if let Some(timezone) = &d.timezone {
            let zone = format!("/usr/share/zoneinfo/{}", timezone);
            cmds.push(self.buildah(["run", &builder, "ln", "-s", &zone, "/etc/localtime"]));
        }

        for file_list in &d.file_lists {
            cmds.push(self.buildah([
                "copy".to_string(),
                builder.clone(),
                format!("./{}", file_list),
                format!("{}/{}", FILE_LISTS_DIR, file_list),
            ]));
        }

        let mut add = vec!["add".to_string(), "--clean".to_string()];
        if !d.files.is_empty() {
            add.push("-f".to_string());
            add.extend(d.files.iter().cloned());
        }
        if !d.file_lists.is_empty() {
            add.push("-l".to_string());
            add.extend(
                d.file_lists
                    .iter()
                    .map(|f| format!("{}/{}", FILE_LISTS_DIR, f)),
            );
        }
        if !d.packages.is_empty() {
            add.push("-p".to_string());
            add.extend(d.packages.iter().cloned());
        }
        if !d.library_binaries.is_empty() {
            add.push("-b".to_string());
            add.extend(d.library_binaries.iter().cloned());
            if d.library_mode == LibraryMode::Packages {
                add.push("--library-packages".to_string());
            }
        }
        cmds.push(self.dl(add));

        let mut tar = vec!["tar".to_string(), "-o".to_string(), self.archive.to_string()];
        if !d.exclude_regexes.is_empty() {
            tar.push("-r".to_string());
            tar.extend(d.exclude_regexes.iter().cloned());
        }
        cmds.push(self.dl(tar));

        cmds.push(self.buildah(["add", "--from", &builder, &new, self.archive, "/"]));

        for (local, target) in &d.copy {
            cmds.push(self.buildah([
                "copy".to_string(),
                new.clone(),
                format!("./{}", local),
                target.clone(),
            ]));
        }

        cmds.push(
            self.buildah(["config"])
                .args(d.config_options())
                .arg(&new),
        );
        cmds.push(self.buildah(["commit", "--rm", "--manifest", self.manifest, &new]));
        cmds
    }

    /// Run the assembly. Working containers are removed before and after.
    pub fn run(&self, exec: &dyn Executor) -> Result<()> {
        println!("  Assembling {} for {}", self.manifest, self.arch);
        let builder = self.builder_container();
        let new = self.target_container();

        let _ = exec.execute(self.buildah(["rm", &builder, &new]).quiet());

        for cmd in self.commands() {
            if let Err(e) = exec.execute(cmd.stream()) {
                let _ = exec.execute(self.buildah(["rm", &builder, &new]).quiet());
                return Err(e);
            }
        }

        // the target was consumed by `commit --rm`
        let _ = exec.execute(self.buildah(["rm", &builder]).quiet());
        Ok(())
    }
}
