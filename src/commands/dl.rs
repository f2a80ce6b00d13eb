//! Dl command - file-set accumulation and archiving inside a builder.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use distroforge::dl::query::{Ldd, Rpm};
use distroforge::dl::{self, AddOptions, ExclusionSet, FileSet, Queries, SourceKind};
use distroforge::process::System;

/// Dl subcommand.
pub enum DlAction {
    /// Append paths to the file set
    Add {
        clean: bool,
        glob: bool,
        follow_symlinks: bool,
        files: Vec<String>,
        file_lists: Vec<String>,
        packages: Vec<String>,
        library_binaries: Vec<String>,
        /// Expand library closures to whole owning packages
        library_packages: bool,
    },
    /// Archive the file set
    Tar {
        outfile: PathBuf,
        regexes: Vec<String>,
    },
    /// Remove the file set
    Clean,
}

/// Execute the dl command.
pub fn cmd_dl(dl_file: &Path, action: DlAction) -> Result<()> {
    let mut set = FileSet::open(dl_file)?;

    match action {
        DlAction::Add {
            clean,
            glob,
            follow_symlinks,
            files,
            file_lists,
            packages,
            library_binaries,
            library_packages,
        } => {
            if clean {
                set.reset()?;
            }

            let exec = System::new(false);
            let rpm = Rpm::new(&exec);
            let ldd = Ldd::new(&exec);
            let queries = Queries {
                packages: &rpm,
                linker: &ldd,
            };
            let options = AddOptions {
                glob,
                follow_symlinks,
            };
            let library_kind = if library_packages {
                SourceKind::LibraryPackages
            } else {
                SourceKind::LibraryFiles
            };

            for (sources, kind, what) in [
                (&files, SourceKind::Literal, "files"),
                (&file_lists, SourceKind::FileList, "file lists"),
                (&packages, SourceKind::Package, "packages"),
                (&library_binaries, library_kind, "library closures"),
            ] {
                if sources.is_empty() {
                    continue;
                }
                let added = set
                    .add(sources, kind, options, &queries)
                    .with_context(|| format!("Failed to add {}", what))?;
                println!("  Added {} path(s) from {}", added, what);
            }
            println!("{} path(s) in {}", set.len(), dl_file.display());
        }

        DlAction::Tar { outfile, regexes } => {
            if set.is_empty() {
                eprintln!("  [WARN] {} is empty, archive will have no entries", dl_file.display());
            }
            let excludes = ExclusionSet::new(&regexes)?;
            let summary = dl::assemble(set.entries(), &excludes, &outfile)
                .with_context(|| format!("Failed to create {}", outfile.display()))?;
            println!("Created {}", summary.path.display());
            println!("  Entries:  {}", summary.entries);
            println!("  Excluded: {}", summary.excluded);
            println!("  Size:     {} bytes", summary.size);
            println!("  SHA-256:  {}", summary.sha256);
        }

        DlAction::Clean => {
            set.reset()?;
            println!("Removed {}", dl_file.display());
        }
    }

    Ok(())
}
