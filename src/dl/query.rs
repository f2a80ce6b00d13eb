//! Package manager and dynamic linker queries.
//!
//! `rpm -qls` lists installed files with their state, `rpm -qf` maps a file
//! back to its package, and `ldd` resolves the library closure of a binary.

use crate::error::{Error, Result};
use crate::process::{Cmd, Executor};

/// State rpm records for an installed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Normal,
    /// replaced, not installed, net shared, wrong color, missing, ...
    Other(String),
}

impl FileState {
    pub fn parse(s: &str) -> Self {
        match s {
            "normal" => FileState::Normal,
            other => FileState::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub state: FileState,
    pub path: String,
}

pub trait PackageManager {
    /// Installed files of `package`, in the order the database reports them.
    fn installed_files(&self, package: &str) -> Result<Vec<PackageFile>>;

    /// Name of the package that owns `path`.
    fn owner(&self, path: &str) -> Result<String>;
}

pub trait LinkerQuery {
    /// Absolute paths of every library `binary` loads, directly or not.
    fn libraries(&self, binary: &str) -> Result<Vec<String>>;
}

/// Queries the rpm database.
pub struct Rpm<'a> {
    exec: &'a dyn Executor,
}

impl<'a> Rpm<'a> {
    pub fn new(exec: &'a dyn Executor) -> Self {
        Self { exec }
    }
}

impl PackageManager for Rpm<'_> {
    fn installed_files(&self, package: &str) -> Result<Vec<PackageFile>> {
        let result = self.exec.execute(Cmd::new("rpm").args(["-qls", package]))?;
        Ok(parse_rpm_states(&result.stdout))
    }

    fn owner(&self, path: &str) -> Result<String> {
        let result = self
            .exec
            .execute(Cmd::new("rpm").args(["-qf", "--queryformat", "%{NAME}\\n", path]))?;
        result
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::ExternalTool {
                command: format!("rpm -qf {}", path),
                code: 0,
                stderr: "no owning package reported".to_string(),
            })
    }
}

/// Parse `rpm -qls` output: `<state> <path>` per line.
///
/// Lines without a path, such as `(contains no files)`, are skipped.
pub fn parse_rpm_states(output: &str) -> Vec<PackageFile> {
    output
        .lines()
        .filter_map(|line| {
            // states may contain spaces ("not installed"); paths start at '/'
            let start = line.find('/')?;
            let state = line[..start].trim();
            if state.is_empty() {
                return None;
            }
            Some(PackageFile {
                state: FileState::parse(state),
                path: line[start..].trim_end().to_string(),
            })
        })
        .collect()
}

/// Resolves library closures with `ldd`.
pub struct Ldd<'a> {
    exec: &'a dyn Executor,
}

impl<'a> Ldd<'a> {
    pub fn new(exec: &'a dyn Executor) -> Self {
        Self { exec }
    }
}

impl LinkerQuery for Ldd<'_> {
    fn libraries(&self, binary: &str) -> Result<Vec<String>> {
        let cmd = Cmd::new("ldd").arg(binary).allow_fail();
        let command = cmd.to_string();
        let result = self.exec.execute(cmd)?;

        // ldd exits non-zero for static binaries; they simply have no closure.
        let static_binary = |s: &str| s.contains("not a dynamic executable");
        if static_binary(&result.stdout) || static_binary(&result.stderr) {
            return Ok(Vec::new());
        }
        if !result.success() {
            return Err(Error::ExternalTool {
                command,
                code: result.code(),
                stderr: result.stderr,
            });
        }
        Ok(parse_ldd_output(&result.stdout))
    }
}

/// Parse `ldd` output into absolute library paths.
///
/// ```text
///     linux-vdso.so.1 (0x00007ffee9bfe000)
///     libc.so.6 => /lib64/libc.so.6 (0x00007f1234000000)
///     /lib64/ld-linux-x86-64.so.2 (0x00007f1234500000)
/// ```
pub fn parse_ldd_output(output: &str) -> Vec<String> {
    let mut libs = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        let target = match line.split_once("=>") {
            Some((name, target)) => {
                let target = target.trim();
                if target.starts_with("not found") {
                    eprintln!("  [WARN] ldd: {} not found", name.trim());
                    continue;
                }
                target
            }
            None => line,
        };
        let path = target.split_whitespace().next().unwrap_or("");
        // vdso and friends have no backing file
        if path.starts_with('/') {
            libs.push(path.to_string());
        }
    }

    libs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rpm_states() {
        let output = "\
normal        /usr/bin/nginx
normal        /etc/nginx
not installed /usr/share/doc/nginx/README
(contains no files)
replaced      /etc/nginx/nginx.conf
";
        let files = parse_rpm_states(output);
        assert_eq!(files.len(), 4);
        assert_eq!(files[0].path, "/usr/bin/nginx");
        assert_eq!(files[0].state, FileState::Normal);
        assert_eq!(files[2].path, "/usr/share/doc/nginx/README");
        assert_eq!(files[2].state, FileState::Other("not installed".into()));
        assert_eq!(files[3].state, FileState::Other("replaced".into()));
    }

    #[test]
    fn test_parse_ldd_standard_format() {
        let output = r#"
        linux-vdso.so.1 (0x00007ffee9bfe000)
        libpcre2-8.so.0 => /usr/lib64/libpcre2-8.so.0 (0x00007f1233f00000)
        libc.so.6 => /lib64/libc.so.6 (0x00007f1234000000)
        /lib64/ld-linux-x86-64.so.2 (0x00007f1234500000)
    "#;
        let libs = parse_ldd_output(output);
        assert_eq!(
            libs,
            vec![
                "/usr/lib64/libpcre2-8.so.0",
                "/lib64/libc.so.6",
                "/lib64/ld-linux-x86-64.so.2"
            ]
        );
    }

    #[test]
    fn test_parse_ldd_skips_not_found() {
        let output = "\tlibfoo.so.1 => not found\n\tlibc.so.6 => /lib64/libc.so.6 (0x1)\n";
        assert_eq!(parse_ldd_output(output), vec!["/lib64/libc.so.6"]);
    }

    #[test]
    fn test_parse_ldd_empty() {
        assert!(parse_ldd_output("").is_empty());
    }
}
