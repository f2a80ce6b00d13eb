//! File-set accumulation and archive assembly tests.

mod helpers;

use helpers::{assert_file_exists, assert_file_not_exists, FakeLdd, FakeRpm, TestEnv};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use distroforge::dl::{assemble, AddOptions, ExclusionSet, FileSet, Queries, SourceKind};
use distroforge::error::Error;

fn no_queries() -> (FakeRpm, FakeLdd) {
    (FakeRpm::default(), FakeLdd::default())
}

fn literal() -> AddOptions {
    AddOptions {
        glob: false,
        follow_symlinks: false,
    }
}

/// Names of the entries in a tar archive, in order.
fn archive_entries(path: &Path) -> Vec<(String, tar::EntryType)> {
    let file = fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(file);
    archive
        .entries()
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            let name = e.path().unwrap().to_string_lossy().trim_end_matches('/').to_string();
            (name, e.header().entry_type())
        })
        .collect()
}

// =============================================================================
// Accumulation
// =============================================================================

#[test]
fn test_add_preserves_order_and_duplicates() {
    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();

    set.add(&["/etc/os-release", "/bin/sh"], SourceKind::Literal, literal(), &queries)
        .unwrap();
    set.add(&["/etc/os-release"], SourceKind::Literal, literal(), &queries)
        .unwrap();

    assert_eq!(set.entries(), ["/etc/os-release", "/bin/sh", "/etc/os-release"]);
}

#[test]
fn test_glob_expansion() {
    let env = TestEnv::new();
    let dir = env.base_dir.join("share");
    fs::create_dir_all(&dir).unwrap();
    for name in ["b.conf", "a.conf", "c.txt"] {
        fs::write(dir.join(name), "").unwrap();
    }

    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();
    let pattern = format!("{}/*.conf", dir.display());
    let missing = format!("{}/*.nothing", dir.display());
    let added = set
        .add(&[pattern, missing], SourceKind::Literal, AddOptions::default(), &queries)
        .unwrap();

    assert_eq!(added, 2);
    assert_eq!(
        set.entries(),
        [
            dir.join("a.conf").display().to_string(),
            dir.join("b.conf").display().to_string()
        ]
    );
}

#[test]
fn test_file_list_skips_blank_lines() {
    let env = TestEnv::new();
    let list = env.write("nginx.list", "/usr/sbin/nginx\n\n/etc/nginx\n");

    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();
    set.add(&[list.display().to_string()], SourceKind::FileList, literal(), &queries)
        .unwrap();

    assert_eq!(set.entries(), ["/usr/sbin/nginx", "/etc/nginx"]);
}

#[test]
fn test_missing_file_list_is_io_error() {
    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();
    let err = set
        .add(&["/nonexistent/list"], SourceKind::FileList, literal(), &queries)
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn test_package_keeps_only_normal_files() {
    let rpm = FakeRpm::default().package(
        "nginx",
        &[
            ("normal", "/usr/sbin/nginx"),
            ("not installed", "/usr/share/doc/nginx/README"),
            ("replaced", "/etc/nginx/mime.types"),
            ("normal", "/etc/nginx"),
        ],
    );
    let ldd = FakeLdd::default();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();
    set.add(&["nginx"], SourceKind::Package, literal(), &queries)
        .unwrap();

    assert_eq!(set.entries(), ["/usr/sbin/nginx", "/etc/nginx"]);
}

#[test]
fn test_library_files_and_library_packages() {
    let rpm = FakeRpm::default()
        .package(
            "libpcre2",
            &[("normal", "/usr/lib64/libpcre2-8.so.0"), ("normal", "/usr/lib64/libpcre2-8.so.0.11")],
        )
        .package(
            "glibc-core",
            &[("normal", "/lib64/libc.so.6"), ("normal", "/lib64/ld-linux-x86-64.so.2")],
        );
    let ldd = FakeLdd::default().binary(
        "/usr/sbin/nginx",
        &["/usr/lib64/libpcre2-8.so.0", "/lib64/libc.so.6", "/lib64/ld-linux-x86-64.so.2"],
    );
    let queries = Queries { packages: &rpm, linker: &ldd };

    let mut files = FileSet::in_memory();
    files
        .add(&["/usr/sbin/nginx"], SourceKind::LibraryFiles, literal(), &queries)
        .unwrap();
    assert_eq!(
        files.entries(),
        ["/usr/lib64/libpcre2-8.so.0", "/lib64/libc.so.6", "/lib64/ld-linux-x86-64.so.2"]
    );

    // Owning packages appear once each, in first-seen order
    let mut packages = FileSet::in_memory();
    packages
        .add(&["/usr/sbin/nginx"], SourceKind::LibraryPackages, literal(), &queries)
        .unwrap();
    assert_eq!(
        packages.entries(),
        [
            "/usr/lib64/libpcre2-8.so.0",
            "/usr/lib64/libpcre2-8.so.0.11",
            "/lib64/libc.so.6",
            "/lib64/ld-linux-x86-64.so.2"
        ]
    );
}

#[test]
fn test_query_failure_keeps_earlier_sources() {
    let env = TestEnv::new();
    let store = env.base_dir.join("dl-file.list");
    let rpm = FakeRpm::default().package("bash", &[("normal", "/bin/bash")]);
    let ldd = FakeLdd::default();
    let queries = Queries { packages: &rpm, linker: &ldd };

    let mut set = FileSet::open(&store).unwrap();
    let err = set
        .add(&["bash", "missing-package"], SourceKind::Package, literal(), &queries)
        .unwrap_err();
    assert!(matches!(err, Error::ExternalTool { .. }));

    let reopened = FileSet::open(&store).unwrap();
    assert_eq!(reopened.entries(), ["/bin/bash"]);
}

#[test]
fn test_follow_symlinks_appends_target() {
    let env = TestEnv::new();
    let target = env.write("lib/libfoo.so.1.2", "");
    let link = env.base_dir.join("lib/libfoo.so.1");
    symlink("libfoo.so.1.2", &link).unwrap();

    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();
    let options = AddOptions {
        glob: false,
        follow_symlinks: true,
    };
    set.add(&[link.display().to_string()], SourceKind::Literal, options, &queries)
        .unwrap();

    let target = fs::canonicalize(target).unwrap();
    assert_eq!(
        set.entries(),
        [link.display().to_string(), target.display().to_string()]
    );
}

#[test]
fn test_invalid_pattern_is_taken_literally() {
    let env = TestEnv::new();
    let odd = env.write("etc/[abc", "");

    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };
    let mut set = FileSet::in_memory();
    let missing = format!("{}/etc/[missing", env.base_dir.display());
    let added = set
        .add(
            &[odd.display().to_string(), missing],
            SourceKind::Literal,
            AddOptions::default(),
            &queries,
        )
        .unwrap();

    assert_eq!(added, 1);
    assert_eq!(set.entries(), [odd.display().to_string()]);
}

// =============================================================================
// Durable store
// =============================================================================

#[test]
fn test_store_survives_reopen_and_reset_is_idempotent() {
    let env = TestEnv::new();
    let store = env.base_dir.join("dl-file.list");
    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };

    let mut set = FileSet::open(&store).unwrap();
    set.add(&["/etc/passwd"], SourceKind::Literal, literal(), &queries)
        .unwrap();
    drop(set);

    let mut set = FileSet::open(&store).unwrap();
    set.add(&["/etc/group"], SourceKind::Literal, literal(), &queries)
        .unwrap();
    assert_eq!(set.entries(), ["/etc/passwd", "/etc/group"]);
    assert_eq!(fs::read_to_string(&store).unwrap(), "/etc/passwd\n/etc/group\n");

    set.reset().unwrap();
    assert!(set.is_empty());
    assert_file_not_exists(&store);
    set.reset().unwrap();
}

#[test]
fn test_unmatched_pattern_still_creates_store() {
    let env = TestEnv::new();
    let store = env.base_dir.join("dl-file.list");
    let (rpm, ldd) = no_queries();
    let queries = Queries { packages: &rpm, linker: &ldd };

    let mut set = FileSet::open(&store).unwrap();
    let pattern = format!("{}/nomatch-*", env.base_dir.display());
    let added = set
        .add(&[pattern], SourceKind::Literal, AddOptions::default(), &queries)
        .unwrap();

    assert_eq!(added, 0);
    assert_file_exists(&store);
    let reopened = FileSet::open(&store).unwrap();
    assert!(reopened.is_empty());

    let out = env.base_dir.join("distroless.tar");
    let summary = assemble(reopened.entries(), &ExclusionSet::default(), &out).unwrap();
    assert_eq!(summary.entries, 0);
    assert!(archive_entries(&out).is_empty());
}

// =============================================================================
// Archive
// =============================================================================

#[test]
fn test_archive_applies_exclusions() {
    let env = TestEnv::new();
    let kept = env.write("usr/bin/x", "binary");
    let dropped = env.write("usr/share/doc/x", "docs");

    // The exclusion sees the archive-relative path
    let root = env.base_dir.display().to_string();
    let excludes = ExclusionSet::new(&[format!("^{}/usr/share/doc/.*", root)]).unwrap();
    let out = env.base_dir.join("out/distroless.tar");
    let paths = vec![kept.display().to_string(), dropped.display().to_string()];
    let summary = assemble(&paths, &excludes, &out).unwrap();

    assert_file_exists(&out);
    assert_eq!(summary.entries, 1);
    assert_eq!(summary.excluded, 1);
    assert_eq!(summary.sha256.len(), 64);
    assert_eq!(summary.size, fs::metadata(&out).unwrap().len());

    let names: Vec<String> = archive_entries(&out).into_iter().map(|(n, _)| n).collect();
    let kept_name = kept.display().to_string().trim_start_matches('/').to_string();
    assert_eq!(names, vec![kept_name]);
}

#[test]
fn test_archive_is_not_recursive() {
    let env = TestEnv::new();
    env.write("etc/nginx/nginx.conf", "worker_processes 1;");
    let dir = env.base_dir.join("etc/nginx");
    let link = env.base_dir.join("etc/nginx.link");
    symlink("nginx", &link).unwrap();

    let out = env.base_dir.join("distroless.tar");
    let paths = vec![dir.display().to_string(), link.display().to_string()];
    assemble(&paths, &ExclusionSet::default(), &out).unwrap();

    let entries = archive_entries(&out);
    assert_eq!(entries.len(), 2, "directory content must not be added");
    assert_eq!(entries[0].1, tar::EntryType::Directory);
    assert_eq!(entries[1].1, tar::EntryType::Symlink);
}

#[test]
fn test_archive_keeps_duplicates() {
    let env = TestEnv::new();
    let file = env.write("etc/os-release", "NAME=ALT");
    let out = env.base_dir.join("distroless.tar");
    let path = file.display().to_string();

    let summary = assemble(&[path.clone(), path], &ExclusionSet::default(), &out).unwrap();
    assert_eq!(summary.entries, 2);
}

#[test]
fn test_archive_resolves_parent_components() {
    let env = TestEnv::new();
    env.write("a/b/keep", "");
    env.write("a/f", "content");
    let dotted = format!("{}/a/b/../f", env.base_dir.display());
    let doc = env.write("a/doc/README", "");
    let dotted_doc = format!("{}/a/b/../doc/README", env.base_dir.display());

    let root = env.base_dir.display().to_string();
    let excludes = ExclusionSet::new(&[format!("^{}/a/doc/", root)]).unwrap();
    let out = env.base_dir.join("distroless.tar");
    let summary = assemble(&[dotted, dotted_doc], &excludes, &out).unwrap();

    assert_eq!(summary.entries, 1);
    assert_eq!(summary.excluded, 1);
    let expected = env.base_dir.join("a/f").display().to_string();
    let names: Vec<String> = archive_entries(&out).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec![expected.trim_start_matches('/').to_string()]);
    assert!(doc.exists());
}

#[test]
fn test_missing_path_leaves_no_archive() {
    let env = TestEnv::new();
    let file = env.write("etc/os-release", "NAME=ALT");
    let out = env.base_dir.join("distroless.tar");
    let paths = vec![
        file.display().to_string(),
        "/nonexistent/file/12345".to_string(),
    ];

    let err = assemble(&paths, &ExclusionSet::default(), &out).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_file_not_exists(&out);
    assert_file_not_exists(&env.base_dir.join("distroless.tar.partial"));
}
