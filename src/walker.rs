//! Recursive search under the served root.
//!
//! Best-effort depth-first traversal: unreadable directories and entries
//! that fail to stat are skipped, the walk never aborts. Symlinks are not
//! followed, so the tree is acyclic without a visited set.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::matcher::SearchCriterion;

/// Collect every regular file under `root` matching `criterion`, in
/// traversal order.
pub fn collect_matches(root: &Path, criterion: &SearchCriterion) -> Vec<PathBuf> {
    let mut matches = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue, // stat failed, skip the entry
        };
        if criterion.matches(&name, &meta) {
            matches.push(entry.into_path());
        }
    }
    matches
}

/// First regular file under `root` whose basename equals `file_name`;
/// stops walking on the first hit.
pub fn find_first(root: &Path, file_name: &str) -> Option<PathBuf> {
    let target = OsStr::new(file_name);
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == target)
        .map(|e| e.into_path())
}

/// Text report for a `w24fn` hit: name, path, size, creation time and
/// permission bits.
pub fn file_details(path: &Path) -> Result<String> {
    let meta = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let created = creation_time(&meta)
        .map(|t| DateTime::<Local>::from(t).format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(format!(
        "File: {}\nPath: {}\nSize: {} bytes\nCreated: {}\nPermissions: {:o}\n",
        name,
        path.display(),
        meta.len(),
        created,
        mode_bits(&meta),
    ))
}

// Creation time is unsupported on some unix filesystems; fall back to mtime.
fn creation_time(meta: &Metadata) -> Option<std::time::SystemTime> {
    meta.created().or_else(|_| meta.modified()).ok()
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/x.txt"), vec![0u8; 50]).unwrap();
        fs::write(dir.path().join("a/y.txt"), vec![0u8; 200]).unwrap();
        fs::write(dir.path().join("a/z.log"), vec![0u8; 10]).unwrap();
        dir
    }

    #[test]
    fn size_search_visits_whole_tree() {
        let dir = fixture();
        let small = collect_matches(
            dir.path(),
            &SearchCriterion::SizeRange { min: 0, max: 100 },
        );
        let names: Vec<_> = small
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"x.txt".to_string()));
        assert!(names.contains(&"z.log".to_string()));
        assert!(!names.contains(&"y.txt".to_string()));

        let all = collect_matches(
            dir.path(),
            &SearchCriterion::SizeRange { min: 0, max: u64::MAX },
        );
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn extension_search_skips_unsuffixed_files() {
        let dir = fixture();
        fs::write(dir.path().join("README"), b"hi").unwrap();
        let hits = collect_matches(
            dir.path(),
            &SearchCriterion::Extensions(vec!["txt".into()]),
        );
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|p| p.extension() == Some(OsStr::new("txt"))));
    }

    #[test]
    fn find_first_locates_nested_file() {
        let dir = fixture();
        let hit = find_first(dir.path(), "x.txt").unwrap();
        assert!(hit.ends_with("a/b/x.txt"));
        assert!(find_first(dir.path(), "nope.txt").is_none());
    }

    #[test]
    fn file_details_reports_size_and_name() {
        let dir = fixture();
        let report = file_details(&dir.path().join("a/y.txt")).unwrap();
        assert!(report.contains("File: y.txt"));
        assert!(report.contains("Size: 200 bytes"));
        assert!(report.contains("Permissions: "));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_trees_are_not_followed() {
        let dir = fixture();
        // loop: a/b/back -> a
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("a/b/back")).unwrap();
        let all = collect_matches(
            dir.path(),
            &SearchCriterion::SizeRange { min: 0, max: u64::MAX },
        );
        // terminates, and nothing is reached through the link
        assert_eq!(all.len(), 3);
    }
}
