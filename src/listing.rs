//! One-level `dirlist` enumeration of the served root.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::SortOrder;

/// Newline-joined names of the immediate subdirectories of `root`,
/// ordered per `order`. Entries that fail to stat sort as epoch.
pub fn list_directories(root: &Path, order: SortOrder) -> Result<String> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Failed to open directory {}", root.display()))?;

    let mut dirs: Vec<(String, SystemTime)> = Vec::new();
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let created = entry
            .metadata()
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .unwrap_or(UNIX_EPOCH);
        dirs.push((name, created));
    }

    match order {
        SortOrder::Name => dirs.sort_by(|a, b| a.0.cmp(&b.0)),
        SortOrder::CreationTime => dirs.sort_by_key(|d| d.1),
    }

    if dirs.is_empty() {
        return Ok("No subdirectories found\n".to_string());
    }
    let mut out = String::new();
    for (name, _) in dirs {
        out.push_str(&name);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn name_order_is_lexicographic_dirs_only() {
        let dir = TempDir::new().unwrap();
        for name in ["delta", "alpha", "charlie"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("bravo.txt"), b"not a dir").unwrap();

        let out = list_directories(dir.path(), SortOrder::Name).unwrap();
        assert_eq!(out, "alpha\ncharlie\ndelta\n");
    }

    #[test]
    fn time_order_lists_every_subdirectory() {
        let dir = TempDir::new().unwrap();
        for name in ["one", "two", "three"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        // creation-time granularity is filesystem dependent, so only the
        // membership is asserted here
        let out = list_directories(dir.path(), SortOrder::CreationTime).unwrap();
        let mut lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        lines.sort_unstable();
        assert_eq!(lines, vec!["one", "three", "two"]);
    }

    #[test]
    fn empty_root_still_replies() {
        let dir = TempDir::new().unwrap();
        let out = list_directories(dir.path(), SortOrder::Name).unwrap();
        assert_eq!(out, "No subdirectories found\n");
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("missing");
        assert!(list_directories(&gone, SortOrder::Name).is_err());
    }
}
