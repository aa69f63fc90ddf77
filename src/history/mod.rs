//! Snapshot discovery and node-list reading.
//!
//! Daily snapshots live at `<root>/<YYYY>/<MM>/<YYYY-MM-DD>/` and hold one
//! node-list file per category. This module finds those directories and
//! reads the files they contain.

use crate::models::NodeCategory;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Format of a snapshot directory name.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Depth of snapshot directories below the history root (year/month/day).
const SNAPSHOT_DEPTH: usize = 3;

/// A dated snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDir {
    /// Date parsed from the directory name.
    pub date: NaiveDate,
    /// Full path to the directory.
    pub path: PathBuf,
}

impl SnapshotDir {
    /// Path of the node-list file for a category.
    pub fn node_file(&self, category: NodeCategory) -> PathBuf {
        self.path.join(category.file_name())
    }

    /// Directory name as it appears on disk.
    pub fn name(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

/// Scanner over a history directory tree.
#[derive(Debug, Clone)]
pub struct HistoryScanner {
    root: PathBuf,
}

impl HistoryScanner {
    /// Create a new scanner rooted at a history directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All snapshot directories with a valid date, in lexicographic path order.
    ///
    /// Directories matching `????-??-??` whose name is not a real date are
    /// skipped without error. A missing root yields no snapshots.
    pub fn snapshots(&self) -> Vec<SnapshotDir> {
        self.candidate_dirs()
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                match parse_snapshot_date(name) {
                    Some(date) => Some(SnapshotDir { date, path }),
                    None => {
                        debug!("Skipping {}: not a valid date", path.display());
                        None
                    }
                }
            })
            .collect()
    }

    /// Directories matching `*/*/????-??-??` below the root.
    fn candidate_dirs(&self) -> Vec<PathBuf> {
        let root = self.root.clone();

        WalkDir::new(&root)
            .min_depth(SNAPSHOT_DEPTH)
            .max_depth(SNAPSHOT_DEPTH)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Cannot read history entry under {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(matches_date_pattern)
                    .unwrap_or(false)
            })
            .map(DirEntry::into_path)
            .collect()
    }
}

/// Whether a name matches the glob `????-??-??`.
pub fn matches_date_pattern(name: &str) -> bool {
    let chars: Vec<char> = name.chars().collect();

    chars.len() == 10 && chars[4] == '-' && chars[7] == '-'
}

/// Parse a snapshot directory name, returning `None` for anything that is
/// not a strict `YYYY-MM-DD` calendar date.
pub fn parse_snapshot_date(name: &str) -> Option<NaiveDate> {
    let digits_only = name
        .bytes()
        .filter(|b| *b != b'-')
        .all(|b| b.is_ascii_digit());

    if !matches_date_pattern(name) || !digits_only {
        return None;
    }

    NaiveDate::parse_from_str(name, DATE_FORMAT).ok()
}

/// Read a node-list file into its non-empty, trimmed lines.
///
/// A missing file reads as empty. Other I/O failures are returned.
pub fn read_node_lines(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Node list not found: {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read node list: {}", path.display()))
        }
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Number of identifiers listed in a node-list file (missing file → 0).
pub fn count_nodes(path: &Path) -> Result<usize> {
    Ok(read_node_lines(path)?.len())
}

/// Unique identifiers in a node-list file (missing file → empty set).
pub fn read_node_set(path: &Path) -> Result<HashSet<String>> {
    Ok(read_node_lines(path)?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_snapshot(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(&name[0..4]).join(&name[5..7]).join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_matches_date_pattern() {
        assert!(matches_date_pattern("2024-01-05"));
        assert!(matches_date_pattern("2024-13-40"));
        assert!(matches_date_pattern("abcd-ef-gh"));
        assert!(!matches_date_pattern("2024-1-05"));
        assert!(!matches_date_pattern("2024_01_05"));
        // Matches the glob, rejected later by the date parse
        assert!(matches_date_pattern(".024-01-05"));
        assert_eq!(parse_snapshot_date(".024-01-05"), None);
    }

    #[test]
    fn test_parse_snapshot_date() {
        assert_eq!(
            parse_snapshot_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_snapshot_date("2023-02-29"), None);
        assert_eq!(parse_snapshot_date("2024-13-40"), None);
        assert_eq!(parse_snapshot_date("abcd-ef-gh"), None);
        assert_eq!(parse_snapshot_date("+024-01-05"), None);
    }

    #[test]
    fn test_snapshots_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        make_snapshot(root, "2024-02-01");
        make_snapshot(root, "2023-12-31");
        make_snapshot(root, "2024-01-15");
        make_snapshot(root, "2024-13-40");

        // Wrong depth and non-matching names are ignored
        fs::create_dir_all(root.join("2024-01-20")).unwrap();
        fs::create_dir_all(root.join("2024/01/notes")).unwrap();
        fs::write(root.join("2024/01/2024-01-21"), "not a directory").unwrap();

        let scanner = HistoryScanner::new(root);
        let dates: Vec<String> = scanner.snapshots().iter().map(|s| s.name()).collect();

        assert_eq!(dates, vec!["2023-12-31", "2024-01-15", "2024-02-01"]);
    }

    #[test]
    fn test_snapshots_include_dot_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // Year and month wildcards also match names with a leading dot
        fs::create_dir_all(root.join(".bak/01/2024-01-05")).unwrap();
        fs::create_dir_all(root.join("2024/.m/2024-01-06")).unwrap();
        make_snapshot(root, "2024-01-07");

        let scanner = HistoryScanner::new(root);
        let dates: Vec<String> = scanner.snapshots().iter().map(|s| s.name()).collect();

        assert_eq!(dates, vec!["2024-01-05", "2024-01-06", "2024-01-07"]);
    }

    #[test]
    fn test_snapshots_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = HistoryScanner::new(temp_dir.path().join("nope"));
        assert!(scanner.snapshots().is_empty());
    }

    #[test]
    fn test_read_node_lines_trims_and_skips_blank() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay-nodes.txt");
        fs::write(&path, "  1.1.1.1  \n\n2.2.2.2\n   \n2.2.2.2\n").unwrap();

        let lines = read_node_lines(&path).unwrap();
        assert_eq!(lines, vec!["1.1.1.1", "2.2.2.2", "2.2.2.2"]);
        assert_eq!(count_nodes(&path).unwrap(), 3);
        assert_eq!(read_node_set(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_node_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("exit-nodes.txt");

        assert_eq!(count_nodes(&path).unwrap(), 0);
        assert!(read_node_set(&path).unwrap().is_empty());
    }
}
