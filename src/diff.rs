//! Comparison of two snapshots.
//!
//! Both snapshots are indexed by path; existence in only one side always
//! classifies a path as added or removed, attribute comparison only happens
//! for paths present in both. Renames are not detected.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use chrono::SecondsFormat;
use tracing::debug;

use crate::error::{Result, ResultExt, TreeSnapError};
use crate::types::{ChangeKind, ChangeSet, CompareMode, Entry, FileDiff, Summary};
use crate::utils::is_volatile_path;

/// Compare two snapshots and classify every differing path
pub fn compare(old: &[Entry], new: &[Entry], mode: CompareMode) -> ChangeSet {
    let old_index = index(old);
    let new_index = index(new);

    let mut differences = Vec::new();
    let mut summary = Summary::default();

    for (path, old_entry) in &old_index {
        match new_index.get(path) {
            None => {
                differences.push(FileDiff {
                    path: path.to_string(),
                    kind: ChangeKind::Removed,
                    old: Some((*old_entry).clone()),
                    new: None,
                    details: Vec::new(),
                });
                summary.removed_files += 1;
            }
            Some(new_entry) => {
                let details = compare_entries(old_entry, new_entry, mode);
                if !details.is_empty() {
                    differences.push(FileDiff {
                        path: path.to_string(),
                        kind: ChangeKind::Modified,
                        old: Some((*old_entry).clone()),
                        new: Some((*new_entry).clone()),
                        details,
                    });
                    summary.modified_files += 1;
                }
            }
        }
    }

    for (path, new_entry) in &new_index {
        if !old_index.contains_key(path) {
            differences.push(FileDiff {
                path: path.to_string(),
                kind: ChangeKind::Added,
                old: None,
                new: Some((*new_entry).clone()),
                details: Vec::new(),
            });
            summary.added_files += 1;
        }
    }

    differences.sort_by(|a, b| a.path.cmp(&b.path));
    summary.total_differences =
        summary.added_files + summary.removed_files + summary.modified_files;

    debug!(
        "Compared {} and {} entries: {} differences",
        old.len(),
        new.len(),
        summary.total_differences
    );

    ChangeSet {
        differences,
        summary,
    }
}

/// Human-readable attribute deltas between two entries for the same path
pub fn compare_entries(old: &Entry, new: &Entry, mode: CompareMode) -> Vec<String> {
    let mut details = Vec::new();

    if old.size != new.size {
        details.push(format!("size changed: {} -> {}", old.size, new.size));
    }
    if old.mode != new.mode {
        details.push(format!("permissions changed: {} -> {}", old.mode, new.mode));
    }
    if old.owner != new.owner || old.group != new.group {
        details.push(format!(
            "ownership changed: {}:{} -> {}:{}",
            old.owner, old.group, new.owner, new.group
        ));
    }

    if mode == CompareMode::WithTimes {
        if let (Some(old_time), Some(new_time)) = (old.mod_time, new.mod_time) {
            if old_time != new_time {
                details.push(format!(
                    "modification time changed: {} -> {}",
                    old_time.to_rfc3339_opts(SecondsFormat::Secs, true),
                    new_time.to_rfc3339_opts(SecondsFormat::Secs, true)
                ));
            }
        }
    }

    if let (Some(old_hash), Some(new_hash)) = (old.hash(), new.hash()) {
        if old_hash != new_hash {
            details.push("content changed (different MD5)".to_string());
        }
    }

    details
}

/// Index a snapshot by path, dropping paths that vary between runs
fn index(entries: &[Entry]) -> BTreeMap<&str, &Entry> {
    entries
        .iter()
        .filter(|e| !is_volatile_path(&e.path))
        .map(|e| (e.path.as_str(), e))
        .collect()
}

/// Load a snapshot document from a file, or stdin for `-`
pub fn load_snapshot(source: &str) -> Result<Vec<Entry>> {
    let mut content = String::new();
    if source == "-" {
        io::stdin()
            .read_to_string(&mut content)
            .with_context(|| "Failed to read snapshot from stdin")?;
    } else {
        let file = File::open(Path::new(source))?;
        BufReader::new(file)
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read snapshot {}", source))?;
    }

    parse_snapshot(&content).map_err(|e| match e {
        TreeSnapError::Snapshot(message) => crate::error!(Snapshot, "{}: {}", source, message),
        other => other,
    })
}

/// Parse a snapshot document and check that its paths are unique
pub fn parse_snapshot(content: &str) -> Result<Vec<Entry>> {
    let entries: Vec<Entry> =
        serde_json::from_str(content).map_err(|e| crate::error!(Snapshot, "{}", e))?;

    let mut seen = std::collections::HashSet::with_capacity(entries.len());
    for entry in &entries {
        crate::ensure!(
            seen.insert(entry.path.as_str()),
            Snapshot,
            "duplicate path {}",
            entry.path
        );
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(path: &str, size: u64) -> Entry {
        Entry {
            path: path.to_string(),
            size,
            mode: "-rw-r--r--".to_string(),
            mod_time: None,
            is_dir: false,
            symlink_target: None,
            owner: "root(0)".to_string(),
            group: "root(0)".to_string(),
            content_hash: None,
        }
    }

    fn paths(changes: &ChangeSet, kind: ChangeKind) -> Vec<String> {
        changes
            .differences
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.path.clone())
            .collect()
    }

    #[test]
    fn test_size_change_is_a_modification() {
        let old = vec![entry("/a", 10)];
        let new = vec![entry("/a", 20)];

        let changes = compare(&old, &new, CompareMode::WithTimes);

        assert_eq!(changes.differences.len(), 1);
        let diff = &changes.differences[0];
        assert_eq!(diff.path, "/a");
        assert_eq!(diff.kind, ChangeKind::Modified);
        assert_eq!(diff.details, vec!["size changed: 10 -> 20".to_string()]);
        assert_eq!(
            changes.summary,
            Summary {
                total_differences: 1,
                added_files: 0,
                removed_files: 0,
                modified_files: 1,
            }
        );
    }

    #[test]
    fn test_missing_path_is_removed() {
        let changes = compare(&[entry("/a", 1)], &[], CompareMode::WithTimes);

        assert_eq!(paths(&changes, ChangeKind::Removed), vec!["/a"]);
        assert!(changes.differences[0].new.is_none());
        assert_eq!(changes.summary.removed_files, 1);
        assert!(changes.has_differences());
    }

    #[test]
    fn test_snapshot_against_itself_is_clean() {
        let mut hashed = entry("/bin/sh", 100);
        hashed.content_hash = Some("abc".to_string());
        hashed.mod_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let snapshot = vec![entry("/a", 1), hashed, entry("/etc/passwd", 5)];

        let changes = compare(&snapshot, &snapshot, CompareMode::WithTimes);

        assert!(changes.differences.is_empty());
        assert_eq!(changes.summary, Summary::default());
        assert!(!changes.has_differences());
    }

    #[test]
    fn test_swapping_inputs_swaps_added_and_removed() {
        let mut changed = entry("/c", 3);
        changed.mode = "-rwxr-xr-x".to_string();
        let a = vec![entry("/a", 1), entry("/c", 3)];
        let b = vec![entry("/b", 2), changed];

        let forward = compare(&a, &b, CompareMode::WithTimes);
        let backward = compare(&b, &a, CompareMode::WithTimes);

        assert_eq!(
            paths(&forward, ChangeKind::Added),
            paths(&backward, ChangeKind::Removed)
        );
        assert_eq!(
            paths(&forward, ChangeKind::Removed),
            paths(&backward, ChangeKind::Added)
        );
        assert_eq!(
            paths(&forward, ChangeKind::Modified),
            paths(&backward, ChangeKind::Modified)
        );

        let backward_modified = backward
            .differences
            .iter()
            .find(|d| d.kind == ChangeKind::Modified)
            .unwrap();
        assert_eq!(
            backward_modified.details,
            vec!["permissions changed: -rwxr-xr-x -> -rw-r--r--".to_string()]
        );
    }

    #[test]
    fn test_existence_wins_over_identical_attributes() {
        let changes = compare(&[entry("/old", 1)], &[entry("/new", 1)], CompareMode::WithTimes);

        assert_eq!(paths(&changes, ChangeKind::Removed), vec!["/old"]);
        assert_eq!(paths(&changes, ChangeKind::Added), vec!["/new"]);
        assert_eq!(changes.summary.total_differences, 2);
    }

    #[test]
    fn test_all_deltas_are_reported_together() {
        let old = entry("/etc/app.conf", 10);
        let mut new = entry("/etc/app.conf", 11);
        new.mode = "-rw-------".to_string();
        new.owner = "app(1000)".to_string();
        let old_hash = Entry {
            content_hash: Some("aaa".to_string()),
            ..old
        };
        new.content_hash = Some("bbb".to_string());

        let details = compare_entries(&old_hash, &new, CompareMode::WithTimes);

        assert_eq!(
            details,
            vec![
                "size changed: 10 -> 11".to_string(),
                "permissions changed: -rw-r--r-- -> -rw-------".to_string(),
                "ownership changed: root(0):root(0) -> app(1000):root(0)".to_string(),
                "content changed (different MD5)".to_string(),
            ]
        );
    }

    #[test]
    fn test_modification_time_respects_mode() {
        let mut old = entry("/a", 1);
        let mut new = entry("/a", 1);
        old.mod_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        new.mod_time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap());

        assert_eq!(
            compare_entries(&old, &new, CompareMode::WithTimes),
            vec![
                "modification time changed: 2024-01-01T00:00:00Z -> 2024-06-01T12:30:00Z"
                    .to_string()
            ]
        );
        assert!(compare_entries(&old, &new, CompareMode::WithoutTimes).is_empty());

        // Only one side carries a timestamp
        new.mod_time = None;
        assert!(compare_entries(&old, &new, CompareMode::WithTimes).is_empty());
    }

    #[test]
    fn test_hash_compared_only_when_both_present() {
        let mut old = entry("/a", 1);
        let new = entry("/a", 1);
        old.content_hash = Some("abc".to_string());

        assert!(compare_entries(&old, &new, CompareMode::WithTimes).is_empty());

        let mut new = new;
        new.content_hash = Some(String::new());
        assert!(compare_entries(&old, &new, CompareMode::WithTimes).is_empty());
    }

    #[test]
    fn test_volatile_paths_are_ignored() {
        let old = vec![entry("/etc/hosts", 10), entry("/proc/1/status", 1)];
        let new = vec![entry("/etc/hosts", 99), entry("/etc/resolv.conf", 3)];

        let changes = compare(&old, &new, CompareMode::WithTimes);
        assert!(changes.differences.is_empty());
    }

    #[test]
    fn test_differences_are_sorted_by_path() {
        let old = vec![entry("/z", 1), entry("/m", 1)];
        let new = vec![entry("/a", 1), entry("/m", 2)];

        let changes = compare(&old, &new, CompareMode::WithTimes);
        let order: Vec<&str> = changes.differences.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(order, vec!["/a", "/m", "/z"]);
    }

    #[test]
    fn test_parse_snapshot_rejects_duplicates_and_garbage() {
        let duplicate = r#"[{"path":"/a","size":1,"mode":"-rw-r--r--"},{"path":"/a","size":2,"mode":"-rw-r--r--"}]"#;
        assert!(parse_snapshot(duplicate).is_err());
        assert!(parse_snapshot("{not json").is_err());

        let valid = r#"[{"path":"/a","size":10,"mode":"-rw-r--r--"}]"#;
        let entries = parse_snapshot(valid).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 10);
    }

    #[test]
    fn test_change_set_json_shape() {
        let changes = compare(&[entry("/a", 10)], &[entry("/a", 20)], CompareMode::WithTimes);
        let value = serde_json::to_value(&changes).unwrap();

        assert_eq!(value["summary"]["totalDifferences"], 1);
        assert_eq!(value["summary"]["modifiedFiles"], 1);
        assert_eq!(value["differences"][0]["type"], "modified");
        assert_eq!(value["differences"][0]["oldFile"]["size"], 10);
        assert_eq!(value["differences"][0]["newFile"]["size"], 20);
        assert_eq!(value["differences"][0]["details"][0], "size changed: 10 -> 20");
    }
}
