/*!
 * Filesystem walking and snapshot construction
 */

use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SnapshotConfig;
use crate::error::Result;
use crate::owner::OwnerResolver;
use crate::types::{mode_string, Entry};
use crate::utils::{md5_file, EXCLUDED_NODES, EXCLUDED_SUBTREES};

/// Scanner statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannerStatistics {
    /// Directories recorded
    pub directories: usize,
    /// Non-directory nodes recorded
    pub files: usize,
    /// Sum of recorded sizes
    pub total_size: u64,
    /// Files hashed successfully
    pub hashed: usize,
    /// Files whose hash could not be computed
    pub hash_errors: usize,
    /// Nodes skipped because of exclusion or access errors
    pub skipped: usize,
}

/// Snapshotter for a filesystem tree
pub struct Scanner {
    /// Scanner configuration
    config: SnapshotConfig,
    /// Progress bar
    pub progress: Arc<ProgressBar>,
    /// Statistics of the last scan
    statistics: ScannerStatistics,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(config: SnapshotConfig, progress: Arc<ProgressBar>) -> Self {
        Self {
            config,
            progress,
            statistics: ScannerStatistics::default(),
        }
    }

    /// Statistics of the last scan
    pub fn statistics(&self) -> &ScannerStatistics {
        &self.statistics
    }

    /// Walk the configured root and return its entries sorted by path
    ///
    /// Permission and existence errors below the root skip the affected node
    /// (and its subtree); anything else, or any error at the root, aborts.
    /// Nodes whose names are not valid UTF-8 are skipped the same way.
    pub fn scan(&mut self) -> Result<Vec<Entry>> {
        self.statistics = ScannerStatistics::default();

        let mut owners = OwnerResolver::new();
        let mut visited: HashSet<(u64, u64)> = HashSet::new();
        let mut entries: Vec<Entry> = Vec::new();
        let mut pending_hashes: Vec<(usize, PathBuf)> = Vec::new();

        let mut walker = WalkDir::new(&self.config.root)
            .follow_links(false)
            .same_file_system(self.config.one_file_system)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let dent = match next {
                Ok(dent) => dent,
                Err(e) => {
                    self.skip_or_fail(e)?;
                    continue;
                }
            };
            let path = dent.path();

            if self.is_pruned(path) {
                debug!("Skipping excluded subtree {}", path.display());
                self.statistics.skipped += 1;
                if dent.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }
            if is_hidden_node(path) {
                continue;
            }

            // Recorded paths must round-trip to the same node
            let Some(path_str) = path.to_str().map(str::to_owned) else {
                warn!(
                    "Skipping {}: name is not valid UTF-8",
                    path.to_string_lossy()
                );
                self.statistics.skipped += 1;
                if dent.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            };

            let metadata = match dent.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    if dent.file_type().is_dir() {
                        walker.skip_current_dir();
                    }
                    self.skip_or_fail(e)?;
                    continue;
                }
            };

            if metadata.is_dir() {
                if !visited.insert((metadata.dev(), metadata.ino())) {
                    warn!(
                        "Directory {} was already visited, not descending again",
                        path.display()
                    );
                    walker.skip_current_dir();
                }
                self.progress
                    .set_message(format!("Scanning {}", path.display()));
            }
            self.progress.inc(1);

            if let Some(pattern) = &self.config.pattern {
                if !pattern.matches(&path_str) {
                    continue;
                }
            }

            if self.config.hash && metadata.file_type().is_file() && metadata.len() > 0 {
                pending_hashes.push((entries.len(), path.to_path_buf()));
            }

            let entry = self.build_entry(path_str, path, &metadata, &mut owners);
            if entry.is_dir {
                self.statistics.directories += 1;
            } else {
                self.statistics.files += 1;
            }
            self.statistics.total_size += entry.size;
            entries.push(entry);
        }

        self.hash_entries(&mut entries, pending_hashes);

        entries.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "Snapshot of {}: {} directories, {} files, {} skipped",
            self.config.root.display(),
            self.statistics.directories,
            self.statistics.files,
            self.statistics.skipped
        );

        Ok(entries)
    }

    /// Decide whether a walk error is skippable
    fn skip_or_fail(&mut self, err: walkdir::Error) -> Result<()> {
        let skippable = err.depth() > 0
            && matches!(
                err.io_error().map(io::Error::kind),
                Some(io::ErrorKind::PermissionDenied) | Some(io::ErrorKind::NotFound)
            );

        if !skippable {
            return Err(err.into());
        }

        let path = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        warn!("Cannot access {}: {}", path, err);
        self.statistics.skipped += 1;
        Ok(())
    }

    /// Whether the walk must not enter this path
    pub fn is_pruned(&self, path: &Path) -> bool {
        EXCLUDED_SUBTREES.iter().any(|p| path.starts_with(p))
            || self.config.exclude.iter().any(|p| path.starts_with(p))
    }

    fn build_entry(
        &self,
        path_str: String,
        path: &Path,
        metadata: &Metadata,
        owners: &mut OwnerResolver,
    ) -> Entry {
        let file_type = metadata.file_type();
        let is_dir = file_type.is_dir();

        let symlink_target = if file_type.is_symlink() {
            match fs::read_link(path) {
                Ok(target) => Some(target.to_string_lossy().into_owned()),
                Err(e) => {
                    warn!("Cannot read link {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let mod_time = if self.config.include_times {
            metadata.modified().ok().map(DateTime::<Utc>::from)
        } else {
            None
        };

        Entry {
            path: path_str,
            size: if is_dir { 0 } else { metadata.len() },
            mode: mode_string(&file_type, metadata.mode()),
            mod_time,
            is_dir,
            symlink_target,
            owner: owners.user(metadata.uid()),
            group: owners.group(metadata.gid()),
            content_hash: None,
        }
    }

    /// Fill in content hashes on the rayon pool
    fn hash_entries(&mut self, entries: &mut [Entry], pending: Vec<(usize, PathBuf)>) {
        if pending.is_empty() {
            return;
        }

        self.progress
            .set_message(format!("Hashing {} files", pending.len()));

        let digests: Vec<(usize, io::Result<String>)> = pending
            .into_par_iter()
            .map(|(index, path)| (index, md5_file(&path)))
            .collect();

        for (index, digest) in digests {
            let entry = &mut entries[index];
            match digest {
                Ok(hash) => {
                    entry.content_hash = Some(hash);
                    self.statistics.hashed += 1;
                }
                Err(e) => {
                    warn!("Cannot hash {}: {}", entry.path, e);
                    entry.content_hash = Some(format!("error: {}", e));
                    self.statistics.hash_errors += 1;
                }
            }
        }
    }
}

/// Single nodes that are skipped without affecting their siblings
fn is_hidden_node(path: &Path) -> bool {
    EXCLUDED_NODES.iter().any(|p| path == *p)
}
