/*!
 * Extraction of snapshot entries into a destination directory
 */

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{symlink, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::fcntl::OFlag;
use nix::unistd::{chown, Gid, Uid};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::owner::parse_display_id;
use crate::types::Entry;

/// Ownership a destination path should end up with
///
/// Handed to an external privileged helper when the extracting process
/// cannot change ownership itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipFix {
    pub path: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

/// Outcome of one extraction batch
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Entries written to the destination
    pub copied: usize,
    /// Entries dropped because every path component was stripped
    pub skipped: usize,
    /// Entries that failed, with the reason
    pub failures: Vec<(String, String)>,
    /// Target ownership of every written entry, when ownership preservation was requested
    pub ownership: Vec<OwnershipFix>,
}

/// Map a source path to its destination-relative path
///
/// Returns `None` when `strip_components` consumes every component.
pub fn destination_path(source: &str, strip_components: usize) -> Option<PathBuf> {
    let trimmed = source.strip_prefix('/').unwrap_or(source);
    let parts: Vec<&str> = trimmed.split('/').collect();

    if strip_components >= parts.len() {
        return None;
    }

    let relative: PathBuf = parts[strip_components..]
        .iter()
        .filter(|part| !matches!(**part, "" | "." | ".."))
        .collect();

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Copies non-directory entries from the live filesystem into a destination root
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    /// Destination path of an entry, if it survives the path transform
    pub fn target_for(&self, entry: &Entry) -> Option<PathBuf> {
        destination_path(&entry.path, self.config.strip_components)
            .map(|relative| self.config.output_dir.join(relative))
    }

    /// Copy every non-directory entry; failures are recorded, never fatal
    ///
    /// Directories are only created as parents of copied files, so empty
    /// source directories are not reproduced.
    pub fn extract(&self, entries: &[Entry]) -> ExtractReport {
        let mut report = ExtractReport::default();

        for entry in entries.iter().filter(|e| !e.is_dir) {
            let Some(dest) = self.target_for(entry) else {
                debug!("All components of {} stripped, skipping", entry.path);
                report.skipped += 1;
                continue;
            };

            match self.copy_entry(Path::new(&entry.path), &dest) {
                Ok((uid, gid)) => {
                    report.copied += 1;
                    if self.config.preserve_ownership {
                        report.ownership.push(OwnershipFix {
                            path: dest,
                            uid,
                            gid,
                        });
                    }
                }
                Err(e) => {
                    warn!("Failed to copy {}: {}", entry.path, e);
                    report.failures.push((entry.path.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Copy one node and return the source's numeric owner and group
    fn copy_entry(&self, src: &Path, dest: &Path) -> io::Result<(u32, u32)> {
        let info = fs::symlink_metadata(src)?;
        let ids = (info.uid(), info.gid());

        self.create_parents(dest)?;

        let file_type = info.file_type();
        if file_type.is_symlink() {
            let target = fs::read_link(src)?;
            if let Ok(existing) = fs::symlink_metadata(dest) {
                if !existing.is_dir() {
                    fs::remove_file(dest)?;
                }
            }
            symlink(&target, dest)?;
            return Ok(ids);
        }

        if !file_type.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is not a regular file", src.display()),
            ));
        }

        // A link left at the destination would redirect the write
        if let Ok(existing) = fs::symlink_metadata(dest) {
            if existing.file_type().is_symlink() {
                fs::remove_file(dest)?;
            }
        }

        let permissions = info.mode() & 0o7777;
        {
            let mut reader = File::open(src)?;
            let mut writer = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(permissions)
                .custom_flags(OFlag::O_NOFOLLOW.bits())
                .open(dest)?;
            io::copy(&mut reader, &mut writer)?;
        }

        if self.config.preserve_permissions {
            if let Err(e) = fs::set_permissions(dest, Permissions::from_mode(permissions)) {
                warn!("Could not preserve mode of {}: {}", dest.display(), e);
            }
        }

        if self.config.preserve_ownership {
            if let Err(e) = chown(dest, Some(Uid::from_raw(ids.0)), Some(Gid::from_raw(ids.1))) {
                warn!("Could not preserve ownership of {}: {}", dest.display(), e);
            }
        }

        self.verify(dest, permissions, ids);

        Ok(ids)
    }

    /// Create the directories between the output root and `dest`
    ///
    /// Refuses to pass through a symlink, so every write stays under the
    /// output directory.
    fn create_parents(&self, dest: &Path) -> io::Result<()> {
        let root = &self.config.output_dir;
        fs::create_dir_all(root)?;

        let Some(relative) = dest.parent().and_then(|p| p.strip_prefix(root).ok()) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is outside {}", dest.display(), root.display()),
            ));
        };

        let mut current = root.clone();
        for component in relative.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(info) if info.file_type().is_symlink() => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{} is a symlink", current.display()),
                    ));
                }
                Ok(info) if !info.is_dir() => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} is not a directory", current.display()),
                    ));
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(&current)?,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Log a warning when the destination did not end up as requested
    fn verify(&self, dest: &Path, permissions: u32, (uid, gid): (u32, u32)) {
        let actual = match fs::symlink_metadata(dest) {
            Ok(actual) => actual,
            Err(e) => {
                warn!("Cannot stat {} after copy: {}", dest.display(), e);
                return;
            }
        };

        if self.config.preserve_ownership && (actual.uid() != uid || actual.gid() != gid) {
            warn!(
                "Final ownership of {} is {}:{} but {}:{} was expected",
                dest.display(),
                actual.uid(),
                actual.gid(),
                uid,
                gid
            );
        }
        if self.config.preserve_permissions && actual.mode() & 0o7777 != permissions {
            warn!(
                "Final mode of {} is {:o} but {:o} was expected",
                dest.display(),
                actual.mode() & 0o7777,
                permissions
            );
        }
    }
}

/// Ownership triples for entries extracted from a snapshot document
///
/// Ids are recovered from the `name(id)` display strings, so this works on
/// a host that only has the snapshot, not the source filesystem.
pub fn ownership_plan(
    entries: &[Entry],
    output_dir: &Path,
    strip_components: usize,
) -> Vec<OwnershipFix> {
    let mut plan = Vec::new();

    for entry in entries.iter().filter(|e| !e.is_dir) {
        let Some(relative) = destination_path(&entry.path, strip_components) else {
            continue;
        };

        let (Some(uid), Some(gid)) = (
            parse_display_id(&entry.owner),
            parse_display_id(&entry.group),
        ) else {
            warn!(
                "Cannot extract ids from {}:{} for {}",
                entry.owner, entry.group, entry.path
            );
            continue;
        };

        plan.push(OwnershipFix {
            path: output_dir.join(relative),
            uid,
            gid,
        });
    }

    plan
}

/// Render ownership triples as a shell script of `chown -h` commands
pub fn ownership_script(fixes: &[OwnershipFix]) -> String {
    let mut script = String::from("#!/bin/sh\n");
    for fix in fixes {
        let _ = writeln!(
            script,
            "chown -h {}:{} {}",
            fix.uid,
            fix.gid,
            shell_quote(&fix.path.to_string_lossy())
        );
    }
    script
}

/// Write the ownership script to `path` as an owner-only executable
pub fn write_ownership_script(fixes: &[OwnershipFix], path: &Path) -> Result<()> {
    fs::write(path, ownership_script(fixes))?;
    fs::set_permissions(path, Permissions::from_mode(0o700))?;
    Ok(())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
