/*!
 * Core types and data structures for treesnap
 */

use std::fs::FileType;
use std::os::unix::fs::FileTypeExt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Metadata record for one filesystem node
///
/// Serialized with the field names used on the wire:
/// `path`, `size`, `mode`, `modTime`, `isDir`, `symlinkTo`, `user`, `group`, `md5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Absolute, slash-separated path. Unique within a snapshot.
    pub path: String,
    /// Size in bytes, 0 for directories
    pub size: u64,
    /// Textual type and permission encoding, e.g. `drwxr-xr-x`
    pub mode: String,
    /// Modification time, absent when times were excluded
    #[serde(rename = "modTime", default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
    /// Whether the node is a directory
    #[serde(rename = "isDir", default)]
    pub is_dir: bool,
    /// Raw link target, only set for symlinks
    #[serde(rename = "symlinkTo", default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
    /// Owner display string, `name(uid)` or `(uid)`
    #[serde(rename = "user", default)]
    pub owner: String,
    /// Group display string, `name(gid)` or `(gid)`
    #[serde(default)]
    pub group: String,
    /// Hex MD5 digest or an `error: ...` sentinel
    #[serde(rename = "md5", default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Entry {
    /// Whether this entry describes a symbolic link
    pub fn is_symlink(&self) -> bool {
        self.symlink_target
            .as_deref()
            .map_or(false, |target| !target.is_empty())
    }

    /// The content hash, if one was recorded and is non-empty
    pub fn hash(&self) -> Option<&str> {
        self.content_hash.as_deref().filter(|h| !h.is_empty())
    }
}

/// Encode a file type and raw `st_mode` bits as a mode string
///
/// One letter per applicable type or flag, in the order
/// `d L D p S u g c t`, or `-` when none applies, followed by
/// the nine permission characters.
pub fn mode_string(file_type: &FileType, mode: u32) -> String {
    let mut out = String::with_capacity(12);

    if file_type.is_dir() {
        out.push('d');
    }
    if file_type.is_symlink() {
        out.push('L');
    }
    if file_type.is_block_device() || file_type.is_char_device() {
        out.push('D');
    }
    if file_type.is_fifo() {
        out.push('p');
    }
    if file_type.is_socket() {
        out.push('S');
    }
    if mode & 0o4000 != 0 {
        out.push('u');
    }
    if mode & 0o2000 != 0 {
        out.push('g');
    }
    if file_type.is_char_device() {
        out.push('c');
    }
    if mode & 0o1000 != 0 {
        out.push('t');
    }
    if out.is_empty() {
        out.push('-');
    }

    const RWX: &[u8; 9] = b"rwxrwxrwx";
    for (i, symbol) in RWX.iter().enumerate() {
        if mode & (1 << (8 - i)) != 0 {
            out.push(*symbol as char);
        } else {
            out.push('-');
        }
    }

    out
}

/// Whether modification times participate in comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// Compare every attribute, including modification times
    #[default]
    WithTimes,
    /// Ignore modification time differences
    WithoutTimes,
}

/// Classification of a single difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// One path-keyed difference between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(rename = "oldFile", default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Entry>,
    #[serde(rename = "newFile", default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Entry>,
    /// Attribute deltas, only populated for modifications
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Aggregate counts of a change set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_differences: usize,
    pub added_files: usize,
    pub removed_files: usize,
    pub modified_files: usize,
}

/// Classified result of comparing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Differences sorted by path
    pub differences: Vec<FileDiff>,
    pub summary: Summary,
}

impl ChangeSet {
    /// Whether any difference was found
    pub fn has_differences(&self) -> bool {
        self.summary.total_differences > 0
    }
}
