/*!
 * Utility functions for treesnap
 */

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use md5::{Digest, Md5};
use once_cell::sync::Lazy;

/// Subtrees that are never walked: kernel pseudo-filesystems and the
/// mount point an extraction target is bound to inside a container.
pub static EXCLUDED_SUBTREES: Lazy<Vec<&'static Path>> = Lazy::new(|| {
    vec![
        Path::new("/proc"),
        Path::new("/sys"),
        Path::new("/dev"),
        Path::new("/inspect-target"),
    ]
});

/// Single nodes that are never reported: the helper binary injected into
/// a container.
pub static EXCLUDED_NODES: Lazy<Vec<&'static Path>> = Lazy::new(|| vec![Path::new("/inspect")]);

/// Paths that differ between any two runs of the same image and are
/// therefore ignored when comparing snapshots.
pub static VOLATILE_FILES: &[&str] = &["/etc/resolv.conf", "/etc/hostname", "/etc/hosts"];

/// Prefixes of pseudo-filesystem content ignored when comparing snapshots.
pub static VOLATILE_PREFIXES: &[&str] = &["/proc/", "/sys/", "/dev/"];

/// Whether a path varies spuriously between runs of the same image
pub fn is_volatile_path(path: &str) -> bool {
    VOLATILE_FILES.contains(&path) || VOLATILE_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Stream a file through MD5 and return the lowercase hex digest
pub fn md5_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::tempdir;

    #[test]
    fn test_md5_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello world\n").unwrap();

        assert_eq!(md5_file(&path).unwrap(), "6f5902ac237024bdd0c176cb93063dc4");
    }

    #[test]
    fn test_md5_missing_file() {
        let dir = tempdir().unwrap();
        assert!(md5_file(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_volatile_paths() {
        assert!(is_volatile_path("/etc/hosts"));
        assert!(is_volatile_path("/proc/1/status"));
        assert!(!is_volatile_path("/etc/hosts.allow"));
        assert!(!is_volatile_path("/device"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }
}
