/*!
 * Configuration handling for treesnap
 */

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use clap_complete::Shell;

use crate::error::Result;
use crate::glob::Pattern;
use crate::types::CompareMode;

/// Command-line arguments for treesnap
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "treesnap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Capture, compare and extract metadata snapshots of filesystem trees",
    long_about = "Walks a filesystem tree and records a metadata snapshot of every node, compares two snapshots, and copies a filtered subset of files elsewhere while preserving selected attributes."
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// Increase diagnostic verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Snapshot a tree and optionally extract the matching files
    Snapshot(SnapshotArgs),
    /// Compare two snapshot documents
    Diff(DiffArgs),
    /// Write a chown script restoring ownership of previously extracted files
    OwnershipScript(OwnershipScriptArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SnapshotArgs {
    /// Path to inspect
    #[clap(long, default_value = "/")]
    pub path: String,

    /// Glob pattern matched against full paths (supports **)
    #[clap(long = "glob")]
    pub pattern: Option<String>,

    /// Calculate MD5 checksums for regular files
    #[clap(long)]
    pub md5: bool,

    /// Exclude modification times from output
    #[clap(long)]
    pub no_times: bool,

    /// Additional subtree to skip (repeatable)
    #[clap(long = "exclude", value_name = "PATH")]
    pub exclude: Vec<String>,

    /// Do not cross filesystem boundaries
    #[clap(long)]
    pub one_file_system: bool,

    /// Output in JSON format
    #[clap(long)]
    pub json: bool,

    /// Show summary statistics
    #[clap(long)]
    pub summary: bool,

    /// Write the JSON snapshot to this file instead of stdout
    #[clap(long, value_name = "FILE")]
    pub output: Option<String>,

    /// Number of threads used for hashing
    #[clap(long, default_value = "4")]
    pub threads: usize,

    /// Hide the progress spinner
    #[clap(short, long)]
    pub quiet: bool,

    #[clap(flatten)]
    pub extract: ExtractArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ExtractArgs {
    /// Extract matching files to this directory
    #[clap(long, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Strip NUMBER leading components from file names
    #[clap(long, value_name = "NUMBER", default_value = "0")]
    pub strip_components: usize,

    /// Preserve user/group information when extracting
    #[clap(long = "preserve-owner")]
    pub preserve_owner: bool,

    /// Preserve file permissions when extracting
    #[clap(long = "preserve-perms")]
    pub preserve_perms: bool,

    /// Preserve all file attributes
    #[clap(long = "preserve-all")]
    pub preserve_all: bool,

    /// Write the ownership repair script for extracted files here
    #[clap(long, value_name = "FILE")]
    pub ownership_script: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DiffArgs {
    /// Old snapshot document ("-" for stdin)
    pub old: String,

    /// New snapshot document ("-" for stdin)
    pub new: String,

    /// Ignore modification time differences
    #[clap(long)]
    pub no_times: bool,

    /// Output in JSON format
    #[clap(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct OwnershipScriptArgs {
    /// Snapshot document describing the extracted files ("-" for stdin)
    pub snapshot: String,

    /// Directory the files were extracted into
    #[clap(long, value_name = "DIR")]
    pub output_dir: String,

    /// Strip count used during extraction
    #[clap(long, value_name = "NUMBER", default_value = "0")]
    pub strip_components: usize,

    /// Script file to write
    #[clap(long, value_name = "FILE")]
    pub script: String,
}

/// Snapshotter configuration
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Root of the walk
    pub root: PathBuf,

    /// Leaf filter applied to full paths
    pub pattern: Option<Pattern>,

    /// Compute MD5 digests for regular, non-empty files
    pub hash: bool,

    /// Record modification times
    pub include_times: bool,

    /// Extra subtrees to prune, in addition to the fixed list
    pub exclude: Vec<PathBuf>,

    /// Stay on the root's filesystem
    pub one_file_system: bool,
}

impl SnapshotConfig {
    /// Configuration that walks `root` with every option off except times
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: None,
            hash: false,
            include_times: true,
            exclude: Vec::new(),
            one_file_system: false,
        }
    }

    /// Create configuration from command-line arguments
    ///
    /// Fails when the glob pattern is malformed or the root cannot be made
    /// absolute.
    pub fn from_args(args: &SnapshotArgs) -> Result<Self> {
        let pattern = args.pattern.as_deref().map(Pattern::new).transpose()?;

        let mut exclude: Vec<PathBuf> = args
            .exclude
            .iter()
            .map(|p| std::path::absolute(p))
            .collect::<std::io::Result<_>>()?;

        // Never walk into our own extraction target
        if let Some(dir) = &args.extract.output_dir {
            exclude.push(std::path::absolute(dir)?);
        }

        Ok(Self {
            root: std::path::absolute(&args.path)?,
            pattern,
            hash: args.md5,
            include_times: !args.no_times,
            exclude,
            one_file_system: args.one_file_system,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if std::fs::symlink_metadata(&self.root).is_err() {
            crate::bail!(PathNotFound, "{}", self.root.display());
        }
        crate::ensure!(
            self.root.to_str().is_some(),
            Config,
            "root path is not valid UTF-8: {}",
            self.root.display()
        );
        Ok(())
    }
}

/// Extractor configuration
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// Destination root
    pub output_dir: PathBuf,

    /// Leading path components to drop
    pub strip_components: usize,

    /// Copy permission bits onto extracted files
    pub preserve_permissions: bool,

    /// Copy numeric owner and group onto extracted files
    pub preserve_ownership: bool,
}

impl ExtractConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            strip_components: 0,
            preserve_permissions: false,
            preserve_ownership: false,
        }
    }

    /// Create configuration from command-line arguments, if extraction was requested
    pub fn from_args(args: &ExtractArgs) -> Result<Option<Self>> {
        let Some(dir) = &args.output_dir else {
            crate::ensure!(
                args.ownership_script.is_none(),
                Config,
                "--ownership-script requires --output-dir"
            );
            crate::ensure!(
                args.strip_components == 0,
                Config,
                "--strip-components requires --output-dir"
            );
            return Ok(None);
        };

        let preserve_ownership = args.preserve_owner || args.preserve_all;
        crate::ensure!(
            args.ownership_script.is_none() || preserve_ownership,
            Config,
            "--ownership-script requires --preserve-owner or --preserve-all"
        );

        Ok(Some(Self {
            output_dir: std::path::absolute(dir)?,
            strip_components: args.strip_components,
            preserve_permissions: args.preserve_perms || args.preserve_all,
            preserve_ownership,
        }))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(parent) = self.output_dir.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                crate::bail!(
                    Config,
                    "parent of output directory not found: {}",
                    parent.display()
                );
            }
        }
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            crate::bail!(
                Config,
                "output path is not a directory: {}",
                self.output_dir.display()
            );
        }
        Ok(())
    }
}

impl DiffArgs {
    pub fn compare_mode(&self) -> CompareMode {
        if self.no_times {
            CompareMode::WithoutTimes
        } else {
            CompareMode::WithTimes
        }
    }

    /// Validate the diff inputs
    pub fn validate(&self) -> Result<()> {
        crate::ensure!(
            !(self.old == "-" && self.new == "-"),
            Config,
            "only one snapshot can be read from stdin"
        );
        for input in [&self.old, &self.new] {
            if input != "-" && !Path::new(input).is_file() {
                crate::bail!(PathNotFound, "{}", input);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_snapshot_defaults() {
        let args = parse(&["treesnap", "snapshot"]);
        let Some(Command::Snapshot(snapshot)) = args.command else {
            panic!("expected snapshot subcommand");
        };

        let config = SnapshotConfig::from_args(&snapshot).unwrap();
        assert_eq!(config.root, PathBuf::from("/"));
        assert!(config.include_times);
        assert!(!config.hash);
        assert!(config.pattern.is_none());
        assert!(ExtractConfig::from_args(&snapshot.extract).unwrap().is_none());
    }

    #[test]
    fn test_preserve_all_sets_both_flags() {
        let args = parse(&[
            "treesnap",
            "snapshot",
            "--output-dir",
            "/tmp/out",
            "--strip-components",
            "2",
            "--preserve-all",
        ]);
        let Some(Command::Snapshot(snapshot)) = args.command else {
            panic!("expected snapshot subcommand");
        };

        let extract = ExtractConfig::from_args(&snapshot.extract)
            .unwrap()
            .unwrap();
        assert_eq!(extract.strip_components, 2);
        assert!(extract.preserve_permissions);
        assert!(extract.preserve_ownership);

        let config = SnapshotConfig::from_args(&snapshot).unwrap();
        assert!(config.exclude.contains(&PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_relative_output_dir_is_made_absolute() {
        let args = parse(&["treesnap", "snapshot", "--output-dir", "out"]);
        let Some(Command::Snapshot(snapshot)) = args.command else {
            panic!("expected snapshot subcommand");
        };

        let extract = ExtractConfig::from_args(&snapshot.extract)
            .unwrap()
            .unwrap();
        assert!(extract.output_dir.is_absolute());
        assert_eq!(
            extract.output_dir,
            std::env::current_dir().unwrap().join("out")
        );
    }

    #[test]
    fn test_malformed_glob_is_a_config_error() {
        let args = parse(&["treesnap", "snapshot", "--glob", "/etc/[abc"]);
        let Some(Command::Snapshot(snapshot)) = args.command else {
            panic!("expected snapshot subcommand");
        };

        assert!(SnapshotConfig::from_args(&snapshot).is_err());
    }

    #[test]
    fn test_strip_components_without_output_dir() {
        let args = parse(&["treesnap", "snapshot", "--strip-components", "1"]);
        let Some(Command::Snapshot(snapshot)) = args.command else {
            panic!("expected snapshot subcommand");
        };

        assert!(ExtractConfig::from_args(&snapshot.extract).is_err());
    }

    #[test]
    fn test_diff_rejects_two_stdin_inputs() {
        let args = parse(&["treesnap", "diff", "-", "-", "--no-times"]);
        let Some(Command::Diff(diff)) = args.command else {
            panic!("expected diff subcommand");
        };

        assert_eq!(diff.compare_mode(), CompareMode::WithoutTimes);
        assert!(diff.validate().is_err());
    }
}
