/*!
 * treesnap - metadata snapshots of filesystem trees
 *
 * This library walks a filesystem tree into a path-sorted list of entries,
 * compares two such snapshots into a classified change set, and copies a
 * filtered subset of files elsewhere while preserving selected attributes.
 */

pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod glob;
pub mod owner;
pub mod report;
pub mod scanner;
pub mod types;
pub mod utils;
pub mod writer;


// Re-export main components for easier access
pub use config::{ExtractConfig, SnapshotConfig};
pub use diff::{compare, load_snapshot};
pub use error::{Result, TreeSnapError};
pub use extract::{ExtractReport, Extractor, OwnershipFix};
pub use glob::Pattern;
pub use report::{ListingOptions, Reporter};
pub use scanner::{Scanner, ScannerStatistics};
pub use types::{ChangeKind, ChangeSet, CompareMode, Entry, FileDiff, Summary};
pub use writer::JsonWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
