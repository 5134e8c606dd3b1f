/*!
 * Reporting functionality for treesnap
 *
 * Renders snapshots, change sets and extraction results for humans
 * using the tabled library. Machine-readable output lives in `writer`.
 */

use std::fmt::Write as _;

use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::extract::ExtractReport;
use crate::scanner::ScannerStatistics;
use crate::types::{ChangeKind, ChangeSet, Entry};
use crate::utils::format_file_size;

/// Columns shown in a snapshot listing
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingOptions {
    /// Include the modification time column
    pub times: bool,
    /// Include the MD5 column
    pub hashes: bool,
}

/// Report generator for snapshots, diffs and extractions
pub struct Reporter {
    options: ListingOptions,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(options: ListingOptions) -> Self {
        Self { options }
    }

    /// One row per entry: mode, size, time, owner, group, path, link target, digest
    pub fn snapshot_table(&self, entries: &[Entry]) -> String {
        let mut builder = Builder::default();

        let mut header = vec!["Mode", "Size"];
        if self.options.times {
            header.push("Modified");
        }
        header.extend(["User", "Group", "Path", "Symlink"]);
        if self.options.hashes {
            header.push("MD5");
        }
        builder.push_record(header);

        for entry in entries {
            let mut row = vec![entry.mode.clone(), entry.size.to_string()];
            if self.options.times {
                row.push(
                    entry
                        .mod_time
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_default(),
                );
            }
            row.push(entry.owner.clone());
            row.push(entry.group.clone());
            row.push(entry.path.clone());
            row.push(
                entry
                    .symlink_target
                    .as_ref()
                    .map(|t| format!("-> {}", t))
                    .unwrap_or_default(),
            );
            if self.options.hashes {
                row.push(entry.content_hash.clone().unwrap_or_default());
            }
            builder.push_record(row);
        }

        let mut table = builder.build();
        table
            .with(Style::blank())
            .with(Padding::new(0, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    /// Totals of a snapshot
    pub fn snapshot_summary(&self, stats: &ScannerStatistics) -> String {
        let mut rows = vec![
            SummaryRow::new("Total size", format_file_size(stats.total_size)),
            SummaryRow::new("Directories", stats.directories.to_string()),
            SummaryRow::new("Files", stats.files.to_string()),
        ];
        if self.options.hashes {
            rows.push(SummaryRow::new("Hashed", stats.hashed.to_string()));
            rows.push(SummaryRow::new("Hash errors", stats.hash_errors.to_string()));
        }
        rows.push(SummaryRow::new("Skipped", stats.skipped.to_string()));

        summary_table(rows)
    }

    /// Summary block followed by one line (or block) per difference
    pub fn diff_text(&self, changes: &ChangeSet) -> String {
        let mut out = String::new();
        let summary = &changes.summary;

        let _ = writeln!(out, "\nComparison Summary:");
        let _ = writeln!(out, "Total differences: {}", summary.total_differences);
        let _ = writeln!(out, "Added files: {}", summary.added_files);
        let _ = writeln!(out, "Removed files: {}", summary.removed_files);
        let _ = writeln!(out, "Modified files: {}\n", summary.modified_files);

        if changes.differences.is_empty() {
            return out;
        }

        let _ = writeln!(out, "Details:");
        for diff in &changes.differences {
            match diff.kind {
                ChangeKind::Added | ChangeKind::Removed => {
                    let (marker, entry) = if diff.kind == ChangeKind::Added {
                        ("+", diff.new.as_ref())
                    } else {
                        ("-", diff.old.as_ref())
                    };
                    let _ = writeln!(out, "{} {}", marker, diff.path);
                    if let Some(entry) = entry {
                        let _ = writeln!(
                            out,
                            "  ({} bytes, {}:{}, mode {})",
                            entry.size, entry.owner, entry.group, entry.mode
                        );
                    }
                }
                ChangeKind::Modified => {
                    let _ = writeln!(out, "M {}", diff.path);
                    for detail in &diff.details {
                        let _ = writeln!(out, "  {}", detail);
                    }
                }
            }
        }

        out
    }

    /// Counts of an extraction batch
    pub fn extract_summary(&self, report: &ExtractReport) -> String {
        summary_table(vec![
            SummaryRow::new("Copied", report.copied.to_string()),
            SummaryRow::new("Skipped (stripped)", report.skipped.to_string()),
            SummaryRow::new("Failed", report.failures.len().to_string()),
        ])
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    key: String,

    #[tabled(rename = "Value")]
    value: String,
}

impl SummaryRow {
    fn new(key: &str, value: String) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

fn summary_table(rows: Vec<SummaryRow>) -> String {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));

    table.to_string()
}
