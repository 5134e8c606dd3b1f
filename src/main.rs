/*!
 * Command-line interface for treesnap
 */

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use treesnap::config::{Args, Command, DiffArgs, OwnershipScriptArgs, SnapshotArgs};
use treesnap::diff::{compare, load_snapshot};
use treesnap::extract::{ownership_plan, write_ownership_script, Extractor};
use treesnap::report::{ListingOptions, Reporter};
use treesnap::scanner::Scanner;
use treesnap::writer::JsonWriter;
use treesnap::{ExtractConfig, Result, SnapshotConfig};

fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(args.verbose);

    if let Some(shell) = args.generate {
        let mut command = Args::command();
        clap_complete::generate(shell, &mut command, "treesnap", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let Some(command) = args.command else {
        let _ = Args::command().print_help();
        return ExitCode::FAILURE;
    };

    let result = match command {
        Command::Snapshot(snapshot) => run_snapshot(&snapshot),
        Command::Diff(diff) => run_diff(&diff),
        Command::OwnershipScript(script) => run_ownership_script(&script),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics always go to stderr; stdout is reserved for documents
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_snapshot(args: &SnapshotArgs) -> Result<ExitCode> {
    let config = SnapshotConfig::from_args(args)?;
    config.validate()?;

    let extract_config = ExtractConfig::from_args(&args.extract)?;
    if let Some(extract_config) = &extract_config {
        extract_config.validate()?;
    }

    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
    {
        warn!("Failed to set thread pool size: {}", e);
    }

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{spinner:.green} {pos} nodes {wide_msg:.dim} [{elapsed_precise}]")
        {
            progress.set_style(style);
        }
        progress.enable_steady_tick(std::time::Duration::from_millis(100));
        progress
    };

    let mut scanner = Scanner::new(config.clone(), Arc::new(progress.clone()));
    let entries = scanner.scan()?;
    progress.finish_and_clear();

    let reporter = Reporter::new(ListingOptions {
        times: config.include_times,
        hashes: config.hash,
    });

    if let Some(extract_config) = extract_config {
        let extractor = Extractor::new(extract_config);
        let report = extractor.extract(&entries);
        info!(
            "Extracted {} entries, {} skipped, {} failed",
            report.copied,
            report.skipped,
            report.failures.len()
        );

        if let Some(script) = &args.extract.ownership_script {
            write_ownership_script(&report.ownership, Path::new(script))?;
            info!(
                "Wrote ownership script for {} entries to {}",
                report.ownership.len(),
                script
            );
        }

        if !args.json && args.output.is_none() {
            eprintln!("{}", reporter.extract_summary(&report));
        }
    }

    if let Some(output) = &args.output {
        JsonWriter::create(Path::new(output))?.write(&entries)?;
    } else if args.json {
        JsonWriter::stdout().write(&entries)?;
    } else {
        println!("{}", reporter.snapshot_table(&entries));
    }

    if args.summary {
        let summary = reporter.snapshot_summary(scanner.statistics());
        if args.json && args.output.is_none() {
            eprintln!("{}", summary);
        } else {
            println!("\n{}", summary);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_diff(args: &DiffArgs) -> Result<ExitCode> {
    args.validate()?;

    let old = load_snapshot(&args.old)?;
    let new = load_snapshot(&args.new)?;

    let changes = compare(&old, &new, args.compare_mode());

    if args.json {
        JsonWriter::stdout().write(&changes)?;
    } else {
        print!("{}", Reporter::new(ListingOptions::default()).diff_text(&changes));
    }

    if changes.has_differences() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_ownership_script(args: &OwnershipScriptArgs) -> Result<ExitCode> {
    let entries = load_snapshot(&args.snapshot)?;
    let output_dir = std::path::absolute(&args.output_dir)?;
    let plan = ownership_plan(&entries, &output_dir, args.strip_components);

    write_ownership_script(&plan, Path::new(&args.script))?;
    info!("Wrote {} ownership fixes to {}", plan.len(), args.script);

    Ok(ExitCode::SUCCESS)
}
