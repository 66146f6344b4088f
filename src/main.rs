use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use file_validator_rs::core::config::DEFAULT_CONFIG_DIR;
use file_validator_rs::core::registry::normalize_extension;
use file_validator_rs::logging;
use file_validator_rs::prelude::*;

/// Exit status after a user interrupt (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "file_validator_rs")]
#[command(about = "Batch file-integrity validator written in Rust", long_about = None)]
struct Cli {
    /// Directories to create a report for
    #[arg(value_name = "DIRECTORY", required = true, value_parser = existing_dir)]
    paths: Vec<PathBuf>,

    /// Output directory for reports
    #[arg(short = 'd', long = "reportdir", default_value = "./reports")]
    report_dir: PathBuf,

    /// XSL style sheet referenced from the report
    #[arg(short = 'x', long = "xsl", default_value = "report.xsl")]
    xsl: String,

    /// Scan directories recursively
    #[arg(short, long)]
    recursive: bool,

    /// Output debug info
    #[arg(short, long)]
    verbose: bool,

    /// Extensions to ignore
    #[arg(short, long, value_name = "EXT", num_args = 1.., value_parser = extension)]
    ignore: Vec<String>,

    /// Output paths relative to the scanned directory
    #[arg(long)]
    relative: bool,

    /// Resume validation using a previous XML report
    #[arg(long, value_name = "REPORT", value_parser = existing_file)]
    resume: Option<PathBuf>,

    /// Directory holding per-validator `<Type>.json` configuration
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Run in batch mode (no progress spinner)
    #[arg(long)]
    batch: bool,
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("'{}' is not a directory", value))
    }
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("'{}' is not a file", value))
    }
}

fn extension(value: &str) -> Result<String, String> {
    let ext = normalize_extension(value);
    if ext.is_empty() {
        Err("extension must not be empty".to_string())
    } else {
        Ok(ext)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // Set up graceful shutdown handler
    let interrupt = Interrupt::new();
    let handler_flag = interrupt.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n⚠️  Interrupt requested. Finishing report...");
        handler_flag.trigger();
    })
    .context("Error setting Ctrl-C handler")?;

    let mut registry = PluginRegistry::new();
    register_builtin(&mut registry).context("Failed to register validator plugins")?;
    registry.log_loaded();

    let config = RunConfig {
        roots: cli.paths,
        report_dir: cli.report_dir,
        stylesheet: cli.xsl,
        resume: cli.resume,
        scan: ScanOptions {
            recursive: cli.recursive,
            relative: cli.relative,
            ignore: cli.ignore.into_iter().collect::<HashSet<_>>(),
            config_dir: cli.config_dir,
        },
    };

    // Log lines would tear through the spinner, so verbose runs go without it
    let progress = if cli.batch || cli.verbose {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} file(s) {msg}")
                .context("Invalid progress template")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let outcome = validate_paths(&registry, &config, interrupt, progress.clone());
    progress.finish_and_clear();
    let RunReport {
        report_path,
        summary,
    } = outcome?;

    print_summary(&summary);
    println!("Report saved to: {}", report_path.display());

    if summary.interrupted {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_summary(summary: &ScanSummary) {
    println!();
    println!("==================================================");
    if summary.interrupted {
        println!("VALIDATION INTERRUPTED");
    } else {
        println!("VALIDATION COMPLETE");
    }
    println!("==================================================");
    println!("Validated files: {}", summary.validated);
    println!("  Valid: {}", summary.validated - summary.invalid);
    println!("  Invalid: {}", summary.invalid);
    println!("Copied from previous report: {}", summary.resumed);
    println!("Skipped (ignored extension): {}", summary.ignored);
    println!("Skipped (no validator): {}", summary.no_validator);
    if summary.duplicates > 0 {
        println!("Skipped (path already reported): {}", summary.duplicates);
    }
    if summary.failed > 0 {
        println!("Validator failures (see log): {}", summary.failed);
    }
    if summary.walk_errors > 0 {
        println!("Unreadable directory entries: {}", summary.walk_errors);
    }
    println!();
}
