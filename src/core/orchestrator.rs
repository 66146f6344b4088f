//! The scan loop tying traversal, resume data, validators and the report together
//!
//! Entries are handled strictly one at a time. For each file:
//!
//! 1. an ignored extension is skipped without touching anything else,
//! 2. a path found in the resume index is copied to the report verbatim,
//! 3. otherwise the validator for the extension is resolved (or built) and run,
//! 4. its result is appended to the report.
//!
//! An extension without a usable validator joins the ignore set for the rest
//! of the run. A report key is written at most once per run; with relative
//! keys two roots can both hold `index.html`, and only the first one is kept.
//! A validator that raises or panics only loses its own file.
//! An interrupt stops the loop before the next entry; the report is still
//! closed properly by [`ReportWriter`].

use indicatif::ProgressBar;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use thiserror::Error;

use super::cache::ValidatorCache;
use super::config::DEFAULT_CONFIG_DIR;
use super::interrupt::Interrupt;
use super::registry::{PluginRegistry, PluginSource};
use super::validator::{ValidationResult, ValidatorError};
use crate::reporting::report_writer::{ReportError, ReportWriter};
use crate::reporting::resume::ResumeIndex;
use crate::scanner::file_scanner::{scan, FileEntry};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to load resume report: {0}")]
    Resume(#[source] ReportError),
    #[error("failed to create report directory {path}: {source}")]
    ReportDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Knobs controlling a single run
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Key report records by root-relative instead of absolute paths
    pub relative: bool,
    /// Lower-cased extensions to skip entirely
    pub ignore: HashSet<String>,
    /// Where `<TypeIdentifier>.json` validator configs live
    pub config_dir: PathBuf,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            relative: false,
            ignore: HashSet::new(),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
        }
    }
}

/// What happened to one scanned file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    SkippedIgnored,
    Resumed(ValidationResult),
    NoValidator,
    /// Another file already produced a record under the same report key
    DuplicateKey,
    Validated(ValidationResult),
    /// The validator raised or panicked; nothing was written
    ValidationFailed,
    /// The validator was abandoned because of an interrupt; nothing was written
    Interrupted,
}

/// Counters for a finished (or interrupted) run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub validated: usize,
    /// Validated files whose status was non-zero
    pub invalid: usize,
    pub resumed: usize,
    pub ignored: usize,
    pub no_validator: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Directory entries that could not be read during traversal
    pub walk_errors: usize,
    pub interrupted: bool,
}

impl ScanSummary {
    fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::SkippedIgnored => self.ignored += 1,
            EntryOutcome::Resumed(_) => self.resumed += 1,
            EntryOutcome::NoValidator => self.no_validator += 1,
            EntryOutcome::DuplicateKey => self.duplicates += 1,
            EntryOutcome::Validated(result) => {
                self.validated += 1;
                if !result.is_valid() {
                    self.invalid += 1;
                }
            }
            EntryOutcome::ValidationFailed => self.failed += 1,
            EntryOutcome::Interrupted => self.interrupted = true,
        }
    }

    /// Number of records written to the report
    pub fn written(&self) -> usize {
        self.validated + self.resumed
    }
}

pub struct Orchestrator<'r, S: PluginSource + ?Sized = PluginRegistry> {
    cache: ValidatorCache<'r, S>,
    resume: ResumeIndex,
    ignore: HashSet<String>,
    /// Keys already present in the report
    written: HashSet<String>,
    recursive: bool,
    relative: bool,
    interrupt: Interrupt,
    progress: ProgressBar,
}

impl<'r, S: PluginSource + ?Sized> Orchestrator<'r, S> {
    pub fn new(
        source: &'r S,
        resume: ResumeIndex,
        options: ScanOptions,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            cache: ValidatorCache::new(source, options.config_dir),
            resume,
            ignore: options.ignore,
            written: HashSet::new(),
            recursive: options.recursive,
            relative: options.relative,
            interrupt,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Scan every root and write the results to `report`
    ///
    /// Only a report write failure aborts the run with an error. The caller
    /// still owns `report` and finishes it (or lets it drop) afterwards.
    pub fn run(
        &mut self,
        roots: &[PathBuf],
        report: &mut ReportWriter,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();

        for entry in scan(roots, self.recursive) {
            if self.interrupt.is_triggered() {
                summary.interrupted = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", e);
                    summary.walk_errors += 1;
                    continue;
                }
            };

            self.progress.set_message(entry.relative_path.display().to_string());
            let outcome = self.process_entry(&entry, report)?;
            summary.record(&outcome);
            self.progress.inc(1);

            if summary.interrupted {
                break;
            }
        }

        if summary.interrupted {
            tracing::warn!("Scan interrupted, {} record(s) written", summary.written());
        }
        Ok(summary)
    }

    /// Handle a single scanned file
    pub fn process_entry(
        &mut self,
        entry: &FileEntry,
        report: &mut ReportWriter,
    ) -> Result<EntryOutcome, ReportError> {
        tracing::debug!("Processing {}", entry.absolute_path.display());
        let ext = entry.extension.as_str();

        if self.ignore.contains(ext) {
            return Ok(EntryOutcome::SkippedIgnored);
        }

        let key = entry.report_key(self.relative);
        if self.written.contains(&key) {
            tracing::warn!(
                "Skipping '{}': report already holds a record for '{}'",
                entry.absolute_path.display(),
                key
            );
            return Ok(EntryOutcome::DuplicateKey);
        }

        if let Some(result) = self.resume.get(&key) {
            tracing::debug!("Copied information for {}", key);
            report.write(&key, result)?;
            self.written.insert(key);
            return Ok(EntryOutcome::Resumed(result.clone()));
        }

        let Some(validator) = self.cache.resolve(ext) else {
            self.ignore.insert(ext.to_string());
            return Ok(EntryOutcome::NoValidator);
        };

        let interrupt = &self.interrupt;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            validator.validate(&entry.absolute_path, ext, interrupt)
        }));

        match outcome {
            Ok(Ok(result)) => {
                report.write(&key, &result)?;
                self.written.insert(key);
                Ok(EntryOutcome::Validated(result))
            }
            Ok(Err(ValidatorError::Interrupted)) => {
                tracing::warn!("Validating '{}' interrupted", entry.absolute_path.display());
                Ok(EntryOutcome::Interrupted)
            }
            Ok(Err(ValidatorError::Failed(e))) => {
                tracing::error!("Validating '{}' failed: {:#}", entry.absolute_path.display(), e);
                Ok(EntryOutcome::ValidationFailed)
            }
            Err(payload) => {
                tracing::error!(
                    "Validating '{}' failed: validator panicked: {}",
                    entry.absolute_path.display(),
                    panic_message(payload.as_ref())
                );
                Ok(EntryOutcome::ValidationFailed)
            }
        }
    }

    pub fn cache(&self) -> &ValidatorCache<'r, S> {
        &self.cache
    }

    /// Extensions currently skipped, user-supplied or learned during the run
    pub fn ignored_extensions(&self) -> &HashSet<String> {
        &self.ignore
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Everything needed for one complete run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub roots: Vec<PathBuf>,
    pub report_dir: PathBuf,
    /// Style sheet referenced from the report for later rendering
    pub stylesheet: String,
    /// Previous report whose results are reused
    pub resume: Option<PathBuf>,
    pub scan: ScanOptions,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub report_path: PathBuf,
    pub summary: ScanSummary,
}

/// Load resume data, open a fresh report and scan every root into it
///
/// A resume file that cannot be loaded stops the run before any report is
/// created.
///
/// # Arguments
/// * `source` - Where validator types are looked up by extension
/// * `config` - Roots, report location and scan options for this run
/// * `interrupt` - Flag checked before each file and while ffmpeg runs
/// * `progress` - Progress display, ticked once per file
///
/// # Returns
/// Path of the finished report and the run's counters
pub fn validate_paths<S: PluginSource + ?Sized>(
    source: &S,
    config: &RunConfig,
    interrupt: Interrupt,
    progress: ProgressBar,
) -> Result<RunReport, ScanError> {
    let resume = match &config.resume {
        Some(path) => ResumeIndex::load(path).map_err(ScanError::Resume)?,
        None => ResumeIndex::empty(),
    };

    fs::create_dir_all(&config.report_dir).map_err(|source| ScanError::ReportDir {
        path: config.report_dir.clone(),
        source,
    })?;

    let mut orchestrator = Orchestrator::new(source, resume, config.scan.clone(), interrupt)
        .with_progress(progress);
    let mut report = ReportWriter::create(&config.report_dir, &config.stylesheet)?;
    let summary = orchestrator.run(&config.roots, &mut report)?;
    let report_path = report.finish()?;

    tracing::info!(
        "Wrote {} record(s) to {}",
        summary.written(),
        report_path.display()
    );
    Ok(RunReport {
        report_path,
        summary,
    })
}
