//! File Validator Library
//!
//! Walks directory trees, hands every file to the validator registered for
//! its extension and streams the results into a resumable XML report.

pub mod core;
pub mod logging;
pub mod plugins;
pub mod reporting;
pub mod scanner;

pub use crate::core::orchestrator;
pub use crate::reporting::report_writer;
pub use crate::scanner::file_scanner;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::core::{
        validate_paths, EntryOutcome, Interrupt, Orchestrator, PluginRegistry, PluginSource,
        RunConfig, RunReport, ScanError, ScanOptions, ScanSummary, ValidationResult, Validator,
        ValidatorCache, ValidatorConfig, ValidatorDescriptor, ValidatorError,
    };
    pub use crate::plugins::register_builtin;
    pub use crate::reporting::{read_records, ReportRecord, ReportWriter, ResumeIndex};
    pub use crate::scanner::{scan, FileEntry};
}
