//! Report output and resume input

pub mod escape;
pub mod report_writer;
pub mod resume;

pub use report_writer::{ReportError, ReportWriter};
pub use resume::{read_records, ReportRecord, ResumeIndex};
