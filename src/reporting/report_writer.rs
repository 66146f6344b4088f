//! Streaming XML report output
//!
//! A report looks like:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <?xml-stylesheet type="text/xsl" href="report.xsl"?>
//! <report>
//!   <file><path>a.htm</path><code>0</code><message></message></file>
//! </report>
//! ```
//!
//! Records are flushed as they are written and the closing tag is emitted
//! when the writer is finished or dropped, so an aborted scan still leaves
//! a well-formed document behind.

use chrono::Local;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::escape;
use crate::core::validator::ValidationResult;

pub(crate) const ROOT_TAG: &str = "report";
pub(crate) const RECORD_TAG: &str = "file";
pub(crate) const PATH_TAG: &str = "path";
pub(crate) const CODE_TAG: &str = "code";
pub(crate) const MESSAGE_TAG: &str = "message";

/// Attempts at finding a free report filename before giving up
const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open report {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("report I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed report {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("report already finished")]
    Finished,
}

/// Append-only sink for validation records
pub struct ReportWriter {
    path: PathBuf,
    writer: Option<Writer<BufWriter<File>>>,
    records: usize,
}

impl ReportWriter {
    /// Open a new timestamped report in `report_dir`
    ///
    /// # Arguments
    /// * `report_dir` - Existing directory the report is created in
    /// * `stylesheet` - XSL reference written into the document prologue
    ///
    /// # Returns
    /// A writer positioned inside the root element, ready for records
    pub fn create(report_dir: &Path, stylesheet: &str) -> Result<Self, ReportError> {
        let stamp = Local::now().format("%Y-%m-%d_%H.%M.%S%.6f").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("report_{}.xml", stamp)
            } else {
                format!("report_{}_{}.xml", stamp, attempt)
            };
            let path = report_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Self::start(path, file, stylesheet),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(ReportError::Create { path, source }),
            }
        }

        Err(ReportError::Create {
            path: report_dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "no free report filename for this timestamp",
            ),
        })
    }

    /// Open a new report at an explicit path, which must not exist yet
    pub fn create_at(path: &Path, stylesheet: &str) -> Result<Self, ReportError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| ReportError::Create {
                path: path.to_path_buf(),
                source,
            })?;
        Self::start(path.to_path_buf(), file, stylesheet)
    }

    fn start(path: PathBuf, file: File, stylesheet: &str) -> Result<Self, ReportError> {
        let mut writer = Writer::new(BufWriter::new(file));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        writer.write_event(Event::PI(BytesPI::new(format!(
            "xml-stylesheet type=\"text/xsl\" href=\"{}\"",
            quick_xml::escape::escape(stylesheet)
        ))))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT_TAG)))?;
        writer.get_mut().flush()?;

        tracing::debug!("Writing report to {}", path.display());
        Ok(Self {
            path,
            writer: Some(writer),
            records: 0,
        })
    }

    /// Append one record and flush it to disk
    pub fn write(&mut self, key: &str, result: &ValidationResult) -> Result<(), ReportError> {
        let writer = self.writer.as_mut().ok_or(ReportError::Finished)?;

        writer.write_event(Event::Text(BytesText::new("\n  ")))?;
        writer.write_event(Event::Start(BytesStart::new(RECORD_TAG)))?;
        write_field(writer, PATH_TAG, key)?;
        write_field(writer, CODE_TAG, &result.code.to_string())?;
        write_field(writer, MESSAGE_TAG, &result.message)?;
        writer.write_event(Event::End(BytesEnd::new(RECORD_TAG)))?;
        writer.get_mut().flush()?;

        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Close the document and return where it was written
    pub fn finish(mut self) -> Result<PathBuf, ReportError> {
        self.finalize()?;
        Ok(self.path.clone())
    }

    fn finalize(&mut self) -> Result<(), ReportError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;

        let mut inner = writer.into_inner();
        inner.flush()?;
        inner.get_ref().sync_all()?;
        Ok(())
    }
}

impl Drop for ReportWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.finalize() {
                tracing::warn!("Failed to finalize report {}: {}", self.path.display(), e);
            }
        }
    }
}

fn write_field<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &str,
) -> Result<(), ReportError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(&escape::encode(value))))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_report() {
        let temp_dir = TempDir::new().unwrap();
        let mut report = ReportWriter::create(temp_dir.path(), "report.xsl").unwrap();

        report.write("a.htm", &ValidationResult::valid()).unwrap();
        report
            .write("b.html", &ValidationResult::invalid(1, "ParserError: Document is empty"))
            .unwrap();
        assert_eq!(report.records(), 2);
        let path = report.finish().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(content.contains("<?xml-stylesheet type=\"text/xsl\" href=\"report.xsl\"?>"));
        assert!(content
            .contains("<file><path>a.htm</path><code>0</code><message></message></file>"));
        assert!(content
            .contains("<code>1</code><message>ParserError: Document is empty</message>"));
        assert!(content.trim_end().ends_with("</report>"));
    }

    #[test]
    fn test_report_name_is_timestamped() {
        let temp_dir = TempDir::new().unwrap();
        let path = ReportWriter::create(temp_dir.path(), "report.xsl")
            .unwrap()
            .finish()
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(".xml"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_reports_in_same_dir_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let first = ReportWriter::create(temp_dir.path(), "report.xsl").unwrap();
        let second = ReportWriter::create(temp_dir.path(), "report.xsl").unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_markup_is_escaped() {
        let temp_dir = TempDir::new().unwrap();
        let mut report = ReportWriter::create(temp_dir.path(), "a\"b<c>.xsl").unwrap();
        report
            .write(
                "</path><code>0</code>&.htm",
                &ValidationResult::invalid(1, "<script>x</script>"),
            )
            .unwrap();
        let path = report.finish().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("<script>"));
        assert!(content.contains("&lt;script&gt;"));
        assert!(content.contains("&lt;/path&gt;&lt;code&gt;0&lt;/code&gt;&amp;.htm"));
        assert!(content.contains("href=\"a&quot;b&lt;c&gt;.xsl\""));
    }

    #[test]
    fn test_control_characters_stay_well_formed() {
        let temp_dir = TempDir::new().unwrap();
        let mut report = ReportWriter::create(temp_dir.path(), "report.xsl").unwrap();
        report
            .write(
                "weird\u{1}name.html",
                &ValidationResult::invalid(1, "bad\u{0}\u{1b}[31m\r\n"),
            )
            .unwrap();
        let path = report.finish().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content
            .chars()
            .all(|c| c == '\n' || c == '\t' || !c.is_control()));
        assert!(content.contains("<path>weird\\u{1}name.html</path>"));
        assert!(content.contains("<message>bad\\u{0}\\u{1b}[31m\\u{d}\n</message>"));
    }

    #[test]
    fn test_drop_finalizes_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = {
            let mut report = ReportWriter::create(temp_dir.path(), "report.xsl").unwrap();
            report.write("a.wav", &ValidationResult::valid()).unwrap();
            report.path().to_path_buf()
        };

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.trim_end().ends_with("</report>"));
        assert_eq!(content.matches("</report>").count(), 1);
    }

    #[test]
    fn test_records_are_flushed_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let mut report = ReportWriter::create(temp_dir.path(), "report.xsl").unwrap();
        report.write("a.wav", &ValidationResult::valid()).unwrap();

        let content = fs::read_to_string(report.path()).unwrap();
        assert!(content.contains("<path>a.wav</path>"));
        assert!(!content.contains("</report>"));
    }

    #[test]
    fn test_create_at_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("existing.xml");
        fs::write(&path, "keep me").unwrap();

        let err = ReportWriter::create_at(&path, "report.xsl").err().unwrap();
        assert!(matches!(err, ReportError::Create { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }
}
