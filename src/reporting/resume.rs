//! Loading a previous report to resume a scan
//!
//! The loader accepts exactly the shape [`ReportWriter`] produces and rejects
//! anything else. A half-understood resume file would silently skip files
//! that still need checking.
//!
//! [`ReportWriter`]: super::report_writer::ReportWriter

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::escape;
use super::report_writer::{
    ReportError, CODE_TAG, MESSAGE_TAG, PATH_TAG, RECORD_TAG, ROOT_TAG,
};
use crate::core::validator::ValidationResult;

/// One `(path, code, message)` entry of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub path: String,
    pub result: ValidationResult,
}

/// Results from a previous run, keyed by report path
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResumeIndex {
    entries: HashMap<String, ValidationResult>,
}

impl ResumeIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every record of the report at `path`
    ///
    /// Fails if the report is not well-formed or lists the same path twice.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let mut entries = HashMap::new();
        for record in read_records(path)? {
            match entries.entry(record.path) {
                Entry::Occupied(occupied) => {
                    return Err(ReportError::Malformed {
                        path: path.to_path_buf(),
                        reason: format!("duplicate record for '{}'", occupied.key()),
                    });
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(record.result);
                }
            }
        }

        tracing::info!("Loaded {} record(s) to resume from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&ValidationResult> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValidationResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<ReportRecord> for ResumeIndex {
    fn from_iter<I: IntoIterator<Item = ReportRecord>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|r| (r.path, r.result)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Path,
    Code,
    Message,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            t if t == PATH_TAG.as_bytes() => Some(Self::Path),
            t if t == CODE_TAG.as_bytes() => Some(Self::Code),
            t if t == MESSAGE_TAG.as_bytes() => Some(Self::Message),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PartialRecord {
    path: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// Where the parser currently is inside the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeRoot,
    InRoot,
    InRecord,
    InField(Field),
    AfterRoot,
}

struct RecordParser {
    source: PathBuf,
    state: State,
    current: PartialRecord,
    text: String,
    records: Vec<ReportRecord>,
}

impl RecordParser {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            state: State::BeforeRoot,
            current: PartialRecord::default(),
            text: String::new(),
            records: Vec::new(),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ReportError {
        ReportError::Malformed {
            path: self.source.clone(),
            reason: reason.into(),
        }
    }

    fn start(&mut self, tag: &[u8]) -> Result<(), ReportError> {
        self.state = match (self.state, tag) {
            (State::BeforeRoot, t) if t == ROOT_TAG.as_bytes() => State::InRoot,
            (State::InRoot, t) if t == RECORD_TAG.as_bytes() => {
                self.current = PartialRecord::default();
                State::InRecord
            }
            (State::InRecord, t) => match Field::from_tag(t) {
                Some(field) => {
                    self.text.clear();
                    State::InField(field)
                }
                None => return Err(self.unexpected(t)),
            },
            (_, t) => return Err(self.unexpected(t)),
        };
        Ok(())
    }

    fn end(&mut self, tag: &[u8]) -> Result<(), ReportError> {
        self.state = match self.state {
            State::InField(field) => {
                let value = escape::decode(&self.text).into_owned();
                self.text.clear();
                let slot = match field {
                    Field::Path => &mut self.current.path,
                    Field::Code => &mut self.current.code,
                    Field::Message => &mut self.current.message,
                };
                if slot.replace(value).is_some() {
                    return Err(self.malformed(format!(
                        "repeated <{}> in record",
                        String::from_utf8_lossy(tag)
                    )));
                }
                State::InRecord
            }
            State::InRecord => {
                let record = self.finish_record()?;
                self.records.push(record);
                State::InRoot
            }
            State::InRoot => State::AfterRoot,
            State::BeforeRoot | State::AfterRoot => return Err(self.unexpected(tag)),
        };
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ReportError> {
        match self.state {
            State::InField(_) => {
                self.text.push_str(text);
                Ok(())
            }
            _ if text.trim().is_empty() => Ok(()),
            _ => Err(self.malformed(format!("unexpected text '{}'", text.trim()))),
        }
    }

    fn finish_record(&mut self) -> Result<ReportRecord, ReportError> {
        let record = std::mem::take(&mut self.current);
        let path = record
            .path
            .ok_or_else(|| self.malformed("record without <path>"))?;
        let code = record
            .code
            .ok_or_else(|| self.malformed(format!("record '{}' without <code>", path)))?;
        let code: i32 = code.trim().parse().map_err(|_| {
            self.malformed(format!("record '{}' has non-integer code '{}'", path, code))
        })?;
        let message = record.message.unwrap_or_default();

        Ok(ReportRecord {
            path,
            result: ValidationResult { code, message },
        })
    }

    fn unexpected(&self, tag: &[u8]) -> ReportError {
        self.malformed(format!(
            "unexpected element <{}>",
            String::from_utf8_lossy(tag)
        ))
    }
}

/// Parse every record of a report in document order
pub fn read_records(path: &Path) -> Result<Vec<ReportRecord>, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    let mut parser = RecordParser::new(path);
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            parser.malformed(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;
        match event {
            Event::Start(e) => parser.start(e.name().as_ref())?,
            Event::End(e) => parser.end(e.name().as_ref())?,
            Event::Empty(e) => {
                let name = e.name();
                parser.start(name.as_ref())?;
                parser.end(name.as_ref())?;
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| parser.malformed(err.to_string()))?;
                parser.text(&text)?;
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|err| parser.malformed(err.to_string()))?
                    .to_string();
                parser.text(&text)?;
            }
            Event::Eof => break,
            // Declaration, style-sheet instruction, comments, doctype
            _ => {}
        }
        buf.clear();
    }

    if parser.state != State::AfterRoot {
        return Err(parser.malformed("unexpected end of document"));
    }
    Ok(parser.records)
}
