//! HTML well-formedness check

use scraper::Html;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core::config::from_config;
use crate::core::interrupt::Interrupt;
use crate::core::registry::ValidatorDescriptor;
use crate::core::validator::{
    ConfigError, ValidationResult, Validator, ValidatorConfig, ValidatorError,
};

pub const TYPE_ID: &str = "HTML";
pub const EXTENSIONS: &[&str] = &["htm", "html"];

/// Parse errors quoted in a strict-mode failure message
const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HtmlConfig {
    strict: bool,
}

/// Parses documents with html5ever
///
/// The parser recovers from almost anything, so by default only unreadable
/// or empty documents fail. With `strict` every recovered parse error fails
/// the file.
#[derive(Debug, Default)]
pub struct HtmlValidator {
    strict: bool,
}

impl HtmlValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Box<dyn Validator>, ConfigError> {
        let config: HtmlConfig = from_config(config)?;
        Ok(Box::new(Self::new(config.strict)))
    }

    pub fn descriptor() -> ValidatorDescriptor {
        ValidatorDescriptor::new(TYPE_ID, EXTENSIONS, Self::from_config)
    }

    fn check(&self, data: &[u8]) -> ValidationResult {
        if data.iter().all(u8::is_ascii_whitespace) {
            return ValidationResult::invalid(1, "ParserError: Document is empty");
        }

        let document = Html::parse_document(&String::from_utf8_lossy(data));
        if self.strict && !document.errors.is_empty() {
            let shown: Vec<&str> = document
                .errors
                .iter()
                .take(MAX_REPORTED_ERRORS)
                .map(|e| e.as_ref())
                .collect();
            let mut message = format!("ParserError: {}", shown.join("; "));
            if document.errors.len() > MAX_REPORTED_ERRORS {
                message.push_str(&format!(
                    " (and {} more)",
                    document.errors.len() - MAX_REPORTED_ERRORS
                ));
            }
            return ValidationResult::invalid(1, message);
        }

        ValidationResult::valid()
    }
}

impl Validator for HtmlValidator {
    fn validate(
        &self,
        path: &Path,
        _extension: &str,
        _interrupt: &Interrupt,
    ) -> Result<ValidationResult, ValidatorError> {
        match fs::read(path) {
            Ok(data) => Ok(self.check(&data)),
            Err(e) => Ok(ValidationResult::invalid(1, format!("IOError: {}", e))),
        }
    }
}
