//! Validator plugin contract

use std::path::Path;
use thiserror::Error;

use super::interrupt::Interrupt;

/// Flat key/value configuration handed to a validator constructor
pub type ValidatorConfig = serde_json::Map<String, serde_json::Value>;

/// Outcome of checking a single file
///
/// `code == 0` means the file is well-formed. Any other value marks it as
/// invalid and `message` explains why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub code: i32,
    pub message: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            code: 0,
            message: String::new(),
        }
    }

    pub fn invalid(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.code == 0
    }
}

/// Errors a validator may raise instead of returning a status
///
/// A malformed input file is never an error: it is reported through a
/// non-zero [`ValidationResult`].
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The run was interrupted while the file was being checked
    #[error("validation interrupted")]
    Interrupted,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Errors raised while building a validator from its configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A configured checker for one category of files
pub trait Validator {
    /// Check the file at `path`, whose lower-cased extension is `extension`.
    ///
    /// Long-running implementations should poll `interrupt` and return
    /// [`ValidatorError::Interrupted`] once it is triggered.
    fn validate(
        &self,
        path: &Path,
        extension: &str,
        interrupt: &Interrupt,
    ) -> Result<ValidationResult, ValidatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_result_constructors() {
        let ok = ValidationResult::valid();
        assert!(ok.is_valid());
        assert!(ok.message.is_empty());

        let bad = ValidationResult::invalid(2, "truncated");
        assert!(!bad.is_valid());
        assert_eq!(bad.code, 2);
        assert_eq!(bad.message, "truncated");
    }

    #[test]
    fn test_failed_error_keeps_message() {
        let err: ValidatorError = anyhow::anyhow!("decoder crashed").into();
        assert_eq!(err.to_string(), "decoder crashed");
    }
}
