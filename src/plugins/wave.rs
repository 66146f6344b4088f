//! WAV decoding check

use hound::{SampleFormat, WavReader};
use std::path::Path;

use crate::core::interrupt::Interrupt;
use crate::core::registry::ValidatorDescriptor;
use crate::core::validator::{
    ConfigError, ValidationResult, Validator, ValidatorConfig, ValidatorError,
};

pub const TYPE_ID: &str = "WAVE";
pub const EXTENSIONS: &[&str] = &["wav"];

/// Decodes every sample of a RIFF/WAVE file
#[derive(Debug, Default)]
pub struct WaveValidator;

impl WaveValidator {
    pub fn from_config(_config: &ValidatorConfig) -> Result<Box<dyn Validator>, ConfigError> {
        Ok(Box::new(Self))
    }

    pub fn descriptor() -> ValidatorDescriptor {
        ValidatorDescriptor::new(TYPE_ID, EXTENSIONS, Self::from_config)
    }
}

/// Read the whole file, returning the number of samples decoded
fn decode_all(path: &Path) -> Result<u64, hound::Error> {
    let mut reader = WavReader::open(path)?;
    let mut decoded = 0u64;

    match reader.spec().sample_format {
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                sample?;
                decoded += 1;
            }
        }
        SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                sample?;
                decoded += 1;
            }
        }
    }

    Ok(decoded)
}

impl Validator for WaveValidator {
    fn validate(
        &self,
        path: &Path,
        _extension: &str,
        _interrupt: &Interrupt,
    ) -> Result<ValidationResult, ValidatorError> {
        match decode_all(path) {
            Ok(samples) => {
                tracing::trace!("Decoded {} samples from {}", samples, path.display());
                Ok(ValidationResult::valid())
            }
            Err(e) => Ok(ValidationResult::invalid(1, e.to_string())),
        }
    }
}
