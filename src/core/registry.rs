//! Plugin registry mapping file extensions to validator types
//!
//! The registry is filled once at startup by an explicit registration phase
//! and only read afterwards: the scan borrows it immutably for its whole run.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

use super::validator::{ConfigError, Validator, ValidatorConfig};

/// Builds a validator instance from its type's configuration
pub type ValidatorFactory = fn(&ValidatorConfig) -> Result<Box<dyn Validator>, ConfigError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("extension '{extension}' is claimed by both '{existing}' and '{incoming}'")]
    DuplicateExtension {
        extension: String,
        existing: String,
        incoming: String,
    },
    #[error("validator type '{0}' is already registered")]
    DuplicateType(String),
    #[error("validator type '{0}' claims no extensions")]
    NoExtensions(String),
}

/// A validator type together with the extensions it handles
#[derive(Clone)]
pub struct ValidatorDescriptor {
    type_identifier: String,
    extensions: BTreeSet<String>,
    factory: ValidatorFactory,
}

impl ValidatorDescriptor {
    pub fn new<I, E>(
        type_identifier: impl Into<String>,
        extensions: I,
        factory: ValidatorFactory,
    ) -> Self
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        Self {
            type_identifier: type_identifier.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
            factory,
        }
    }

    /// Name used in log lines and to locate the type's config file
    pub fn type_identifier(&self) -> &str {
        &self.type_identifier
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    pub fn claims(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    pub fn instantiate(&self, config: &ValidatorConfig) -> Result<Box<dyn Validator>, ConfigError> {
        (self.factory)(config)
    }
}

impl fmt::Debug for ValidatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorDescriptor")
            .field("type_identifier", &self.type_identifier)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Extension lookup used by the validator cache
pub trait PluginSource {
    fn lookup(&self, extension: &str) -> Option<&ValidatorDescriptor>;
}

/// Process-wide table of validator types
///
/// Every extension belongs to at most one descriptor: a registration that
/// claims an extension already taken is rejected.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    descriptors: Vec<ValidatorDescriptor>,
    by_extension: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ValidatorDescriptor) -> Result<(), RegistryError> {
        if self
            .descriptors
            .iter()
            .any(|d| d.type_identifier == descriptor.type_identifier)
        {
            return Err(RegistryError::DuplicateType(descriptor.type_identifier));
        }
        if descriptor.extensions.is_empty() {
            return Err(RegistryError::NoExtensions(descriptor.type_identifier));
        }
        if let Some((extension, &index)) = descriptor
            .extensions
            .iter()
            .find_map(|ext| self.by_extension.get_key_value(ext))
        {
            return Err(RegistryError::DuplicateExtension {
                extension: extension.clone(),
                existing: self.descriptors[index].type_identifier.clone(),
                incoming: descriptor.type_identifier,
            });
        }

        let index = self.descriptors.len();
        for ext in &descriptor.extensions {
            self.by_extension.insert(ext.clone(), index);
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Registered descriptors in registration order
    pub fn descriptors(&self) -> &[ValidatorDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Log one line per loaded plugin
    pub fn log_loaded(&self) {
        for descriptor in &self.descriptors {
            let extensions: Vec<&str> = descriptor.extensions.iter().map(String::as_str).collect();
            tracing::info!(
                "Loaded Filetype plugin {} for: {}",
                descriptor.type_identifier,
                extensions.join(", ")
            );
        }
    }
}

impl PluginSource for PluginRegistry {
    fn lookup(&self, extension: &str) -> Option<&ValidatorDescriptor> {
        self.by_extension
            .get(extension)
            .map(|&index| &self.descriptors[index])
    }
}

/// Lower-case an extension and strip any leading dots
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interrupt::Interrupt;
    use crate::core::validator::{ValidationResult, ValidatorError};
    use std::path::Path;

    struct AlwaysValid;

    impl Validator for AlwaysValid {
        fn validate(
            &self,
            _: &Path,
            _: &str,
            _: &Interrupt,
        ) -> Result<ValidationResult, ValidatorError> {
            Ok(ValidationResult::valid())
        }
    }

    fn build(_: &ValidatorConfig) -> Result<Box<dyn Validator>, ConfigError> {
        Ok(Box::new(AlwaysValid))
    }

    #[test]
    fn test_descriptor_normalizes_extensions() {
        let descriptor = ValidatorDescriptor::new("Text", [".TXT", "md", ""], build);
        let extensions: Vec<&str> = descriptor.extensions().iter().map(String::as_str).collect();
        assert_eq!(extensions, ["md", "txt"]);
        assert!(descriptor.claims("txt"));
        assert!(!descriptor.claims("TXT"));
    }

    #[test]
    fn test_lookup_by_extension() {
        let mut registry = PluginRegistry::new();
        registry
            .register(ValidatorDescriptor::new("Text", ["txt", "md"], build))
            .unwrap();
        registry
            .register(ValidatorDescriptor::new("Data", ["csv"], build))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("md").unwrap().type_identifier(), "Text");
        assert_eq!(registry.lookup("csv").unwrap().type_identifier(), "Data");
        assert!(registry.lookup("pdf").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn test_conflicting_extension_is_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register(ValidatorDescriptor::new("Text", ["txt"], build))
            .unwrap();

        let err = registry
            .register(ValidatorDescriptor::new("Notes", ["note", "txt"], build))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateExtension {
                extension: "txt".into(),
                existing: "Text".into(),
                incoming: "Notes".into(),
            }
        );
        // Rejected registration leaves no partial claims behind
        assert!(registry.lookup("note").is_none());
        assert_eq!(registry.lookup("txt").unwrap().type_identifier(), "Text");
    }

    #[test]
    fn test_duplicate_type_is_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register(ValidatorDescriptor::new("Text", ["txt"], build))
            .unwrap();
        let err = registry
            .register(ValidatorDescriptor::new("Text", ["md"], build))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType("Text".into()));
    }

    #[test]
    fn test_empty_extension_set_is_rejected() {
        let mut registry = PluginRegistry::new();
        let err = registry
            .register(ValidatorDescriptor::new("Nothing", [""], build))
            .unwrap_err();
        assert_eq!(err, RegistryError::NoExtensions("Nothing".into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".WAV"), "wav");
        assert_eq!(normalize_extension("Mp4"), "mp4");
        assert_eq!(normalize_extension(" html "), "html");
    }
}
