//! Lazily built, per-run validator instances keyed by extension

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::config::load_validator_config;
use super::registry::{PluginRegistry, PluginSource};
use super::validator::Validator;

/// Memoizes validator construction for one run
///
/// An extension lives in at most one of two places: the map of working
/// validators or the set of extensions known to be unsupported. Neither a
/// missing plugin nor a failed construction is ever retried.
pub struct ValidatorCache<'r, S: PluginSource + ?Sized = PluginRegistry> {
    source: &'r S,
    config_dir: PathBuf,
    validators: HashMap<String, Box<dyn Validator>>,
    unsupported: HashSet<String>,
}

impl<'r, S: PluginSource + ?Sized> ValidatorCache<'r, S> {
    pub fn new(source: &'r S, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            config_dir: config_dir.into(),
            validators: HashMap::new(),
            unsupported: HashSet::new(),
        }
    }

    /// Return the validator for `extension`, building it on first use
    pub fn resolve(&mut self, extension: &str) -> Option<&dyn Validator> {
        if self.validators.contains_key(extension) {
            return self.validators.get(extension).map(|v| &**v);
        }
        if self.unsupported.contains(extension) {
            return None;
        }

        let source = self.source;
        let Some(descriptor) = source.lookup(extension) else {
            tracing::info!("No validator found for file extension '{}'", extension);
            self.unsupported.insert(extension.to_string());
            return None;
        };

        let config = load_validator_config(&self.config_dir, descriptor.type_identifier());
        match descriptor.instantiate(&config) {
            Ok(validator) => {
                tracing::debug!(
                    "Created '{}' validator for extension '{}'",
                    descriptor.type_identifier(),
                    extension
                );
                Some(&**self.validators.entry(extension.to_string()).or_insert(validator))
            }
            Err(e) => {
                tracing::error!("Cannot use '{}': {}", descriptor.type_identifier(), e);
                self.unsupported.insert(extension.to_string());
                None
            }
        }
    }

    pub fn is_cached(&self, extension: &str) -> bool {
        self.validators.contains_key(extension)
    }

    pub fn is_unsupported(&self, extension: &str) -> bool {
        self.unsupported.contains(extension)
    }

    /// Extensions with a working validator
    pub fn cached_extensions(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}
