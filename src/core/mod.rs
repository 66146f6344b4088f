//! Validation orchestration: plugin contract, registry, validator cache and the scan loop

pub mod cache;
pub mod config;
pub mod interrupt;
pub mod orchestrator;
pub mod registry;
pub mod validator;

pub use cache::ValidatorCache;
pub use interrupt::Interrupt;
pub use orchestrator::{
    validate_paths, EntryOutcome, Orchestrator, RunConfig, RunReport, ScanError, ScanOptions,
    ScanSummary,
};
pub use registry::{PluginRegistry, PluginSource, RegistryError, ValidatorDescriptor};
pub use validator::{ConfigError, ValidationResult, Validator, ValidatorConfig, ValidatorError};
