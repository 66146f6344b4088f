//! Built-in validator plugins

pub mod html;
pub mod video;
pub mod wave;

pub use html::HtmlValidator;
pub use video::VideoValidator;
pub use wave::WaveValidator;

use crate::core::registry::{PluginRegistry, RegistryError};

/// Register every built-in validator type, in a fixed order
pub fn register_builtin(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register(HtmlValidator::descriptor())?;
    registry.register(WaveValidator::descriptor())?;
    registry.register(VideoValidator::descriptor())?;
    Ok(())
}
