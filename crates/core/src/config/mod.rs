//! Generator configuration and on-disk output layout.

mod layout;
mod settings;

pub use layout::OutputLayout;
pub use settings::{load_config, GeneratorConfig, DEFAULT_ALLOWED_TAGS};
