//! TOML configuration stored under the application base directory

pub mod interactive;
pub mod settings;

use std::path::PathBuf;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, IndexConfig, LlmConfig, OllamaConfig, RetrievalConfig};

/// Name of the base directory created in the user's home
pub const BASE_DIR_NAME: &str = ".rag-core";

/// Default base directory, `~/.rag-core`
#[inline]
pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(BASE_DIR_NAME))
        .ok_or(ConfigError::DirectoryError)
}
