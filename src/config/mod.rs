// Configuration management module
// TOML settings, environment secrets and the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, OpenAiConfig, PineconeConfig, ServerConfig, SessionConfig,
};

use std::path::{Path, PathBuf};

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn resolve_config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Config::default_dir(),
    }
}

/// Load the configuration from `config_dir` and apply environment overrides
#[inline]
pub fn load_effective(config_dir: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(config_dir)?;
    config.apply_env_overrides()?;
    Ok(config)
}
