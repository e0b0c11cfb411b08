//! Engine configuration persisted as `engine.toml` in the user config dir.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::model::project::ConfigurationPath;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Directories searched for plugins and their dependencies.
    pub plugin_search_paths: Vec<PathBuf>,
    pub default_configuration: ConfigurationPath,
    pub parallel_tasks: bool,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugin_search_paths: Vec::new(),
            default_configuration: ConfigurationPath::root(),
            parallel_tasks: false,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load_from(path: &Path) -> Result<Self, BuildError> {
        let toml_str = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_str)?)
    }
}

fn get_config_path() -> Option<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "content-pipeline", "content_pipeline") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            if let Err(e) = fs::create_dir_all(config_dir) {
                error!("Failed to create config directory: {}", e);
                return None;
            }
        }
        return Some(config_dir.join("engine.toml"));
    }
    None
}

pub fn save_config(config: &EngineConfig) {
    if let Some(path) = get_config_path() {
        match toml::to_string_pretty(config) {
            Ok(toml_str) => {
                if let Err(e) = fs::write(&path, toml_str) {
                    error!("Failed to write config file: {}", e);
                } else {
                    info!("Engine config saved to {}", path.display());
                }
            }
            Err(e) => {
                error!("Failed to serialize config: {}", e);
            }
        }
    }
}

/// Load the user's engine config; any problem falls back to defaults.
pub fn load_config() -> EngineConfig {
    if let Some(path) = get_config_path() {
        if path.exists() {
            match EngineConfig::load_from(&path) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("Failed to load {}, using defaults: {}", path.display(), e);
                }
            }
        }
    }
    EngineConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(
            &path,
            "plugin_search_paths = [\"/opt/plugins\"]\ndefault_configuration = \"Root.Release\"\n",
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.plugin_search_paths, vec![PathBuf::from("/opt/plugins")]);
        assert_eq!(config.default_configuration.to_string(), "Root.Release");
        assert!(!config.parallel_tasks);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_configuration_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "default_configuration = \"Root..Debug\"\n").unwrap();
        assert!(matches!(EngineConfig::load_from(&path), Err(BuildError::Toml(_))));
    }
}
