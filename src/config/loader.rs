//! Configuration File Loading
//!
//! Finds and parses configuration files from the usual locations, with
//! TOML preferred and JSON accepted.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Config;
use crate::error::{Error, Result};

/// File names probed inside each search directory, in preference order.
const CONFIG_FILE_NAMES: [&str; 2] = ["config.toml", "config.json"];

/// Configuration file loader
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths for configuration files
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader with the default search paths: the per-user config
    /// directory, then the current directory.
    pub fn new() -> Self {
        let mut search_paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            search_paths.push(dir.join("propctl"));
        }
        search_paths.push(PathBuf::from("."));
        Self { search_paths }
    }

    /// The directories probed by [`load`](Self::load).
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Load the first configuration file found in the search paths, or
    /// the defaults when none exists.
    pub fn load(&self) -> Result<Config> {
        for dir in &self.search_paths {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    debug!(path = %candidate.display(), "loading configuration");
                    return Self::load_from(&candidate);
                }
            }
        }
        debug!("no configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Load a specific configuration file, picking the format from its
    /// extension.
    pub fn load_from(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            Some("json") => serde_json::from_str(&text).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            _ => Err(Error::ConfigFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
