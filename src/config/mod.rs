//! Configuration management for propctl
//!
//! Runtime settings grouped the way the crate is grouped: the shell
//! bridge, the mount table, and the property editor each get a section.
//! Everything has a sensible default so the tool runs without any
//! configuration file at all.

pub mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for propctl
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell bridge configuration
    pub shell: ShellConfig,

    /// Mount table configuration
    pub mounts: MountsConfig,

    /// Property editor configuration
    pub editor: EditorConfig,
}

/// Shell bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Explicit superuser binary path; the well-known locations are
    /// searched when unset
    pub su_path: Option<PathBuf>,

    /// Privilege probe budget in milliseconds
    pub probe_timeout_ms: u64,

    /// Per-command wait budget in milliseconds
    pub command_timeout_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            su_path: None,
            probe_timeout_ms: 2_000,
            command_timeout_ms: 10_000,
        }
    }
}

impl ShellConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Mount table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountsConfig {
    /// Mount table source file
    pub table_path: PathBuf,
}

impl Default for MountsConfig {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from("/proc/mounts"),
        }
    }
}

/// Property editor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Property file edited when no path is given on the command line
    pub properties_path: PathBuf,

    /// Staging and backup directory; a per-user cache directory is used
    /// when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            properties_path: PathBuf::from("/system/build.prop"),
            work_dir: None,
        }
    }
}

impl EditorConfig {
    /// Resolved staging directory.
    pub fn work_dir(&self) -> PathBuf {
        match &self.work_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("propctl"),
        }
    }
}
