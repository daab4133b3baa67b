//! User settings persistence.
//!
//! This module handles loading and saving the exporter configuration. Command
//! line flags are layered on top of these values by [`crate::cli::Cli`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parsers::HeaderPolicy;

/// Name of the consolidated CSV written into the source directory
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "el4000_export.csv";

/// Name of the chart rendered next to the CSV
pub const DEFAULT_CHART_FILE_NAME: &str = "el4000_watts.png";

/// Device configuration file the logger stores alongside its data files
pub const DEFAULT_SETTINGS_FILE_NAME: &str = "setupel3.bin";

/// Errors that can occur while reading or writing a settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read settings file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid settings file {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write settings file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Exporter settings that persist across runs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the logger's .BIN files
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,
    #[serde(default = "default_chart_file_name")]
    pub chart_file_name: String,
    /// Device settings file skipped during export (matched case-insensitively)
    #[serde(default = "default_settings_file_name")]
    pub settings_file_name: String,
    #[serde(default)]
    pub header_policy: HeaderPolicy,
    /// Parse files on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
    /// Render the watt chart after exporting
    #[serde(default = "default_plot")]
    pub plot: bool,
}

fn default_output_file_name() -> String {
    DEFAULT_OUTPUT_FILE_NAME.to_string()
}

fn default_chart_file_name() -> String {
    DEFAULT_CHART_FILE_NAME.to_string()
}

fn default_settings_file_name() -> String {
    DEFAULT_SETTINGS_FILE_NAME.to_string()
}

fn default_plot() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_dir: None,
            output_file_name: default_output_file_name(),
            chart_file_name: default_chart_file_name(),
            settings_file_name: default_settings_file_name(),
            header_policy: HeaderPolicy::default(),
            parallel: false,
            plot: default_plot(),
        }
    }
}

impl Settings {
    /// Get the config directory path for el4000log
    pub fn get_config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir().map(|p| p.join("el4000log"))
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir().map(|p| p.join("el4000log"))
        }
    }

    /// Get the path to the settings JSON file
    pub fn get_settings_path() -> Option<PathBuf> {
        Self::get_config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the per-user location.
    ///
    /// A missing file yields defaults. An unreadable or invalid one is logged
    /// and also yields defaults.
    pub fn load() -> Self {
        let Some(path) = Self::get_settings_path() else {
            return Self::default();
        };
        match Self::read_from(&path) {
            Ok(settings) => settings,
            Err(SettingsError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring settings: {}", e);
                Self::default()
            }
        }
    }

    /// Read settings from an explicitly chosen file
    pub fn read_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SettingsError::NotFound(path.to_path_buf())
            } else {
                SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|source| SettingsError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings as pretty JSON, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_error = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        fs::write(path, content).map_err(write_error)
    }

    /// Directory to export from, defaulting to the working directory
    pub fn source_dir(&self) -> PathBuf {
        self.source_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
