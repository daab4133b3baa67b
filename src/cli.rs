//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

use crate::export::ExportOptions;
use crate::parsers::HeaderPolicy;
use crate::settings::{Settings, SettingsError};

/// Export EL3500/EL4000 logger files to one CSV and chart the wattage
#[derive(Debug, Parser)]
#[command(name = "el4000log", version)]
#[command(about = "Decode EL3500/EL4000 power-meter .BIN files into a time-sorted CSV")]
pub struct Cli {
    /// Directory holding the logger's .BIN files
    pub source_dir: Option<PathBuf>,

    /// Where to write the CSV (default: <SOURCE_DIR>/el4000_export.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// What to do with a block header that is not a valid date
    #[arg(long, value_name = "abort|skip-file|skip-block")]
    pub header_policy: Option<HeaderPolicy>,

    /// Parse files in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Only export, do not render the chart
    #[arg(long)]
    pub no_plot: bool,

    /// Where to write the chart (default: next to the CSV)
    #[arg(long)]
    pub chart: Option<PathBuf>,

    /// Open the chart in the system image viewer once rendered
    #[arg(long)]
    pub open: bool,

    /// Settings file to use instead of the per-user one; it must exist
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the merged settings to the settings file and exit
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Load the settings file and apply the flags on top.
    ///
    /// An explicit `--config` file that is missing or invalid is an error,
    /// except that `--save-config` may create a new one.
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        let mut settings = match &self.config {
            Some(path) => match Settings::read_from(path) {
                Err(SettingsError::NotFound(_)) if self.save_config => Settings::default(),
                result => result?,
            },
            None => Settings::load(),
        };
        self.apply(&mut settings);
        Ok(settings)
    }

    /// File that `--save-config` writes to
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Settings::get_settings_path)
    }

    /// Override settings with whatever was given on the command line
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.source_dir {
            settings.source_dir = Some(dir.clone());
        }
        if let Some(policy) = self.header_policy {
            settings.header_policy = policy;
        }
        if self.parallel {
            settings.parallel = true;
        }
        if self.no_plot {
            settings.plot = false;
        }
    }

    pub fn export_options(&self, settings: &Settings) -> ExportOptions {
        let mut options = ExportOptions::from_settings(settings, settings.source_dir());
        if let Some(output) = &self.output {
            options.output = output.clone();
        }
        options
    }

    /// Chart path, defaulting to the settings' chart name next to the CSV
    pub fn chart_path(&self, settings: &Settings, csv_path: &std::path::Path) -> PathBuf {
        self.chart.clone().unwrap_or_else(|| {
            csv_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."))
                .join(&settings.chart_file_name)
        })
    }
}
