//! Collects rows from every logger file in a directory and writes them as one
//! time-sorted CSV table.

use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parsers::{El4000, HeaderPolicy, Log, ParseError, Row};
use crate::settings::Settings;

/// Column names of the exported table, in order
pub const CSV_HEADER: [&str; 6] = [
    "datetime",
    "voltage_V",
    "current_A",
    "power_factor_%",
    "watt_W",
    "va_VA",
];

/// Timestamp layout used in the datetime column
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while exporting a directory
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to list the source directory
    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    /// Failed to read a data file
    #[error("Failed to read {}: {source}", path.display())]
    ReadFile { path: PathBuf, source: io::Error },

    /// A data file contained a header that could not be decoded
    #[error("Failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },

    /// Failed to write the CSV table
    #[error("Failed to write {}: {source}", path.display())]
    WriteOutput { path: PathBuf, source: io::Error },
}

// ============================================================================
// Options and Summary
// ============================================================================

/// Everything the exporter needs to know about one run
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub source_dir: PathBuf,
    pub output: PathBuf,
    /// Device settings file to leave out, matched case-insensitively
    pub settings_file_name: String,
    pub header_policy: HeaderPolicy,
    pub parallel: bool,
}

impl ExportOptions {
    /// Options for exporting `source_dir`, writing the CSV inside it
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self::from_settings(&Settings::default(), source_dir)
    }

    pub fn from_settings(settings: &Settings, source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            output: source_dir.join(&settings.output_file_name),
            source_dir,
            settings_file_name: settings.settings_file_name.clone(),
            header_policy: settings.header_policy,
            parallel: settings.parallel,
        }
    }
}

/// Outcome of a successful export
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub files_read: usize,
    /// Files dropped under [`HeaderPolicy::SkipFile`]
    pub files_skipped: usize,
    pub rows_written: usize,
}

// ============================================================================
// File Selection
// ============================================================================

/// Check whether a path names a logger data file.
///
/// Any `.bin` file qualifies except the device settings file.
pub fn is_data_file(path: &Path, settings_file_name: &str) -> bool {
    let is_bin = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("bin"));
    let is_settings = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(settings_file_name));
    is_bin && !is_settings
}

/// List the data files directly inside `dir`, sorted by path
pub fn discover_files(dir: &Path, settings_file_name: &str) -> Result<Vec<PathBuf>, ExportError> {
    let read_dir_error = |source| ExportError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if !path.is_file() {
            continue;
        }
        if is_data_file(&path, settings_file_name) {
            files.push(path);
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bin")) {
            tracing::debug!("Skipping settings file {}", path.display());
        }
    }
    files.sort();

    Ok(files)
}

// ============================================================================
// Collection
// ============================================================================

/// Read and decode one logger file
pub fn parse_file(path: &Path, policy: HeaderPolicy) -> Result<Log, ExportError> {
    tracing::info!("Reading {}", path.display());
    let data = fs::read(path).map_err(|source| ExportError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    El4000::new(policy)
        .parse_binary(&data)
        .map_err(|source| ExportError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Rows gathered from a set of files, not yet sorted
#[derive(Clone, Debug, Default)]
pub struct Collected {
    pub rows: Vec<Row>,
    pub files_read: usize,
    pub files_skipped: usize,
}

/// Decode every file and gather the rows in file order.
///
/// Read errors always fail the collection. Parse errors fail it too unless the
/// policy is [`HeaderPolicy::SkipFile`], in which case the file is left out.
pub fn collect_rows(
    files: &[PathBuf],
    policy: HeaderPolicy,
    parallel: bool,
) -> Result<Collected, ExportError> {
    let results: Vec<Result<Log, ExportError>> = if parallel {
        files.par_iter().map(|path| parse_file(path, policy)).collect()
    } else {
        files.iter().map(|path| parse_file(path, policy)).collect()
    };

    let mut collected = Collected::default();
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(log) => {
                if log.meta.skipped_headers > 0 {
                    tracing::warn!(
                        "Skipped {} malformed block headers in {}",
                        log.meta.skipped_headers,
                        path.display()
                    );
                }
                if let Some((first, last)) = log.time_range() {
                    tracing::debug!(
                        "{}: {} rows from {} to {}",
                        path.display(),
                        log.rows.len(),
                        first,
                        last
                    );
                }
                collected.files_read += 1;
                collected.rows.extend(log.rows);
            }
            Err(ExportError::Parse { path, source }) if policy == HeaderPolicy::SkipFile => {
                tracing::warn!("Skipping {}: {}", path.display(), source);
                collected.files_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(collected)
}

/// Order rows by timestamp. Equal timestamps keep their collection order.
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by_key(|row| row.timestamp);
}

// ============================================================================
// CSV Output
// ============================================================================

/// Render a float as plain decimal text that always has a fractional part
pub fn format_decimal(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Write the header line and one line per row
pub fn write_csv<W: Write>(writer: &mut W, rows: &[Row]) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for row in rows {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            row.timestamp.format(DATETIME_FORMAT),
            format_decimal(row.voltage),
            format_decimal(row.current),
            row.power_factor_percent,
            format_decimal(row.real_power),
            format_decimal(row.apparent_power),
        )?;
    }
    Ok(())
}

fn write_csv_file(path: &Path, rows: &[Row]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, rows)?;
    writer.flush()
}

/// Export every data file in the source directory into one sorted CSV
pub fn export_all(options: &ExportOptions) -> Result<ExportSummary, ExportError> {
    let files = discover_files(&options.source_dir, &options.settings_file_name)?;
    if files.is_empty() {
        tracing::warn!("No .bin files found in {}", options.source_dir.display());
    }

    let mut collected = collect_rows(&files, options.header_policy, options.parallel)?;
    sort_rows(&mut collected.rows);

    write_csv_file(&options.output, &collected.rows).map_err(|source| {
        ExportError::WriteOutput {
            path: options.output.clone(),
            source,
        }
    })?;

    tracing::info!(
        "Wrote {} samples to {}",
        collected.rows.len(),
        options.output.display()
    );

    Ok(ExportSummary {
        output: options.output.clone(),
        files_read: collected.files_read,
        files_skipped: collected.files_skipped,
        rows_written: collected.rows.len(),
    })
}
