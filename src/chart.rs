//! Chart export for the exported table (PNG).
//!
//! Re-reads the CSV written by [`crate::export`] and draws real power over
//! time into an image.

use chrono::NaiveDateTime;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::export::DATETIME_FORMAT;

/// Column plotted by [`plot_watt_over_time`]
pub const WATT_COLUMN: &str = "watt_W";

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;

const BACKGROUND: Rgba<u8> = Rgba([30, 30, 30, 255]);
const PLOT_AREA: Rgba<u8> = Rgba([40, 40, 40, 255]);
const GRID: Rgba<u8> = Rgba([70, 70, 70, 255]);
const LINE: Rgba<u8> = Rgba([113, 120, 78, 255]);

/// Errors that can occur while charting an exported table
#[derive(Debug, Error)]
pub enum ChartError {
    /// The table has not been exported yet
    #[error("{} not found, run the export first", .0.display())]
    MissingOutputFile(PathBuf),

    /// The table lacks the requested column
    #[error("'{column}' column not in {}", path.display())]
    MissingColumn { column: String, path: PathBuf },

    /// A data line could not be interpreted
    #[error("line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("Failed to read table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write chart: {0}")]
    Render(#[from] image::ImageError),
}

/// One column of the table against the datetime column
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    pub times: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Earliest and latest timestamps
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((*self.times.iter().min()?, *self.times.iter().max()?))
    }

    /// Smallest and largest values
    pub fn value_range(&self) -> Option<(f64, f64)> {
        if self.values.is_empty() {
            return None;
        }
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for &value in &self.values {
            min = min.min(value);
            max = max.max(value);
        }
        Some((min, max))
    }
}

/// Parse an ISO-like timestamp with either a space or a `T` separator
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Extract a series from table text.
///
/// The timestamp is taken from the first column; `column` is found by name in
/// the header line. `path` is only used for error messages.
pub fn parse_series(content: &str, column: &str, path: &Path) -> Result<Series, ChartError> {
    let missing_column = || ChartError::MissingColumn {
        column: column.to_string(),
        path: path.to_path_buf(),
    };

    let mut lines = content.lines().enumerate();
    let (_, header) = lines.next().ok_or_else(missing_column)?;
    let value_idx = header
        .split(',')
        .position(|name| name.trim() == column)
        .ok_or_else(missing_column)?;

    let mut series = Series::default();
    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        let time_text = fields.first().copied().unwrap_or_default();
        let time = parse_timestamp(time_text).ok_or_else(|| ChartError::InvalidRow {
            line: line_no,
            reason: format!("invalid timestamp '{}'", time_text),
        })?;

        let value_text = fields.get(value_idx).ok_or_else(|| ChartError::InvalidRow {
            line: line_no,
            reason: format!("missing '{}' value", column),
        })?;
        let value = value_text
            .trim()
            .parse::<f64>()
            .map_err(|e| ChartError::InvalidRow {
                line: line_no,
                reason: format!("invalid '{}' value '{}': {}", column, value_text, e),
            })?;

        series.times.push(time);
        series.values.push(value);
    }

    Ok(series)
}

/// Read a series from an exported table on disk
pub fn read_series(path: &Path, column: &str) -> Result<Series, ChartError> {
    if !path.exists() {
        return Err(ChartError::MissingOutputFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_series(&content, column, path)
}

const GRID_COLUMNS: u32 = 10;
const GRID_ROWS: u32 = 5;

/// Value span mapped onto the plot area's height
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisScale {
    /// Value at the bottom edge
    pub min: f64,
    /// Value at the top edge
    pub max: f64,
    /// Value covered by one grid row
    pub step: f64,
}

impl AxisScale {
    /// Scale for a series; a flat series gets a span of one unit
    pub fn for_series(series: &Series) -> Option<Self> {
        let (min, max) = series.value_range()?;
        let span = if (max - min).abs() < 0.0001 { 1.0 } else { max - min };
        Some(Self {
            min,
            max: min + span,
            step: span / f64::from(GRID_ROWS),
        })
    }

    fn ratio(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Pixel rectangle the grid and data are drawn into (right and bottom exclusive)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PlotArea {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl PlotArea {
    /// Inset plot area for a non-empty image
    fn inset(width: u32, height: u32) -> Self {
        let left = 80u32.min(width / 4);
        let top = 60u32.min(height / 4);
        Self {
            left,
            top,
            right: width.saturating_sub(40).max(left + 1),
            bottom: height.saturating_sub(80).max(top + 1),
        }
    }

    fn span_x(&self) -> f64 {
        f64::from(self.right - self.left - 1)
    }

    fn span_y(&self) -> f64 {
        f64::from(self.bottom - self.top - 1)
    }

    /// Pixel for fractions of the width (left to right) and height (bottom to top)
    fn point(&self, x_ratio: f64, y_ratio: f64) -> (u32, u32) {
        let x = self.left + (x_ratio * self.span_x()) as u32;
        let y = self.bottom - 1 - (y_ratio * self.span_y()) as u32;
        (x, y)
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        (i64::from(self.left)..i64::from(self.right)).contains(&x)
            && (i64::from(self.top)..i64::from(self.bottom)).contains(&y)
    }

    fn fill(&self, img: &mut RgbaImage, color: Rgba<u8>) {
        for y in self.top..self.bottom {
            for x in self.left..self.right {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Draw a series as a line chart.
///
/// The image carries no text since `image` has no font rasterizer. The grid
/// has 10 time columns and 5 value rows; [`AxisScale::for_series`] gives the
/// values the rows stand for, and [`plot_watt_over_time`] logs them.
pub fn render_image(series: &Series, width: u32, height: u32) -> RgbaImage {
    let mut imgbuf = RgbaImage::from_pixel(width, height, BACKGROUND);
    if width == 0 || height == 0 {
        return imgbuf;
    }

    let area = PlotArea::inset(width, height);
    area.fill(&mut imgbuf, PLOT_AREA);

    for i in 0..=GRID_COLUMNS {
        let x_ratio = f64::from(i) / f64::from(GRID_COLUMNS);
        let (top, bottom) = (area.point(x_ratio, 1.0), area.point(x_ratio, 0.0));
        draw_line(&mut imgbuf, &area, top, bottom, GRID);
    }
    for i in 0..=GRID_ROWS {
        let y_ratio = f64::from(i) / f64::from(GRID_ROWS);
        let (left, right) = (area.point(0.0, y_ratio), area.point(1.0, y_ratio));
        draw_line(&mut imgbuf, &area, left, right, GRID);
    }

    let (Some((min_time, max_time)), Some(scale)) =
        (series.time_range(), AxisScale::for_series(series))
    else {
        return imgbuf;
    };

    let time_span = (max_time - min_time).num_seconds().max(1) as f64;

    let mut prev: Option<(u32, u32)> = None;
    for (&time, &value) in series.times.iter().zip(series.values.iter()) {
        let x_ratio = (time - min_time).num_seconds() as f64 / time_span;
        let point = area.point(x_ratio, scale.ratio(value));

        match prev {
            Some(from) => draw_line(&mut imgbuf, &area, from, point, LINE),
            None => imgbuf.put_pixel(point.0, point.1, LINE),
        }
        prev = Some(point);
    }

    imgbuf
}

/// Render a series to a PNG file
pub fn render_png(series: &Series, path: &Path) -> Result<(), ChartError> {
    render_image(series, WIDTH, HEIGHT).save(path)?;
    Ok(())
}

/// Read the exported table and chart real power over time.
///
/// Returns the path of the written image.
pub fn plot_watt_over_time(csv_path: &Path, chart_path: &Path) -> Result<PathBuf, ChartError> {
    let series = read_series(csv_path, WATT_COLUMN)?;
    if series.is_empty() {
        tracing::warn!("{} has no samples, chart will be empty", csv_path.display());
    }
    render_png(&series, chart_path)?;
    tracing::info!(
        "Charted {} samples to {}",
        series.len(),
        chart_path.display()
    );
    if let (Some((first, last)), Some(scale)) =
        (series.time_range(), AxisScale::for_series(&series))
    {
        tracing::info!(
            "Chart spans {} to {}, {:.1} W to {:.1} W ({:.1} W per grid row)",
            first,
            last,
            scale.min,
            scale.max,
            scale.step
        );
    }
    Ok(chart_path.to_path_buf())
}

/// Draw a straight line, leaving out any pixel outside `area`
fn draw_line(
    img: &mut RgbaImage,
    area: &PlotArea,
    from: (u32, u32),
    to: (u32, u32),
    color: Rgba<u8>,
) {
    let (x0, y0) = (i64::from(from.0), i64::from(from.1));
    let (x1, y1) = (i64::from(to.0), i64::from(to.1));
    let (dx, dy) = ((x1 - x0).abs(), (y1 - y0).abs());
    let (step_x, step_y) = ((x1 - x0).signum(), (y1 - y0).signum());

    let (mut x, mut y) = (x0, y0);
    let mut err = dx - dy;
    loop {
        if area.contains(x, y) {
            img.put_pixel(x as u32, y as u32, color);
        }
        if (x, y) == (x1, y1) {
            break;
        }
        let doubled = 2 * err;
        if doubled > -dy {
            err -= dy;
            x += step_x;
        }
        if doubled < dx {
            err += dx;
            y += step_y;
        }
    }
}
