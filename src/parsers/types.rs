use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors raised while decoding a logger file
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Header bytes are present but do not form a calendar date
    #[error("malformed block header at offset {offset:#x}: {bytes:02X?}")]
    MalformedHeader { offset: usize, bytes: Vec<u8> },
}

/// What to do with a block header that does not decode to a valid date
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum HeaderPolicy {
    /// Fail the file, and with it the whole run
    #[default]
    Abort,
    /// Drop every row of the offending file and carry on with the next one
    SkipFile,
    /// Skip only the offending block and resume searching after its header
    SkipBlock,
}

/// Block header decoded from the 5 bytes after a magic marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Byte offset of the magic marker within the source buffer
    pub magic_offset: usize,
    pub base_timestamp: NaiveDateTime,
}

/// One decoded measurement, relative to its block's base timestamp
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Minutes elapsed since the block's base timestamp
    pub timestamp_offset: u32,
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    /// Power factor in percent, as stored by the logger
    pub power_factor_percent: u8,
    /// Watts
    pub real_power: f64,
    /// Volt-amperes
    pub apparent_power: f64,
}

/// A fully timestamped measurement, ready for export
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Row {
    pub timestamp: NaiveDateTime,
    pub voltage: f64,
    pub current: f64,
    pub power_factor_percent: u8,
    pub real_power: f64,
    pub apparent_power: f64,
}

impl Row {
    /// Attach a sample to its block's base timestamp
    pub fn from_sample(header: &BlockHeader, sample: &Sample) -> Self {
        Self {
            timestamp: header.base_timestamp + Duration::minutes(i64::from(sample.timestamp_offset)),
            voltage: sample.voltage,
            current: sample.current,
            power_factor_percent: sample.power_factor_percent,
            real_power: sample.real_power,
            apparent_power: sample.apparent_power,
        }
    }
}

/// Header plus the run of samples that followed it
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub samples: Vec<Sample>,
}

impl Block {
    /// Expand the block into timestamped rows, in sample order
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        self.samples
            .iter()
            .map(move |sample| Row::from_sample(&self.header, sample))
    }
}

/// Scan diagnostics for one file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogMeta {
    pub block_count: usize,
    /// Blocks whose header was followed directly by padding, a marker or EOF
    pub empty_block_count: usize,
    /// Headers dropped under [`HeaderPolicy::SkipBlock`]
    pub skipped_headers: usize,
}

/// Parsed log file structure
#[derive(Clone, Debug, Default)]
pub struct Log {
    pub meta: LogMeta,
    pub rows: Vec<Row>,
}

impl Log {
    /// Earliest and latest timestamps, if any rows were decoded
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.rows.iter().map(|r| r.timestamp).min()?;
        let max = self.rows.iter().map(|r| r.timestamp).max()?;
        Some((min, max))
    }
}

/// Trait for log file parsers
pub trait Parseable {
    fn parse(&self, data: &[u8]) -> Result<Log, ParseError>;
}
