//! EL3500/EL4000 power-meter logger (.BIN) format parser
//!
//! The logger writes no length or count fields. Format structure based on
//! reverse engineering:
//! - Magic marker `E0 C5 EA` opens each record block
//! - 5-byte header: month, day, year offset from 2000, hour, minute (u8 each)
//! - Run of 5-byte samples: voltage in 0.1 V (u16 BE), current in mA (u16 BE),
//!   power factor in percent (u8), one minute apart
//! - The run ends at a `0xFF` padding byte, at the next magic marker, or when
//!   fewer than 5 bytes remain

use chrono::{NaiveDate, NaiveDateTime};

use super::types::{
    Block, BlockHeader, HeaderPolicy, Log, LogMeta, ParseError, Parseable, Sample,
};

/// Start of every record block
pub const MAGIC: [u8; 3] = [0xE0, 0xC5, 0xEA];

/// Length of the block header that follows the marker
pub const TIMESTAMP_LEN: usize = 5;

/// Length of one measurement sample
pub const SAMPLE_LEN: usize = 5;

/// Padding byte that terminates a sample run
pub const PADDING: u8 = 0xFF;

/// Decode a block header into its base timestamp.
///
/// `magic_offset` is only used to locate the header in the error.
pub fn decode_timestamp(raw: &[u8], magic_offset: usize) -> Result<NaiveDateTime, ParseError> {
    let malformed = || ParseError::MalformedHeader {
        offset: magic_offset,
        bytes: raw.to_vec(),
    };

    let &[month, day, year_offset, hour, minute] = raw else {
        return Err(malformed());
    };

    NaiveDate::from_ymd_opt(
        2000 + i32::from(year_offset),
        u32::from(month),
        u32::from(day),
    )
    .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), 0))
    .ok_or_else(malformed)
}

/// Decode one sample into physical quantities
pub fn decode_sample(raw: &[u8; SAMPLE_LEN], timestamp_offset: u32) -> Sample {
    let voltage_tenths = u16::from_be_bytes([raw[0], raw[1]]);
    let current_ma = u16::from_be_bytes([raw[2], raw[3]]);
    let power_factor_percent = raw[4];

    let voltage = f64::from(voltage_tenths) / 10.0;
    let current = f64::from(current_ma) / 1000.0;
    let apparent_power = voltage * current;
    let real_power = apparent_power * (f64::from(power_factor_percent) / 100.0);

    Sample {
        timestamp_offset,
        voltage,
        current,
        power_factor_percent,
        real_power,
        apparent_power,
    }
}

/// Offset of the next magic marker at or after `from`
fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(MAGIC.len())
        .position(|window| window == MAGIC)
        .map(|idx| idx + from)
}

/// Iterator over the record blocks in a logger buffer.
///
/// Each call to `next()` searches for the next marker, decodes its header and
/// collects the sample run behind it. Exhausting the buffer, including a
/// truncated header or sample, ends iteration without an error. A header that
/// is not a valid date is handled according to the [`HeaderPolicy`]: under
/// `SkipBlock` it is counted and passed over, otherwise it is yielded as an
/// error and iteration stops.
pub struct BlockScanner<'a> {
    data: &'a [u8],
    pos: usize,
    policy: HeaderPolicy,
    skipped_headers: usize,
}

impl<'a> BlockScanner<'a> {
    /// Create a new scanner over the given byte slice.
    pub fn new(data: &'a [u8], policy: HeaderPolicy) -> Self {
        Self {
            data,
            pos: 0,
            policy,
            skipped_headers: 0,
        }
    }

    /// Number of headers passed over so far under [`HeaderPolicy::SkipBlock`]
    pub fn skipped_headers(&self) -> usize {
        self.skipped_headers
    }

    /// Collect samples from the cursor until padding, a marker or end of data.
    /// The terminating bytes are left unconsumed.
    fn read_samples(&mut self) -> Vec<Sample> {
        let mut samples = Vec::new();

        while let Some(raw) = self
            .data
            .get(self.pos..)
            .and_then(|rest| rest.first_chunk::<SAMPLE_LEN>())
        {
            if raw[0] == PADDING || raw.starts_with(&MAGIC) {
                break;
            }
            samples.push(decode_sample(raw, samples.len() as u32));
            self.pos += SAMPLE_LEN;
        }

        samples
    }
}

impl Iterator for BlockScanner<'_> {
    type Item = Result<Block, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let magic_offset = find_magic(self.data, self.pos)?;
            let header_start = magic_offset + MAGIC.len();
            let header_end = header_start + TIMESTAMP_LEN;

            // Truncated trailing header
            if header_end > self.data.len() {
                self.pos = self.data.len();
                return None;
            }
            self.pos = header_end;

            let raw = &self.data[header_start..header_end];
            let base_timestamp = match decode_timestamp(raw, magic_offset) {
                Ok(ts) => ts,
                Err(e) if self.policy == HeaderPolicy::SkipBlock => {
                    tracing::warn!("Skipping block: {}", e);
                    self.skipped_headers += 1;
                    continue;
                }
                Err(e) => {
                    self.pos = self.data.len();
                    return Some(Err(e));
                }
            };

            let header = BlockHeader {
                magic_offset,
                base_timestamp,
            };
            let samples = self.read_samples();
            return Some(Ok(Block { header, samples }));
        }
    }
}

/// EL3500/EL4000 logger file parser
#[derive(Clone, Copy, Debug, Default)]
pub struct El4000 {
    pub policy: HeaderPolicy,
}

impl El4000 {
    pub fn new(policy: HeaderPolicy) -> Self {
        Self { policy }
    }

    /// Detect if data contains at least one EL4000 record block
    pub fn detect(data: &[u8]) -> bool {
        find_magic(data, 0).is_some()
    }

    /// Iterate over the blocks of a buffer without flattening them into rows
    pub fn blocks<'a>(&self, data: &'a [u8]) -> BlockScanner<'a> {
        BlockScanner::new(data, self.policy)
    }

    /// Decode every block in the buffer into rows, in file order
    pub fn parse_binary(&self, data: &[u8]) -> Result<Log, ParseError> {
        let mut scanner = self.blocks(data);
        let mut meta = LogMeta::default();
        let mut rows = Vec::with_capacity(data.len() / SAMPLE_LEN);

        for block in scanner.by_ref() {
            let block = block?;
            meta.block_count += 1;
            if block.samples.is_empty() {
                meta.empty_block_count += 1;
            }
            tracing::debug!(
                "Block at {:#x}: base {}, {} samples",
                block.header.magic_offset,
                block.header.base_timestamp,
                block.samples.len()
            );
            rows.extend(block.rows());
        }
        meta.skipped_headers = scanner.skipped_headers();

        Ok(Log { meta, rows })
    }
}

impl Parseable for El4000 {
    fn parse(&self, data: &[u8]) -> Result<Log, ParseError> {
        self.parse_binary(data)
    }
}
