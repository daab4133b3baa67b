//! EL4000 block scanner tests
//!
//! Tests verify that synthetic logger files decode into the expected rows and
//! that every framing edge case ends the scan gracefully.

use chrono::{NaiveDate, NaiveDateTime};
use el4000log::parsers::{Block, El4000, HeaderPolicy, ParseError, Parseable};

use crate::common::assertions::*;
use crate::common::float_cmp::*;
use crate::common::synthetic::*;

fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

// ============================================
// Reference Example
// ============================================

#[test]
fn test_reference_example_bytes() {
    let data = [
        0xE0, 0xC5, 0xEA, 0x06, 0x0F, 0x18, 0x09, 0x1E, 0x00, 0x64, 0x03, 0xE8, 0x64, 0xFF,
    ];
    let log = El4000::default().parse(&data).expect("Should parse");

    assert_eq!(log.rows.len(), 1);
    let row = log.rows[0];
    assert_eq!(row.timestamp, ts(2024, 6, 15, 9, 30));
    assert_eq!(row.voltage, 10.0);
    assert_eq!(row.current, 1.0);
    assert_eq!(row.power_factor_percent, 100);
    assert_eq!(row.real_power, 10.0);
    assert_eq!(row.apparent_power, 10.0);
}

// ============================================
// Realistic File Tests
// ============================================

/// A day's worth of blocks the way the logger writes them: each block padded
/// out with 0xFF, a few blocks back to back, and a truncated tail.
fn realistic_file() -> Vec<u8> {
    FileBuilder::new()
        .raw(&[0x00; 16])
        .block(
            header(2024, 3, 1, 0, 0),
            &[
                sample(229.8, 0.120, 45),
                sample(230.1, 0.118, 44),
                sample(230.4, 2.310, 97),
            ],
        )
        .padding(32)
        .block(header(2024, 3, 1, 6, 0), &[sample(231.0, 5.5, 99); 60])
        .block(header(2024, 3, 1, 7, 0), &[sample(228.7, 0.05, 12); 30])
        .padding(5)
        .block(header(2024, 3, 1, 7, 30), &[sample(229.0, 0.1, 30)])
        .raw(&[0x08, 0xF2, 0x00])
        .build()
}

#[test]
fn test_realistic_file_row_count() {
    let log = El4000::default().parse_binary(&realistic_file()).unwrap();
    assert_eq!(log.rows.len(), 3 + 60 + 30 + 1);
    assert_eq!(log.meta.block_count, 4);
    assert_eq!(log.meta.empty_block_count, 0);
}

#[test]
fn test_realistic_file_timestamps_within_blocks() {
    let log = El4000::default().parse_binary(&realistic_file()).unwrap();
    assert_eq!(log.rows[0].timestamp, ts(2024, 3, 1, 0, 0));
    assert_eq!(log.rows[2].timestamp, ts(2024, 3, 1, 0, 2));
    assert_eq!(log.rows[3].timestamp, ts(2024, 3, 1, 6, 0));
    assert_eq!(log.rows[62].timestamp, ts(2024, 3, 1, 6, 59));
    assert_eq!(log.rows[63].timestamp, ts(2024, 3, 1, 7, 0));
    assert_eq!(log.rows[93].timestamp, ts(2024, 3, 1, 7, 30));
    assert_sorted_rows(&log.rows);
}

#[test]
fn test_realistic_file_values() {
    let log = El4000::default().parse_binary(&realistic_file()).unwrap();
    assert_consistent_powers(&log.rows);

    let first = log.rows[0];
    assert_approx_eq(first.voltage, 229.8, DEFAULT_TOLERANCE);
    assert_approx_eq(first.current, 0.12, DEFAULT_TOLERANCE);
    assert_eq!(first.power_factor_percent, 45);
    assert_approx_eq(first.real_power, 229.8 * 0.12 * 0.45, DEFAULT_TOLERANCE);

    let heavy = log.rows[10];
    assert_approx_eq(heavy.apparent_power, 231.0 * 5.5, DEFAULT_TOLERANCE);
}

#[test]
fn test_realistic_file_block_offsets() {
    let data = realistic_file();
    let blocks: Vec<Block> = El4000::default()
        .blocks(&data)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0].header.magic_offset, 16);
    for block in &blocks {
        let at = block.header.magic_offset;
        assert_eq!(&data[at..at + 3], &MAGIC);
    }
}

// ============================================
// Framing Edge Cases
// ============================================

#[test]
fn test_marker_only_file() {
    let log = El4000::default().parse_binary(&MAGIC).unwrap();
    assert!(log.rows.is_empty());
}

#[test]
fn test_all_padding_file() {
    let data = vec![PADDING; 4096];
    let log = El4000::default().parse_binary(&data).unwrap();
    assert!(log.rows.is_empty());
    assert_eq!(log.meta.block_count, 0);
}

#[test]
fn test_back_to_back_blocks_keep_marker() {
    let data = FileBuilder::new()
        .block(header(2024, 6, 15, 9, 30), &[sample(10.0, 1.0, 100); 2])
        .block(header(2024, 6, 15, 12, 0), &[sample(20.0, 2.0, 50)])
        .build();
    let log = El4000::default().parse_binary(&data).unwrap();
    assert_eq!(log.rows.len(), 3);
    assert_eq!(log.rows[2].timestamp, ts(2024, 6, 15, 12, 0));
    assert_eq!(log.rows[2].voltage, 20.0);
}

#[test]
fn test_truncated_trailing_sample_is_dropped() {
    for tail in 1..5 {
        let data = FileBuilder::new()
            .block(header(2024, 6, 15, 9, 30), &[sample(10.0, 1.0, 100)])
            .raw(&sample(11.0, 1.0, 100)[..tail])
            .build();
        let log = El4000::default().parse_binary(&data).unwrap();
        assert_eq!(log.rows.len(), 1, "tail of {} bytes should be dropped", tail);
    }
}

#[test]
fn test_truncated_trailing_header_is_not_an_error() {
    for cut in 0..5 {
        let data = FileBuilder::new()
            .block(header(2024, 6, 15, 9, 30), &[sample(10.0, 1.0, 100)])
            .padding(1)
            .raw(&MAGIC)
            .raw(&header(2024, 6, 15, 10, 0)[..cut])
            .build();
        let log = El4000::default().parse_binary(&data).unwrap();
        assert_eq!(log.rows.len(), 1);
        assert_eq!(log.meta.block_count, 1);
    }
}

#[test]
fn test_garbage_between_blocks_is_skipped() {
    let data = FileBuilder::new()
        .block(header(2024, 6, 15, 9, 30), &[sample(10.0, 1.0, 100)])
        .padding(1)
        .raw(&[0x12, 0x34, 0x56, 0xE0, 0xC5, 0x00, 0x99])
        .block(header(2024, 6, 15, 9, 45), &[sample(10.0, 1.0, 100)])
        .build();
    let log = El4000::default().parse_binary(&data).unwrap();
    assert_eq!(log.rows.len(), 2);
}

#[test]
fn test_scan_is_repeatable() {
    let data = realistic_file();
    let parser = El4000::default();
    let a = parser.parse_binary(&data).unwrap();
    let b = parser.parse_binary(&data).unwrap();
    assert_eq!(a.rows, b.rows);
}

// ============================================
// Header Policy Tests
// ============================================

fn file_with_bad_header() -> Vec<u8> {
    FileBuilder::new()
        .block(header(2024, 6, 15, 9, 0), &[sample(230.0, 1.0, 90)])
        .padding(3)
        .block([13, 1, 24, 0, 0], &[sample(230.0, 1.0, 90); 4])
        .padding(3)
        .block(header(2024, 6, 15, 10, 0), &[sample(230.0, 1.0, 90)])
        .build()
}

#[test]
fn test_bad_header_aborts_by_default() {
    let result = El4000::default().parse_binary(&file_with_bad_header());
    match result {
        Err(ParseError::MalformedHeader { offset, bytes }) => {
            assert_eq!(offset, 16);
            assert_eq!(bytes, vec![13, 1, 24, 0, 0]);
        }
        other => panic!("Expected MalformedHeader, got {:?}", other),
    }
}

#[test]
fn test_bad_header_skip_block() {
    let log = El4000::new(HeaderPolicy::SkipBlock)
        .parse_binary(&file_with_bad_header())
        .unwrap();
    assert_eq!(log.rows.len(), 2);
    assert_eq!(log.meta.skipped_headers, 1);
    assert_eq!(log.rows[0].timestamp, ts(2024, 6, 15, 9, 0));
    assert_eq!(log.rows[1].timestamp, ts(2024, 6, 15, 10, 0));
}
