//! Format detection tests
//!
//! Verify that EL4000 data is recognised by its block marker and that other
//! binary content is not.

use el4000log::parsers::El4000;

use crate::common::synthetic::*;

#[test]
fn test_detect_logger_file() {
    let data = FileBuilder::new()
        .block(header(2025, 1, 1, 0, 0), &[sample(230.0, 0.5, 80)])
        .padding(8)
        .build();
    assert!(El4000::detect(&data));
}

#[test]
fn test_detect_marker_mid_file() {
    let data = FileBuilder::new().raw(&[0u8; 300]).raw(&MAGIC).build();
    assert!(El4000::detect(&data));
}

#[test]
fn test_detect_rejects_other_formats() {
    assert!(!El4000::detect(b"MLVLG\x00\x00\x01"));
    assert!(!El4000::detect(b"%DataLog%\nDataLogVersion : 1.1\n"));
    assert!(!El4000::detect(&[PADDING; 512]));
}

#[test]
fn test_detect_partial_marker() {
    assert!(!El4000::detect(&[0xE0, 0xC5]));
    assert!(!El4000::detect(&[0xC5, 0xEA, 0xE0]));
    assert!(!El4000::detect(&[]));
}
