//! Parser integration tests
//!
//! Tests cover:
//! - Format detection
//! - Block framing (padding, back-to-back markers, truncation)
//! - Header policies
//! - Data integrity of decoded rows

pub mod el4000_tests;
pub mod format_detection_tests;
