//! Integration tests for end-to-end functionality
//!
//! Tests for:
//! - Directory export (file selection, merge, sort, CSV output)
//! - Charting the exported table
