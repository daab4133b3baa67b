//! Core module tests for non-parser functionality
//!
//! Tests for:
//! - Settings persistence
