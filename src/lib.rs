//! el4000log - EL3500/EL4000 power-meter log exporter
//!
//! This library decodes the binary files written by EL3500/EL4000 class
//! energy loggers, exports them as one time-sorted CSV table and charts the
//! real power series.
//!
//! ## Module Structure
//!
//! - [`parsers`] - Logger file parsers (block scanner, sample and timestamp decoding)
//! - [`export`] - File selection, row collection and CSV output
//! - [`chart`] - Re-reads the CSV and renders real power over time as PNG
//! - [`settings`] - Persisted exporter settings
//! - [`cli`] - Command line arguments layered over the settings

pub mod chart;
pub mod cli;
pub mod export;
pub mod parsers;
pub mod settings;
