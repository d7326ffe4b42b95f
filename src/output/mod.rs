//! Output module for reporting mirror progress
//!
//! This module handles reading the frontier database back for the
//! `--stats` report.

pub mod stats;

pub use stats::{load_statistics, print_statistics, MirrorStatistics};
