//! Meter Tracker library
//!
//! This module exposes the core functionality for use in tests
//! and by the command-line binaries.

pub mod consumption;
pub mod core;
pub mod db;
pub mod gaps;
pub mod metrics;
pub mod tracker;
