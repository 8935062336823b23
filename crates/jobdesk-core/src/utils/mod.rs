//! Utility functions for timestamp handling.

pub mod time;

pub use time::parse_timestamp;
