//! Chrona Core - Core types for the time series database
//!
//! This crate provides the fundamental data types used throughout the Chrona
//! TSDB:
//! - `Timestamp`: Nanosecond-precision Unix epoch timestamps
//! - `Tag`: Key-value pair for series identification
//! - `Tags`: Immutable ordered tag set with dimension subsetting
//! - `FieldValue`: Typed field values (Float, Integer, String, Boolean, etc.)
//! - `TimeRange`: Inclusive query time range

pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::*;
