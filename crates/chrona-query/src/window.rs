//! Aggregation window computation and externally supplied iterator options.

use chrona_core::{TimeRange, Timestamp};
use serde::{Deserialize, Serialize};

/// A grouping interval with an optional offset, both in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub duration: i64,
    pub offset: i64,
}

impl Interval {
    pub fn new(duration: i64) -> Self {
        Self {
            duration,
            offset: 0,
        }
    }

    pub fn with_offset(duration: i64, offset: i64) -> Self {
        Self { duration, offset }
    }

    /// A zero interval means no time grouping: one window spans the whole
    /// query range, and slice reducers keep original timestamps instead of
    /// stamping window starts.
    pub fn is_zero(&self) -> bool {
        self.duration == 0
    }
}

/// Options supplied by the planner when constructing a call iterator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IteratorOptions {
    /// Tag keys used for grouping; points are aggregated independently per
    /// distinct subset of these dimensions.
    pub dimensions: Vec<String>,
    /// Window interval; zero means a single window over the query range.
    pub interval: Interval,
    /// Overall query time range.
    pub time_range: TimeRange,
}

impl IteratorOptions {
    /// Return the `[start, end)` window enclosing the given timestamp.
    ///
    /// Windows are contiguous and non-overlapping for a non-zero interval,
    /// and the computation is idempotent for the same timestamp. Uses the
    /// Euclidean remainder so windows stay aligned for negative timestamps.
    pub fn window(&self, t: Timestamp) -> (Timestamp, Timestamp) {
        if self.interval.is_zero() {
            // One window covering the whole range, end made exclusive past
            // the inclusive range end.
            return (self.time_range.start, self.time_range.end.saturating_add(1));
        }

        let start = t - (t - self.interval.offset).rem_euclid(self.interval.duration);
        (start, start + self.interval.duration)
    }
}

/// The window boundaries in force for one reduction pass.
#[derive(Debug, Clone, Copy)]
pub struct ReduceOptions {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}
