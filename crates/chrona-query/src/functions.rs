//! Reducer implementations for every supported aggregate function.
//!
//! Pairwise (streaming) reducers are plain functions matching
//! [`ReduceFn`](crate::reduce::ReduceFn); they combine a running
//! accumulator with the next raw point in one pass. Slice reducers receive
//! a full window per tag group. Behavior that differs between the float
//! and integer variants of a function (percentile's out-of-range handling,
//! stddev on strings) is kept per-type on purpose.

use crate::point::sort_points_by_value;
use crate::point::{FloatPoint, IntegerPoint, Numeric, Point, PointValue, StringPoint};
use crate::reduce::SliceReducer;
use crate::window::ReduceOptions;
use chrona_core::{FieldValue, Timestamp};
use fxhash::FxHashMap;
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Pairwise reducers
// ---------------------------------------------------------------------------

/// Count of points. Seeds at the window start with 1.
pub fn count_reduce<V: Numeric>(
    prev: Option<&Point<V>>,
    _curr: &Point<V>,
    opt: &ReduceOptions,
) -> (Timestamp, V, Vec<FieldValue>) {
    match prev {
        None => (opt.start_time, V::one(), Vec::new()),
        Some(prev) => (prev.time, prev.value.add(&V::one()), Vec::new()),
    }
}

/// Sum of values. Seeds with the first value.
pub fn sum_reduce<V: Numeric>(
    prev: Option<&Point<V>>,
    curr: &Point<V>,
    _opt: &ReduceOptions,
) -> (Timestamp, V, Vec<FieldValue>) {
    match prev {
        None => (curr.time, curr.value.clone(), Vec::new()),
        Some(prev) => (prev.time, prev.value.add(&curr.value), Vec::new()),
    }
}

/// Minimum value; ties prefer the earlier timestamp.
pub fn min_reduce<V: PointValue>(
    prev: Option<&Point<V>>,
    curr: &Point<V>,
    _opt: &ReduceOptions,
) -> (Timestamp, V, Vec<FieldValue>) {
    match prev {
        Some(prev) => {
            let take_curr = match curr.value.cmp_values(&prev.value) {
                Ordering::Less => true,
                Ordering::Equal => curr.time < prev.time,
                Ordering::Greater => false,
            };
            if take_curr {
                (curr.time, curr.value.clone(), curr.aux.clone())
            } else {
                (prev.time, prev.value.clone(), prev.aux.clone())
            }
        }
        None => (curr.time, curr.value.clone(), curr.aux.clone()),
    }
}

/// Maximum value; ties prefer the earlier timestamp.
pub fn max_reduce<V: PointValue>(
    prev: Option<&Point<V>>,
    curr: &Point<V>,
    _opt: &ReduceOptions,
) -> (Timestamp, V, Vec<FieldValue>) {
    match prev {
        Some(prev) => {
            let take_curr = match curr.value.cmp_values(&prev.value) {
                Ordering::Greater => true,
                Ordering::Equal => curr.time < prev.time,
                Ordering::Less => false,
            };
            if take_curr {
                (curr.time, curr.value.clone(), curr.aux.clone())
            } else {
                (prev.time, prev.value.clone(), prev.aux.clone())
            }
        }
        None => (curr.time, curr.value.clone(), curr.aux.clone()),
    }
}

/// Earliest point; timestamp ties prefer the larger value.
pub fn first_reduce<V: PointValue>(
    prev: Option<&Point<V>>,
    curr: &Point<V>,
    _opt: &ReduceOptions,
) -> (Timestamp, V, Vec<FieldValue>) {
    match prev {
        Some(prev) => {
            let take_curr = curr.time < prev.time
                || (curr.time == prev.time
                    && curr.value.cmp_values(&prev.value) == Ordering::Greater);
            if take_curr {
                (curr.time, curr.value.clone(), curr.aux.clone())
            } else {
                (prev.time, prev.value.clone(), prev.aux.clone())
            }
        }
        None => (curr.time, curr.value.clone(), curr.aux.clone()),
    }
}

/// Latest point; timestamp ties prefer the larger value.
pub fn last_reduce<V: PointValue>(
    prev: Option<&Point<V>>,
    curr: &Point<V>,
    _opt: &ReduceOptions,
) -> (Timestamp, V, Vec<FieldValue>) {
    match prev {
        Some(prev) => {
            let take_curr = curr.time > prev.time
                || (curr.time == prev.time
                    && curr.value.cmp_values(&prev.value) == Ordering::Greater);
            if take_curr {
                (curr.time, curr.value.clone(), curr.aux.clone())
            } else {
                (prev.time, prev.value.clone(), prev.aux.clone())
            }
        }
        None => (curr.time, curr.value.clone(), curr.aux.clone()),
    }
}

/// Running mean weighted by each point's aggregation count, so that
/// folding in upstream partially-aggregated points stays numerically
/// correct rather than averaging already-averaged values.
pub fn float_mean_reduce(
    prev: Option<&FloatPoint>,
    curr: &FloatPoint,
    opt: &ReduceOptions,
) -> (Timestamp, f64, Vec<FieldValue>) {
    let Some(prev) = prev else {
        return (opt.start_time, curr.value, Vec::new());
    };

    let mut value = prev.value * prev.aggregated as f64;
    if curr.aggregated > 1 {
        value += curr.value * curr.aggregated as f64;
        value /= (prev.aggregated + curr.aggregated) as f64;
    } else {
        value += curr.value;
        value /= (prev.aggregated + 1) as f64;
    }
    (prev.time, value, prev.aux.clone())
}

/// Weighted running mean over integer input, producing a float result.
pub fn integer_mean_reduce(
    prev: Option<&FloatPoint>,
    curr: &IntegerPoint,
    opt: &ReduceOptions,
) -> (Timestamp, f64, Vec<FieldValue>) {
    let Some(prev) = prev else {
        return (opt.start_time, curr.value as f64, Vec::new());
    };

    let mut value = prev.value * prev.aggregated as f64;
    if curr.aggregated > 1 {
        value += curr.value as f64 * curr.aggregated as f64;
        value /= (prev.aggregated + curr.aggregated) as f64;
    } else {
        value += curr.value as f64;
        value /= (prev.aggregated + 1) as f64;
    }
    (prev.time, value, prev.aux.clone())
}

// ---------------------------------------------------------------------------
// Slice reducers: distinct
// ---------------------------------------------------------------------------

/// Distinct float values: first-seen point per unique value, sorted
/// ascending by value. Keyed by bit pattern so every distinct float,
/// NaN payloads included, has a stable identity.
pub fn float_distinct_reduce(a: Vec<FloatPoint>, _opt: &ReduceOptions) -> Vec<FloatPoint> {
    let mut m: FxHashMap<u64, FloatPoint> = FxHashMap::default();
    for p in a {
        m.entry(p.value.to_bits()).or_insert(p);
    }

    let mut points: Vec<FloatPoint> = m
        .into_values()
        .map(|p| FloatPoint::new("", p.time, p.value))
        .collect();
    sort_points_by_value(&mut points);
    points
}

/// Distinct integer values within a window.
pub fn integer_distinct_reduce(a: Vec<IntegerPoint>, _opt: &ReduceOptions) -> Vec<IntegerPoint> {
    let mut m: FxHashMap<i64, IntegerPoint> = FxHashMap::default();
    for p in a {
        m.entry(p.value).or_insert(p);
    }

    let mut points: Vec<IntegerPoint> = m
        .into_values()
        .map(|p| IntegerPoint::new("", p.time, p.value))
        .collect();
    sort_points_by_value(&mut points);
    points
}

/// Distinct string values within a window.
pub fn string_distinct_reduce(a: Vec<StringPoint>, _opt: &ReduceOptions) -> Vec<StringPoint> {
    let mut m: FxHashMap<String, StringPoint> = FxHashMap::default();
    for p in a {
        m.entry(p.value.clone()).or_insert(p);
    }

    let mut points: Vec<StringPoint> = m
        .into_values()
        .map(|p| StringPoint::new("", p.time, p.value))
        .collect();
    sort_points_by_value(&mut points);
    points
}

// ---------------------------------------------------------------------------
// Slice reducers: median
// ---------------------------------------------------------------------------

/// Median float value within a window. Even-length windows return the mean
/// of the two middle values; a single point is returned without sorting.
pub fn float_median_reduce(mut a: Vec<FloatPoint>, opt: &ReduceOptions) -> Vec<FloatPoint> {
    if a.len() == 1 {
        return vec![FloatPoint::new("", opt.start_time, a[0].value)];
    }

    sort_points_by_value(&mut a);
    if a.len() % 2 == 0 {
        let lo = &a[a.len() / 2 - 1];
        let hi = &a[a.len() / 2];
        return vec![FloatPoint::new(
            "",
            opt.start_time,
            lo.value + (hi.value - lo.value) / 2.0,
        )];
    }
    vec![FloatPoint::new("", opt.start_time, a[a.len() / 2].value)]
}

/// Median of integer input, producing a float result.
pub fn integer_median_reduce(mut a: Vec<IntegerPoint>, opt: &ReduceOptions) -> Vec<FloatPoint> {
    if a.len() == 1 {
        return vec![FloatPoint::new("", opt.start_time, a[0].value as f64)];
    }

    sort_points_by_value(&mut a);
    if a.len() % 2 == 0 {
        let lo = &a[a.len() / 2 - 1];
        let hi = &a[a.len() / 2];
        return vec![FloatPoint::new(
            "",
            opt.start_time,
            lo.value as f64 + (hi.value - lo.value) as f64 / 2.0,
        )];
    }
    vec![FloatPoint::new("", opt.start_time, a[a.len() / 2].value as f64)]
}

// ---------------------------------------------------------------------------
// Slice reducers: stddev / spread
// ---------------------------------------------------------------------------

/// Sample standard deviation of the window's float values. NaN values are
/// excluded from both the mean and the variance; fewer than two valid
/// points yields a nil result.
pub fn float_stddev_reduce(a: Vec<FloatPoint>, opt: &ReduceOptions) -> Vec<FloatPoint> {
    let mut mean = 0.0_f64;
    let mut count = 0_usize;
    for p in &a {
        if p.value.is_nan() {
            continue;
        }
        count += 1;
        mean += (p.value - mean) / count as f64;
    }

    if count < 2 {
        return vec![FloatPoint::nil_at(opt.start_time)];
    }

    let mut variance = 0.0_f64;
    for p in &a {
        if p.value.is_nan() {
            continue;
        }
        variance += (p.value - mean).powi(2);
    }
    vec![FloatPoint::new(
        "",
        opt.start_time,
        (variance / (count - 1) as f64).sqrt(),
    )]
}

/// Sample standard deviation of integer input, producing a float result.
pub fn integer_stddev_reduce(a: Vec<IntegerPoint>, opt: &ReduceOptions) -> Vec<FloatPoint> {
    if a.len() < 2 {
        return vec![FloatPoint::nil_at(opt.start_time)];
    }

    let mut mean = 0.0_f64;
    let mut count = 0_usize;
    for p in &a {
        count += 1;
        mean += (p.value as f64 - mean) / count as f64;
    }

    let mut variance = 0.0_f64;
    for p in &a {
        variance += (p.value as f64 - mean).powi(2);
    }
    vec![FloatPoint::new(
        "",
        opt.start_time,
        (variance / (count - 1) as f64).sqrt(),
    )]
}

/// Stddev is meaningless for strings; the call still type-checks and
/// always yields an empty-string constant.
pub fn string_stddev_reduce(_a: Vec<StringPoint>, opt: &ReduceOptions) -> Vec<StringPoint> {
    vec![StringPoint::new("", opt.start_time, String::new())]
}

/// Spread (max - min) of the window's float values. The window must be
/// non-empty; the grouping layer guarantees that.
pub fn float_spread_reduce(a: Vec<FloatPoint>, opt: &ReduceOptions) -> Vec<FloatPoint> {
    let mut min = a[0].value;
    let mut max = a[0].value;
    for p in &a[1..] {
        if p.value < min {
            min = p.value;
        }
        if p.value > max {
            max = p.value;
        }
    }
    vec![FloatPoint::new("", opt.start_time, max - min)]
}

/// Spread (max - min) of the window's integer values.
pub fn integer_spread_reduce(a: Vec<IntegerPoint>, opt: &ReduceOptions) -> Vec<IntegerPoint> {
    let mut min = a[0].value;
    let mut max = a[0].value;
    for p in &a[1..] {
        if p.value < min {
            min = p.value;
        }
        if p.value > max {
            max = p.value;
        }
    }
    vec![IntegerPoint::new("", opt.start_time, max - min)]
}

// ---------------------------------------------------------------------------
// Slice reducers: percentile
// ---------------------------------------------------------------------------

/// Index into the value-sorted window for the given percentile, or `None`
/// when the nearest-rank index falls outside the window.
fn percentile_index(length: usize, percentile: f64) -> Option<usize> {
    let i = (length as f64 * percentile / 100.0 + 0.5).floor() as i64 - 1;
    if i < 0 || i >= length as i64 {
        return None;
    }
    Some(i as usize)
}

/// Nearest-rank percentile over float values. An out-of-range rank yields
/// a nil point.
pub fn float_percentile_reducer(
    percentile: f64,
) -> impl FnMut(Vec<FloatPoint>, &ReduceOptions) -> Vec<FloatPoint> + Send {
    move |mut a, opt| {
        let Some(i) = percentile_index(a.len(), percentile) else {
            return vec![FloatPoint::nil_at(opt.start_time)];
        };
        sort_points_by_value(&mut a);
        vec![FloatPoint::new("", opt.start_time, a[i].value)]
    }
}

/// Nearest-rank percentile over integer values. Unlike the float variant,
/// an out-of-range rank yields no output at all.
pub fn integer_percentile_reducer(
    percentile: f64,
) -> impl FnMut(Vec<IntegerPoint>, &ReduceOptions) -> Vec<IntegerPoint> + Send {
    move |mut a, opt| {
        let Some(i) = percentile_index(a.len(), percentile) else {
            return Vec::new();
        };
        sort_points_by_value(&mut a);
        vec![IntegerPoint::new("", opt.start_time, a[i].value)]
    }
}

// ---------------------------------------------------------------------------
// Slice reducers: derivative
// ---------------------------------------------------------------------------

/// Rate of change between consecutive points, normalized to the given
/// interval.
///
/// The previous-point state deliberately persists across windows: the
/// first point of the first window seeds it and emits nothing, and later
/// windows continue from wherever the last pass left off. Each iterator
/// instance owns its own state; reducers are never shared between
/// concurrent iterator chains.
pub struct DerivativeReducer<V: PointValue> {
    prev: Option<Point<V>>,
    interval: i64,
    non_negative: bool,
}

impl<V: PointValue> DerivativeReducer<V> {
    pub fn new(interval: i64, non_negative: bool) -> Self {
        Self {
            prev: None,
            interval,
            non_negative,
        }
    }
}

impl<V: Numeric> SliceReducer<V, f64> for DerivativeReducer<V> {
    fn reduce(&mut self, a: Vec<Point<V>>, _opt: &ReduceOptions) -> Vec<FloatPoint> {
        if a.is_empty() {
            return Vec::new();
        } else if a.len() == 1 {
            return vec![FloatPoint::nil_at(a[0].time)];
        }

        let mut prev = match self.prev.take() {
            Some(p) => p,
            None => a[0].clone(),
        };

        let mut output = Vec::with_capacity(a.len() - 1);
        for p in &a[1..] {
            let diff = p.value.as_f64() - prev.value.as_f64();
            let elapsed = p.time - prev.time;

            // Zero or negative elapsed time yields 0 instead of a
            // division error.
            let value = if elapsed > 0 {
                diff / (elapsed as f64 / self.interval as f64)
            } else {
                0.0
            };

            prev = p.clone();

            // Non-negative derivatives drop the pair entirely, not clamp.
            if self.non_negative && diff < 0.0 {
                continue;
            }

            output.push(FloatPoint::new("", p.time, value));
        }
        self.prev = Some(prev);
        output
    }
}
