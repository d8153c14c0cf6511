//! Typed point records flowing through iterator chains.
//!
//! A point is one timestamped, typed value plus its tags, auxiliary
//! projected fields, and an aggregation counter. One `Point<V>` variant
//! exists per supported value type; the engine machinery is generic over
//! `PointValue` while the reducer functions stay per-type wherever the
//! aggregate semantics differ between types.

use chrona_core::{FieldValue, Tags, Timestamp};
use std::cmp::Ordering;
use std::fmt;

/// Reserved sentinel meaning "no timestamp". Pairwise reducers return it to
/// signal that nothing should be emitted for the current input point.
pub const ZERO_TIME: Timestamp = i64::MIN;

/// A value type that can flow through point iterators.
///
/// Supplies the total ordering used by value sorts, selection heaps, and
/// tie-breaking. Floats order via `total_cmp` so NaN values sort
/// deterministically instead of poisoning comparisons.
pub trait PointValue: Clone + PartialEq + fmt::Debug + Send + 'static {
    fn cmp_values(&self, other: &Self) -> Ordering;

    /// Name of the concrete type, used in dispatch error messages.
    fn type_name() -> &'static str;
}

impl PointValue for f64 {
    fn cmp_values(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn type_name() -> &'static str {
        "float"
    }
}

impl PointValue for i64 {
    fn cmp_values(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn type_name() -> &'static str {
        "integer"
    }
}

impl PointValue for String {
    fn cmp_values(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn type_name() -> &'static str {
        "string"
    }
}

impl PointValue for bool {
    fn cmp_values(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn type_name() -> &'static str {
        "boolean"
    }
}

/// Numeric point values, used by arithmetic reducers (count, sum,
/// derivative).
pub trait Numeric: PointValue {
    fn zero() -> Self;
    fn one() -> Self;
    fn add(&self, other: &Self) -> Self;
    fn as_f64(&self) -> f64;
}

impl Numeric for f64 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn as_f64(&self) -> f64 {
        *self
    }
}

impl Numeric for i64 {
    fn zero() -> Self {
        0
    }

    fn one() -> Self {
        1
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn as_f64(&self) -> f64 {
        *self as f64
    }
}

/// A single timestamped value with its series context.
#[derive(Debug, Clone, PartialEq)]
pub struct Point<V: PointValue> {
    /// Source measurement/series name
    pub name: String,
    /// Nanosecond epoch timestamp
    pub time: Timestamp,
    /// The point's primary value; meaningless when `is_nil` is set
    pub value: V,
    /// Tags identifying the series, already in canonical order
    pub tags: Tags,
    /// Auxiliary projected columns carried alongside the value
    pub aux: Vec<FieldValue>,
    /// How many raw points have been folded into this point
    pub aggregated: u64,
    /// Marks "no value for this window"; still carries a valid time
    pub is_nil: bool,
}

/// A point carrying a 64-bit float value
pub type FloatPoint = Point<f64>;
/// A point carrying a 64-bit signed integer value
pub type IntegerPoint = Point<i64>;
/// A point carrying a string value
pub type StringPoint = Point<String>;
/// A point carrying a boolean value
pub type BooleanPoint = Point<bool>;

impl<V: PointValue> Point<V> {
    /// Create a point with the given name, time, and value
    pub fn new(name: impl Into<String>, time: Timestamp, value: V) -> Self {
        Self {
            name: name.into(),
            time,
            value,
            tags: Tags::new(),
            aux: Vec::new(),
            aggregated: 0,
            is_nil: false,
        }
    }

    /// Attach tags
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Attach auxiliary projected fields
    pub fn with_aux(mut self, aux: Vec<FieldValue>) -> Self {
        self.aux = aux;
        self
    }
}

impl<V: PointValue + Default> Point<V> {
    /// Create a nil point at the given time.
    ///
    /// Nil points are an output marker only: they carry a valid time so
    /// they sort correctly with regular points, but no meaningful value
    /// or aux fields. They must never be fed back into a reducer.
    pub fn nil_at(time: Timestamp) -> Self {
        Self {
            name: String::new(),
            time,
            value: V::default(),
            tags: Tags::new(),
            aux: Vec::new(),
            aggregated: 0,
            is_nil: true,
        }
    }
}

/// Sort points ascending by time. Stable, so points with equal timestamps
/// keep their relative order.
pub fn sort_points_by_time<V: PointValue>(points: &mut [Point<V>]) {
    points.sort_by_key(|p| p.time);
}

/// Sort points ascending by value, then by time for equal values.
pub fn sort_points_by_value<V: PointValue>(points: &mut [Point<V>]) {
    points.sort_by(|a, b| {
        a.value
            .cmp_values(&b.value)
            .then_with(|| a.time.cmp(&b.time))
    });
}
