//! Pull-based point iterators.
//!
//! Iteration is strictly forward and single-pass: callers that need more
//! than one look at a window buffer explicitly (slice reducers do exactly
//! that). `close()` releases the resources of the whole chain and must be
//! propagated to the wrapped input on every exit path.

use crate::error::Result;
use crate::point::{BooleanPoint, FloatPoint, IntegerPoint, Point, PointValue, StringPoint};
use chrona_core::Timestamp;

/// A pull-based, single-pass sequence of typed points.
pub trait PointIterator<V: PointValue>: Send {
    /// Return the next point, or `None` when the stream is exhausted.
    fn next(&mut self) -> Option<Point<V>>;

    /// Release resources held by this iterator and its inputs.
    fn close(&mut self) -> Result<()>;
}

/// Boxed iterator, the form iterators take across the planner boundary.
pub type BoxedIterator<V> = Box<dyn PointIterator<V>>;

/// A concrete-typed iterator handed across the planner boundary.
///
/// The call dispatcher matches on this to pick the reducer implementation
/// for the input's value type.
pub enum TypedIterator {
    Float(BoxedIterator<f64>),
    Integer(BoxedIterator<i64>),
    String(BoxedIterator<String>),
    Boolean(BoxedIterator<bool>),
}

impl std::fmt::Debug for TypedIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypedIterator").field(&self.type_name()).finish()
    }
}

impl TypedIterator {
    /// Name of the concrete element type, used in dispatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedIterator::Float(_) => "float",
            TypedIterator::Integer(_) => "integer",
            TypedIterator::String(_) => "string",
            TypedIterator::Boolean(_) => "boolean",
        }
    }

    /// Close the underlying iterator.
    pub fn close(&mut self) -> Result<()> {
        match self {
            TypedIterator::Float(itr) => itr.close(),
            TypedIterator::Integer(itr) => itr.close(),
            TypedIterator::String(itr) => itr.close(),
            TypedIterator::Boolean(itr) => itr.close(),
        }
    }

    /// Unwrap a float iterator; panics on other variants. Test helper.
    #[cfg(test)]
    pub fn unwrap_float(self) -> BoxedIterator<f64> {
        match self {
            TypedIterator::Float(itr) => itr,
            other => panic!("expected float iterator, got {}", other.type_name()),
        }
    }

    /// Unwrap an integer iterator; panics on other variants. Test helper.
    #[cfg(test)]
    pub fn unwrap_integer(self) -> BoxedIterator<i64> {
        match self {
            TypedIterator::Integer(itr) => itr,
            other => panic!("expected integer iterator, got {}", other.type_name()),
        }
    }
}

impl From<BoxedIterator<f64>> for TypedIterator {
    fn from(itr: BoxedIterator<f64>) -> Self {
        TypedIterator::Float(itr)
    }
}

impl From<BoxedIterator<i64>> for TypedIterator {
    fn from(itr: BoxedIterator<i64>) -> Self {
        TypedIterator::Integer(itr)
    }
}

impl From<BoxedIterator<String>> for TypedIterator {
    fn from(itr: BoxedIterator<String>) -> Self {
        TypedIterator::String(itr)
    }
}

impl From<BoxedIterator<bool>> for TypedIterator {
    fn from(itr: BoxedIterator<bool>) -> Self {
        TypedIterator::Boolean(itr)
    }
}

/// Vector-backed point source.
///
/// The storage engine is the real producer of raw points; this source seeds
/// iterator chains at the planner boundary and in tests. Points must
/// already be sorted ascending by time, the engine does not re-sort input.
pub struct VecIterator<V: PointValue> {
    points: std::vec::IntoIter<Point<V>>,
}

impl<V: PointValue> VecIterator<V> {
    pub fn new(points: Vec<Point<V>>) -> Self {
        Self {
            points: points.into_iter(),
        }
    }
}

impl<V: PointValue> PointIterator<V> for VecIterator<V> {
    fn next(&mut self) -> Option<Point<V>> {
        self.points.next()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Convenience constructors for typed vector sources.
impl TypedIterator {
    pub fn from_float_points(points: Vec<FloatPoint>) -> Self {
        TypedIterator::Float(Box::new(VecIterator::new(points)))
    }

    pub fn from_integer_points(points: Vec<IntegerPoint>) -> Self {
        TypedIterator::Integer(Box::new(VecIterator::new(points)))
    }

    pub fn from_string_points(points: Vec<StringPoint>) -> Self {
        TypedIterator::String(Box::new(VecIterator::new(points)))
    }

    pub fn from_boolean_points(points: Vec<BooleanPoint>) -> Self {
        TypedIterator::Boolean(Box::new(VecIterator::new(points)))
    }
}

/// Adds one-element lookahead and window-bounded consumption on top of a
/// raw iterator. Every windowed reducer consumes its input through this.
pub struct BufIterator<V: PointValue> {
    input: BoxedIterator<V>,
    buf: Option<Point<V>>,
}

impl<V: PointValue> BufIterator<V> {
    pub fn new(input: BoxedIterator<V>) -> Self {
        Self { input, buf: None }
    }

    /// Timestamp of the next unread point, without consuming it.
    /// `None` means no more data: no further windows exist.
    pub fn peek_time(&mut self) -> Option<Timestamp> {
        if self.buf.is_none() {
            self.buf = self.input.next();
        }
        self.buf.as_ref().map(|p| p.time)
    }

    /// Consume and return the next point, from the buffer first.
    pub fn next(&mut self) -> Option<Point<V>> {
        self.buf.take().or_else(|| self.input.next())
    }

    /// Push a point back; it becomes the next point returned.
    fn unread(&mut self, point: Point<V>) {
        debug_assert!(self.buf.is_none());
        self.buf = Some(point);
    }

    /// Consume and return the next point only if its timestamp falls in
    /// `[start, end)`. A point outside the window is held back for the
    /// next window and `None` is returned, signaling window exhaustion.
    pub fn next_in_window(&mut self, start: Timestamp, end: Timestamp) -> Option<Point<V>> {
        let point = self.next()?;
        if point.time < start || point.time >= end {
            self.unread(point);
            return None;
        }
        Some(point)
    }

    /// Close the wrapped input.
    pub fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}
