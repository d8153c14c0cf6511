//! Chrona Query - Streaming aggregation engine for time series data
//!
//! This crate provides the query execution core:
//! - Typed point model and pull-based iterators
//! - Time window computation and tag grouping
//! - Streaming and window-buffering reduction engines
//! - Aggregate, selector, and transformation functions
//! - Call dispatch with construction-time type checking

pub mod call;
pub mod error;
pub mod functions;
pub mod iterator;
pub mod point;
pub mod reduce;
pub mod selector;
pub mod window;

pub use call::{new_call_iterator, AggregateCall};
pub use error::{QueryError, Result};
pub use iterator::{BoxedIterator, BufIterator, PointIterator, TypedIterator, VecIterator};
pub use point::{BooleanPoint, FloatPoint, IntegerPoint, Point, PointValue, StringPoint};
pub use reduce::{ReduceIterator, SliceReduceIterator, SliceReducer};
pub use window::{Interval, IteratorOptions, ReduceOptions};
