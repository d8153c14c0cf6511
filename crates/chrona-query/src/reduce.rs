//! Window reduction engines.
//!
//! Two engines drive every aggregate function:
//!
//! - [`ReduceIterator`] streams a pairwise reducer across each window,
//!   holding one accumulator point per tag group (O(1) memory per group).
//! - [`SliceReduceIterator`] buffers one window's points per tag group and
//!   hands the whole slice to the reducer at once, for aggregates that
//!   cannot be computed incrementally.
//!
//! Both group points by `name + NUL + subset-tags id`, buffer the per-group
//! results in reverse lexicographic key order, and pop results from the
//! back of the buffer on `next()`. This exact ordering is an output
//! compatibility contract, not an implementation detail.

use crate::error::Result;
use crate::iterator::{BoxedIterator, BufIterator, PointIterator};
use crate::point::{Point, PointValue, ZERO_TIME};
use crate::window::{IteratorOptions, ReduceOptions};
use chrona_core::{FieldValue, Tags, Timestamp};
use std::collections::BTreeMap;
use tracing::trace;

/// A pairwise reducer: combines the running accumulator (`None` on the
/// first point of a group) with the next raw point, returning the updated
/// time, value, and aux fields. Returning [`ZERO_TIME`] skips emission for
/// this input point.
pub type ReduceFn<V, O> =
    fn(Option<&Point<O>>, &Point<V>, &ReduceOptions) -> (Timestamp, O, Vec<FieldValue>);

/// Composite group key: measurement name and canonical subset-tags id,
/// NUL-separated so names cannot collide with tag content.
fn group_key(name: &str, tags: &Tags) -> String {
    format!("{}\0{}", name, tags.id())
}

/// Streams a pairwise reducer across windows, one output point per tag
/// group per window, stamped with the window start time.
pub struct ReduceIterator<V: PointValue, O: PointValue> {
    input: BufIterator<V>,
    f: ReduceFn<V, O>,
    opt: IteratorOptions,
    points: Vec<Point<O>>,
}

impl<V: PointValue, O: PointValue> ReduceIterator<V, O> {
    pub fn new(input: BoxedIterator<V>, f: ReduceFn<V, O>, opt: IteratorOptions) -> Self {
        Self {
            input: BufIterator::new(input),
            f,
            opt,
            points: Vec::new(),
        }
    }

    /// Run the reducer over every point in the next window. The previous
    /// accumulator for each group is passed back into the reducer.
    fn reduce(&mut self) -> Vec<Point<O>> {
        let Some(t) = self.input.peek_time() else {
            return Vec::new();
        };
        let (start_time, end_time) = self.opt.window(t);
        trace!(start_time, end_time, "reducing window");

        let reduce_options = ReduceOptions {
            start_time,
            end_time,
        };

        // One accumulator point per group.
        let mut m: BTreeMap<String, Point<O>> = BTreeMap::new();
        while let Some(curr) = self.input.next_in_window(start_time, end_time) {
            if curr.is_nil {
                continue;
            }
            let tags = curr.tags.subset(&self.opt.dimensions);
            let id = group_key(&curr.name, &tags);

            let (time, value, aux) = (self.f)(m.get(&id), &curr, &reduce_options);
            if time == ZERO_TIME {
                continue;
            }

            match m.get_mut(&id) {
                Some(prev) => {
                    prev.time = time;
                    prev.value = value;
                    prev.aux = aux;
                    prev.aggregated += 1;
                }
                None => {
                    m.insert(
                        id,
                        Point {
                            name: curr.name.clone(),
                            time,
                            value,
                            tags,
                            aux,
                            aggregated: 1,
                            is_nil: false,
                        },
                    );
                }
            }
        }

        // Buffer groups in reverse key order; next() pops from the back.
        let mut a: Vec<Point<O>> = m.into_values().rev().collect();
        for p in &mut a {
            p.time = start_time;
        }
        a
    }
}

impl<V: PointValue, O: PointValue> PointIterator<O> for ReduceIterator<V, O> {
    fn next(&mut self) -> Option<Point<O>> {
        if self.points.is_empty() {
            self.points = self.reduce();
            if self.points.is_empty() {
                return None;
            }
        }
        self.points.pop()
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

/// A slice reducer receives the entire set of points for one window and
/// one tag group at once, and may emit any number of result points.
///
/// Implemented by plain closures via the blanket impl; reducers that carry
/// state across windows (derivative) implement it on an explicit state
/// struct instead.
pub trait SliceReducer<V: PointValue, O: PointValue>: Send {
    fn reduce(&mut self, points: Vec<Point<V>>, opt: &ReduceOptions) -> Vec<Point<O>>;
}

impl<V, O, F> SliceReducer<V, O> for F
where
    V: PointValue,
    O: PointValue,
    F: FnMut(Vec<Point<V>>, &ReduceOptions) -> Vec<Point<O>> + Send,
{
    fn reduce(&mut self, points: Vec<Point<V>>, opt: &ReduceOptions) -> Vec<Point<O>> {
        self(points, opt)
    }
}

/// Buffers one window per tag group and runs a slice reducer over each
/// group. Groups may emit multiple points (distinct, derivative, top);
/// each group's result is reversed in place before buffering so the final
/// popped order is forward within a group.
pub struct SliceReduceIterator<V: PointValue, O: PointValue> {
    input: BufIterator<V>,
    f: Box<dyn SliceReducer<V, O>>,
    opt: IteratorOptions,
    points: Vec<Point<O>>,
}

impl<V: PointValue, O: PointValue> SliceReduceIterator<V, O> {
    pub fn new(
        input: BoxedIterator<V>,
        f: Box<dyn SliceReducer<V, O>>,
        opt: IteratorOptions,
    ) -> Self {
        Self {
            input: BufIterator::new(input),
            f,
            opt,
            points: Vec::new(),
        }
    }

    fn reduce(&mut self) -> Vec<Point<O>> {
        let Some(t) = self.input.peek_time() else {
            return Vec::new();
        };
        let (start_time, end_time) = self.opt.window(t);
        trace!(start_time, end_time, "buffering window");

        let reduce_options = ReduceOptions {
            start_time,
            end_time,
        };

        // Buffer the whole window, grouped by name and subset tags.
        struct Group<V: PointValue> {
            name: String,
            tags: Tags,
            points: Vec<Point<V>>,
        }
        let mut groups: BTreeMap<String, Group<V>> = BTreeMap::new();
        while let Some(p) = self.input.next_in_window(start_time, end_time) {
            let tags = p.tags.subset(&self.opt.dimensions);
            let id = group_key(&p.name, &tags);
            groups
                .entry(id)
                .or_insert_with(|| Group {
                    name: p.name.clone(),
                    tags,
                    points: Vec::new(),
                })
                .points
                .push(p);
        }

        // Reduce each group, restamp series identity on the results, and
        // buffer groups in reverse key order with each group's points
        // reversed so popping yields forward order within a group.
        let mut a: Vec<Point<O>> = Vec::new();
        for (_, group) in groups.into_iter().rev() {
            let mut result = self.f.reduce(group.points, &reduce_options);
            if result.is_empty() {
                continue;
            }
            for p in &mut result {
                p.name = group.name.clone();
                p.tags = group.tags.clone();
            }
            a.extend(result.into_iter().rev());
        }
        a
    }
}

impl<V: PointValue, O: PointValue> PointIterator<O> for SliceReduceIterator<V, O> {
    fn next(&mut self) -> Option<Point<O>> {
        if self.points.is_empty() {
            self.points = self.reduce();
            if self.points.is_empty() {
                return None;
            }
        }
        self.points.pop()
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::count_reduce;
    use crate::iterator::VecIterator;
    use crate::point::FloatPoint;
    use crate::window::Interval;
    use chrona_core::TimeRange;

    fn tagged(name: &str, time: i64, value: f64, host: &str) -> FloatPoint {
        FloatPoint::new(name, time, value).with_tags(Tags::from_pairs([("host", host)]))
    }

    fn grouped_opts(duration: i64) -> IteratorOptions {
        IteratorOptions {
            dimensions: vec!["host".to_string()],
            interval: Interval::new(duration),
            time_range: TimeRange::new(0, 100),
        }
    }

    #[test]
    fn test_streaming_reduce_counts_per_group() {
        let points = vec![
            tagged("cpu", 1, 10.0, "a"),
            tagged("cpu", 2, 20.0, "b"),
            tagged("cpu", 3, 30.0, "a"),
        ];
        let mut itr = ReduceIterator::new(
            Box::new(VecIterator::new(points)),
            count_reduce::<f64>,
            grouped_opts(0),
        );

        // Groups are popped in ascending key order, host=a before host=b.
        let p = itr.next().unwrap();
        assert_eq!(p.tags.get("host"), Some("a"));
        assert_eq!(p.value, 2.0);
        assert_eq!(p.time, 0);
        assert_eq!(p.aggregated, 2);

        let p = itr.next().unwrap();
        assert_eq!(p.tags.get("host"), Some("b"));
        assert_eq!(p.value, 1.0);

        assert!(itr.next().is_none());
    }

    #[test]
    fn test_streaming_reduce_windows_advance() {
        let points = vec![
            FloatPoint::new("cpu", 5, 1.0),
            FloatPoint::new("cpu", 15, 1.0),
            FloatPoint::new("cpu", 16, 1.0),
        ];
        let mut itr = ReduceIterator::new(
            Box::new(VecIterator::new(points)),
            count_reduce::<f64>,
            IteratorOptions {
                dimensions: vec![],
                interval: Interval::new(10),
                time_range: TimeRange::new(0, 100),
            },
        );

        let p = itr.next().unwrap();
        assert_eq!((p.time, p.value), (0, 1.0));
        let p = itr.next().unwrap();
        assert_eq!((p.time, p.value), (10, 2.0));
        assert!(itr.next().is_none());
    }

    #[test]
    fn test_streaming_reduce_skips_nil_points() {
        let points = vec![
            FloatPoint::new("cpu", 1, 1.0),
            FloatPoint::nil_at(2),
            FloatPoint::new("cpu", 3, 1.0),
        ];
        let mut itr = ReduceIterator::new(
            Box::new(VecIterator::new(points)),
            count_reduce::<f64>,
            grouped_opts(0),
        );

        // The nil point lands in its own (empty-name) group but is never
        // folded; only the two real points count.
        let counts: Vec<f64> = std::iter::from_fn(|| itr.next()).map(|p| p.value).collect();
        assert_eq!(counts, vec![2.0]);
    }

    #[test]
    fn test_slice_reduce_group_ordering_and_multi_point_results() {
        // A reducer that echoes its input identifies the buffered order.
        let echo = |points: Vec<FloatPoint>, _opt: &ReduceOptions| points;

        let points = vec![
            tagged("cpu", 1, 1.0, "b"),
            tagged("cpu", 2, 2.0, "a"),
            tagged("cpu", 3, 3.0, "a"),
        ];
        let mut itr = SliceReduceIterator::new(
            Box::new(VecIterator::new(points)),
            Box::new(echo),
            grouped_opts(0),
        );

        // host=a points come out first, in forward order, then host=b.
        let seen: Vec<(Option<String>, f64)> = std::iter::from_fn(|| itr.next())
            .map(|p| (p.tags.get("host").map(str::to_string), p.value))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Some("a".to_string()), 2.0),
                (Some("a".to_string()), 3.0),
                (Some("b".to_string()), 1.0),
            ]
        );
    }

    #[test]
    fn test_slice_reduce_restamps_series_identity() {
        // Reducers emit bare points; the engine restores name and tags.
        let one = |_points: Vec<FloatPoint>, opt: &ReduceOptions| {
            vec![FloatPoint::new("", opt.start_time, 9.0)]
        };

        let points = vec![tagged("cpu", 1, 1.0, "a")];
        let mut itr = SliceReduceIterator::new(
            Box::new(VecIterator::new(points)),
            Box::new(one),
            grouped_opts(0),
        );

        let p = itr.next().unwrap();
        assert_eq!(p.name, "cpu");
        assert_eq!(p.tags.get("host"), Some("a"));
        assert_eq!(p.value, 9.0);
    }
}
