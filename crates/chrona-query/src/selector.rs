//! Exact top-N / bottom-N selection within a window.
//!
//! Selection optionally collapses the window to one point per unique
//! combination of caller-specified aux columns, then pops the most extreme
//! points off a binary heap whose ordering captures the value-then-time
//! tie-break rule.

use crate::point::{sort_points_by_time, Point, PointValue};
use crate::reduce::SliceReducer;
use crate::window::{Interval, ReduceOptions};
use fxhash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap ordering for `top`: greater values first, ties broken by the
/// earliest time.
struct TopOrd<V: PointValue>(Point<V>);

impl<V: PointValue> PartialEq for TopOrd<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V: PointValue> Eq for TopOrd<V> {}

impl<V: PointValue> PartialOrd for TopOrd<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: PointValue> Ord for TopOrd<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.value.cmp_values(&other.0.value) {
            // Earlier time wins the tie, so it must rank higher.
            Ordering::Equal => other.0.time.cmp(&self.0.time),
            ord => ord,
        }
    }
}

/// Heap ordering for `bottom`: smaller values first, ties broken by the
/// earliest time.
struct BottomOrd<V: PointValue>(Point<V>);

impl<V: PointValue> PartialEq for BottomOrd<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V: PointValue> Eq for BottomOrd<V> {}

impl<V: PointValue> PartialOrd for BottomOrd<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: PointValue> Ord for BottomOrd<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.0.value.cmp_values(&self.0.value) {
            Ordering::Equal => other.0.time.cmp(&self.0.time),
            ord => ord,
        }
    }
}

/// Collapse the point set to one point per unique combination of the aux
/// columns at `tag_indices`, keeping whichever point `prefer` favors.
fn filter_by_unique_tags<V, F>(a: Vec<Point<V>>, tag_indices: &[usize], prefer: F) -> Vec<Point<V>>
where
    V: PointValue,
    F: Fn(&Point<V>, &Point<V>) -> bool,
{
    let mut m: FxHashMap<String, Point<V>> = FxHashMap::default();
    for p in a {
        let mut key = String::new();
        for (i, &index) in tag_indices.iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            if let Some(v) = p.aux.get(index) {
                key.push_str(&v.to_string());
            }
        }

        match m.get_mut(&key) {
            Some(cur) => {
                if prefer(cur, &p) {
                    *cur = p;
                }
            }
            None => {
                m.insert(key, p);
            }
        }
    }
    m.into_values().collect()
}

/// Stamp or sort the popped points depending on whether time grouping is
/// in effect: a grouped aggregate collapses to the window start, a raw
/// selection stays an ordered subsequence of the original series.
fn finish_selection<V: PointValue>(
    mut points: Vec<Point<V>>,
    interval: Interval,
    opt: &ReduceOptions,
) -> Vec<Point<V>> {
    if !interval.is_zero() {
        for p in &mut points {
            p.time = opt.start_time;
        }
    } else {
        sort_points_by_time(&mut points);
    }
    points
}

/// The `top(n)` slice reducer: the n greatest values in the window, ties
/// broken by the earliest time.
pub fn top_reducer<V: PointValue>(
    n: usize,
    tags: Option<Vec<usize>>,
    interval: Interval,
) -> impl SliceReducer<V, V> {
    move |a: Vec<Point<V>>, opt: &ReduceOptions| {
        let a = match &tags {
            Some(indices) => filter_by_unique_tags(a, indices, |cur, p| {
                p.value.cmp_values(&cur.value) == Ordering::Greater
                    || (p.value == cur.value && p.time < cur.time)
            }),
            None => a,
        };

        let size = n.min(a.len());
        let mut heap: BinaryHeap<TopOrd<V>> = a.into_iter().map(TopOrd).collect();

        let mut points = Vec::with_capacity(size);
        while points.len() < size {
            let Some(TopOrd(p)) = heap.pop() else { break };
            points.push(p);
        }
        finish_selection(points, interval, opt)
    }
}

/// The `bottom(n)` slice reducer: the n smallest values in the window,
/// ties broken by the earliest time.
pub fn bottom_reducer<V: PointValue>(
    n: usize,
    tags: Option<Vec<usize>>,
    interval: Interval,
) -> impl SliceReducer<V, V> {
    move |a: Vec<Point<V>>, opt: &ReduceOptions| {
        let a = match &tags {
            Some(indices) => filter_by_unique_tags(a, indices, |cur, p| {
                p.value.cmp_values(&cur.value) == Ordering::Less
                    || (p.value == cur.value && p.time < cur.time)
            }),
            None => a,
        };

        let size = n.min(a.len());
        let mut heap: BinaryHeap<BottomOrd<V>> = a.into_iter().map(BottomOrd).collect();

        let mut points = Vec::with_capacity(size);
        while points.len() < size {
            let Some(BottomOrd(p)) = heap.pop() else { break };
            points.push(p);
        }
        finish_selection(points, interval, opt)
    }
}
