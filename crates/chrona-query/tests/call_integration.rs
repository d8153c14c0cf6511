use chrona_core::{Tags, TimeRange};
use chrona_query::{
    new_call_iterator, AggregateCall, FloatPoint, IntegerPoint, Interval, IteratorOptions,
    QueryError, StringPoint, TypedIterator,
};

fn fp(time: i64, value: f64) -> FloatPoint {
    FloatPoint::new("cpu", time, value)
}

fn ip(time: i64, value: i64) -> IntegerPoint {
    IntegerPoint::new("cpu", time, value)
}

fn hosted(time: i64, value: f64, host: &str) -> FloatPoint {
    fp(time, value).with_tags(Tags::from_pairs([("host", host)]))
}

fn raw_opts() -> IteratorOptions {
    IteratorOptions {
        dimensions: vec![],
        interval: Interval::default(),
        time_range: TimeRange::new(0, 1_000),
    }
}

fn windowed_opts(duration: i64) -> IteratorOptions {
    IteratorOptions {
        dimensions: vec!["host".to_string()],
        interval: Interval::new(duration),
        time_range: TimeRange::new(0, 1_000),
    }
}

fn drain_float(itr: TypedIterator) -> Vec<FloatPoint> {
    match itr {
        TypedIterator::Float(mut itr) => {
            let mut out = Vec::new();
            while let Some(p) = itr.next() {
                out.push(p);
            }
            itr.close().unwrap();
            out
        }
        other => panic!("expected float iterator, got {}", other.type_name()),
    }
}

fn drain_integer(itr: TypedIterator) -> Vec<IntegerPoint> {
    match itr {
        TypedIterator::Integer(mut itr) => {
            let mut out = Vec::new();
            while let Some(p) = itr.next() {
                out.push(p);
            }
            itr.close().unwrap();
            out
        }
        other => panic!("expected integer iterator, got {}", other.type_name()),
    }
}

#[test]
fn top_without_interval_is_an_ordered_subsequence() {
    let input =
        TypedIterator::from_float_points(vec![fp(0, 5.0), fp(10, 1.0), fp(20, 9.0), fp(30, 3.0)]);
    let out = drain_float(
        new_call_iterator(input, &AggregateCall::Top { n: 2, tags: None }, raw_opts()).unwrap(),
    );

    let seen: Vec<(i64, f64)> = out.iter().map(|p| (p.time, p.value)).collect();
    assert_eq!(seen, vec![(0, 5.0), (20, 9.0)]);
}

#[test]
fn bottom_with_interval_stamps_window_starts() {
    let points = vec![fp(1, 5.0), fp(2, 1.0), fp(11, 9.0), fp(12, 3.0)];
    let input = TypedIterator::from_float_points(points);
    let out = drain_float(
        new_call_iterator(
            input,
            &AggregateCall::Bottom { n: 1, tags: None },
            windowed_opts(10),
        )
        .unwrap(),
    );

    let seen: Vec<(i64, f64)> = out.iter().map(|p| (p.time, p.value)).collect();
    assert_eq!(seen, vec![(0, 1.0), (10, 3.0)]);
}

#[test]
fn percentile_fifty_matches_median_on_odd_windows() {
    // For odd-length windows with no duplicate values, the nearest-rank
    // 50th percentile picks exactly the median element.
    let values = [7.0, 1.0, 9.0, 4.0, 3.0];
    let points: Vec<FloatPoint> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| fp(i as i64, v))
        .collect();

    let median = drain_float(
        new_call_iterator(
            TypedIterator::from_float_points(points.clone()),
            &AggregateCall::Median,
            raw_opts(),
        )
        .unwrap(),
    );
    let pct = drain_float(
        new_call_iterator(
            TypedIterator::from_float_points(points),
            &AggregateCall::Percentile { percentile: 50.0 },
            raw_opts(),
        )
        .unwrap(),
    );

    assert_eq!(median.len(), 1);
    assert_eq!(median[0].value, 4.0);
    assert_eq!(pct[0].value, median[0].value);
}

#[test]
fn grouped_windowed_count_orders_windows_then_groups() {
    let points = vec![
        hosted(1, 1.0, "b"),
        hosted(2, 1.0, "a"),
        hosted(3, 1.0, "a"),
        hosted(11, 1.0, "b"),
        hosted(12, 1.0, "a"),
    ];
    let input = TypedIterator::from_float_points(points);
    let out = drain_float(
        new_call_iterator(input, &AggregateCall::Count, windowed_opts(10)).unwrap(),
    );

    let seen: Vec<(i64, &str, f64)> = out
        .iter()
        .map(|p| (p.time, p.tags.get("host").unwrap(), p.value))
        .collect();
    // Windows come out in time order; within a window, groups come out in
    // ascending tag order.
    assert_eq!(
        seen,
        vec![
            (0, "a", 2.0),
            (0, "b", 1.0),
            (10, "a", 1.0),
            (10, "b", 1.0),
        ]
    );
}

#[test]
fn mean_over_integers_produces_float_output() {
    let input = TypedIterator::from_integer_points(vec![ip(1, 1), ip(2, 2), ip(3, 4)]);
    let out = new_call_iterator(input, &AggregateCall::Mean, raw_opts()).unwrap();
    assert_eq!(out.type_name(), "float");

    let points = drain_float(out);
    assert_eq!(points.len(), 1);
    assert!((points[0].value - 7.0 / 3.0).abs() < 1e-12);
}

#[test]
fn distinct_sorts_by_value_within_each_window() {
    let input = TypedIterator::from_integer_points(vec![ip(0, 9), ip(1, 2), ip(2, 9), ip(3, 5)]);
    let out = drain_integer(
        new_call_iterator(input, &AggregateCall::Distinct, raw_opts()).unwrap(),
    );

    let values: Vec<i64> = out.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![2, 5, 9]);
}

#[test]
fn derivative_carries_state_across_windows() {
    let points = vec![ip(0, 10), ip(5, 20), ip(10, 30), ip(15, 45)];
    let input = TypedIterator::from_integer_points(points);
    let out = drain_float(
        new_call_iterator(
            input,
            &AggregateCall::Derivative {
                interval: 5,
                non_negative: false,
            },
            IteratorOptions {
                dimensions: vec![],
                interval: Interval::new(10),
                time_range: TimeRange::new(0, 1_000),
            },
        )
        .unwrap(),
    );

    // First window emits 10 -> 20 over one interval. In the second window
    // the first point stands in for the carried state and is skipped, so
    // the only pair is carried (t=5, v=20) -> (t=15, v=45): 25 over two
    // intervals of elapsed time.
    let seen: Vec<(i64, f64)> = out.iter().map(|p| (p.time, p.value)).collect();
    assert_eq!(seen, vec![(5, 10.0), (15, 12.5)]);
}

#[test]
fn top_with_tag_collapse_keeps_one_point_per_host() {
    use chrona_core::FieldValue;

    let with_host_aux = |time: i64, value: f64, host: &str| {
        fp(time, value).with_aux(vec![FieldValue::String(host.to_string())])
    };
    let points = vec![
        with_host_aux(0, 5.0, "a"),
        with_host_aux(10, 8.0, "a"),
        with_host_aux(20, 3.0, "b"),
    ];
    let input = TypedIterator::from_float_points(points);
    let out = drain_float(
        new_call_iterator(
            input,
            &AggregateCall::Top {
                n: 3,
                tags: Some(vec![0]),
            },
            raw_opts(),
        )
        .unwrap(),
    );

    let seen: Vec<(i64, f64)> = out.iter().map(|p| (p.time, p.value)).collect();
    assert_eq!(seen, vec![(10, 8.0), (20, 3.0)]);
}

#[test]
fn unsupported_combinations_fail_at_construction() {
    let input = TypedIterator::from_string_points(vec![StringPoint::new("m", 0, "x".to_string())]);
    let err = new_call_iterator(input, &AggregateCall::Sum, raw_opts()).unwrap_err();
    match err {
        QueryError::UnsupportedFunction { call, input } => {
            assert_eq!(call, "sum");
            assert_eq!(input, "string");
        }
        other => panic!("unexpected error: {other}"),
    }

    let input = TypedIterator::from_boolean_points(vec![]);
    assert!(new_call_iterator(input, &AggregateCall::Mean, raw_opts()).is_err());
}

#[test]
fn stddev_on_strings_is_supported_but_constant() {
    let points = vec![
        StringPoint::new("m", 0, "x".to_string()),
        StringPoint::new("m", 1, "y".to_string()),
    ];
    let input = TypedIterator::from_string_points(points);
    let mut out = match new_call_iterator(input, &AggregateCall::Stddev, raw_opts()).unwrap() {
        TypedIterator::String(itr) => itr,
        other => panic!("expected string iterator, got {}", other.type_name()),
    };

    let p = out.next().unwrap();
    assert_eq!(p.value, "");
    assert!(out.next().is_none());
}

#[test]
fn closing_the_chain_reaches_the_source() {
    use chrona_query::{PointIterator, Result};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Tracked {
        closed: Arc<AtomicBool>,
    }

    impl PointIterator<f64> for Tracked {
        fn next(&mut self) -> Option<FloatPoint> {
            None
        }

        fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    let closed = Arc::new(AtomicBool::new(false));
    let input = TypedIterator::Float(Box::new(Tracked {
        closed: closed.clone(),
    }));
    let mut out = new_call_iterator(input, &AggregateCall::Sum, raw_opts()).unwrap();
    out.close().unwrap();
    assert!(closed.load(Ordering::SeqCst));
}
