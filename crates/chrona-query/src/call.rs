//! Aggregate call dispatch.
//!
//! [`new_call_iterator`] is the engine's entry point: given a typed raw
//! iterator, a call description, and the iterator options, it builds the
//! iterator chain implementing that aggregate. Every (call, input type)
//! combination not explicitly supported fails here, at construction time,
//! so planning errors surface before any point is pulled.

use crate::error::{QueryError, Result};
use crate::functions::{
    count_reduce, first_reduce, float_distinct_reduce, float_mean_reduce, float_median_reduce,
    float_percentile_reducer, float_spread_reduce, float_stddev_reduce, integer_distinct_reduce,
    integer_mean_reduce, integer_median_reduce, integer_percentile_reducer, integer_spread_reduce,
    integer_stddev_reduce, last_reduce, max_reduce, min_reduce, string_distinct_reduce,
    string_stddev_reduce, sum_reduce, DerivativeReducer,
};
use crate::iterator::TypedIterator;
use crate::reduce::{ReduceIterator, SliceReduceIterator};
use crate::selector::{bottom_reducer, top_reducer};
use crate::window::IteratorOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An aggregate function call with its argument literals, as resolved by
/// the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregateCall {
    Count,
    Min,
    Max,
    Sum,
    First,
    Last,
    Mean,
    Distinct,
    Median,
    Stddev,
    Spread,
    Percentile {
        percentile: f64,
    },
    Top {
        n: usize,
        /// Aux column indices whose unique combinations collapse the
        /// window before selection.
        tags: Option<Vec<usize>>,
    },
    Bottom {
        n: usize,
        tags: Option<Vec<usize>>,
    },
    Derivative {
        /// Normalization interval in nanoseconds.
        interval: i64,
        non_negative: bool,
    },
}

impl AggregateCall {
    /// The function name, as it appears in queries and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            AggregateCall::Count => "count",
            AggregateCall::Min => "min",
            AggregateCall::Max => "max",
            AggregateCall::Sum => "sum",
            AggregateCall::First => "first",
            AggregateCall::Last => "last",
            AggregateCall::Mean => "mean",
            AggregateCall::Distinct => "distinct",
            AggregateCall::Median => "median",
            AggregateCall::Stddev => "stddev",
            AggregateCall::Spread => "spread",
            AggregateCall::Percentile { .. } => "percentile",
            AggregateCall::Top { .. } => "top",
            AggregateCall::Bottom { .. } => "bottom",
            AggregateCall::Derivative { .. } => "derivative",
        }
    }

    /// Parse an argument-free call from its name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "count" => Ok(AggregateCall::Count),
            "min" => Ok(AggregateCall::Min),
            "max" => Ok(AggregateCall::Max),
            "sum" => Ok(AggregateCall::Sum),
            "first" => Ok(AggregateCall::First),
            "last" => Ok(AggregateCall::Last),
            "mean" | "avg" | "average" => Ok(AggregateCall::Mean),
            "distinct" => Ok(AggregateCall::Distinct),
            "median" => Ok(AggregateCall::Median),
            "stddev" | "std_dev" => Ok(AggregateCall::Stddev),
            "spread" => Ok(AggregateCall::Spread),
            _ => Err(QueryError::UnsupportedCall {
                call: s.to_string(),
            }),
        }
    }

    /// Validate argument literals. Called by the dispatcher before any
    /// iterator is constructed.
    fn validate(&self) -> Result<()> {
        match self {
            AggregateCall::Top { n, .. } | AggregateCall::Bottom { n, .. } if *n == 0 => {
                Err(QueryError::InvalidArgument {
                    call: self.name().to_string(),
                    reason: "n must be at least 1".to_string(),
                })
            }
            AggregateCall::Derivative { interval, .. } if *interval <= 0 => {
                Err(QueryError::InvalidArgument {
                    call: self.name().to_string(),
                    reason: format!("interval must be positive, got {interval}"),
                })
            }
            _ => Ok(()),
        }
    }
}

fn unsupported(call: &AggregateCall, input: &TypedIterator) -> QueryError {
    QueryError::UnsupportedFunction {
        call: call.name().to_string(),
        input: input.type_name(),
    }
}

/// Build the iterator implementing `call` over `input`.
///
/// The returned iterator lazily computes one aggregate result per window
/// per tag group, pulling from `input` only as far as needed.
pub fn new_call_iterator(
    input: TypedIterator,
    call: &AggregateCall,
    opt: IteratorOptions,
) -> Result<TypedIterator> {
    debug!(
        call = call.name(),
        input = input.type_name(),
        "building call iterator"
    );
    call.validate()?;

    match call {
        AggregateCall::Count => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                count_reduce::<f64>,
                opt,
            )))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                ReduceIterator::new(itr, count_reduce::<i64>, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Min => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                min_reduce::<f64>,
                opt,
            )))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                ReduceIterator::new(itr, min_reduce::<i64>, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Max => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                max_reduce::<f64>,
                opt,
            )))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                ReduceIterator::new(itr, max_reduce::<i64>, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Sum => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                sum_reduce::<f64>,
                opt,
            )))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                ReduceIterator::new(itr, sum_reduce::<i64>, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::First => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                first_reduce::<f64>,
                opt,
            )))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                ReduceIterator::new(itr, first_reduce::<i64>, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Last => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                last_reduce::<f64>,
                opt,
            )))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                ReduceIterator::new(itr, last_reduce::<i64>, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Mean => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(ReduceIterator::new(
                itr,
                float_mean_reduce,
                opt,
            )))),
            // Integer input produces a float mean.
            TypedIterator::Integer(itr) => Ok(TypedIterator::Float(Box::new(
                ReduceIterator::new(itr, integer_mean_reduce, opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Distinct => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(float_distinct_reduce), opt),
            ))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                SliceReduceIterator::new(itr, Box::new(integer_distinct_reduce), opt),
            ))),
            TypedIterator::String(itr) => Ok(TypedIterator::String(Box::new(
                SliceReduceIterator::new(itr, Box::new(string_distinct_reduce), opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Median => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(float_median_reduce), opt),
            ))),
            // Integer input produces a float median.
            TypedIterator::Integer(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(integer_median_reduce), opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Stddev => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(float_stddev_reduce), opt),
            ))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(integer_stddev_reduce), opt),
            ))),
            TypedIterator::String(itr) => Ok(TypedIterator::String(Box::new(
                SliceReduceIterator::new(itr, Box::new(string_stddev_reduce), opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Spread => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(float_spread_reduce), opt),
            ))),
            TypedIterator::Integer(itr) => Ok(TypedIterator::Integer(Box::new(
                SliceReduceIterator::new(itr, Box::new(integer_spread_reduce), opt),
            ))),
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Percentile { percentile } => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(itr, Box::new(float_percentile_reducer(*percentile)), opt),
            ))),
            TypedIterator::Integer(itr) => {
                Ok(TypedIterator::Integer(Box::new(SliceReduceIterator::new(
                    itr,
                    Box::new(integer_percentile_reducer(*percentile)),
                    opt,
                ))))
            }
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Top { n, tags } => match input {
            TypedIterator::Float(itr) => {
                let f = top_reducer::<f64>(*n, tags.clone(), opt.interval);
                Ok(TypedIterator::Float(Box::new(SliceReduceIterator::new(
                    itr,
                    Box::new(f),
                    opt,
                ))))
            }
            TypedIterator::Integer(itr) => {
                let f = top_reducer::<i64>(*n, tags.clone(), opt.interval);
                Ok(TypedIterator::Integer(Box::new(SliceReduceIterator::new(
                    itr,
                    Box::new(f),
                    opt,
                ))))
            }
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Bottom { n, tags } => match input {
            TypedIterator::Float(itr) => {
                let f = bottom_reducer::<f64>(*n, tags.clone(), opt.interval);
                Ok(TypedIterator::Float(Box::new(SliceReduceIterator::new(
                    itr,
                    Box::new(f),
                    opt,
                ))))
            }
            TypedIterator::Integer(itr) => {
                let f = bottom_reducer::<i64>(*n, tags.clone(), opt.interval);
                Ok(TypedIterator::Integer(Box::new(SliceReduceIterator::new(
                    itr,
                    Box::new(f),
                    opt,
                ))))
            }
            other => Err(unsupported(call, &other)),
        },
        AggregateCall::Derivative {
            interval,
            non_negative,
        } => match input {
            TypedIterator::Float(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(
                    itr,
                    Box::new(DerivativeReducer::<f64>::new(*interval, *non_negative)),
                    opt,
                ),
            ))),
            // Integer input produces a float derivative.
            TypedIterator::Integer(itr) => Ok(TypedIterator::Float(Box::new(
                SliceReduceIterator::new(
                    itr,
                    Box::new(DerivativeReducer::<i64>::new(*interval, *non_negative)),
                    opt,
                ),
            ))),
            other => Err(unsupported(call, &other)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{BooleanPoint, FloatPoint, IntegerPoint, StringPoint};

    fn opt() -> IteratorOptions {
        IteratorOptions::default()
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(AggregateCall::parse("count").unwrap(), AggregateCall::Count);
        assert_eq!(AggregateCall::parse("SUM").unwrap(), AggregateCall::Sum);
        assert_eq!(AggregateCall::parse("avg").unwrap(), AggregateCall::Mean);
        assert_eq!(
            AggregateCall::parse("std_dev").unwrap(),
            AggregateCall::Stddev
        );
        assert!(matches!(
            AggregateCall::parse("explode"),
            Err(QueryError::UnsupportedCall { .. })
        ));
    }

    #[test]
    fn test_dispatch_rejects_unsupported_type_at_construction() {
        let input = TypedIterator::from_boolean_points(vec![BooleanPoint::new("m", 0, true)]);
        let err = new_call_iterator(input, &AggregateCall::Count, opt()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("count"), "message was: {msg}");
        assert!(msg.contains("boolean"), "message was: {msg}");

        let input = TypedIterator::from_string_points(vec![StringPoint::new(
            "m",
            0,
            "x".to_string(),
        )]);
        assert!(new_call_iterator(input, &AggregateCall::Sum, opt()).is_err());
    }

    #[test]
    fn test_dispatch_validates_arguments() {
        let input = TypedIterator::from_float_points(vec![]);
        let err = new_call_iterator(
            input,
            &AggregateCall::Top { n: 0, tags: None },
            opt(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));

        let input = TypedIterator::from_float_points(vec![]);
        let err = new_call_iterator(
            input,
            &AggregateCall::Derivative {
                interval: 0,
                non_negative: false,
            },
            opt(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_dispatch_count_integer() {
        let input = TypedIterator::from_integer_points(vec![
            IntegerPoint::new("m", 1, 10),
            IntegerPoint::new("m", 2, 20),
        ]);
        let mut itr = new_call_iterator(input, &AggregateCall::Count, opt())
            .unwrap()
            .unwrap_integer();
        assert_eq!(itr.next().unwrap().value, 2);
        assert!(itr.next().is_none());
    }

    #[test]
    fn test_dispatch_integer_mean_yields_float_iterator() {
        let input = TypedIterator::from_integer_points(vec![
            IntegerPoint::new("m", 1, 1),
            IntegerPoint::new("m", 2, 2),
        ]);
        let mut itr = new_call_iterator(input, &AggregateCall::Mean, opt())
            .unwrap()
            .unwrap_float();
        assert_eq!(itr.next().unwrap().value, 1.5);
    }

    #[test]
    fn test_dispatch_string_stddev_supported() {
        let input = TypedIterator::from_string_points(vec![StringPoint::new(
            "m",
            0,
            "x".to_string(),
        )]);
        let out = new_call_iterator(input, &AggregateCall::Stddev, opt()).unwrap();
        assert_eq!(out.type_name(), "string");
    }

    #[test]
    fn test_call_serialization_roundtrip() {
        let calls = vec![
            AggregateCall::Mean,
            AggregateCall::Percentile { percentile: 95.0 },
            AggregateCall::Top {
                n: 3,
                tags: Some(vec![0, 2]),
            },
            AggregateCall::Derivative {
                interval: 1_000_000_000,
                non_negative: true,
            },
        ];
        for call in calls {
            let json = serde_json::to_string(&call).unwrap();
            let decoded: AggregateCall = serde_json::from_str(&json).unwrap();
            assert_eq!(call, decoded);
        }
    }

    #[test]
    fn test_dispatch_closes_cleanly() {
        let input = TypedIterator::from_float_points(vec![FloatPoint::new("m", 0, 1.0)]);
        let mut out = new_call_iterator(input, &AggregateCall::Min, opt()).unwrap();
        out.close().unwrap();
    }
}
