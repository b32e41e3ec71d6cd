// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Aggregation strategies used by group-by.
//!
//! An [`AggFn`] names a strategy; [`AggFn::accumulator`] creates a fresh [`Accumulator`] for one
//! group and one aggregated column.

extern crate alloc;

use alloc::boxed::Box;
use core::cmp::Ordering;
use core::fmt;

use serde::Serialize;

use crate::value::{ColumnType, Value};

/// Per-group, per-column reduction state.
pub trait Accumulator: fmt::Debug + Send {
    /// Feeds one input value.
    fn combine(&mut self, value: &Value);
    /// Produces the aggregate.
    fn finalize(&self) -> Value;
}

/// Aggregation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFn {
    /// Sum of numeric values, starting at zero.
    Sum,
    /// The common value if every non-null input agrees, otherwise null.
    Uniq,
    /// Arithmetic mean of numeric values; `NaN` if there were none.
    Avg,
    /// Number of non-null values.
    Count,
    /// Smallest comparable value.
    Min,
    /// Largest comparable value.
    Max,
}

impl AggFn {
    /// The strategy used when a column is aggregated without an explicit one.
    pub fn default_for(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Integer | ColumnType::Real => Self::Sum,
            ColumnType::Text => Self::Uniq,
        }
    }

    /// Type of the aggregated column, given the input column type.
    pub fn output_type(self, input: ColumnType) -> ColumnType {
        match self {
            Self::Sum | Self::Uniq | Self::Min | Self::Max => input,
            Self::Avg => ColumnType::Real,
            Self::Count => ColumnType::Integer,
        }
    }

    /// A fresh accumulator.
    pub fn accumulator(self) -> Box<dyn Accumulator> {
        match self {
            Self::Sum => Box::new(Sum::default()),
            Self::Uniq => Box::new(Uniq::default()),
            Self::Avg => Box::new(Avg::default()),
            Self::Count => Box::new(Count::default()),
            Self::Min => Box::new(Min::default()),
            Self::Max => Box::new(Max::default()),
        }
    }
}

/// Sums integers exactly; switches to real arithmetic on the first real input or on overflow.
#[derive(Debug, Default)]
pub struct Sum {
    int: i64,
    real: Option<f64>,
}

impl Accumulator for Sum {
    fn combine(&mut self, value: &Value) {
        if let Some(acc) = self.real.as_mut() {
            if let Some(v) = value.as_f64() {
                *acc += v;
            }
            return;
        }
        match value {
            Value::Integer(i) => match self.int.checked_add(*i) {
                Some(s) => self.int = s,
                None => self.real = Some(self.int as f64 + *i as f64),
            },
            Value::Real(r) => self.real = Some(self.int as f64 + r),
            Value::Null | Value::Text(_) => {}
        }
    }

    fn finalize(&self) -> Value {
        match self.real {
            Some(r) => Value::Real(r),
            None => Value::Integer(self.int),
        }
    }
}

#[derive(Debug, Default)]
enum UniqState {
    #[default]
    Empty,
    One(Value),
    Conflict,
}

/// Keeps a value only while every non-null input agrees with it.
#[derive(Debug, Default)]
pub struct Uniq(UniqState);

impl Accumulator for Uniq {
    fn combine(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.0 = match core::mem::take(&mut self.0) {
            UniqState::Empty => UniqState::One(value.clone()),
            UniqState::One(v) if v.loose_eq(value) => UniqState::One(v),
            UniqState::One(_) | UniqState::Conflict => UniqState::Conflict,
        };
    }

    fn finalize(&self) -> Value {
        match &self.0 {
            UniqState::One(v) => v.clone(),
            UniqState::Empty | UniqState::Conflict => Value::Null,
        }
    }
}

/// Mean of numeric inputs.
#[derive(Debug, Default)]
pub struct Avg {
    sum: f64,
    count: u64,
}

impl Accumulator for Avg {
    fn combine(&mut self, value: &Value) {
        if let Some(v) = value.as_f64() {
            self.sum += v;
            self.count += 1;
        }
    }

    fn finalize(&self) -> Value {
        if self.count == 0 {
            Value::Real(f64::NAN)
        } else {
            Value::Real(self.sum / self.count as f64)
        }
    }
}

/// Counts non-null inputs.
#[derive(Debug, Default)]
pub struct Count(i64);

impl Accumulator for Count {
    fn combine(&mut self, value: &Value) {
        if !value.is_null() {
            self.0 += 1;
        }
    }

    fn finalize(&self) -> Value {
        Value::Integer(self.0)
    }
}

fn keep_extreme(slot: &mut Option<Value>, value: &Value, want: Ordering) {
    if value.is_null() {
        return;
    }
    match slot {
        None => *slot = Some(value.clone()),
        Some(cur) => {
            if value.compare(cur) == Some(want) {
                *cur = value.clone();
            }
        }
    }
}

/// Smallest input under [`Value::compare`].
#[derive(Debug, Default)]
pub struct Min(Option<Value>);

impl Accumulator for Min {
    fn combine(&mut self, value: &Value) {
        keep_extreme(&mut self.0, value, Ordering::Less);
    }

    fn finalize(&self) -> Value {
        self.0.clone().unwrap_or_default()
    }
}

/// Largest input under [`Value::compare`].
#[derive(Debug, Default)]
pub struct Max(Option<Value>);

impl Accumulator for Max {
    fn combine(&mut self, value: &Value) {
        keep_extreme(&mut self.0, value, Ordering::Greater);
    }

    fn finalize(&self) -> Value {
        self.0.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(f: AggFn, values: &[Value]) -> Value {
        let mut acc = f.accumulator();
        for v in values {
            acc.combine(v);
        }
        acc.finalize()
    }

    #[test]
    fn sum_skips_missing_values() {
        assert_eq!(run(AggFn::Sum, &[]), Value::from(0));
        assert_eq!(
            run(AggFn::Sum, &[Value::from(3), Value::Null, Value::from(4)]),
            Value::from(7)
        );
        assert_eq!(
            run(AggFn::Sum, &[Value::from(1), Value::from(0.5)]),
            Value::from(1.5)
        );
    }

    #[test]
    fn sum_promotes_on_overflow() {
        let v = run(AggFn::Sum, &[Value::Integer(i64::MAX), Value::Integer(1)]);
        assert!(matches!(v, Value::Real(r) if r > 9.2e18), "got {v:?}");
    }

    #[test]
    fn uniq_keeps_agreeing_values() {
        assert_eq!(run(AggFn::Uniq, &[]), Value::Null);
        assert_eq!(
            run(AggFn::Uniq, &[Value::from("a"), Value::Null, Value::from("a")]),
            Value::from("a")
        );
        assert_eq!(
            run(AggFn::Uniq, &[Value::from("a"), Value::from("b"), Value::from("a")]),
            Value::Null
        );
    }

    #[test]
    fn avg_of_nothing_is_nan() {
        assert!(matches!(run(AggFn::Avg, &[]), Value::Real(r) if r.is_nan()));
        assert!(matches!(run(AggFn::Avg, &[Value::from("x")]), Value::Real(r) if r.is_nan()));
        assert_eq!(
            run(AggFn::Avg, &[Value::from(1), Value::Null, Value::from(4)]),
            Value::from(2.5)
        );
    }

    #[test]
    fn count_min_max() {
        let vals = [Value::from(5), Value::Null, Value::from(2), Value::from(9)];
        assert_eq!(run(AggFn::Count, &vals), Value::from(3));
        assert_eq!(run(AggFn::Min, &vals), Value::from(2));
        assert_eq!(run(AggFn::Max, &vals), Value::from(9));
        assert_eq!(run(AggFn::Max, &[]), Value::Null);
    }

    #[test]
    fn defaults_follow_column_type() {
        assert_eq!(AggFn::default_for(ColumnType::Integer), AggFn::Sum);
        assert_eq!(AggFn::default_for(ColumnType::Real), AggFn::Sum);
        assert_eq!(AggFn::default_for(ColumnType::Text), AggFn::Uniq);
        assert_eq!(AggFn::Avg.output_type(ColumnType::Integer), ColumnType::Real);
    }
}
