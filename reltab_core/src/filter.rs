// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boolean filter expressions.
//!
//! A [`FilterExp`] is a conjunction or disjunction of column comparisons and nested
//! sub-expressions, built by chaining:
//!
//! ```
//! use reltab_core::{and, col, lit, or};
//!
//! let e = and()
//!     .eq("x", 30)
//!     .eq(col("y"), lit("goodbye"))
//!     .sub_exp(or().gt("z", 50).gt("a", lit("b")));
//! assert_eq!(e.to_sql_where(), "x=30 and y='goodbye' and ( z>50 or a>'b' )");
//! ```
//!
//! Expressions are plain values: each builder call consumes and returns the expression, and
//! cloning is how a prefix is shared between two derived filters.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use serde::Serialize;

use crate::value::Value;

/// How the arguments of a [`FilterExp`] are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    /// All arguments must hold.
    And,
    /// At least one argument must hold.
    Or,
}

impl BoolOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Relational comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelOp {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl RelOp {
    /// SQL spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    /// A column reference.
    Column(String),
    /// A literal value.
    Const(Value),
    /// Unparsed operand text: an identifier, a `'quoted'` string, or an integer.
    ///
    /// Tokens are resolved when the filter is compiled against a schema.
    Token(String),
}

/// A column reference operand.
pub fn col(id: impl Into<String>) -> Operand {
    Operand::Column(id.into())
}

/// A literal operand.
pub fn lit(value: impl Into<Value>) -> Operand {
    Operand::Const(value.into())
}

impl From<&str> for Operand {
    fn from(token: &str) -> Self {
        Self::Token(token.into())
    }
}

impl From<String> for Operand {
    fn from(token: String) -> Self {
        Self::Token(token)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Const(value)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Const(value.into())
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Self::Const(value.into())
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Const(value.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(id) | Self::Token(id) => f.write_str(id),
            Self::Const(Value::Null) => f.write_str("NULL"),
            Self::Const(Value::Text(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Const(v) => write!(f, "{v}"),
        }
    }
}

/// A single `lhs <op> rhs` comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRelOp {
    /// Comparison operator.
    pub op: RelOp,
    /// Left operand.
    pub lhs: Operand,
    /// Right operand.
    pub rhs: Operand,
}

/// An argument of a [`FilterExp`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterArg {
    /// A comparison.
    RelOp(ColumnRelOp),
    /// A nested expression.
    SubExp(FilterExp),
}

/// A boolean combination of comparisons and sub-expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterExp {
    bool_op: BoolOp,
    args: Vec<FilterArg>,
}

/// Starts an empty conjunction.
pub fn and() -> FilterExp {
    FilterExp::new(BoolOp::And)
}

/// Starts an empty disjunction.
pub fn or() -> FilterExp {
    FilterExp::new(BoolOp::Or)
}

impl FilterExp {
    /// An expression with no arguments.
    ///
    /// An empty conjunction accepts every row; an empty disjunction accepts none.
    pub fn new(bool_op: BoolOp) -> Self {
        Self {
            bool_op,
            args: Vec::new(),
        }
    }

    /// The combining operator.
    pub fn bool_op(&self) -> BoolOp {
        self.bool_op
    }

    /// Arguments in the order they were added.
    pub fn args(&self) -> &[FilterArg] {
        &self.args
    }

    fn rel(mut self, op: RelOp, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        self.args.push(FilterArg::RelOp(ColumnRelOp {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }));
        self
    }

    /// Adds `lhs = rhs`.
    pub fn eq(self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        self.rel(RelOp::Eq, lhs, rhs)
    }

    /// Adds `lhs > rhs`.
    pub fn gt(self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        self.rel(RelOp::Gt, lhs, rhs)
    }

    /// Adds `lhs >= rhs`.
    pub fn ge(self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        self.rel(RelOp::Ge, lhs, rhs)
    }

    /// Adds `lhs < rhs`.
    pub fn lt(self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        self.rel(RelOp::Lt, lhs, rhs)
    }

    /// Adds `lhs <= rhs`.
    pub fn le(self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        self.rel(RelOp::Le, lhs, rhs)
    }

    /// Adds a nested expression.
    pub fn sub_exp(mut self, exp: Self) -> Self {
        self.args.push(FilterArg::SubExp(exp));
        self
    }

    /// Pretty-prints the expression as the body of a SQL `WHERE` clause.
    ///
    /// This is for debugging only; evaluation goes through [`compile_filter`](crate::compile_filter).
    pub fn to_sql_where(&self) -> String {
        let parts: Vec<String> = self
            .args
            .iter()
            .map(|arg| match arg {
                FilterArg::RelOp(r) => {
                    let mut s = r.lhs.to_string();
                    s.push_str(r.op.symbol());
                    s.push_str(&r.rhs.to_string());
                    s
                }
                FilterArg::SubExp(e) => alloc::format!("( {} )", e.to_sql_where()),
            })
            .collect();
        let sep = alloc::format!(" {} ", self.bool_op.as_str());
        parts.join(&sep)
    }
}

impl fmt::Display for FilterExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[filter-exp ({})]", self.to_sql_where())
    }
}
