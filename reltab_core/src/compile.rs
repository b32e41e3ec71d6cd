// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiles a [`FilterExp`] against a [`Schema`] into a row predicate.
//!
//! Operand tokens are parsed and column references resolved once, at compile time; the returned
//! closure only indexes into rows.

extern crate alloc;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::filter::{BoolOp, ColumnRelOp, FilterArg, FilterExp, Operand, RelOp};
use crate::schema::Schema;
use crate::table::Row;
use crate::value::Value;

/// Errors raised while compiling a filter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// An operand token is not an identifier, a quoted string, or an integer.
    #[error("unrecognized token '{0}' in filter expression")]
    BadToken(String),
    /// A column reference does not name a column of the bound schema.
    #[error("unknown column '{0}' in filter expression")]
    UnknownColumn(String),
}

/// A compiled filter.
pub type RowPredicate = Box<dyn Fn(&Row) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
enum Accessor {
    Column(usize),
    Const(Value),
}

impl Accessor {
    fn get<'a>(&'a self, row: &'a Row) -> &'a Value {
        match self {
            Self::Column(i) => &row[*i],
            Self::Const(v) => v,
        }
    }
}

/// Binds `exp` to `schema`.
pub fn compile_filter(exp: &FilterExp, schema: &Schema) -> Result<RowPredicate, CompileError> {
    let subs = exp
        .args()
        .iter()
        .map(|arg| match arg {
            FilterArg::RelOp(r) => compile_rel_op(r, schema),
            FilterArg::SubExp(e) => compile_filter(e, schema),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pred: RowPredicate = match exp.bool_op() {
        BoolOp::And => Box::new(move |row: &Row| subs.iter().all(|p| p(row))),
        BoolOp::Or => Box::new(move |row: &Row| subs.iter().any(|p| p(row))),
    };
    Ok(pred)
}

fn compile_rel_op(r: &ColumnRelOp, schema: &Schema) -> Result<RowPredicate, CompileError> {
    let lhs = resolve(&r.lhs, schema)?;
    let rhs = resolve(&r.rhs, schema)?;
    let test: fn(&Value, &Value) -> bool = match r.op {
        RelOp::Eq => Value::loose_eq,
        RelOp::Gt => |a, b| a.compare(b) == Some(Ordering::Greater),
        RelOp::Ge => |a, b| matches!(a.compare(b), Some(Ordering::Greater | Ordering::Equal)),
        RelOp::Lt => |a, b| a.compare(b) == Some(Ordering::Less),
        RelOp::Le => |a, b| matches!(a.compare(b), Some(Ordering::Less | Ordering::Equal)),
    };
    Ok(Box::new(move |row: &Row| test(lhs.get(row), rhs.get(row))))
}

fn resolve(operand: &Operand, schema: &Schema) -> Result<Accessor, CompileError> {
    match operand {
        Operand::Column(id) => column(id, schema),
        Operand::Const(v) => Ok(Accessor::Const(v.clone())),
        Operand::Token(tok) => match tokenize(tok)? {
            Token::Ident(id) => column(id, schema),
            Token::Literal(v) => Ok(Accessor::Const(v)),
        },
    }
}

fn column(id: &str, schema: &Schema) -> Result<Accessor, CompileError> {
    schema
        .column_index(id)
        .map(Accessor::Column)
        .ok_or_else(|| CompileError::UnknownColumn(id.into()))
}

enum Token<'a> {
    Ident(&'a str),
    Literal(Value),
}

fn tokenize(raw: &str) -> Result<Token<'_>, CompileError> {
    let s = raw.trim();
    let bad = || CompileError::BadToken(raw.into());

    if let Some(body) = s.strip_prefix('\'') {
        let body = body.strip_suffix('\'').ok_or_else(bad)?;
        // A lone quote inside the body is malformed; doubled quotes are an escaped quote.
        if body.replace("''", "").contains('\'') {
            return Err(bad());
        }
        return Ok(Token::Literal(Value::Text(body.replace("''", "'"))));
    }

    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            if chars.all(|c| c.is_alphanumeric() || c == '_') {
                Ok(Token::Ident(s))
            } else {
                Err(bad())
            }
        }
        Some(c) if c.is_ascii_digit() || c == '-' => s
            .parse::<i64>()
            .map(|i| Token::Literal(Value::Integer(i)))
            .map_err(|_| bad()),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::{ColumnMetadata, ColumnType, and, col, lit, or};

    fn schema() -> Schema {
        Schema::new([
            ("Job", ColumnMetadata::new(ColumnType::Text)),
            ("Base", ColumnMetadata::new(ColumnType::Integer)),
            ("Rate", ColumnMetadata::new(ColumnType::Real)),
        ])
        .unwrap()
    }

    fn row(job: &str, base: i64, rate: f64) -> Row {
        vec![Value::from(job), Value::from(base), Value::from(rate)]
    }

    #[test]
    fn tokens_resolve_to_columns_and_literals() {
        let p = compile_filter(&and().eq("Job", "'Safety'").gt("Base", "100"), &schema()).unwrap();
        assert!(p(&row("Safety", 101, 0.0)));
        assert!(!p(&row("Safety", 100, 0.0)));
        assert!(!p(&row("IT", 500, 0.0)));
    }

    #[test]
    fn all_comparators() {
        let s = schema();
        let r = row("M", 10, 2.5);
        let check = |e: FilterExp| compile_filter(&e, &s).unwrap()(&r);
        assert!(check(and().ge("Base", 10).le("Base", 10)));
        assert!(check(and().lt("Rate", 3).gt("Rate", 2)));
        assert!(check(and().eq(col("Rate"), lit(2.5))));
        assert!(!check(and().lt("Job", lit("A"))));
        assert!(check(and().gt("Job", lit("A"))));
        // Text never orders against numbers.
        assert!(!check(or().gt("Job", 1).lt("Job", 1)));
    }

    #[test]
    fn empty_expressions() {
        let s = schema();
        let r = row("M", 1, 1.0);
        assert!(compile_filter(&and(), &s).unwrap()(&r));
        assert!(!compile_filter(&or(), &s).unwrap()(&r));
    }

    #[test]
    fn nested_disjunction_short_circuits() {
        let e = and()
            .eq("Job", lit("M"))
            .sub_exp(or().eq("Base", 1).eq("Base", 2));
        let p = compile_filter(&e, &schema()).unwrap();
        assert!(p(&row("M", 2, 0.0)));
        assert!(!p(&row("M", 3, 0.0)));
        assert!(!p(&row("N", 1, 0.0)));
    }

    #[test]
    fn quoted_literal_with_escaped_quote() {
        let p = compile_filter(&and().eq("Job", "'O''Brien'"), &schema()).unwrap();
        assert!(p(&row("O'Brien", 0, 0.0)));
    }

    #[test]
    fn compile_errors() {
        let s = schema();
        assert_eq!(
            compile_filter(&and().eq("Nope", 1), &s).err(),
            Some(CompileError::UnknownColumn("Nope".into()))
        );
        assert_eq!(
            compile_filter(&and().eq(col("Job Family"), 1), &s).err(),
            Some(CompileError::UnknownColumn("Job Family".into()))
        );
        for tok in ["'open", "1.5x", "a b", "'x'y'", ""] {
            assert_eq!(
                compile_filter(&and().eq("Job", tok), &s).err(),
                Some(CompileError::BadToken(tok.into())),
                "token {tok:?}"
            );
        }
    }
}
