// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for the RelTab relational engine.
//!
//! This crate is the leaf of the workspace and has no notion of queries or evaluation. It holds:
//! - **Values and schemas**: scalar cells, column metadata, and [`Schema`] lookups.
//! - **Table data**: the materialized `(schema, rows)` pair every query evaluates to.
//! - **Filters**: a chainable boolean filter builder, its SQL-ish pretty-printer, and a compiler
//!   that binds a filter to a schema and produces a row predicate.
//! - **Aggregators**: per-group accumulators used by group-by.
//! - **Paths**: the encoding used for pivot-tree node paths.

#![no_std]

extern crate alloc;

mod aggregate;
mod compile;
mod filter;
mod format;
pub mod path;
mod schema;
mod table;
mod value;

pub use aggregate::{Accumulator, AggFn, Avg, Count, Max, Min, Sum, Uniq};
pub use compile::{CompileError, RowPredicate, compile_filter};
pub use filter::{BoolOp, ColumnRelOp, FilterArg, FilterExp, Operand, RelOp, and, col, lit, or};
pub use format::view_format;
pub use path::{PathComponent, PathError, decode_path, encode_path};
pub use schema::{ColumnMetadata, Schema, SchemaError};
pub use table::{Row, TableData};
pub use value::{ColumnType, Value};
