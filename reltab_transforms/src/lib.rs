// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Relational query expressions and their operators.
//!
//! This crate provides:
//! - a closed operator IR ([`Transform`]) covering every table operator,
//! - a persistent, shareable query builder ([`QueryExp`]),
//! - value numbering ([`Plan`]), which collapses structurally identical subexpressions into one
//!   arena slot so each is computed once, and
//! - the pure per-operator schema and row transforms.
//!
//! Nothing here performs I/O. Base tables (`Transform::Table`) are resolved by the evaluator in
//! the `reltab` crate, which then drives the pure operators in plan order.

#![no_std]

extern crate alloc;

mod exec;
mod plan;
mod query;
mod transform;


pub use exec::TransformError;
pub use plan::{Plan, PlanError, PlanNode, ValueNum};
pub use query::QueryExp;
pub use transform::{AggColumn, ColumnExpr, ColumnMapping, SortKey, Transform};
