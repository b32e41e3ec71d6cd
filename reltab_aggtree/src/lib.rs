// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drill-down pivot trees over RelTab queries.
//!
//! [`vpivot`] takes a base query and an ordered list of pivot columns and returns an [`AggTree`].
//! The tree is never materialized: each node is named by its *path*, the pivot values chosen on
//! the way down from the root, and [`AggTree::apply_path`] derives the query for a node's
//! children. [`AggTree::get_tree_query`] unions the queries for every expanded node into one
//! query whose rows, sorted by [`PATH_COLUMN`], are the flattened tree in preorder.
//!
//! Every derived query has the columns `[_depth, _pivot, _path, ...base columns]`:
//! - `_depth`: `0` for the synthetic root, `n + 1` for the children of an `n`-component path.
//!   Leaf rows (the base rows under a fully specified path) sit at depth `pivots + 1`.
//! - `_pivot`: the pivot value this row groups, as text. Null for the root and for leaves.
//! - `_path`: the row's own encoded path (see [`reltab_core::path`]). A group of null pivot
//!   values gets the null component, so it can be drilled into like any other group. Leaf paths
//!   end in an empty component.
//!
//! [`PivotTreeModel`] tracks which nodes are open and yields the current tree query.
//!
//! ```
//! use futures::executor::block_on;
//! use reltab::{MemoryLoader, RelTab};
//! use reltab_aggtree::{OpenPaths, vpivot};
//! use reltab_core::{ColumnMetadata, ColumnType, Schema, TableData, Value};
//! use reltab_transforms::QueryExp;
//!
//! let schema = Schema::new([
//!     ("Dept", ColumnMetadata::new(ColumnType::Text)),
//!     ("Pay", ColumnMetadata::new(ColumnType::Integer)),
//! ])
//! .unwrap();
//! let rows = vec![
//!     vec![Value::from("Ops"), Value::from(10)],
//!     vec![Value::from("IT"), Value::from(20)],
//!     vec![Value::from("Ops"), Value::from(5)],
//! ];
//! let loader = MemoryLoader::new();
//! loader.insert("staff", TableData::new(schema, rows).unwrap());
//! let rt = RelTab::new(loader);
//!
//! let tree = block_on(vpivot(&rt, QueryExp::table("staff"), ["Dept"])).unwrap();
//! let mut open = OpenPaths::new();
//! open.open(&["Ops"]);
//! let flat = block_on(rt.eval_query(&tree.get_tree_query(Some(&open)).unwrap())).unwrap();
//! // Root, both departments, then the two Ops rows.
//! assert_eq!(flat.row_count(), 5);
//! ```

mod error;
mod model;
mod open_paths;
mod tree;

#[cfg(test)]
mod tree_tests;

pub use error::AggTreeError;
pub use model::PivotTreeModel;
pub use open_paths::OpenPaths;
pub use tree::{AggTree, DEPTH_COLUMN, PATH_COLUMN, PIVOT_COLUMN, vpivot};
