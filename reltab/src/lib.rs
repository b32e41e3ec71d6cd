// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query evaluation for RelTab.
//!
//! [`RelTab::eval_query`] turns a [`QueryExp`] into [`TableData`]:
//! - the query is value-numbered into a [`Plan`](reltab_transforms::Plan), so each structurally
//!   distinct subexpression appears once;
//! - each plan node becomes one shared future, started on first demand, that waits for all of its
//!   inputs and then runs its operator synchronously;
//! - base tables come from a [`TableLoader`], the only place that performs I/O.
//!
//! Per-node futures live for one `eval_query` call. Caching across calls is the loader's job
//! (see [`CachedLoader`]).
//!
//! ```
//! use futures::executor::block_on;
//! use reltab::{MemoryLoader, RelTab};
//! use reltab_core::{ColumnMetadata, ColumnType, Schema, TableData, Value, and};
//! use reltab_transforms::QueryExp;
//!
//! let schema = Schema::new([("n", ColumnMetadata::new(ColumnType::Integer))]).unwrap();
//! let rows = (1..=4).map(|i| vec![Value::from(i)]).collect();
//! let loader = MemoryLoader::new();
//! loader.insert("nums", TableData::new(schema, rows).unwrap());
//!
//! let rt = RelTab::new(loader);
//! let q = QueryExp::table("nums").filter(and().gt("n", 2));
//! let out = block_on(rt.eval_query(&q)).unwrap();
//! assert_eq!(out.row_count(), 2);
//! ```

mod error;
mod eval;
mod loader;


pub use error::{EvalError, LoadError};
pub use eval::RelTab;
pub use loader::{CachedLoader, DirLoader, LoaderConfig, MemoryLoader, TableFuture, TableLoader};
pub use reltab_core::TableData;
pub use reltab_transforms::QueryExp;
