// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use reltab_transforms::{PlanError, TransformError, ValueNum};

/// Errors raised by a [`TableLoader`](crate::TableLoader).
///
/// Cloneable so that one failed load can be reported to every query waiting on it.
#[derive(thiserror::Error, Debug, Clone)]
pub enum LoadError {
    /// No table with this name exists.
    #[error("table '{0}' not found")]
    NotFound(String),

    /// The name cannot refer to a table (empty, or contains a path component).
    #[error("invalid table name '{0}'")]
    InvalidName(String),

    /// Reading the table failed.
    #[error("failed to read table '{name}': {source}")]
    Io {
        /// Table name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The table file is not a valid `[schema, {"rowData": [...]}]` document.
    #[error("malformed table '{name}': {source}")]
    Parse {
        /// Table name.
        name: String,
        /// Underlying decode error.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

/// Errors raised by [`RelTab`](crate::RelTab) evaluation.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EvalError {
    /// The query could not be value-numbered.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A base table failed to load.
    #[error("loading table '{table}': {source}")]
    Load {
        /// Table name.
        table: String,
        /// Loader error.
        #[source]
        source: LoadError,
    },

    /// An operator failed.
    #[error("evaluating {op} ({node}): {source}")]
    Transform {
        /// Operator name.
        op: &'static str,
        /// Plan node.
        node: ValueNum,
        /// Operator error.
        #[source]
        source: TransformError,
    },

    /// Output schema derivation failed.
    #[error("deriving schema: {0}")]
    Schema(#[source] TransformError),
}
