// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use reltab::EvalError;
use reltab_core::PathError;

/// Errors raised while building or querying an [`AggTree`](crate::AggTree).
#[derive(thiserror::Error, Debug, Clone)]
pub enum AggTreeError {
    /// A path names more levels than there are pivot columns.
    #[error("path has {len} components but the tree has only {max} pivot columns")]
    PathTooLong {
        /// Components in the path.
        len: usize,
        /// Number of pivot columns.
        max: usize,
    },

    /// A pivot column is not in the base query's output.
    #[error("pivot column '{0}' is not produced by the base query")]
    UnknownPivot(String),

    /// The base query already produces one of the tree's own columns.
    #[error("base query column '{0}' clashes with a pivot tree column")]
    ReservedColumn(String),

    /// An encoded path could not be decoded.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Evaluating the base query's schema failed.
    #[error(transparent)]
    Eval(#[from] EvalError),
}
