// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operator IR types.
//!
//! Every type here is `Serialize` so that a node's arguments can be rendered to a canonical key
//! during value numbering.

extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use reltab_core::{AggFn, ColumnMetadata, ColumnType, FilterExp, Value};
use serde::Serialize;

/// An aggregated column of [`Transform::GroupBy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggColumn {
    /// Input column to aggregate.
    pub column: String,
    /// Strategy; `None` picks [`AggFn::default_for`] the column type.
    pub agg: Option<AggFn>,
}

impl AggColumn {
    /// Aggregates `column` with its type's default strategy.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            agg: None,
        }
    }

    /// Aggregates `column` with an explicit strategy.
    pub fn with(column: impl Into<String>, agg: AggFn) -> Self {
        Self {
            column: column.into(),
            agg: Some(agg),
        }
    }
}

impl From<&str> for AggColumn {
    fn from(column: &str) -> Self {
        Self::new(column)
    }
}

impl From<&String> for AggColumn {
    fn from(column: &String) -> Self {
        Self::new(column.as_str())
    }
}

impl From<String> for AggColumn {
    fn from(column: String) -> Self {
        Self::new(column)
    }
}

impl<S: Into<String>> From<(S, AggFn)> for AggColumn {
    fn from((column, agg): (S, AggFn)) -> Self {
        Self::with(column, agg)
    }
}

/// Edits applied to one column by [`Transform::MapColumns`] or [`Transform::MapColumnsByIndex`].
///
/// Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    /// New column id.
    pub id: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New column type; the column's values are converted to it.
    pub column_type: Option<ColumnType>,
}

impl ColumnMapping {
    /// Renames the column.
    pub fn rename(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the column type.
    pub fn with_type(mut self, ty: ColumnType) -> Self {
        self.column_type = Some(ty);
        self
    }
}

/// A per-row value computed by [`Transform::Extend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnExpr {
    /// The same value on every row.
    Const(Value),
    /// The value of another column in the same row.
    ///
    /// May name an input column or a column added earlier by the same extend.
    Column(String),
    /// Text concatenation of the parts; nulls contribute nothing.
    Concat(Vec<ColumnExpr>),
    /// The text of the inner value, percent-encoded as a path component. Null encodes as
    /// [`NULL_SEGMENT`](reltab_core::path::NULL_SEGMENT).
    Encode(Box<ColumnExpr>),
}

impl ColumnExpr {
    /// Shorthand for [`ColumnExpr::Column`].
    pub fn column(id: impl Into<String>) -> Self {
        Self::Column(id.into())
    }

    /// Shorthand for [`ColumnExpr::Encode`].
    pub fn encode(inner: Self) -> Self {
        Self::Encode(Box::new(inner))
    }
}

impl From<Value> for ColumnExpr {
    fn from(value: Value) -> Self {
        Self::Const(value)
    }
}

impl From<&str> for ColumnExpr {
    fn from(value: &str) -> Self {
        Self::Const(value.into())
    }
}

impl From<String> for ColumnExpr {
    fn from(value: String) -> Self {
        Self::Const(value.into())
    }
}

impl From<i64> for ColumnExpr {
    fn from(value: i64) -> Self {
        Self::Const(value.into())
    }
}

impl From<i32> for ColumnExpr {
    fn from(value: i32) -> Self {
        Self::Const(value.into())
    }
}

impl From<f64> for ColumnExpr {
    fn from(value: f64) -> Self {
        Self::Const(value.into())
    }
}

/// One key of [`Transform::Sort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    /// Column to compare.
    pub column: String,
    /// Sort largest first.
    pub descending: bool,
}

impl SortKey {
    /// Ascending key.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Descending key.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A table operator.
///
/// Inputs are not stored here; a [`QueryExp`](crate::QueryExp) or a [`Plan`](crate::Plan) node
/// pairs the operator with its inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Transform {
    /// A named base table. Takes no inputs.
    Table {
        /// Name passed to the table loader.
        name: String,
    },
    /// Keep rows matching a filter.
    Filter {
        /// The filter expression.
        exp: FilterExp,
    },
    /// Select and reorder columns.
    Project {
        /// Output columns, in order.
        columns: Vec<String>,
    },
    /// One output row per distinct key, in first-seen order.
    ///
    /// Output columns are `keys` (in order) followed by the `aggs` columns (in order).
    GroupBy {
        /// Grouping columns.
        keys: Vec<String>,
        /// Aggregated columns.
        aggs: Vec<AggColumn>,
    },
    /// Rename or retype columns selected by id. Other columns pass through.
    MapColumns {
        /// Edits keyed by current column id.
        map: BTreeMap<String, ColumnMapping>,
    },
    /// Rename or retype columns selected by position. Other columns pass through.
    MapColumnsByIndex {
        /// Edits keyed by column position.
        map: BTreeMap<usize, ColumnMapping>,
    },
    /// Append computed columns.
    Extend {
        /// New column ids, in order.
        columns: Vec<String>,
        /// Metadata for every new column.
        metadata: BTreeMap<String, ColumnMetadata>,
        /// Values for new columns; a column without an entry is null.
        values: BTreeMap<String, ColumnExpr>,
    },
    /// Rows of every input, in input order. Inputs must have compatible schemas.
    Concat,
    /// Stable sort by one or more keys.
    Sort {
        /// Sort keys, most significant first.
        keys: Vec<SortKey>,
    },
}

impl Transform {
    /// Operator name, as used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Table { .. } => "table",
            Self::Filter { .. } => "filter",
            Self::Project { .. } => "project",
            Self::GroupBy { .. } => "groupBy",
            Self::MapColumns { .. } => "mapColumns",
            Self::MapColumnsByIndex { .. } => "mapColumnsByIndex",
            Self::Extend { .. } => "extend",
            Self::Concat => "concat",
            Self::Sort { .. } => "sort",
        }
    }
}

fn join<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Transform {
    /// Formats as `name ( args )`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ( ", self.name())?;
        match self {
            Self::Table { name } => f.write_str(name)?,
            Self::Filter { exp } => write!(f, "{exp}")?,
            Self::Project { columns } => join(f, columns)?,
            Self::GroupBy { keys, aggs } => {
                f.write_str("[")?;
                join(f, keys)?;
                f.write_str("],[")?;
                join(f, aggs.iter().map(|a| a.column.as_str()))?;
                f.write_str("]")?;
            }
            Self::MapColumns { map } => join(f, map.keys())?,
            Self::MapColumnsByIndex { map } => join(f, map.keys())?,
            Self::Extend { columns, .. } => join(f, columns)?,
            Self::Concat => {}
            Self::Sort { keys } => {
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(&k.column)?;
                    if k.descending {
                        f.write_str(" desc")?;
                    }
                }
            }
        }
        f.write_str(" )")
    }
}
