// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use reltab::RelTab;
use reltab_core::path::{PathComponent, SEPARATOR, decode_path, encode_path};
use reltab_core::{ColumnMetadata, ColumnType, Schema, Value, and, col, lit};
use reltab_transforms::{ColumnExpr, QueryExp, SortKey};
use tracing::Instrument as _;

use crate::error::AggTreeError;
use crate::open_paths::OpenPaths;

/// Depth of a tree row: `0` for the root.
pub const DEPTH_COLUMN: &str = "_depth";
/// Pivot value grouped by a tree row, as text.
pub const PIVOT_COLUMN: &str = "_pivot";
/// Encoded path of a tree row.
pub const PATH_COLUMN: &str = "_path";

const TREE_COLUMNS: [&str; 3] = [DEPTH_COLUMN, PIVOT_COLUMN, PATH_COLUMN];

/// Builds a pivot tree over `base_query`, grouping by `pivots` in order.
///
/// Resolves the base query's schema (loading its tables, but running no operators) and checks
/// that every pivot column exists.
pub async fn vpivot<I, S>(
    rt: &RelTab,
    base_query: QueryExp,
    pivots: I,
) -> Result<AggTree, AggTreeError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let pivots: Vec<String> = pivots.into_iter().map(Into::into).collect();
    let span = tracing::debug_span!("vpivot", pivots = pivots.len());
    async {
        let schema = rt.get_schema(&base_query).await?;
        let tree = AggTree::new(base_query, pivots, schema)?;
        tracing::debug!(columns = tree.schema.len(), "pivot tree ready");
        Ok(tree)
    }
    .instrument(span)
    .await
}

/// A pivot tree over a base query. See the [crate docs](crate).
#[derive(Debug, Clone)]
pub struct AggTree {
    base_query: QueryExp,
    pivots: Vec<String>,
    pivot_types: Vec<ColumnType>,
    schema: Arc<Schema>,
    root: QueryExp,
}

fn text() -> ColumnMetadata {
    ColumnMetadata::new(ColumnType::Text)
}

fn integer() -> ColumnMetadata {
    ColumnMetadata::new(ColumnType::Integer)
}

impl AggTree {
    fn new(
        base_query: QueryExp,
        pivots: Vec<String>,
        schema: Arc<Schema>,
    ) -> Result<Self, AggTreeError> {
        if let Some(clash) = TREE_COLUMNS.iter().find(|c| schema.column_index(c).is_some()) {
            return Err(AggTreeError::ReservedColumn((*clash).to_owned()));
        }
        let pivot_types = pivots
            .iter()
            .map(|p| {
                schema
                    .column_type(p)
                    .ok_or_else(|| AggTreeError::UnknownPivot(p.clone()))
            })
            .collect::<Result<_, _>>()?;

        let root = base_query
            .group_by(core::iter::empty::<&str>(), schema.columns())
            .extend_column(PIVOT_COLUMN, text(), Value::Null)
            .extend_column(DEPTH_COLUMN, integer(), 0)
            .extend_column(PATH_COLUMN, text(), "")
            .project(output_columns(&schema));

        Ok(Self {
            base_query,
            pivots,
            pivot_types,
            schema,
            root,
        })
    }

    /// The query the tree was built over.
    pub fn base_query(&self) -> &QueryExp {
        &self.base_query
    }

    /// Pivot columns, outermost first.
    pub fn pivots(&self) -> &[String] {
        &self.pivots
    }

    /// Schema of the base query.
    pub fn base_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// One row aggregating every base row, at depth 0 with an empty path.
    pub fn root_query(&self) -> &QueryExp {
        &self.root
    }

    /// Returns `true` if rows at `depth` are base rows rather than groups.
    pub fn is_leaf_depth(&self, depth: i64) -> bool {
        usize::try_from(depth).is_ok_and(|d| d > self.pivots.len())
    }

    /// Query for the children of the node at `path`.
    ///
    /// `path[i]` is a value of pivot column `i`, given as text and converted to the column's
    /// type, or `None` for the group of rows where that column is null. Above the last pivot
    /// level the children are groups of the next pivot column; under a full path they are the
    /// matching base rows.
    ///
    /// A child group's [`PATH_COLUMN`] is its parent's path plus the encoded [`PIVOT_COLUMN`],
    /// so a null pivot value gets the [`NULL_SEGMENT`](reltab_core::path::NULL_SEGMENT) component and decodes back to `None`.
    /// Base rows carry their parent's path plus an empty component.
    pub fn apply_path<S: PathComponent>(&self, path: &[S]) -> Result<QueryExp, AggTreeError> {
        let depth = path.len();
        if depth > self.pivots.len() {
            return Err(AggTreeError::PathTooLong {
                len: depth,
                max: self.pivots.len(),
            });
        }

        let mut query = self.base_query.clone();
        if !path.is_empty() {
            let pred = self
                .pivots
                .iter()
                .zip(&self.pivot_types)
                .zip(path)
                .fold(and(), |pred, ((pivot, &ty), component)| {
                    pred.eq(col(pivot.as_str()), lit(pivot_value(component.component(), ty)))
                });
            query = query.filter(pred);
        }

        let prefix = format!("{}{SEPARATOR}", encode_path(path));
        let (query, child_path) = match self.pivots.get(depth) {
            Some(next) => (
                query
                    .extend_column(PIVOT_COLUMN, text(), ColumnExpr::column(next.as_str()))
                    .group_by([PIVOT_COLUMN], self.schema.columns()),
                ColumnExpr::Concat(vec![
                    ColumnExpr::from(prefix),
                    ColumnExpr::encode(ColumnExpr::column(PIVOT_COLUMN)),
                ]),
            ),
            None => (
                query.extend_column(PIVOT_COLUMN, text(), Value::Null),
                ColumnExpr::from(prefix),
            ),
        };

        let child_depth = i64::try_from(depth + 1).unwrap_or(i64::MAX);
        Ok(query
            .extend_column(DEPTH_COLUMN, integer(), child_depth)
            .extend_column(PATH_COLUMN, text(), child_path)
            .project(output_columns(&self.schema)))
    }

    /// Query for the children of the node whose [`PATH_COLUMN`] is `encoded`.
    pub fn apply_encoded_path(&self, encoded: &str) -> Result<QueryExp, AggTreeError> {
        self.apply_path(decode_path(encoded)?.as_slice())
    }

    /// Query for the flattened tree with the nodes in `open` expanded.
    ///
    /// `None` leaves even the root closed, giving just the root row. Otherwise the root is open
    /// along with every node named in `open`. Rows come out in preorder, sorted by
    /// [`PATH_COLUMN`]. Open keys that match no pivot value contribute no rows.
    pub fn get_tree_query(&self, open: Option<&OpenPaths>) -> Result<QueryExp, AggTreeError> {
        let mut parts = Vec::new();
        if let Some(open) = open {
            parts.push(self.apply_path::<&str>(&[])?);
            self.collect_open(open, &mut Vec::new(), &mut parts)?;
        }
        Ok(self
            .root
            .concat_all(parts)
            .sort([SortKey::asc(PATH_COLUMN)]))
    }

    fn collect_open<'a>(
        &self,
        level: &'a OpenPaths,
        prefix: &mut Vec<Option<&'a str>>,
        parts: &mut Vec<QueryExp>,
    ) -> Result<(), AggTreeError> {
        for (key, below) in level.children() {
            prefix.push(key);
            parts.push(self.apply_path(prefix.as_slice())?);
            self.collect_open(below, prefix, parts)?;
            prefix.pop();
        }
        Ok(())
    }
}

/// The filter constant matching pivot `text` in a column of type `ty`.
///
/// Text that does not convert to `ty` stays text, so it matches no row rather than the nulls.
fn pivot_value(text: Option<&str>, ty: ColumnType) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };
    let raw = Value::from(text);
    match raw.cast(ty) {
        Value::Null => raw,
        converted => converted,
    }
}

fn output_columns(schema: &Schema) -> Vec<String> {
    TREE_COLUMNS
        .iter()
        .map(|c| (*c).to_owned())
        .chain(schema.columns().iter().cloned())
        .collect()
}
