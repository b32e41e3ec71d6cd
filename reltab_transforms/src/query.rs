// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persistent query-expression builder.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use reltab_core::{ColumnMetadata, FilterExp};

use crate::transform::{AggColumn, ColumnExpr, ColumnMapping, SortKey, Transform};

#[derive(Debug)]
struct QueryNode {
    transform: Transform,
    inputs: Vec<QueryExp>,
}

/// An immutable query expression.
///
/// Each builder method returns a new expression that references `self` as its input; `self` is
/// never modified. Cloning is a reference-count bump, so one sub-query can be shared by any
/// number of derived queries. Shared and structurally identical sub-queries are evaluated once
/// per evaluation (see [`Plan`](crate::Plan)).
///
/// Every expression is rooted in at least one [`QueryExp::table`].
#[derive(Debug, Clone)]
pub struct QueryExp(Arc<QueryNode>);

impl QueryExp {
    fn node(transform: Transform, inputs: Vec<Self>) -> Self {
        Self(Arc::new(QueryNode { transform, inputs }))
    }

    fn derive(&self, transform: Transform) -> Self {
        Self::node(transform, vec![self.clone()])
    }

    /// A reference to the named base table.
    pub fn table(name: impl Into<String>) -> Self {
        Self::node(Transform::Table { name: name.into() }, Vec::new())
    }

    /// The operator at the root of this expression.
    pub fn transform(&self) -> &Transform {
        &self.0.transform
    }

    /// Input expressions, in operator order.
    pub fn inputs(&self) -> &[Self] {
        &self.0.inputs
    }

    /// Returns `true` if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared node, used to memoize re-convergent DAG walks.
    pub(crate) fn node_addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }

    /// Keeps rows matching `exp`.
    pub fn filter(&self, exp: FilterExp) -> Self {
        self.derive(Transform::Filter { exp })
    }

    /// Selects `columns`, in that order.
    pub fn project<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derive(Transform::Project {
            columns: columns.into_iter().map(Into::into).collect(),
        })
    }

    /// Groups by `keys` and aggregates `aggs`.
    ///
    /// Plain column ids aggregate with their type's default strategy; pass `(id, AggFn)` pairs
    /// for an explicit one.
    pub fn group_by<K, S, A>(&self, keys: K, aggs: A) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
        A: IntoIterator,
        A::Item: Into<AggColumn>,
    {
        self.derive(Transform::GroupBy {
            keys: keys.into_iter().map(Into::into).collect(),
            aggs: aggs.into_iter().map(Into::into).collect(),
        })
    }

    /// Renames or retypes columns selected by id.
    pub fn map_columns<I, S>(&self, map: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnMapping)>,
        S: Into<String>,
    {
        self.derive(Transform::MapColumns {
            map: map.into_iter().map(|(k, m)| (k.into(), m)).collect(),
        })
    }

    /// Renames or retypes columns selected by position.
    pub fn map_columns_by_index<I>(&self, map: I) -> Self
    where
        I: IntoIterator<Item = (usize, ColumnMapping)>,
    {
        self.derive(Transform::MapColumnsByIndex {
            map: map.into_iter().collect(),
        })
    }

    /// Appends `columns`, described by `metadata` and computed from `values`.
    ///
    /// Every new column needs a metadata entry; a column without a value entry is null.
    pub fn extend<I, S>(
        &self,
        columns: I,
        metadata: BTreeMap<String, ColumnMetadata>,
        values: BTreeMap<String, ColumnExpr>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derive(Transform::Extend {
            columns: columns.into_iter().map(Into::into).collect(),
            metadata,
            values,
        })
    }

    /// Appends a single column.
    pub fn extend_column(
        &self,
        id: impl Into<String>,
        metadata: ColumnMetadata,
        value: impl Into<ColumnExpr>,
    ) -> Self {
        let id = id.into();
        self.derive(Transform::Extend {
            columns: vec![id.clone()],
            metadata: BTreeMap::from([(id.clone(), metadata)]),
            values: BTreeMap::from([(id, value.into())]),
        })
    }

    /// Rows of `self` followed by rows of `other`.
    pub fn concat(&self, other: &Self) -> Self {
        Self::node(Transform::Concat, vec![self.clone(), other.clone()])
    }

    /// Rows of `self` followed by rows of each of `others`, in order, as a single operator.
    pub fn concat_all(&self, others: impl IntoIterator<Item = Self>) -> Self {
        let mut inputs = vec![self.clone()];
        inputs.extend(others);
        Self::node(Transform::Concat, inputs)
    }

    /// Stable sort by `keys`, most significant first.
    pub fn sort(&self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.derive(Transform::Sort {
            keys: keys.into_iter().collect(),
        })
    }
}

impl fmt::Display for QueryExp {
    /// Prints the operator chain through first inputs, joined by `>>>`.
    ///
    /// Secondary inputs (the other sides of a concat) are printed inline, in brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chain = Vec::new();
        let mut cur = self;
        loop {
            chain.push(cur);
            match cur.inputs().first() {
                Some(first) => cur = first,
                None => break,
            }
        }
        for (i, q) in chain.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" >>> ")?;
            }
            write!(f, "{}", q.transform())?;
            for other in q.inputs().iter().skip(1) {
                write!(f, " [ {other} ]")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use reltab_core::{AggFn, ColumnType, and};

    use super::*;

    #[test]
    fn builders_do_not_modify_their_input() {
        let base = QueryExp::table("t").project(["a", "b"]);
        let left = base.filter(and().eq("a", 1));
        let right = base.group_by(["a"], ["b"]);
        assert!(left.inputs()[0].ptr_eq(&base));
        assert!(right.inputs()[0].ptr_eq(&base));
        assert_eq!(base.transform().name(), "project");
    }

    #[test]
    fn display_follows_the_chain() {
        let q = QueryExp::table("bart")
            .project(["Job", "TCOE"])
            .filter(and().eq("Job", "'Safety'"))
            .group_by(["Job"], [("TCOE", AggFn::Avg)]);
        assert_eq!(
            q.to_string(),
            "table ( bart ) >>> project ( Job,TCOE ) >>> \
             filter ( [filter-exp (Job='Safety')] ) >>> groupBy ( [Job],[TCOE] )"
        );
    }

    #[test]
    fn display_shows_concat_inputs() {
        let a = QueryExp::table("a");
        let q = a.concat(&QueryExp::table("b")).sort([SortKey::desc("x")]);
        assert_eq!(
            q.to_string(),
            "table ( a ) >>> concat (  ) [ table ( b ) ] >>> sort ( x desc )"
        );
    }

    #[test]
    fn extend_column_fills_all_three_arguments() {
        let q = QueryExp::table("t").extend_column(
            "_depth",
            ColumnMetadata::new(ColumnType::Integer),
            0,
        );
        let Transform::Extend {
            columns,
            metadata,
            values,
        } = q.transform()
        else {
            panic!("expected extend, got {q}");
        };
        assert_eq!(columns, &["_depth"]);
        assert!(metadata.contains_key("_depth"));
        assert_eq!(values.get("_depth"), Some(&ColumnExpr::from(0)));
    }
}
