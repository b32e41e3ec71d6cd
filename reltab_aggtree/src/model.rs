// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use reltab::RelTab;
use reltab_core::PathComponent;
use reltab_transforms::QueryExp;

use crate::error::AggTreeError;
use crate::open_paths::OpenPaths;
use crate::tree::{AggTree, vpivot};

/// Expand/collapse state for a pivot tree view.
///
/// Starts with everything closed, including the root, so the first query shows only the root
/// row. Each mutation returns the query for the updated view.
#[derive(Debug, Clone)]
pub struct PivotTreeModel {
    rt: RelTab,
    tree: AggTree,
    open: Option<OpenPaths>,
}

impl PivotTreeModel {
    /// Pivots `base_query` by `pivots`.
    pub async fn new<I, S>(rt: RelTab, base_query: QueryExp, pivots: I) -> Result<Self, AggTreeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tree = vpivot(&rt, base_query, pivots).await?;
        Ok(Self {
            rt,
            tree,
            open: None,
        })
    }

    /// Current pivot columns.
    pub fn pivots(&self) -> &[String] {
        self.tree.pivots()
    }

    /// The current tree.
    pub fn tree(&self) -> &AggTree {
        &self.tree
    }

    /// Open nodes, or `None` while the root is closed.
    pub fn open_paths(&self) -> Option<&OpenPaths> {
        self.open.as_ref()
    }

    /// Re-pivots the base query by `pivots`.
    ///
    /// Open nodes are kept, except those deeper than the new pivot list allows. On error the
    /// model is unchanged.
    pub async fn set_pivots<I, S>(&mut self, pivots: I) -> Result<QueryExp, AggTreeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tree = vpivot(&self.rt, self.tree.base_query().clone(), pivots).await?;
        if let Some(open) = &mut self.open {
            open.truncate(tree.pivots().len());
        }
        self.tree = tree;
        self.current_query()
    }

    /// Opens the node at `path` and every node above it, including the root.
    pub fn open_path<S: PathComponent>(&mut self, path: &[S]) -> Result<QueryExp, AggTreeError> {
        let max = self.tree.pivots().len();
        if path.len() > max {
            return Err(AggTreeError::PathTooLong {
                len: path.len(),
                max,
            });
        }
        self.open.get_or_insert_with(OpenPaths::new).open(path);
        self.current_query()
    }

    /// Closes the node at `path` and everything beneath it. The empty path closes the root.
    pub fn close_path<S: PathComponent>(&mut self, path: &[S]) -> Result<QueryExp, AggTreeError> {
        if path.is_empty() {
            self.open = None;
        } else if let Some(open) = &mut self.open {
            open.close(path);
        }
        self.current_query()
    }

    /// Query for the tree as currently expanded.
    pub fn current_query(&self) -> Result<QueryExp, AggTreeError> {
        self.tree.get_tree_query(self.open.as_ref())
    }
}
