// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared, try_join_all};
use parking_lot::Mutex;
use reltab_core::{Schema, TableData};
use reltab_transforms::{Plan, QueryExp, Transform, ValueNum};
use tracing::Instrument as _;

use crate::error::EvalError;
use crate::loader::{CachedLoader, DirLoader, LoaderConfig, TableLoader};

type NodeFuture = Shared<BoxFuture<'static, Result<Arc<TableData>, EvalError>>>;

/// Handle for evaluating queries against one table source.
///
/// Cloning is cheap; clones share the loader.
#[derive(Clone)]
pub struct RelTab {
    loader: Arc<dyn TableLoader>,
}

impl std::fmt::Debug for RelTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelTab").finish_non_exhaustive()
    }
}

impl RelTab {
    /// Evaluates queries against tables from `loader`.
    pub fn new(loader: impl TableLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    /// Evaluates queries against JSON table files, caching each table after its first load.
    pub fn local(config: LoaderConfig) -> Self {
        Self::new(CachedLoader::new(DirLoader::new(config)))
    }

    /// The table source.
    pub fn loader(&self) -> &Arc<dyn TableLoader> {
        &self.loader
    }

    /// Evaluates `query`.
    ///
    /// Each structurally distinct subexpression is computed at most once. Independent inputs are
    /// awaited concurrently. The first failure is returned; there are no partial results.
    pub async fn eval_query(&self, query: &QueryExp) -> Result<TableData, EvalError> {
        let plan = Plan::build(query)?;
        let span = tracing::debug_span!("eval_query", nodes = plan.len());
        let root = plan.root();
        let scope = EvalScope(Arc::new(EvalContext {
            plan,
            loader: self.loader.clone(),
            results: Mutex::new(HashMap::new()),
        }));
        let out = scope.0.eval_node(root).instrument(span).await;
        // Releasing the per-node results usually leaves the root table uniquely owned.
        drop(scope);
        Ok(Arc::unwrap_or_clone(out?))
    }

    /// Output schema of `query`.
    ///
    /// Loads the base tables the query references but runs no operators.
    pub async fn get_schema(&self, query: &QueryExp) -> Result<Arc<Schema>, EvalError> {
        let plan = Plan::build(query)?;
        let span = tracing::debug_span!("get_schema", nodes = plan.len());
        async {
            let loads = plan.base_tables().map(|(_, name)| {
                let name = name.to_owned();
                let load = self.loader.load_table(&name);
                async move {
                    match load.await {
                        Ok(table) => Ok((name, table.schema().clone())),
                        Err(source) => Err(EvalError::Load {
                            table: name,
                            source,
                        }),
                    }
                }
            });
            let schemas: HashMap<String, Arc<Schema>> =
                try_join_all(loads).await?.into_iter().collect();
            plan.output_schema(|name| schemas.get(name).cloned())
                .map_err(EvalError::Schema)
        }
        .instrument(span)
        .await
    }
}

/// State for one evaluation: the plan and a shared future per started node.
struct EvalContext {
    plan: Plan,
    loader: Arc<dyn TableLoader>,
    results: Mutex<HashMap<ValueNum, NodeFuture>>,
}

/// Owns an [`EvalContext`] for the duration of one call.
///
/// Unfinished node futures hold the context, so the results map is emptied on drop to break the
/// cycle, including when the caller drops the evaluation early.
struct EvalScope(Arc<EvalContext>);

impl Drop for EvalScope {
    fn drop(&mut self) {
        let pending = std::mem::take(&mut *self.0.results.lock());
        drop(pending);
    }
}

impl EvalContext {
    fn eval_node(self: &Arc<Self>, vn: ValueNum) -> NodeFuture {
        let mut results = self.results.lock();
        if let Some(pending) = results.get(&vn) {
            return pending.clone();
        }
        let pending = Self::compute(self.clone(), vn).shared();
        results.insert(vn, pending.clone());
        pending
    }

    fn compute(
        self: Arc<Self>,
        vn: ValueNum,
    ) -> BoxFuture<'static, Result<Arc<TableData>, EvalError>> {
        async move {
            let node = self.plan.node(vn);
            let table = match &node.transform {
                Transform::Table { name } => {
                    self.loader
                        .load_table(name)
                        .await
                        .map_err(|source| EvalError::Load {
                            table: name.clone(),
                            source,
                        })?
                }
                transform => {
                    let inputs =
                        try_join_all(node.inputs.iter().map(|&input| self.eval_node(input)))
                            .await?;
                    let out = transform
                        .apply(&inputs)
                        .map_err(|source| EvalError::Transform {
                            op: transform.name(),
                            node: vn,
                            source,
                        })?;
                    Arc::new(out)
                }
            };
            tracing::debug!(
                node = %vn,
                op = node.transform.name(),
                rows = table.row_count(),
                "evaluated plan node"
            );
            Ok(table)
        }
        .boxed()
    }
}
