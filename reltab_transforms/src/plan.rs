// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value numbering.
//!
//! [`Plan::build`] walks a [`QueryExp`] inputs-first and gives every node a [`ValueNum`]. Two
//! nodes get the same number when they apply the same operator, with the same arguments, to
//! inputs that already share numbers. The plan stores one [`PlanNode`] per number, in the order
//! numbers were assigned, so every node appears after all of its inputs.

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use reltab_core::Schema;
use serde::Serialize;
use smallvec::SmallVec;

use crate::exec::TransformError;
use crate::query::QueryExp;
use crate::transform::Transform;

/// Identifies a class of structurally identical subexpressions within one [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ValueNum(pub usize);

impl fmt::Display for ValueNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Errors raised while building a plan.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A node's arguments could not be rendered to a canonical key.
    #[error("failed to encode {op} node: {message}")]
    Encode {
        /// Operator name.
        op: &'static str,
        /// Encoder message.
        message: String,
    },
}

/// One distinct subexpression.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    /// The operator.
    pub transform: Transform,
    /// Value numbers of the inputs, in operator order.
    pub inputs: SmallVec<[ValueNum; 2]>,
}

/// A query expression flattened into value-numbered nodes.
#[derive(Debug, Clone)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: ValueNum,
}

#[derive(Default)]
struct Numbering {
    nodes: Vec<PlanNode>,
    by_key: HashMap<String, ValueNum>,
    by_addr: HashMap<*const (), ValueNum>,
}

impl Numbering {
    fn visit(&mut self, query: &QueryExp) -> Result<ValueNum, PlanError> {
        if let Some(&vn) = self.by_addr.get(&query.node_addr()) {
            return Ok(vn);
        }
        let inputs = query
            .inputs()
            .iter()
            .map(|q| self.visit(q))
            .collect::<Result<SmallVec<[ValueNum; 2]>, _>>()?;

        let transform = query.transform();
        let key = serde_json::to_string(&(transform, inputs.as_slice())).map_err(|e| {
            PlanError::Encode {
                op: transform.name(),
                message: e.to_string(),
            }
        })?;
        let vn = match self.by_key.get(&key) {
            Some(&vn) => vn,
            None => {
                let vn = ValueNum(self.nodes.len());
                self.nodes.push(PlanNode {
                    transform: transform.clone(),
                    inputs,
                });
                self.by_key.insert(key, vn);
                vn
            }
        };
        self.by_addr.insert(query.node_addr(), vn);
        Ok(vn)
    }
}

impl Plan {
    /// Numbers every node of `query`.
    pub fn build(query: &QueryExp) -> Result<Self, PlanError> {
        let mut numbering = Numbering::default();
        let root = numbering.visit(query)?;
        Ok(Self {
            nodes: numbering.nodes,
            root,
        })
    }

    /// Value number of the whole query.
    pub fn root(&self) -> ValueNum {
        self.root
    }

    /// Distinct nodes; each node's inputs precede it.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// The node numbered `vn`.
    ///
    /// # Panics
    ///
    /// If `vn` was not produced by this plan.
    pub fn node(&self, vn: ValueNum) -> &PlanNode {
        &self.nodes[vn.0]
    }

    /// Number of distinct nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a plan has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distinct base tables, in first-use order.
    pub fn base_tables(&self) -> impl Iterator<Item = (ValueNum, &str)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match &n.transform {
                Transform::Table { name } => Some((ValueNum(i), name.as_str())),
                _ => None,
            })
    }

    /// Output schema of the root, without touching row data.
    ///
    /// `base_schema` supplies the schema of each base table.
    pub fn output_schema<F>(&self, mut base_schema: F) -> Result<Arc<Schema>, TransformError>
    where
        F: FnMut(&str) -> Option<Arc<Schema>>,
    {
        let mut schemas: Vec<Arc<Schema>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let schema = match &node.transform {
                Transform::Table { name } => base_schema(name)
                    .ok_or_else(|| TransformError::BaseTable(name.clone()))?,
                t => {
                    let inputs: SmallVec<[Arc<Schema>; 2]> =
                        node.inputs.iter().map(|vn| schemas[vn.0].clone()).collect();
                    t.output_schema(&inputs)?
                }
            };
            schemas.push(schema);
        }
        Ok(schemas.swap_remove(self.root.0))
    }
}
