// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pure per-operator schema and row transforms.
//!
//! Each operator first derives its output schema from its input schemas, then maps input rows to
//! output rows. Column references are resolved to positions once per call, never per row.

extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use reltab_core::path::{NULL_SEGMENT, encode_component};
use reltab_core::{
    Accumulator, AggFn, ColumnMetadata, ColumnType, CompileError, Row, Schema, SchemaError,
    TableData, Value, compile_filter,
};

use crate::transform::{AggColumn, ColumnExpr, ColumnMapping, SortKey, Transform};

/// Errors raised by operator transforms.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A column reference or schema combination is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A filter did not compile against its input schema.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The operator was given the wrong number of inputs.
    #[error("{op} expects {expected} input(s), got {actual}")]
    Arity {
        /// Operator name.
        op: &'static str,
        /// Expected input count (a minimum for concat).
        expected: usize,
        /// Actual input count.
        actual: usize,
    },
    /// A base table reached the transform layer, or has no known schema.
    #[error("base table '{0}' must be loaded, not transformed")]
    BaseTable(String),
    /// A group key could not be encoded.
    #[error("failed to encode group key: {0}")]
    GroupKey(String),
}

fn unary<'a, T>(op: &'static str, inputs: &'a [T]) -> Result<&'a T, TransformError> {
    match inputs {
        [one] => Ok(one),
        _ => Err(TransformError::Arity {
            op,
            expected: 1,
            actual: inputs.len(),
        }),
    }
}

fn indices(schema: &Schema, columns: &[String]) -> Result<Vec<usize>, SchemaError> {
    columns.iter().map(|c| schema.require_index(c)).collect()
}

/// Columns of `schema` at positions `idx`, as owned `(id, metadata)` pairs.
fn pick_columns(schema: &Schema, idx: &[usize]) -> Vec<(String, ColumnMetadata)> {
    let all: Vec<(&str, &ColumnMetadata)> = schema.iter().collect();
    idx.iter()
        .map(|&i| (all[i].0.to_string(), all[i].1.clone()))
        .collect()
}

fn pick(schema: &Schema, idx: &[usize]) -> Result<Schema, SchemaError> {
    Schema::new(pick_columns(schema, idx))
}

impl Transform {
    /// Output schema for the given input schemas.
    pub fn output_schema(&self, inputs: &[Arc<Schema>]) -> Result<Arc<Schema>, TransformError> {
        let op = self.name();
        match self {
            Self::Table { name } => Err(TransformError::BaseTable(name.clone())),
            Self::Filter { .. } | Self::Sort { .. } => Ok(unary(op, inputs)?.clone()),
            Self::Project { columns } => {
                let input = unary(op, inputs)?;
                Ok(Arc::new(pick(input, &indices(input, columns)?)?))
            }
            Self::GroupBy { keys, aggs } => {
                Ok(Arc::new(GroupPlan::new(unary(op, inputs)?, keys, aggs)?.schema))
            }
            Self::MapColumns { map } => {
                let input = unary(op, inputs)?;
                let by_index = map
                    .iter()
                    .map(|(id, m)| Ok((input.require_index(id)?, m)))
                    .collect::<Result<BTreeMap<_, _>, SchemaError>>()?;
                Ok(Arc::new(remap(input, &by_index)?))
            }
            Self::MapColumnsByIndex { map } => {
                let input = unary(op, inputs)?;
                let by_index = map
                    .iter()
                    .map(|(&i, m)| {
                        if i < input.len() {
                            Ok((i, m))
                        } else {
                            Err(SchemaError::ColumnIndexOutOfRange {
                                index: i,
                                len: input.len(),
                            })
                        }
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Ok(Arc::new(remap(input, &by_index)?))
            }
            Self::Extend {
                columns,
                metadata,
                values,
            } => Ok(Arc::new(
                ExtendPlan::new(unary(op, inputs)?, columns, metadata, values)?.schema,
            )),
            Self::Concat => {
                let Some((first, rest)) = inputs.split_first() else {
                    return Err(TransformError::Arity {
                        op,
                        expected: 1,
                        actual: 0,
                    });
                };
                for other in rest {
                    first.compat_check(other)?;
                }
                Ok(first.clone())
            }
        }
    }

    /// Applies the operator to resolved inputs.
    ///
    /// [`Transform::Table`] is never applied here: base tables come from the table loader.
    pub fn apply(&self, inputs: &[Arc<TableData>]) -> Result<TableData, TransformError> {
        let op = self.name();
        let schemas: Vec<Arc<Schema>> = inputs.iter().map(|t| t.schema().clone()).collect();
        match self {
            Self::Table { name } => Err(TransformError::BaseTable(name.clone())),
            Self::Filter { exp } => {
                let input = unary(op, inputs)?;
                let pred = compile_filter(exp, input.schema())?;
                let rows = input.rows().iter().filter(|&r| pred(r)).cloned().collect();
                Ok(TableData::new(input.schema().clone(), rows)?)
            }
            Self::Project { columns } => {
                let input = unary(op, inputs)?;
                let idx = indices(input.schema(), columns)?;
                let schema = pick(input.schema(), &idx)?;
                let rows = input
                    .rows()
                    .iter()
                    .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                    .collect();
                Ok(TableData::new(schema, rows)?)
            }
            Self::GroupBy { keys, aggs } => {
                let input = unary(op, inputs)?;
                GroupPlan::new(input.schema(), keys, aggs)?.run(input.rows())
            }
            Self::MapColumns { .. } | Self::MapColumnsByIndex { .. } => {
                let input = unary(op, inputs)?;
                let schema = self.output_schema(&schemas)?;
                // Row data only changes where a column was retyped.
                let retyped: Vec<usize> = schema
                    .iter()
                    .zip(input.schema().iter())
                    .enumerate()
                    .filter(|(_, ((_, new), (_, old)))| new.column_type != old.column_type)
                    .map(|(i, _)| i)
                    .collect();
                let rows = input
                    .rows()
                    .iter()
                    .map(|r| {
                        let mut r = r.clone();
                        for &i in &retyped {
                            if let Some(md) = schema.metadata_at(i) {
                                r[i] = r[i].cast(md.column_type);
                            }
                        }
                        r
                    })
                    .collect();
                Ok(TableData::new(schema, rows)?)
            }
            Self::Extend {
                columns,
                metadata,
                values,
            } => {
                let input = unary(op, inputs)?;
                ExtendPlan::new(input.schema(), columns, metadata, values)?.run(input.rows())
            }
            Self::Concat => {
                let schema = self.output_schema(&schemas)?;
                let rows = inputs
                    .iter()
                    .flat_map(|t| t.rows().iter().cloned())
                    .collect();
                Ok(TableData::new(schema, rows)?)
            }
            Self::Sort { keys } => {
                let input = unary(op, inputs)?;
                sort(input, keys)
            }
        }
    }
}

fn remap(input: &Schema, edits: &BTreeMap<usize, &ColumnMapping>) -> Result<Schema, SchemaError> {
    Schema::new(input.iter().enumerate().map(|(i, (id, md))| {
        let Some(edit) = edits.get(&i) else {
            return (id.to_string(), md.clone());
        };
        let mut md = md.clone();
        if let Some(name) = &edit.display_name {
            md.display_name = Some(name.clone());
        }
        if let Some(ty) = edit.column_type {
            md.column_type = ty;
        }
        (edit.id.clone().unwrap_or_else(|| id.to_string()), md)
    }))
}

struct GroupPlan {
    schema: Schema,
    keys: Vec<usize>,
    aggs: Vec<(usize, AggFn, ColumnType)>,
}

impl GroupPlan {
    fn new(input: &Schema, keys: &[String], aggs: &[AggColumn]) -> Result<Self, SchemaError> {
        let key_idx = indices(input, keys)?;
        let mut columns = pick_columns(input, &key_idx);
        let mut agg_idx = Vec::with_capacity(aggs.len());
        for a in aggs {
            let i = input.require_index(&a.column)?;
            let mut md = input
                .metadata_at(i)
                .cloned()
                .ok_or_else(|| SchemaError::UnknownColumn(a.column.clone()))?;
            let f = a.agg.unwrap_or_else(|| AggFn::default_for(md.column_type));
            md.column_type = f.output_type(md.column_type);
            agg_idx.push((i, f, md.column_type));
            columns.push((a.column.clone(), md));
        }
        Ok(Self {
            schema: Schema::new(columns)?,
            keys: key_idx,
            aggs: agg_idx,
        })
    }

    fn run(self, rows: &[Row]) -> Result<TableData, TransformError> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(Row, Vec<Box<dyn Accumulator>>)> = Vec::new();
        for row in rows {
            let key: Row = self.keys.iter().map(|&i| row[i].clone()).collect();
            let encoded =
                serde_json::to_string(&key).map_err(|e| TransformError::GroupKey(e.to_string()))?;
            let slot = match slots.entry(encoded) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => {
                    let accs: Vec<Box<dyn Accumulator>> =
                        self.aggs.iter().map(|(_, f, _)| f.accumulator()).collect();
                    groups.push((key, accs));
                    *e.insert(groups.len() - 1)
                }
            };
            let (_, accs) = &mut groups[slot];
            for (acc, (i, _, _)) in accs.iter_mut().zip(&self.aggs) {
                acc.combine(&row[*i]);
            }
        }

        // No keys means exactly one group, even over no rows.
        if self.keys.is_empty() && groups.is_empty() {
            let accs: Vec<Box<dyn Accumulator>> =
                self.aggs.iter().map(|(_, f, _)| f.accumulator()).collect();
            groups.push((Row::new(), accs));
        }

        let out = groups
            .into_iter()
            .map(|(mut key, accs)| {
                for (acc, (_, _, ty)) in accs.iter().zip(&self.aggs) {
                    key.push(acc.finalize().cast(*ty));
                }
                key
            })
            .collect();
        Ok(TableData::new(self.schema, out)?)
    }
}

#[derive(Debug)]
enum BoundExpr {
    Const(Value),
    Column(usize),
    Concat(Vec<BoundExpr>),
    Encode(Box<BoundExpr>),
}

impl BoundExpr {
    fn bind(expr: &ColumnExpr, schema: &Schema) -> Result<Self, SchemaError> {
        Ok(match expr {
            ColumnExpr::Const(v) => Self::Const(v.clone()),
            ColumnExpr::Column(id) => Self::Column(schema.require_index(id)?),
            ColumnExpr::Concat(parts) => Self::Concat(
                parts
                    .iter()
                    .map(|p| Self::bind(p, schema))
                    .collect::<Result<_, _>>()?,
            ),
            ColumnExpr::Encode(inner) => Self::Encode(Box::new(Self::bind(inner, schema)?)),
        })
    }

    fn eval(&self, row: &[Value]) -> Value {
        match self {
            Self::Const(v) => v.clone(),
            Self::Column(i) => row[*i].clone(),
            Self::Concat(parts) => {
                let mut s = String::new();
                for p in parts {
                    s.push_str(&p.eval(row).to_string());
                }
                Value::Text(s)
            }
            Self::Encode(inner) => Value::Text(match inner.eval(row) {
                Value::Null => NULL_SEGMENT.into(),
                value => encode_component(&value.to_string()),
            }),
        }
    }
}

struct ExtendPlan {
    schema: Schema,
    new_columns: Vec<(Option<BoundExpr>, ColumnMetadata)>,
}

impl ExtendPlan {
    fn new(
        input: &Schema,
        columns: &[String],
        metadata: &BTreeMap<String, ColumnMetadata>,
        values: &BTreeMap<String, ColumnExpr>,
    ) -> Result<Self, SchemaError> {
        let mut all: Vec<(String, ColumnMetadata)> = input
            .iter()
            .map(|(id, md)| (id.to_string(), md.clone()))
            .collect();
        let mut new_columns = Vec::with_capacity(columns.len());
        for id in columns {
            let md = metadata
                .get(id)
                .cloned()
                .ok_or_else(|| SchemaError::MissingMetadata(id.clone()))?;
            // Expressions see the input columns plus the new columns added before this one.
            let visible = Schema::new(all.iter().cloned())?;
            let expr = values
                .get(id)
                .map(|e| BoundExpr::bind(e, &visible))
                .transpose()?;
            all.push((id.clone(), md.clone()));
            new_columns.push((expr, md));
        }
        Ok(Self {
            schema: Schema::new(all)?,
            new_columns,
        })
    }

    fn run(self, rows: &[Row]) -> Result<TableData, TransformError> {
        let out = rows
            .iter()
            .map(|r| {
                let mut r = r.clone();
                for (expr, md) in &self.new_columns {
                    let v = match expr {
                        Some(e) => e.eval(&r).cast(md.column_type),
                        None => Value::Null,
                    };
                    r.push(v);
                }
                r
            })
            .collect();
        Ok(TableData::new(self.schema, out)?)
    }
}

fn sort(input: &TableData, keys: &[SortKey]) -> Result<TableData, TransformError> {
    let idx: Vec<(usize, bool)> = keys
        .iter()
        .map(|k| Ok((input.schema().require_index(&k.column)?, k.descending)))
        .collect::<Result<_, SchemaError>>()?;
    let mut rows = input.rows().to_vec();
    rows.sort_by(|a, b| {
        idx.iter()
            .map(|&(i, desc)| {
                let ord = a[i].total_cmp(&b[i]);
                if desc { ord.reverse() } else { ord }
            })
            .find(|o| o.is_ne())
            .unwrap_or(core::cmp::Ordering::Equal)
    });
    Ok(TableData::new(input.schema().clone(), rows)?)
}
