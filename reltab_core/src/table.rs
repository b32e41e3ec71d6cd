// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Materialized query results.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::schema::{Schema, SchemaError};
use crate::value::{ColumnType, Value};

/// One row: a value per schema column, in column order.
pub type Row = Vec<Value>;

/// A schema plus row data.
///
/// The serialized form is the two-element table file layout `[schema, {"rowData": [...]}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableFile", into = "TableFile")]
pub struct TableData {
    schema: Arc<Schema>,
    row_data: Vec<Row>,
}

#[derive(Serialize, Deserialize)]
struct RowData {
    #[serde(rename = "rowData")]
    row_data: Vec<Row>,
}

#[derive(Serialize, Deserialize)]
struct TableFile(Schema, RowData);

impl TableData {
    /// Builds a table, checking each row against the schema.
    ///
    /// Every row must have one value per column, and every non-null value must match its
    /// column's type. Integers in a real column are converted to reals.
    pub fn new(
        schema: impl Into<Arc<Schema>>,
        mut row_data: Vec<Row>,
    ) -> Result<Self, SchemaError> {
        let schema = schema.into();
        let expected = schema.len();
        for (row, values) in row_data.iter_mut().enumerate() {
            if values.len() != expected {
                return Err(SchemaError::RowArity {
                    row,
                    expected,
                    actual: values.len(),
                });
            }
            for (value, (column, md)) in values.iter_mut().zip(schema.iter()) {
                let Some(actual) = value.value_type() else {
                    continue;
                };
                match (actual, md.column_type) {
                    (a, e) if a == e => {}
                    (ColumnType::Integer, ColumnType::Real) => {
                        *value = value.cast(ColumnType::Real);
                    }
                    (actual, expected) => {
                        return Err(SchemaError::CellType {
                            row,
                            column: column.into(),
                            expected,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(Self { schema, row_data })
    }

    /// The table schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// All rows.
    pub fn rows(&self) -> &[Row] {
        &self.row_data
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.row_data.len()
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, id: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let i = self.schema.column_index(id)?;
        Some(self.row_data.iter().map(move |r| &r[i]))
    }

    /// Splits the table into its schema and rows.
    pub fn into_parts(self) -> (Arc<Schema>, Vec<Row>) {
        (self.schema, self.row_data)
    }
}

impl TryFrom<TableFile> for TableData {
    type Error = SchemaError;

    fn try_from(file: TableFile) -> Result<Self, Self::Error> {
        Self::new(file.0, file.1.row_data)
    }
}

impl From<TableData> for TableFile {
    fn from(table: TableData) -> Self {
        let schema = Arc::unwrap_or_clone(table.schema);
        Self(
            schema,
            RowData {
                row_data: table.row_data,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use super::*;
    use crate::ColumnMetadata;

    #[test]
    fn rejects_ragged_rows() {
        let schema = Schema::new([
            ("a", ColumnMetadata::new(ColumnType::Integer)),
            ("b", ColumnMetadata::new(ColumnType::Text)),
        ])
        .unwrap();
        let err = TableData::new(
            schema,
            vec![vec![Value::from(1), Value::from("x")], vec![Value::from(2)]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RowArity {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn checks_cell_types() {
        let schema = Arc::new(
            Schema::new([
                ("k", ColumnMetadata::new(ColumnType::Text)),
                ("n", ColumnMetadata::new(ColumnType::Integer)),
                ("r", ColumnMetadata::new(ColumnType::Real)),
            ])
            .unwrap(),
        );
        let row = |k: Value, n: Value, r: Value| vec![k, n, r];

        let t = TableData::new(
            schema.clone(),
            vec![
                row(Value::from("a"), Value::from(1), Value::from(3)),
                row(Value::Null, Value::Null, Value::Null),
            ],
        )
        .unwrap();
        assert_eq!(t.rows()[0][2], Value::from(3.0), "integers widen in real columns");
        assert_eq!(t.rows()[1], vec![Value::Null, Value::Null, Value::Null]);

        let err = TableData::new(
            schema.clone(),
            vec![
                row(Value::from("a"), Value::from(1), Value::from(0.5)),
                row(Value::from("b"), Value::from(2.7), Value::from(0.5)),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::CellType {
                row: 1,
                column: "n".into(),
                expected: ColumnType::Integer,
                actual: ColumnType::Real,
            }
        );

        let err = TableData::new(
            schema,
            vec![row(Value::from(5), Value::from(1), Value::from(0.5))],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::CellType { row: 0, .. }), "{err}");
    }

    #[test]
    fn table_files_with_mistyped_cells_fail_to_parse() {
        let json = r#"[
            {"columns": ["k", "n"],
             "columnMetadata": {"k": {"type": "text"}, "n": {"type": "integer"}}},
            {"rowData": [["a", "oops"]]}
        ]"#;
        let err = serde_json::from_str::<TableData>(json).unwrap_err();
        assert!(err.to_string().contains("column 'n' is integer"), "{err}");
    }

    #[test]
    fn parses_table_file_layout() {
        let json = r#"[
            {"columns": ["Name", "Base"],
             "columnMetadata": {"Name": {"type": "text"}, "Base": {"type": "integer"}}},
            {"rowData": [["Crunican, Grace", 312461], ["Doe, Jane", null]]}
        ]"#;
        let t: TableData = serde_json::from_str(json).unwrap();
        assert_eq!(t.row_count(), 2);
        let base: Vec<_> = t.column("Base").unwrap().cloned().collect();
        assert_eq!(base, vec![Value::from(312_461), Value::Null]);
    }
}
