// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Table schemas.
//!
//! A [`Schema`] is an ordered list of unique column ids, each with [`ColumnMetadata`]. Schemas are
//! immutable; every operator that changes column structure builds a new one.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::value::ColumnType;

/// Errors raised by schema construction, lookups, and compatibility checks.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A column id was referenced that the schema does not contain.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    /// A column id appears more than once.
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    /// A column has no metadata entry.
    #[error("no metadata for column '{0}'")]
    MissingMetadata(String),
    /// A positional column reference is past the end of the schema.
    #[error("column index {index} out of range for a schema with {len} columns")]
    ColumnIndexOutOfRange {
        /// The requested position.
        index: usize,
        /// Number of columns in the schema.
        len: usize,
    },
    /// A row does not have one value per column.
    #[error("row {row} has {actual} values, schema has {expected} columns")]
    RowArity {
        /// Position of the offending row.
        row: usize,
        /// Number of schema columns.
        expected: usize,
        /// Number of values in the row.
        actual: usize,
    },
    /// A cell holds a value of a different type than its column declares.
    #[error("row {row}: column '{column}' is {expected}, found a {actual} value")]
    CellType {
        /// Position of the offending row.
        row: usize,
        /// Column id.
        column: String,
        /// Declared column type.
        expected: ColumnType,
        /// Type of the value found.
        actual: ColumnType,
    },
    /// Two schemas have a different number of columns.
    #[error("incompatible schemas: expected {expected} columns, found {actual}")]
    ColumnCountMismatch {
        /// Column count of the reference schema.
        expected: usize,
        /// Column count of the other schema.
        actual: usize,
    },
    /// Two schemas name a column differently at the same position.
    #[error("incompatible schemas: column {index} is '{actual}', expected '{expected}'")]
    ColumnIdMismatch {
        /// Column position.
        index: usize,
        /// Id in the reference schema.
        expected: String,
        /// Id in the other schema.
        actual: String,
    },
    /// Two schemas type a column differently at the same position.
    #[error("incompatible schemas: column '{column}' is {actual}, expected {expected}")]
    ColumnTypeMismatch {
        /// Column id.
        column: String,
        /// Type in the reference schema.
        expected: ColumnType,
        /// Type in the other schema.
        actual: ColumnType,
    },
}

/// Per-column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Declared column type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Optional human-readable name.
    #[serde(
        rename = "displayName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

impl ColumnMetadata {
    /// Metadata with a type and no display name.
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            display_name: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Serialized form of a schema: `{columns, columnMetadata}`.
#[derive(Serialize, Deserialize)]
struct SchemaDescriptor {
    columns: Vec<String>,
    #[serde(rename = "columnMetadata")]
    column_metadata: BTreeMap<String, ColumnMetadata>,
}

/// An ordered set of uniquely named, typed columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDescriptor", into = "SchemaDescriptor")]
pub struct Schema {
    columns: Vec<String>,
    metadata: Vec<ColumnMetadata>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema from `(id, metadata)` pairs, in column order.
    pub fn new<I, S>(columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, ColumnMetadata)>,
        S: Into<String>,
    {
        let mut ids = Vec::new();
        let mut metadata = Vec::new();
        let mut index = HashMap::new();
        for (id, md) in columns {
            let id = id.into();
            if index.insert(id.clone(), ids.len()).is_some() {
                return Err(SchemaError::DuplicateColumn(id));
            }
            ids.push(id);
            metadata.push(md);
        }
        Ok(Self {
            columns: ids,
            metadata,
            index,
        })
    }

    /// Builds a schema from a column list and an id-keyed metadata map.
    ///
    /// Every listed column must have an entry in `column_metadata`; extra entries are ignored.
    pub fn from_parts(
        columns: Vec<String>,
        column_metadata: &BTreeMap<String, ColumnMetadata>,
    ) -> Result<Self, SchemaError> {
        let mut pairs = Vec::with_capacity(columns.len());
        for id in columns {
            let Some(md) = column_metadata.get(&id) else {
                return Err(SchemaError::MissingMetadata(id));
            };
            let md = md.clone();
            pairs.push((id, md));
        }
        Self::new(pairs)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column ids in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Iterates `(id, metadata)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnMetadata)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.metadata.iter())
    }

    /// Position of a column.
    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Position of a column, or [`SchemaError::UnknownColumn`].
    pub fn require_index(&self, id: &str) -> Result<usize, SchemaError> {
        self.column_index(id)
            .ok_or_else(|| SchemaError::UnknownColumn(id.into()))
    }

    /// Declared type of a column.
    pub fn column_type(&self, id: &str) -> Option<ColumnType> {
        self.metadata(id).map(|md| md.column_type)
    }

    /// Display name of a column, falling back to its id.
    pub fn display_name(&self, id: &str) -> Option<&str> {
        let i = self.column_index(id)?;
        Some(
            self.metadata[i]
                .display_name
                .as_deref()
                .unwrap_or(&self.columns[i]),
        )
    }

    /// Metadata of a column.
    pub fn metadata(&self, id: &str) -> Option<&ColumnMetadata> {
        self.column_index(id).map(|i| &self.metadata[i])
    }

    /// Metadata of the column at `index`.
    pub fn metadata_at(&self, index: usize) -> Option<&ColumnMetadata> {
        self.metadata.get(index)
    }

    /// Checks that `other` has the same column ids and types, position by position.
    ///
    /// Display names are not compared.
    pub fn compat_check(&self, other: &Self) -> Result<(), SchemaError> {
        if self.len() != other.len() {
            return Err(SchemaError::ColumnCountMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        for (index, ((id, md), (other_id, other_md))) in self.iter().zip(other.iter()).enumerate()
        {
            if id != other_id {
                return Err(SchemaError::ColumnIdMismatch {
                    index,
                    expected: id.into(),
                    actual: other_id.into(),
                });
            }
            if md.column_type != other_md.column_type {
                return Err(SchemaError::ColumnTypeMismatch {
                    column: id.into(),
                    expected: md.column_type,
                    actual: other_md.column_type,
                });
            }
        }
        Ok(())
    }
}

impl TryFrom<SchemaDescriptor> for Schema {
    type Error = SchemaError;

    fn try_from(desc: SchemaDescriptor) -> Result<Self, Self::Error> {
        Self::from_parts(desc.columns, &desc.column_metadata)
    }
}

impl From<Schema> for SchemaDescriptor {
    fn from(schema: Schema) -> Self {
        let column_metadata = schema
            .columns
            .iter()
            .cloned()
            .zip(schema.metadata)
            .collect();
        Self {
            columns: schema.columns,
            column_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use super::*;

    fn jobs() -> Schema {
        Schema::new([
            ("Job", ColumnMetadata::new(ColumnType::Text)),
            (
                "TCOE",
                ColumnMetadata::new(ColumnType::Integer).with_display_name("Total Comp"),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn lookups() {
        let s = jobs();
        assert_eq!(s.column_index("TCOE"), Some(1));
        assert_eq!(s.column_type("Job"), Some(ColumnType::Text));
        assert_eq!(s.display_name("TCOE"), Some("Total Comp"));
        assert_eq!(s.display_name("Job"), Some("Job"));
        assert_eq!(s.column_index("nope"), None);
        assert_eq!(
            s.require_index("nope"),
            Err(SchemaError::UnknownColumn("nope".to_string()))
        );
    }

    #[test]
    fn duplicate_and_missing_metadata_are_rejected() {
        let dup = Schema::new([
            ("a", ColumnMetadata::new(ColumnType::Text)),
            ("a", ColumnMetadata::new(ColumnType::Text)),
        ]);
        assert_eq!(dup, Err(SchemaError::DuplicateColumn("a".to_string())));

        let md = BTreeMap::new();
        let missing = Schema::from_parts(vec!["x".to_string()], &md);
        assert_eq!(missing, Err(SchemaError::MissingMetadata("x".to_string())));
    }

    #[test]
    fn compat_check_reports_first_difference() {
        let a = jobs();
        assert_eq!(a.compat_check(&a.clone()), Ok(()));

        let short = Schema::new([("Job", ColumnMetadata::new(ColumnType::Text))]).unwrap();
        assert!(matches!(
            a.compat_check(&short),
            Err(SchemaError::ColumnCountMismatch {
                expected: 2,
                actual: 1
            })
        ));

        let renamed = Schema::new([
            ("Job", ColumnMetadata::new(ColumnType::Text)),
            ("Base", ColumnMetadata::new(ColumnType::Integer)),
        ])
        .unwrap();
        assert!(matches!(
            a.compat_check(&renamed),
            Err(SchemaError::ColumnIdMismatch { index: 1, .. })
        ));

        let retyped = Schema::new([
            ("Job", ColumnMetadata::new(ColumnType::Text)),
            ("TCOE", ColumnMetadata::new(ColumnType::Real)),
        ])
        .unwrap();
        assert!(matches!(
            a.compat_check(&retyped),
            Err(SchemaError::ColumnTypeMismatch { .. })
        ));
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let json = r#"{"columns":["Job","TCOE"],
            "columnMetadata":{"TCOE":{"type":"integer","displayName":"Total Comp"},
                              "Job":{"type":"text"}}}"#;
        let s: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(s, jobs());
        let back: Schema = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert_eq!(back, s);
    }
}
