// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain-text rendering of [`TableData`], for logs and the demo.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::table::TableData;
use crate::value::{ColumnType, Value};

/// Formats a cell for display under a column of type `ty`.
///
/// Integers get thousands separators, reals get two decimals and separators, nulls are blank.
pub fn view_format(ty: ColumnType, value: &Value) -> String {
    match (ty, value) {
        (_, Value::Null) => String::new(),
        (ColumnType::Integer, Value::Integer(i)) => group_thousands(&i.to_string()),
        (ColumnType::Real | ColumnType::Integer, Value::Real(r)) => {
            if r.is_finite() {
                let s = format!("{r:.2}");
                match s.split_once('.') {
                    Some((int, frac)) => format!("{}.{frac}", group_thousands(int)),
                    None => s,
                }
            } else {
                r.to_string()
            }
        }
        (ColumnType::Real, Value::Integer(i)) => view_format(ty, &Value::Real(*i as f64)),
        _ => value.to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for TableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.schema();
        let header: Vec<String> = schema
            .columns()
            .iter()
            .map(|id| schema.display_name(id).unwrap_or(id).into())
            .collect();
        let cells: Vec<Vec<String>> = self
            .rows()
            .iter()
            .map(|row| {
                schema
                    .iter()
                    .zip(row)
                    .map(|((_, md), v)| view_format(md.column_type, v))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &cells {
            for (w, c) in widths.iter_mut().zip(row) {
                *w = (*w).max(c.chars().count());
            }
        }

        write_line(f, &header, &widths, |_| false)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_line(f, &rule, &widths, |_| false)?;
        for row in &cells {
            write_line(f, row, &widths, |i| {
                schema
                    .metadata_at(i)
                    .is_some_and(|md| md.column_type.is_numeric())
            })?;
        }
        write!(f, "({} rows)", self.row_count())
    }
}

fn write_line(
    f: &mut fmt::Formatter<'_>,
    cells: &[String],
    widths: &[usize],
    right_align: impl Fn(usize) -> bool,
) -> fmt::Result {
    for (i, (cell, w)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            f.write_str(" | ")?;
        }
        if right_align(i) {
            write!(f, "{cell:>w$}")?;
        } else {
            write!(f, "{cell:<w$}")?;
        }
    }
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::{ColumnMetadata, Schema};

    #[test]
    fn formats_numbers_like_a_spreadsheet() {
        assert_eq!(view_format(ColumnType::Integer, &Value::from(399_921)), "399,921");
        assert_eq!(view_format(ColumnType::Integer, &Value::from(-1_000)), "-1,000");
        assert_eq!(view_format(ColumnType::Integer, &Value::from(12)), "12");
        assert_eq!(view_format(ColumnType::Real, &Value::from(1234.5)), "1,234.50");
        assert_eq!(view_format(ColumnType::Real, &Value::from(f64::NAN)), "NaN");
        assert_eq!(view_format(ColumnType::Text, &Value::Null), "");
    }

    #[test]
    fn renders_a_grid() {
        let schema = Schema::new([
            ("Job", ColumnMetadata::new(ColumnType::Text)),
            (
                "TCOE",
                ColumnMetadata::new(ColumnType::Integer).with_display_name("Total"),
            ),
        ])
        .unwrap();
        let t = TableData::new(
            schema,
            vec![
                vec![Value::from("Safety"), Value::from(1_500)],
                vec![Value::from("IT"), Value::from(20)],
            ],
        )
        .unwrap();
        let text = t.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Job    | Total");
        assert_eq!(lines[2], "Safety | 1,500");
        assert_eq!(lines[3], "IT     |    20");
        assert_eq!(lines[4], "(2 rows)");
    }
}
