// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar cell values and column types.

extern crate alloc;

use alloc::string::{String, ToString};
use core::cmp::Ordering;
use core::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit signed integers.
    Integer,
    /// 64-bit floats.
    Real,
    /// UTF-8 text.
    Text,
}

impl ColumnType {
    /// Returns `true` for `integer` and `real`.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }

    /// Returns the lowercase name used in schema descriptors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell.
///
/// Serialized as a plain JSON scalar, except that a non-finite real, which JSON numbers cannot
/// hold, is written as `{"real": "NaN"}` (or `"inf"`, `"-inf"`). Writing it as a number would
/// turn it into `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// An integer cell.
    Integer(i64),
    /// A real cell.
    Real(f64),
    /// A text cell.
    Text(String),
}

impl Value {
    /// Returns `true` if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The column type this value belongs to, or `None` for null.
    pub fn value_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Real(_) => Some(ColumnType::Real),
            Self::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Numeric view of the value, if it is an integer or a real.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Borrowed text, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to the given column type.
    ///
    /// Conversions that cannot succeed (unparseable text, non-finite reals into integers)
    /// produce [`Value::Null`]. Null stays null.
    pub fn cast(&self, ty: ColumnType) -> Self {
        match (self, ty) {
            (Self::Null, _) => Self::Null,
            (Self::Integer(_), ColumnType::Integer)
            | (Self::Real(_), ColumnType::Real)
            | (Self::Text(_), ColumnType::Text) => self.clone(),
            (Self::Integer(_), ColumnType::Real) => self.as_f64().map_or(Self::Null, Self::Real),
            (Self::Real(r), ColumnType::Integer) => {
                if r.is_finite() {
                    #[allow(clippy::cast_possible_truncation, reason = "saturating float cast")]
                    let i = *r as i64;
                    Self::Integer(i)
                } else {
                    Self::Null
                }
            }
            (Self::Integer(_) | Self::Real(_), ColumnType::Text) => Self::Text(self.to_string()),
            (Self::Text(s), ColumnType::Integer) => {
                s.trim().parse().map_or(Self::Null, Self::Integer)
            }
            (Self::Text(s), ColumnType::Real) => s.trim().parse().map_or(Self::Null, Self::Real),
        }
    }

    /// Compares two values the way filter predicates do.
    ///
    /// Integers and reals compare numerically, text compares lexicographically. Any other
    /// pairing (including null on either side) is unordered.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Integer(_) | Self::Real(_), Self::Integer(_) | Self::Real(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }

    /// Equality as used by `eq` filters: numeric across integer/real, and null equals null.
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// A total order for sorting: null first, then numbers, then text.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) | Value::Real(_) => 1,
                Value::Text(_) => 2,
            }
        }
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Integer(_) | Self::Real(_), Self::Integer(_) | Self::Real(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

const REAL_KEY: &str = "real";

fn non_finite_name(r: f64) -> &'static str {
    if r.is_nan() {
        "NaN"
    } else if r.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Real(r) if r.is_finite() => serializer.serialize_f64(*r),
            Self::Real(r) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(REAL_KEY, non_finite_name(*r))?;
                map.end()
            }
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a number, a string, or a non-finite real")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Err(E::invalid_type(de::Unexpected::Bool(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        #[allow(clippy::cast_precision_loss, reason = "only past i64::MAX")]
        let value = i64::try_from(v).map_or(Value::Real(v as f64), Value::Integer);
        Ok(value)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Real(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.into()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let Some((key, name)) = map.next_entry::<String, String>()? else {
            return Err(de::Error::invalid_length(0, &self));
        };
        if key != REAL_KEY {
            return Err(de::Error::unknown_field(&key, &[REAL_KEY]));
        }
        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::invalid_length(2, &self));
        }
        let r = match name.as_str() {
            "NaN" => f64::NAN,
            "inf" => f64::INFINITY,
            "-inf" => f64::NEG_INFINITY,
            _ => {
                return Err(de::Error::unknown_variant(&name, &["NaN", "inf", "-inf"]));
            }
        };
        Ok(Value::Real(r))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
