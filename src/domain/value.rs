// ============================================================================
// Field Values
// Tagged values carried by message fields, with checked typed accessors
// ============================================================================

use crate::errors::DataError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Schema-declared type of a dictionary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldType {
    Price,
    F64,
    I64,
    U64,
    Bool,
    Char,
    String,
    DateTime,
    Date,
}

/// A single field value as delivered in a message.
///
/// Accessors return [`DataError`] on a shape mismatch rather than panicking;
/// lossless numeric coercions (integer to price, price to float) are applied
/// because feeds are not consistent about the width they publish numeric
/// fields with.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldValue {
    Price(Decimal),
    F64(f64),
    I64(i64),
    U64(u64),
    Bool(bool),
    Char(char),
    String(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl FieldValue {
    /// Name of the carried type, used in error reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Price(_) => "price",
            FieldValue::F64(_) => "f64",
            FieldValue::I64(_) => "i64",
            FieldValue::U64(_) => "u64",
            FieldValue::Bool(_) => "bool",
            FieldValue::Char(_) => "char",
            FieldValue::String(_) => "string",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Date(_) => "date",
        }
    }

    pub fn try_price(&self) -> Result<Decimal, DataError> {
        match self {
            FieldValue::Price(p) => Ok(*p),
            FieldValue::F64(f) => Decimal::from_f64_retain(*f)
                .ok_or_else(|| DataError::new("price", self.type_name())),
            FieldValue::I64(i) => Ok(Decimal::from(*i)),
            FieldValue::U64(u) => Ok(Decimal::from(*u)),
            _ => Err(DataError::new("price", self.type_name())),
        }
    }

    pub fn try_f64(&self) -> Result<f64, DataError> {
        match self {
            FieldValue::F64(f) => Ok(*f),
            FieldValue::Price(p) => p
                .to_f64()
                .ok_or_else(|| DataError::new("f64", self.type_name())),
            FieldValue::I64(i) => Ok(*i as f64),
            FieldValue::U64(u) => Ok(*u as f64),
            _ => Err(DataError::new("f64", self.type_name())),
        }
    }

    pub fn try_u64(&self) -> Result<u64, DataError> {
        match self {
            FieldValue::U64(u) => Ok(*u),
            FieldValue::I64(i) if *i >= 0 => Ok(*i as u64),
            _ => Err(DataError::new("u64", self.type_name())),
        }
    }

    pub fn try_i64(&self) -> Result<i64, DataError> {
        match self {
            FieldValue::I64(i) => Ok(*i),
            FieldValue::U64(u) => {
                i64::try_from(*u).map_err(|_| DataError::new("i64", self.type_name()))
            }
            _ => Err(DataError::new("i64", self.type_name())),
        }
    }

    pub fn try_bool(&self) -> Result<bool, DataError> {
        match self {
            FieldValue::Bool(b) => Ok(*b),
            FieldValue::I64(i) => Ok(*i != 0),
            FieldValue::U64(u) => Ok(*u != 0),
            _ => Err(DataError::new("bool", self.type_name())),
        }
    }

    /// Single characters are frequently published as one-byte strings.
    pub fn try_char(&self) -> Result<char, DataError> {
        match self {
            FieldValue::Char(c) => Ok(*c),
            FieldValue::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(DataError::new("char", self.type_name())),
                }
            }
            _ => Err(DataError::new("char", self.type_name())),
        }
    }

    pub fn try_str(&self) -> Result<&str, DataError> {
        match self {
            FieldValue::String(s) => Ok(s),
            _ => Err(DataError::new("string", self.type_name())),
        }
    }

    pub fn try_datetime(&self) -> Result<DateTime<Utc>, DataError> {
        match self {
            FieldValue::DateTime(t) => Ok(*t),
            _ => Err(DataError::new("datetime", self.type_name())),
        }
    }

    pub fn try_date(&self) -> Result<NaiveDate, DataError> {
        match self {
            FieldValue::Date(d) => Ok(*d),
            FieldValue::DateTime(t) => Ok(t.date_naive()),
            _ => Err(DataError::new("date", self.type_name())),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        FieldValue::Price(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::F64(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::I64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::U64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<char> for FieldValue {
    fn from(v: char) -> Self {
        FieldValue::Char(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::DateTime(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_coercions() {
        assert_eq!(
            FieldValue::Price(Decimal::new(105, 1)).try_price().unwrap(),
            Decimal::new(105, 1)
        );
        assert_eq!(
            FieldValue::I64(42).try_price().unwrap(),
            Decimal::from(42i64)
        );
        assert!(FieldValue::String("x".into()).try_price().is_err());
    }

    #[test]
    fn test_integer_coercions() {
        assert_eq!(FieldValue::I64(7).try_u64().unwrap(), 7);
        assert!(FieldValue::I64(-7).try_u64().is_err());
        assert_eq!(FieldValue::U64(7).try_i64().unwrap(), 7);
    }

    #[test]
    fn test_char_from_string() {
        assert_eq!(FieldValue::String("R".into()).try_char().unwrap(), 'R');
        assert!(FieldValue::String("RT".into()).try_char().is_err());
        assert!(FieldValue::String(String::new()).try_char().is_err());
    }

    #[test]
    fn test_mismatch_reports_types() {
        let err = FieldValue::Bool(true).try_price().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("price"));
        assert!(text.contains("bool"));
    }
}
