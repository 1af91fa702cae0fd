//! Type catalog
//! ------------
//! The fixed set of scalar kinds a field may declare, and the column types they
//! dispatch to when an entity table is materialized. Lookups are case-insensitive.
//! `ColumnType` is the only place a field spec is interpreted as a tagged variant;
//! persisted specs stay raw parameter lists.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistryError, Result};

pub const DEFAULT_CHAR_LENGTH: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    BigInteger,
    Float,
    Double,
    Decimal,
    Boolean,
    Char,
    Text,
    LongText,
    Binary,
    Blob,
    Date,
    DateTime,
    Time,
    Json,
    Uuid,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 17] = [
        ScalarKind::String,
        ScalarKind::Integer,
        ScalarKind::BigInteger,
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::Decimal,
        ScalarKind::Boolean,
        ScalarKind::Char,
        ScalarKind::Text,
        ScalarKind::LongText,
        ScalarKind::Binary,
        ScalarKind::Blob,
        ScalarKind::Date,
        ScalarKind::DateTime,
        ScalarKind::Time,
        ScalarKind::Json,
        ScalarKind::Uuid,
    ];

    /// Canonical lowercase type name as stored in field metadata.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::BigInteger => "biginteger",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Decimal => "decimal",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Char => "char",
            ScalarKind::Text => "text",
            ScalarKind::LongText => "longtext",
            ScalarKind::Binary => "binary",
            ScalarKind::Blob => "blob",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Time => "time",
            ScalarKind::Json => "json",
            ScalarKind::Uuid => "uuid",
        }
    }

    pub fn parse(type_name: &str) -> Option<ScalarKind> {
        ScalarKind::ALL.iter().copied().find(|k| k.name().eq_ignore_ascii_case(type_name))
    }

    /// Only `char` interprets parameters; every other kind ignores them.
    pub fn takes_length(&self) -> bool { matches!(self, ScalarKind::Char) }
}

pub fn is_supported(type_name: &str) -> bool { ScalarKind::parse(type_name).is_some() }

/// Concrete column type of a materialized entity table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnType {
    Varchar,
    Integer,
    BigInt,
    Float,
    Double,
    Decimal,
    Boolean,
    Char { length: u32 },
    Text,
    LongText,
    Binary,
    Blob,
    Date,
    DateTime,
    Time,
    Json,
    Uuid,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Varchar => "VARCHAR".into(),
            ColumnType::Integer => "INTEGER".into(),
            ColumnType::BigInt => "BIGINT".into(),
            ColumnType::Float => "FLOAT".into(),
            ColumnType::Double => "DOUBLE".into(),
            ColumnType::Decimal => "DECIMAL".into(),
            ColumnType::Boolean => "BOOLEAN".into(),
            ColumnType::Char { length } => format!("CHAR({})", length),
            ColumnType::Text => "TEXT".into(),
            ColumnType::LongText => "LONGTEXT".into(),
            ColumnType::Binary => "BINARY".into(),
            ColumnType::Blob => "BLOB".into(),
            ColumnType::Date => "DATE".into(),
            ColumnType::DateTime => "DATETIME".into(),
            ColumnType::Time => "TIME".into(),
            ColumnType::Json => "JSON".into(),
            ColumnType::Uuid => "UUID".into(),
        }
    }
}

/// Read a char length parameter: a positive integer, or a string of digits.
fn char_length(field_name: &str, param: &Value) -> Result<u32> {
    let n = match param {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n > 0 && n <= u32::MAX as u64 => Ok(n as u32),
        _ => Err(RegistryError::invalid_field(field_name, format!("char length must be a positive integer, got {}", param))),
    }
}

/// Dispatch a validated kind plus its trailing parameters to a column type.
pub fn column_type(field_name: &str, kind: ScalarKind, params: &[Value], default_char_length: u32) -> Result<ColumnType> {
    let ct = match kind {
        ScalarKind::String => ColumnType::Varchar,
        ScalarKind::Integer => ColumnType::Integer,
        ScalarKind::BigInteger => ColumnType::BigInt,
        ScalarKind::Float => ColumnType::Float,
        ScalarKind::Double => ColumnType::Double,
        ScalarKind::Decimal => ColumnType::Decimal,
        ScalarKind::Boolean => ColumnType::Boolean,
        ScalarKind::Char => {
            let length = match params.first() {
                Some(p) => char_length(field_name, p)?,
                None => default_char_length,
            };
            ColumnType::Char { length }
        }
        ScalarKind::Text => ColumnType::Text,
        ScalarKind::LongText => ColumnType::LongText,
        ScalarKind::Binary => ColumnType::Binary,
        ScalarKind::Blob => ColumnType::Blob,
        ScalarKind::Date => ColumnType::Date,
        ScalarKind::DateTime => ColumnType::DateTime,
        ScalarKind::Time => ColumnType::Time,
        ScalarKind::Json => ColumnType::Json,
        ScalarKind::Uuid => ColumnType::Uuid,
    };
    Ok(ct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_is_case_insensitive() {
        assert!(is_supported("decimal"));
        assert!(is_supported("DateTime"));
        assert!(is_supported("UUID"));
        assert!(!is_supported("currency"));
        assert!(!is_supported(""));
        assert_eq!(ScalarKind::ALL.len(), 17);
        for k in ScalarKind::ALL { assert_eq!(ScalarKind::parse(k.name()), Some(k)); }
    }

    #[test]
    fn char_length_defaults_and_overrides() {
        let d = column_type("code", ScalarKind::Char, &[], DEFAULT_CHAR_LENGTH).unwrap();
        assert_eq!(d.sql(), "CHAR(16)");
        let n = column_type("code", ScalarKind::Char, &[json!(8)], DEFAULT_CHAR_LENGTH).unwrap();
        assert_eq!(n, ColumnType::Char { length: 8 });
        let s = column_type("code", ScalarKind::Char, &[json!("32")], DEFAULT_CHAR_LENGTH).unwrap();
        assert_eq!(s.sql(), "CHAR(32)");
        assert!(column_type("code", ScalarKind::Char, &[json!(0)], DEFAULT_CHAR_LENGTH).is_err());
        assert!(column_type("code", ScalarKind::Char, &[json!(-3)], DEFAULT_CHAR_LENGTH).is_err());
        assert!(column_type("code", ScalarKind::Char, &[json!("wide")], DEFAULT_CHAR_LENGTH).is_err());
    }

    #[test]
    fn extra_params_are_ignored_outside_char() {
        let ct = column_type("total", ScalarKind::Decimal, &[json!(10), json!(2)], DEFAULT_CHAR_LENGTH).unwrap();
        assert_eq!(ct.sql(), "DECIMAL");
    }

    #[test]
    fn every_kind_maps_to_a_column() {
        let sql: Vec<String> = ScalarKind::ALL
            .iter()
            .map(|k| column_type("f", *k, &[], DEFAULT_CHAR_LENGTH).unwrap().sql())
            .collect();
        assert_eq!(sql, vec![
            "VARCHAR", "INTEGER", "BIGINT", "FLOAT", "DOUBLE", "DECIMAL", "BOOLEAN", "CHAR(16)", "TEXT",
            "LONGTEXT", "BINARY", "BLOB", "DATE", "DATETIME", "TIME", "JSON", "UUID",
        ]);
    }
}
