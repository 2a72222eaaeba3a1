//! Driver rows to JSON values.
//!
//! Each driver reports types differently, so decoding is driven by the
//! reported type name with a string fallback. NULL always maps to `Value::Null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

fn decimal_value(d: Decimal) -> Value {
    Value::String(d.normalize().to_string())
}

pub(crate) fn pg_value(row: &PgRow, index: usize) -> Value {
    let value_ref = match row.try_get_raw(index) {
        Ok(v) => v,
        Err(_) => return Value::Null,
    };
    if value_ref.is_null() {
        return Value::Null;
    }
    let type_name = value_ref.type_info().name().to_string();

    match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool).unwrap_or(Value::Null),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from).unwrap_or(Value::Null),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from).unwrap_or(Value::Null),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from).unwrap_or(Value::Null),
        "FLOAT4" => row.try_get::<f32, _>(index).map(Value::from).unwrap_or(Value::Null),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from).unwrap_or(Value::Null),
        "NUMERIC" => row.try_get::<Decimal, _>(index).map(decimal_value).unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(index)
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index).unwrap_or(Value::Null),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => row
            .try_get::<Vec<String>, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT4[]" => row
            .try_get::<Vec<i32>, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT8[]" => row
            .try_get::<Vec<i64>, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => match row.try_get::<String, _>(index) {
            Ok(s) => Value::String(s),
            Err(_) => match value_ref.as_bytes() {
                Ok(bytes) => std::str::from_utf8(bytes)
                    .map(|s| Value::String(s.to_string()))
                    .unwrap_or_else(|_| Value::String(format!("<{}>", type_name))),
                Err(_) => Value::String(format!("<{}>", type_name)),
            },
        },
    }
}

pub(crate) fn mysql_value(row: &MySqlRow, index: usize) -> Value {
    let value_ref = match row.try_get_raw(index) {
        Ok(v) => v,
        Err(_) => return Value::Null,
    };
    if value_ref.is_null() {
        return Value::Null;
    }
    let type_name = value_ref.type_info().name().to_string();

    match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(index).map(Value::Bool).unwrap_or(Value::Null),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<u64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT" => row.try_get::<f32, _>(index).map(Value::from).unwrap_or(Value::Null),
        "DOUBLE" => row.try_get::<f64, _>(index).map(Value::from).unwrap_or(Value::Null),
        "DECIMAL" => row.try_get::<Decimal, _>(index).map(decimal_value).unwrap_or(Value::Null),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "JSON" => row.try_get::<Value, _>(index).unwrap_or(Value::Null),
        _ => match row.try_get::<String, _>(index) {
            Ok(s) => Value::String(s),
            Err(_) => row
                .try_get::<Vec<u8>, _>(index)
                .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                .unwrap_or(Value::Null),
        },
    }
}

/// SQLite columns are dynamically typed (expression columns report no
/// declared type), so try the storage classes in order.
pub(crate) fn sqlite_value(row: &SqliteRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(v) if v.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        _ => {}
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        Value::from(v)
    } else if let Ok(v) = row.try_get::<f64, _>(index) {
        Value::from(v)
    } else if let Ok(v) = row.try_get::<String, _>(index) {
        Value::String(v)
    } else if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        Value::String(String::from_utf8_lossy(&v).into_owned())
    } else {
        Value::Null
    }
}

/// Interpret a catalog flag that may come back as a bool, a 0/1 number, or `YES`/`NO`.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        Value::String(s) => matches!(s.to_uppercase().as_str(), "YES" | "TRUE" | "1"),
        _ => false,
    }
}

pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null => None,
        Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("YES")));
        assert!(!truthy(&json!("NO")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&Value::Null));
    }

    #[test]
    fn test_text() {
        assert_eq!(text(&json!("orders")), Some("orders".to_string()));
        assert_eq!(text(&json!("")), None);
        assert_eq!(text(&Value::Null), None);
        assert_eq!(text(&json!(42)), Some("42".to_string()));
    }

    #[test]
    fn test_decimal_value_normalizes() {
        let d: Decimal = "150.500".parse().unwrap();
        assert_eq!(decimal_value(d), json!("150.5"));
    }
}
