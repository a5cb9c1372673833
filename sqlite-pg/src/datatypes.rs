//! Storage-class and declared-type mapping onto PostgreSQL OIDs.
//!
//! Policy: a declared column type from table metadata wins; otherwise the
//! engine storage class of the value decides. Baseline bindings:
//! INTEGER→int8 (20), TEXT→text (25), REAL→float8 (701), BLOB→bytea (17).

use pgwire::api::Type;
use rusqlite::types::Value;

/// PostgreSQL type for a declared SQLite column type. Declarations are free
/// text in SQLite, so matching is by uppercased prefix family.
pub fn declared_type_to_pg(declared: &str) -> Type {
    let upper = declared.trim().to_ascii_uppercase();
    // parameterized declarations keep their base name
    let base = upper.split(['(', ' ']).next().unwrap_or("");
    match base {
        "BOOLEAN" | "BOOL" => Type::BOOL,
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "INT2" | "INT4" | "INT8" | "TINYINT"
        | "MEDIUMINT" | "SERIAL" | "BIGSERIAL" => Type::INT8,
        "REAL" | "FLOAT" | "DOUBLE" | "FLOAT4" | "FLOAT8" => Type::FLOAT8,
        "NUMERIC" | "DECIMAL" => Type::NUMERIC,
        "BLOB" | "BYTEA" => Type::BYTEA,
        _ => Type::TEXT,
    }
}

/// PostgreSQL type inferred from a value's storage class, used when the
/// column carries no declared type (expressions, `COUNT(*)`, ...).
pub fn value_pg_type(value: &Value) -> Type {
    match value {
        Value::Integer(_) => Type::INT8,
        Value::Real(_) => Type::FLOAT8,
        Value::Text(_) => Type::TEXT,
        Value::Blob(_) => Type::BYTEA,
        Value::Null => Type::UNKNOWN,
    }
}

/// Engine storage class name of a value, as `typeof()` reports it.
pub fn storage_class_of(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
        Value::Null => "null",
    }
}

/// Whether binary result format is supported for this type; everything else
/// is sent in text format regardless of what Bind requested.
pub fn supports_binary(ty: &Type) -> bool {
    [
        Type::BOOL,
        Type::INT2,
        Type::INT4,
        Type::INT8,
        Type::FLOAT4,
        Type::FLOAT8,
        Type::BYTEA,
    ]
    .contains(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_oids() {
        assert_eq!(value_pg_type(&Value::Integer(1)).oid(), 20);
        assert_eq!(value_pg_type(&Value::Text("x".into())).oid(), 25);
        assert_eq!(value_pg_type(&Value::Real(1.0)).oid(), 701);
        assert_eq!(value_pg_type(&Value::Blob(vec![1])).oid(), 17);
    }

    #[test]
    fn declared_types_override() {
        assert_eq!(declared_type_to_pg("BOOLEAN"), Type::BOOL);
        assert_eq!(declared_type_to_pg("integer"), Type::INT8);
        assert_eq!(declared_type_to_pg("VARCHAR(255)"), Type::TEXT);
        assert_eq!(declared_type_to_pg("NUMERIC(10, 2)"), Type::NUMERIC);
        assert_eq!(declared_type_to_pg("double precision"), Type::FLOAT8);
        assert_eq!(declared_type_to_pg("BLOB"), Type::BYTEA);
        assert_eq!(declared_type_to_pg("uuid"), Type::TEXT);
    }

    #[test]
    fn binary_format_allowlist() {
        assert!(supports_binary(&Type::INT8));
        assert!(supports_binary(&Type::BYTEA));
        assert!(!supports_binary(&Type::TEXT));
        assert!(!supports_binary(&Type::NUMERIC));
    }
}
