//! Encoding a single SQLite value into a wire `DataRow` field.

use pgwire::api::results::DataRowEncoder;
use pgwire::api::Type;
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use rusqlite::types::Value;

fn type_mismatch(ty: &Type, value: &Value) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".to_string(),
        "22P02".to_string(),
        format!(
            "cannot encode {} value as {}",
            crate::datatypes::storage_class_of(value),
            ty.name()
        ),
    )))
}

/// Encode `value` under the column's declared wire type. Values are coerced
/// where the engine's dynamic typing allows it (integers in REAL columns,
/// 0/1 in BOOL columns); anything else is a `22P02`.
pub fn encode_value(
    encoder: &mut DataRowEncoder,
    value: &Value,
    ty: &Type,
) -> PgWireResult<()> {
    // Type constants are not matchable patterns, hence the comparison chain
    if *ty == Type::BOOL {
        match value {
            Value::Null => encoder.encode_field(&None::<bool>),
            Value::Integer(i) => encoder.encode_field(&(*i != 0)),
            Value::Text(t) if t == "t" || t == "true" => encoder.encode_field(&true),
            Value::Text(t) if t == "f" || t == "false" => encoder.encode_field(&false),
            other => Err(type_mismatch(ty, other)),
        }
    } else if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
        match value {
            Value::Null => encoder.encode_field(&None::<i64>),
            Value::Integer(i) => encoder.encode_field(i),
            other => Err(type_mismatch(ty, other)),
        }
    } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        match value {
            Value::Null => encoder.encode_field(&None::<f64>),
            Value::Real(f) => encoder.encode_field(f),
            Value::Integer(i) => encoder.encode_field(&(*i as f64)),
            other => Err(type_mismatch(ty, other)),
        }
    } else if *ty == Type::BYTEA {
        match value {
            Value::Null => encoder.encode_field(&None::<&[u8]>),
            Value::Blob(bytes) => encoder.encode_field(&bytes.as_slice()),
            Value::Text(t) => encoder.encode_field(&t.as_bytes()),
            other => Err(type_mismatch(ty, other)),
        }
    } else {
        // TEXT, VARCHAR, NUMERIC, UNKNOWN and everything else go out as text
        match value {
            Value::Null => encoder.encode_field(&None::<&str>),
            Value::Text(t) => encoder.encode_field(&t.as_str()),
            Value::Integer(i) => encoder.encode_field(&i.to_string()),
            Value::Real(f) => encoder.encode_field(&f.to_string()),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                encoder.encode_field(&format!("\\x{hex}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgwire::api::results::FieldInfo;
    use pgwire::api::results::FieldFormat;
    use std::sync::Arc;

    fn encoder_for(ty: Type) -> DataRowEncoder {
        DataRowEncoder::new(Arc::new(vec![FieldInfo::new(
            "c".to_string(),
            None,
            None,
            ty,
            FieldFormat::Text,
        )]))
    }

    #[test]
    fn encodes_matching_values() {
        let mut enc = encoder_for(Type::INT8);
        encode_value(&mut enc, &Value::Integer(42), &Type::INT8).unwrap();

        let mut enc = encoder_for(Type::BOOL);
        encode_value(&mut enc, &Value::Integer(1), &Type::BOOL).unwrap();

        let mut enc = encoder_for(Type::FLOAT8);
        encode_value(&mut enc, &Value::Integer(2), &Type::FLOAT8).unwrap();

        let mut enc = encoder_for(Type::TEXT);
        encode_value(&mut enc, &Value::Text("hello".into()), &Type::TEXT).unwrap();
    }

    #[test]
    fn nulls_encode_for_every_type() {
        for ty in [Type::BOOL, Type::INT8, Type::FLOAT8, Type::BYTEA, Type::TEXT] {
            let mut enc = encoder_for(ty.clone());
            encode_value(&mut enc, &Value::Null, &ty).unwrap();
        }
    }

    #[test]
    fn mismatches_are_rejected() {
        let mut enc = encoder_for(Type::INT8);
        assert!(encode_value(&mut enc, &Value::Text("nope".into()), &Type::INT8).is_err());
    }

    #[test]
    fn numbers_stringify_under_text_types() {
        let mut enc = encoder_for(Type::TEXT);
        encode_value(&mut enc, &Value::Integer(7), &Type::TEXT).unwrap();
        let mut enc = encoder_for(Type::NUMERIC);
        encode_value(&mut enc, &Value::Real(1.5), &Type::NUMERIC).unwrap();
    }
}
