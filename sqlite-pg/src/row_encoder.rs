//! Row-at-a-time adapter from materialized engine rows to wire `DataRow`s.

use std::sync::Arc;

use pgwire::api::results::{DataRowEncoder, FieldInfo};
use pgwire::error::PgWireResult;
use pgwire::messages::data::DataRow;
use rusqlite::types::Value;

use crate::encoder::encode_value;

pub struct RowEncoder {
    rows: Vec<Vec<Value>>,
    curr_idx: usize,
    fields: Arc<Vec<FieldInfo>>,
}

impl RowEncoder {
    pub fn new(rows: Vec<Vec<Value>>, fields: Arc<Vec<FieldInfo>>) -> Self {
        Self {
            rows,
            curr_idx: 0,
            fields,
        }
    }

    pub fn next_row(&mut self) -> Option<PgWireResult<DataRow>> {
        if self.curr_idx == self.rows.len() {
            return None;
        }

        let row = &self.rows[self.curr_idx];
        let mut encoder = DataRowEncoder::new(self.fields.clone());
        for (value, field) in row.iter().zip(self.fields.iter()) {
            if let Err(e) = encode_value(&mut encoder, value, field.datatype()) {
                return Some(Err(e));
            }
        }
        self.curr_idx += 1;
        Some(encoder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgwire::api::results::FieldFormat;
    use pgwire::api::Type;

    fn fields() -> Arc<Vec<FieldInfo>> {
        Arc::new(vec![
            FieldInfo::new("id".to_string(), None, None, Type::INT8, FieldFormat::Text),
            FieldInfo::new("name".to_string(), None, None, Type::TEXT, FieldFormat::Text),
        ])
    }

    #[test]
    fn encodes_all_rows_then_stops() {
        let rows = vec![
            vec![Value::Integer(1), Value::Text("a".into())],
            vec![Value::Integer(2), Value::Null],
        ];
        let mut encoder = RowEncoder::new(rows, fields());
        assert!(encoder.next_row().unwrap().is_ok());
        assert!(encoder.next_row().unwrap().is_ok());
        assert!(encoder.next_row().is_none());
    }

    #[test]
    fn empty_result_yields_no_rows() {
        let mut encoder = RowEncoder::new(Vec::new(), fields());
        assert!(encoder.next_row().is_none());
    }
}
