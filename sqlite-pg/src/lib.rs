//! SQLite value mapping and encoding for the PostgreSQL wire protocol.

pub mod datatypes;
pub mod encoder;
pub mod row_encoder;

pub use datatypes::{declared_type_to_pg, storage_class_of, value_pg_type};
pub use encoder::encode_value;
pub use row_encoder::RowEncoder;
