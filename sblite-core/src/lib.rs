//! PostgreSQL compatibility core over an embedded SQLite engine: the query
//! pipeline, row-level security enforcement, RPC functions and migration
//! export. The wire front-end and REST collaborators call in through
//! [`Pipeline`].

pub mod auth;
pub mod engine;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod policy;
pub mod rls;
pub mod rpc;

pub use auth::{AuthContext, Role};
pub use engine::{ColumnInfo, Engine, QueryResult, TableInfo};
pub use error::CoreError;
pub use pipeline::{Outcome, Pipeline, QueryHint};
pub use policy::{Policy, PolicyCommand, PolicySet, PolicyStore};
pub use rpc::RpcFunction;
