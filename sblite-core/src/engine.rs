//! Embedded SQLite engine handle. One connection shared across tasks behind
//! an async mutex; writers are serialized by the engine (WAL mode). The
//! interrupt handle lives outside the lock so cancellation never waits on a
//! running statement.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, InterruptHandle, OpenFlags};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::CoreError;

/// Metadata tables the compatibility core keeps inside the database.
const BOOTSTRAP_SQL: &str = "\
CREATE TABLE IF NOT EXISTS _policies (
  table_name TEXT NOT NULL,
  policy_name TEXT NOT NULL,
  command TEXT NOT NULL DEFAULT 'ALL',
  roles TEXT NOT NULL DEFAULT '',
  using_expr TEXT,
  check_expr TEXT,
  permissive INTEGER NOT NULL DEFAULT 1,
  PRIMARY KEY (table_name, policy_name)
);
CREATE TABLE IF NOT EXISTS _rls_tables (
  table_name TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS _rpc_functions (
  name TEXT PRIMARY KEY,
  args_json TEXT,
  return_type_json TEXT,
  language TEXT,
  volatility TEXT,
  security TEXT,
  body TEXT
);";

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub decl_types: Vec<Option<String>>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: Option<String>,
    pub not_null: bool,
    pub primary_key: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub is_view: bool,
}

pub struct Engine {
    conn: Mutex<Connection>,
    interrupt: Arc<InterruptHandle>,
}

impl Engine {
    pub fn open(path: impl AsRef<Path>) -> Result<Engine, CoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Engine::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Engine, CoreError> {
        Engine::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Engine, CoreError> {
        configure(&conn)?;
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Ok(Engine {
            conn: Mutex::new(conn),
            interrupt,
        })
    }

    /// Abort the statement currently executing on this engine, if any.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    /// Run a SELECT-shaped statement and materialize all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<QueryResult, CoreError> {
        debug!("engine query: {sql}");
        let conn = self.conn.lock().await;
        let watchdog = self.spawn_watchdog(timeout);
        let result = query_sync(&conn, sql, params);
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        result
    }

    /// Run a DML/DDL statement, returning the number of affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<usize, CoreError> {
        debug!("engine execute: {sql}");
        let conn = self.conn.lock().await;
        let watchdog = self.spawn_watchdog(timeout);
        let result = (|| {
            let mut stmt = conn.prepare(sql)?;
            let params = trim_params(&stmt, params);
            Ok(stmt.execute(params_from_iter(params.iter()))?)
        })();
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        result
    }

    /// Prepare without executing: result columns, their declared types and
    /// the number of statement parameters. Backs extended-query Describe.
    pub async fn describe(
        &self,
        sql: &str,
    ) -> Result<(Vec<String>, Vec<Option<String>>, usize), CoreError> {
        let conn = self.conn.lock().await;
        let stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let decl_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(|t| t.to_string()))
            .collect();
        let parameter_count = stmt.parameter_count();
        Ok((columns, decl_types, parameter_count))
    }

    /// Run several semicolon-separated statements, e.g. schema bootstrap.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), CoreError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }

    // The watchdog needs a worker thread to fire from while the statement
    // blocks this one; timeouts require the multi-thread runtime.
    fn spawn_watchdog(&self, timeout: Option<Duration>) -> Option<tokio::task::JoinHandle<()>> {
        let timeout = timeout?;
        let interrupt = Arc::clone(&self.interrupt);
        Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            interrupt.interrupt();
        }))
    }

    /// User tables and views, excluding the engine's and the core's own
    /// bookkeeping tables.
    pub async fn table_list(&self) -> Result<Vec<TableInfo>, CoreError> {
        let result = self
            .query(
                "SELECT name, type FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
                &[],
                None,
            )
            .await?;
        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| match (row.first(), row.get(1)) {
                (Some(Value::Text(name)), Some(Value::Text(kind))) => Some(TableInfo {
                    name: name.clone(),
                    is_view: kind == "view",
                }),
                _ => None,
            })
            .collect())
    }

    pub async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, CoreError> {
        let quoted = table.replace('"', "\"\"");
        let result = self
            .query(&format!("PRAGMA table_info(\"{quoted}\")"), &[], None)
            .await?;

        let mut columns = Vec::new();
        for row in result.rows {
            // table_info: cid, name, type, notnull, dflt_value, pk
            let name = match row.get(1) {
                Some(Value::Text(name)) => name.clone(),
                _ => continue,
            };
            let decl_type = match row.get(2) {
                Some(Value::Text(ty)) if !ty.is_empty() => Some(ty.clone()),
                _ => None,
            };
            let not_null = matches!(row.get(3), Some(Value::Integer(v)) if *v != 0);
            let default = match row.get(4) {
                Some(Value::Text(expr)) => Some(expr.clone()),
                _ => None,
            };
            let primary_key = matches!(row.get(5), Some(Value::Integer(v)) if *v != 0);
            columns.push(ColumnInfo {
                name,
                decl_type,
                not_null,
                primary_key,
                default,
            });
        }
        Ok(columns)
    }

    pub async fn has_table(&self, table: &str) -> Result<bool, CoreError> {
        let result = self
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[Value::Text(table.to_string())],
                None,
            )
            .await?;
        Ok(!result.rows.is_empty())
    }
}

/// A statement may reference only a prefix of the bound arguments (an RPC
/// body that ignores an argument, a pre-check with none); bind exactly what
/// it declares.
fn trim_params<'a>(stmt: &rusqlite::Statement<'_>, params: &'a [Value]) -> &'a [Value] {
    &params[..stmt.parameter_count().min(params.len())]
}

fn query_sync(conn: &Connection, sql: &str, params: &[Value]) -> Result<QueryResult, CoreError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let decl_types: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().map(|t| t.to_string()))
        .collect();
    let column_count = columns.len();

    let params = trim_params(&stmt, params);
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(row.get::<_, Value>(i)?);
        }
        out.push(values);
    }

    Ok(QueryResult {
        columns,
        decl_types,
        rows: out,
    })
}

fn configure(conn: &Connection) -> Result<(), CoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    register_functions(conn)?;
    conn.execute_batch(BOOTSTRAP_SQL)?;
    Ok(())
}

/// Scalar functions the translated SQL relies on: `gen_uuid()` backs the
/// DEFAULT sentinel, `regexp` backs the `~` operator family.
fn register_functions(conn: &Connection) -> Result<(), CoreError> {
    // INNOCUOUS so the function stays usable inside schema DEFAULT clauses
    conn.create_scalar_function(
        "gen_uuid",
        0,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_INNOCUOUS,
        |_ctx| Ok(Uuid::new_v4().to_string()),
    )?;

    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: Option<String> = ctx.get(0)?;
            let text: Option<String> = ctx.get(1)?;
            let (Some(pattern), Some(text)) = (pattern, text) else {
                return Ok(false);
            };
            let re = regex::Regex::new(&pattern).map_err(|e| {
                rusqlite::Error::UserFunctionError(Box::new(e))
            })?;
            Ok(re.is_match(&text))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine_with_users() -> Engine {
        let engine = Engine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT UNIQUE NOT NULL, age INTEGER);",
            )
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn query_returns_columns_and_decl_types() {
        let engine = engine_with_users().await;
        engine
            .execute(
                "INSERT INTO users (id, email, age) VALUES (?1, ?2, ?3)",
                &[
                    Value::Text("u1".into()),
                    Value::Text("a@b.c".into()),
                    Value::Integer(33),
                ],
                None,
            )
            .await
            .unwrap();

        let result = engine
            .query("SELECT id, email, age FROM users", &[], None)
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "email", "age"]);
        assert_eq!(result.decl_types[2].as_deref(), Some("INTEGER"));
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][2], Value::Integer(33));
    }

    #[tokio::test]
    async fn unique_violation_maps_to_23505() {
        let engine = engine_with_users().await;
        for _ in 0..2 {
            let result = engine
                .execute(
                    "INSERT INTO users (id, email) VALUES (gen_uuid(), 'dup@x.y')",
                    &[],
                    None,
                )
                .await;
            if let Err(err) = result {
                assert_eq!(err.sqlstate(), "23505");
                return;
            }
        }
        panic!("expected a unique constraint violation");
    }

    #[tokio::test]
    async fn not_null_violation_maps_to_23502() {
        let engine = engine_with_users().await;
        let err = engine
            .execute("INSERT INTO users (id) VALUES ('u2')", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), "23502");
    }

    #[tokio::test]
    async fn gen_uuid_function_produces_v4() {
        let engine = engine_with_users().await;
        let result = engine.query("SELECT gen_uuid()", &[], None).await.unwrap();
        let Value::Text(uuid) = &result.rows[0][0] else {
            panic!("expected text uuid");
        };
        let parsed = Uuid::parse_str(uuid).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[tokio::test]
    async fn regexp_function_backs_tilde_operator() {
        let engine = engine_with_users().await;
        let result = engine
            .query("SELECT 'hello' REGEXP 'ell', 'hello' REGEXP '^z'", &[], None)
            .await
            .unwrap();
        assert_eq!(result.rows[0][0], Value::Integer(1));
        assert_eq!(result.rows[0][1], Value::Integer(0));
    }

    #[tokio::test]
    async fn table_introspection() {
        let engine = engine_with_users().await;
        let tables = engine.table_list().await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");
        assert!(!tables[0].is_view);

        let columns = engine.table_columns("users").await.unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns[0].primary_key);
        assert!(columns[1].not_null);
        assert_eq!(columns[2].decl_type.as_deref(), Some("INTEGER"));

        assert!(engine.has_table("users").await.unwrap());
        assert!(!engine.has_table("missing").await.unwrap());
    }

    #[tokio::test]
    async fn on_disk_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        {
            let engine = Engine::open(&path).unwrap();
            engine
                .execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (7);")
                .await
                .unwrap();
        }
        let engine = Engine::open(&path).unwrap();
        let result = engine.query("SELECT n FROM t", &[], None).await.unwrap();
        assert_eq!(result.rows[0][0], Value::Integer(7));
    }

    #[tokio::test]
    async fn bookkeeping_tables_are_hidden_from_table_list() {
        let engine = Engine::open_in_memory().unwrap();
        assert!(engine.table_list().await.unwrap().is_empty());
        assert!(engine.has_table("_policies").await.unwrap());
        assert!(engine.has_table("_rpc_functions").await.unwrap());
    }

    #[tokio::test]
    async fn gen_uuid_shape_holds_over_many_draws() {
        let engine = Engine::open_in_memory().unwrap();
        let result = engine
            .query(
                "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt WHERE x < 10000) \
                 SELECT gen_uuid() FROM cnt",
                &[],
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 10_000);

        let shape = regex::Regex::new(
            r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .unwrap();
        let mut seen = std::collections::HashSet::new();
        for row in &result.rows {
            let Value::Text(uuid) = &row[0] else {
                panic!("expected text uuid");
            };
            assert!(shape.is_match(uuid), "{uuid} is not a v4 uuid");
            assert!(seen.insert(uuid.clone()), "duplicate uuid {uuid}");
        }
    }

    #[tokio::test]
    async fn uuid_default_sentinel_fills_at_insert() {
        let engine = Engine::open_in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE t (id TEXT DEFAULT (gen_uuid()), n TEXT)")
            .await
            .unwrap();
        engine
            .execute("INSERT INTO t (n) VALUES ('x')", &[], None)
            .await
            .unwrap();
        let result = engine.query("SELECT id FROM t", &[], None).await.unwrap();
        let Value::Text(uuid) = &result.rows[0][0] else {
            panic!("expected generated uuid");
        };
        assert_eq!(Uuid::parse_str(uuid).unwrap().get_version_num(), 4);
    }
}
