//! Migration export: rebuild PostgreSQL DDL from the engine catalog and the
//! function metadata, via the PostgreSQL-dialect generator.

use rusqlite::types::Value;
use sblite_sql::ast::{
    ColumnConstraint, ColumnDef, CreateTableStmt, Expr, Stmt, TypeName,
};
use sblite_sql::token::Pos;
use sblite_sql::{mapper, to_postgres, Parser};

use crate::engine::Engine;
use crate::error::CoreError;
use crate::rpc;

/// Emit a PostgreSQL script recreating every user table, index and stored
/// function.
pub async fn export_schema(engine: &Engine) -> Result<String, CoreError> {
    let mut script = String::new();

    for table in engine.table_list().await? {
        if table.is_view {
            continue;
        }
        let stmt = table_to_create(engine, &table.name).await?;
        script.push_str(&to_postgres(&stmt)?);
        script.push_str(";\n\n");
    }

    let indexes = engine
        .query(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND sql IS NOT NULL \
             AND tbl_name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
            &[],
            None,
        )
        .await?;
    for row in indexes.rows {
        let Some(Value::Text(sql)) = row.first() else {
            continue;
        };
        match Parser::parse_statement(sql) {
            Ok(stmt) => {
                script.push_str(&to_postgres(&stmt)?);
                script.push_str(";\n\n");
            }
            Err(err) => log::warn!("skipping index in export: {err}"),
        }
    }

    for function in rpc::list(engine).await? {
        script.push_str(&function.to_postgres_ddl());
        script.push_str(";\n\n");
    }

    Ok(script)
}

async fn table_to_create(engine: &Engine, table: &str) -> Result<Stmt, CoreError> {
    let mut columns = Vec::new();
    for column in engine.table_columns(table).await? {
        let ty = TypeName::plain(mapper::sqlite_type_to_pg(
            column.decl_type.as_deref().unwrap_or("TEXT"),
        ));
        let mut constraints = Vec::new();
        if column.primary_key {
            constraints.push(ColumnConstraint::PrimaryKey);
        }
        if column.not_null && !column.primary_key {
            constraints.push(ColumnConstraint::NotNull);
        }
        if let Some(default) = &column.default {
            constraints.push(ColumnConstraint::Default(default_to_expr(default)));
        }
        columns.push(ColumnDef {
            name: column.name,
            ty,
            constraints,
            pos: Pos::default(),
        });
    }

    Ok(Stmt::CreateTable(CreateTableStmt {
        if_not_exists: false,
        name: table.to_string(),
        columns,
        constraints: Vec::new(),
        pos: Pos::default(),
    }))
}

/// Reconstruct a PostgreSQL default from the stored SQLite one. The UUID
/// sentinel maps back to `gen_random_uuid()`.
fn default_to_expr(default_sql: &str) -> Expr {
    if default_sql.contains("gen_uuid") {
        return Expr::FunctionCall {
            name: "gen_random_uuid".to_string(),
            args: Vec::new(),
            distinct: false,
            star: false,
            order_by: Vec::new(),
            pos: Pos::default(),
        };
    }
    Parser::parse_expression(default_sql).unwrap_or(Expr::Raw {
        sql: default_sql.to_string(),
        pos: Pos::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exports_tables_indexes_and_functions() {
        let engine = Engine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE users (id TEXT PRIMARY KEY, age INTEGER NOT NULL, \
                 score REAL, raw BLOB, note TEXT DEFAULT 'hi', uid TEXT DEFAULT (gen_uuid()));
                 CREATE INDEX idx_users_age ON users (age);",
            )
            .await
            .unwrap();
        engine
            .execute(
                "INSERT INTO _rpc_functions VALUES ('f', '[]', \
                 '{\"kind\":\"scalar\",\"type\":\"integer\"}', 'sql', 'VOLATILE', 'INVOKER', 'SELECT 1')",
                &[],
                None,
            )
            .await
            .unwrap();

        let script = export_schema(&engine).await.unwrap();
        assert!(script.contains("CREATE TABLE users"));
        assert!(script.contains("id TEXT PRIMARY KEY"));
        assert!(script.contains("age BIGINT NOT NULL"));
        assert!(script.contains("score DOUBLE PRECISION"));
        assert!(script.contains("raw BYTEA"));
        assert!(script.contains("DEFAULT 'hi'"));
        assert!(script.contains("DEFAULT gen_random_uuid()"));
        assert!(script.contains("CREATE INDEX idx_users_age ON users (age)"));
        assert!(script.contains("CREATE OR REPLACE FUNCTION f()"));
    }
}
