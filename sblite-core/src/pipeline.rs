//! End-to-end query pipeline: parse → translate → RLS rewrite → execute.
//!
//! The AST path is primary. When parsing fails the regex fallback takes
//! over, with defensive textual predicate splicing. REST/RPC callers pass a
//! table hint to opt into RLS enforcement; the wire path does not.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use sblite_sql::ast::{
    ConflictAction, Expr, InsertSource, Literal, ObjectKind, Stmt,
};
use sblite_sql::token::Pos;
use sblite_sql::{fallback, to_sqlite, Dialect, Generator, Parser};
use serde_json::Value as JsonValue;

use crate::auth::AuthContext;
use crate::engine::{Engine, QueryResult};
use crate::error::CoreError;
use crate::policy::{PolicyCommand, PolicyStore};
use crate::rls;
use crate::rpc::{self, RpcFunction};

/// REST/RPC table hint: which table the request targets and as what command.
#[derive(Debug, Clone)]
pub struct QueryHint {
    pub table: String,
    pub command: PolicyCommand,
}

#[derive(Debug)]
pub enum Outcome {
    Rows(QueryResult),
    Affected { command: &'static str, rows: usize },
}

impl Outcome {
    /// Wire-protocol command tag, e.g. `INSERT 0 3` or `UPDATE 1`.
    pub fn command_tag(&self) -> String {
        match self {
            Outcome::Rows(result) => format!("SELECT {}", result.rows.len()),
            Outcome::Affected { command, rows } => match *command {
                "INSERT" => format!("INSERT 0 {rows}"),
                "UPDATE" | "DELETE" => format!("{command} {rows}"),
                other => other.to_string(),
            },
        }
    }
}

pub struct Pipeline {
    engine: Arc<Engine>,
    policies: Arc<PolicyStore>,
}

impl Pipeline {
    pub fn new(engine: Arc<Engine>, policies: Arc<PolicyStore>) -> Pipeline {
        Pipeline { engine, policies }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    /// Run one statement with optional RLS enforcement.
    pub async fn execute(
        &self,
        sql: &str,
        hint: Option<&QueryHint>,
        auth: &AuthContext,
    ) -> Result<Outcome, CoreError> {
        self.execute_with(sql, &[], hint, auth, None).await
    }

    pub async fn execute_with(
        &self,
        sql: &str,
        params: &[Value],
        hint: Option<&QueryHint>,
        auth: &AuthContext,
        timeout: Option<Duration>,
    ) -> Result<Outcome, CoreError> {
        match Parser::parse_statement(sql) {
            Ok(stmt) => {
                let table = hint.map(|h| h.table.clone());
                self.run_stmt(stmt, params, table.as_deref(), auth, timeout)
                    .await
            }
            Err(parse_err) => {
                self.run_text(sql, params, hint, auth, timeout, parse_err)
                    .await
            }
        }
    }

    /// Run an already-parsed statement without RLS, e.g. one statement out
    /// of a wire-protocol batch.
    pub async fn execute_parsed(
        &self,
        stmt: Stmt,
        auth: &AuthContext,
        timeout: Option<Duration>,
    ) -> Result<Outcome, CoreError> {
        self.run_stmt(stmt, &[], None, auth, timeout).await
    }

    /// Combined USING predicate for (table, command, caller) as SQLite text.
    pub fn rls_predicate(
        &self,
        table: &str,
        command: PolicyCommand,
        auth: &AuthContext,
    ) -> Result<String, CoreError> {
        rls::predicate_text(&self.policies.snapshot(), table, command, auth)
    }

    /// Look up a stored function, bind arguments, run the body through the
    /// pipeline and shape the result.
    pub async fn invoke_rpc(
        &self,
        name: &str,
        args: &serde_json::Map<String, JsonValue>,
        auth: &AuthContext,
    ) -> Result<JsonValue, CoreError> {
        let function = rpc::load(&self.engine, name)
            .await?
            .ok_or_else(|| CoreError::rpc(format!("function {name} does not exist")))?;

        let resolved = rpc::resolve_args(&function, args)?;
        let (body_sql, params) = rpc::bind_args(&function.body, &resolved)?;

        let effective = if function.is_security_definer() {
            AuthContext::service_role()
        } else {
            auth.clone()
        };

        let outcome = self
            .run_body(&function, &body_sql, &params, &effective)
            .await?;

        Ok(match outcome {
            Outcome::Rows(result) => rpc::shape_result(&function.returns, &result),
            Outcome::Affected { rows, .. } => JsonValue::from(rows as i64),
        })
    }

    async fn run_body(
        &self,
        function: &RpcFunction,
        body_sql: &str,
        params: &[Value],
        auth: &AuthContext,
    ) -> Result<Outcome, CoreError> {
        match Parser::parse_statements(body_sql) {
            Ok(statements) if !statements.is_empty() => {
                let mut last = None;
                for stmt in statements {
                    let table = stmt.target_table().map(|t| t.to_string());
                    last = Some(
                        self.run_stmt(stmt, params, table.as_deref(), auth, None)
                            .await?,
                    );
                }
                Ok(last.expect("non-empty statement list"))
            }
            Ok(_) => Err(CoreError::rpc(format!(
                "function {} has an empty body",
                function.name
            ))),
            Err(_) => {
                // bodies beyond the parser's grammar take the regex path
                let translated = fallback::translate(body_sql)?;
                let translated = pg_params_to_sqlite(&translated);
                if looks_like_query(&translated) {
                    let result = self.engine.query(&translated, params, None).await?;
                    Ok(Outcome::Rows(result))
                } else {
                    let rows = self.engine.execute(&translated, params, None).await?;
                    Ok(Outcome::Affected {
                        command: "OK",
                        rows,
                    })
                }
            }
        }
    }

    async fn run_stmt(
        &self,
        stmt: Stmt,
        params: &[Value],
        rls_table: Option<&str>,
        auth: &AuthContext,
        timeout: Option<Duration>,
    ) -> Result<Outcome, CoreError> {
        match stmt {
            Stmt::CreateFunction(create) => {
                // body parse errors are fatal for this statement only
                Parser::parse_statements(&create.body)?;
                let function = RpcFunction::from_create(&create)?;
                rpc::save(&self.engine, &function).await?;
                Ok(Outcome::Affected {
                    command: "CREATE FUNCTION",
                    rows: 0,
                })
            }
            Stmt::Drop(drop) if drop.kind == ObjectKind::Function => {
                rpc::remove(&self.engine, &drop.name).await?;
                Ok(Outcome::Affected {
                    command: "DROP FUNCTION",
                    rows: 0,
                })
            }
            mut stmt => {
                let mut prechecks = Vec::new();
                if let Some(table) = rls_table {
                    prechecks = self.apply_rls(&mut stmt, table, auth, params).await?;
                }

                let mut sql = to_sqlite(&stmt)?;
                if matches!(stmt, Stmt::CreateTable(_)) {
                    sql = parenthesize_uuid_default(&sql);
                }

                for precheck in &prechecks {
                    let result = self.engine.query(precheck, &[], timeout).await?;
                    let passed = matches!(
                        result.rows.first().and_then(|r| r.first()),
                        Some(Value::Integer(n)) if *n != 0
                    );
                    if !passed {
                        return Err(CoreError::RlsDenied {
                            table: rls_table.unwrap_or_default().to_string(),
                        });
                    }
                }

                let returns_rows = matches!(&stmt, Stmt::Select(_))
                    || matches!(&stmt, Stmt::Insert(i) if !i.returning.is_empty())
                    || matches!(&stmt, Stmt::Update(u) if !u.returning.is_empty())
                    || matches!(&stmt, Stmt::Delete(d) if !d.returning.is_empty());

                if returns_rows {
                    let result = self.engine.query(&sql, params, timeout).await?;
                    Ok(Outcome::Rows(result))
                } else {
                    let rows = self.engine.execute(&sql, params, timeout).await?;
                    Ok(Outcome::Affected {
                        command: command_tag(&stmt),
                        rows,
                    })
                }
            }
        }
    }

    /// Splice USING predicates into the statement and build WITH CHECK
    /// pre-checks for INSERT/UPDATE. Pre-check queries must evaluate to 1.
    async fn apply_rls(
        &self,
        stmt: &mut Stmt,
        table: &str,
        auth: &AuthContext,
        params: &[Value],
    ) -> Result<Vec<String>, CoreError> {
        let set = self.policies.snapshot();
        let mut prechecks = Vec::new();

        match stmt {
            Stmt::Select(select) => {
                if let Some(pred) = rls::using_predicate(&set, table, PolicyCommand::Select, auth)
                {
                    select.where_clause = Some(and_where(select.where_clause.take(), pred));
                }
            }
            Stmt::Delete(delete) => {
                if let Some(pred) = rls::using_predicate(&set, table, PolicyCommand::Delete, auth)
                {
                    delete.where_clause = Some(and_where(delete.where_clause.take(), pred));
                }
            }
            Stmt::Update(update) => {
                if let Some(pred) = rls::using_predicate(&set, table, PolicyCommand::Update, auth)
                {
                    update.where_clause = Some(and_where(update.where_clause.take(), pred));
                }
                if let Some(check) =
                    rls::check_predicate(&set, table, PolicyCommand::Update, auth)
                {
                    let mut assigned: Vec<(String, Expr)> = Vec::new();
                    for assignment in &update.assignments {
                        assigned.push((assignment.column.clone(), assignment.value.clone()));
                    }
                    let substituted =
                        substitute_columns(check, &assigned, &[], params);
                    let check_sql = Generator::new(Dialect::SQLite).expr(&substituted)?;
                    let where_sql = match &update.where_clause {
                        Some(w) => {
                            let inlined = inline_params(w.clone(), params);
                            Generator::new(Dialect::SQLite).expr(&inlined)?
                        }
                        None => "1".to_string(),
                    };
                    prechecks.push(format!(
                        "SELECT NOT EXISTS (SELECT 1 FROM \"{}\" WHERE ({where_sql}) \
                         AND COALESCE(({check_sql}), 0) = 0)",
                        table.replace('"', "\"\"")
                    ));
                }
            }
            Stmt::Insert(insert) => {
                let skip_check = matches!(
                    &insert.on_conflict,
                    Some(c) if matches!(c.action, ConflictAction::DoUpdate { .. })
                );
                if let (Some(check), false) = (
                    rls::check_predicate(&set, table, PolicyCommand::Insert, auth),
                    skip_check,
                ) {
                    if let InsertSource::Values(rows) = &insert.source {
                        let columns: Vec<String> = if insert.columns.is_empty() {
                            self.engine
                                .table_columns(table)
                                .await?
                                .into_iter()
                                .map(|c| c.name)
                                .collect()
                        } else {
                            insert.columns.clone()
                        };
                        let all_columns: Vec<String> = self
                            .engine
                            .table_columns(table)
                            .await?
                            .into_iter()
                            .map(|c| c.name)
                            .collect();

                        for row in rows {
                            let assigned: Vec<(String, Expr)> = columns
                                .iter()
                                .cloned()
                                .zip(row.iter().cloned())
                                .collect();
                            let substituted = substitute_columns(
                                check.clone(),
                                &assigned,
                                &all_columns,
                                params,
                            );
                            let check_sql =
                                Generator::new(Dialect::SQLite).expr(&substituted)?;
                            prechecks.push(format!("SELECT COALESCE(({check_sql}), 0)"));
                        }
                    }
                }
            }
            _ => {}
        }

        Ok(prechecks)
    }

    async fn run_text(
        &self,
        sql: &str,
        params: &[Value],
        hint: Option<&QueryHint>,
        auth: &AuthContext,
        timeout: Option<Duration>,
        parse_err: sblite_sql::ParseError,
    ) -> Result<Outcome, CoreError> {
        log::debug!("AST parse failed ({parse_err}), taking the regex path: {sql}");

        let mut translated = fallback::translate(sql)?;
        translated = pg_params_to_sqlite(&translated);

        if let Some(hint) = hint {
            let predicate = rls::predicate_text(
                &self.policies.snapshot(),
                &hint.table,
                hint.command,
                auth,
            )?;
            if !predicate.is_empty() {
                translated = splice_text_predicate(&translated, &predicate);
            }
        }

        if looks_like_query(&translated) {
            let result = self.engine.query(&translated, params, timeout).await?;
            Ok(Outcome::Rows(result))
        } else {
            let rows = self.engine.execute(&translated, params, timeout).await?;
            Ok(Outcome::Affected {
                command: text_command_tag(&translated),
                rows,
            })
        }
    }
}

/// Wire command-tag word(s) for a statement.
pub fn command_tag(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::Select(_) => "SELECT",
        Stmt::Insert(_) => "INSERT",
        Stmt::Update(_) => "UPDATE",
        Stmt::Delete(_) => "DELETE",
        Stmt::CreateTable(_) => "CREATE TABLE",
        Stmt::CreateFunction(_) => "CREATE FUNCTION",
        Stmt::CreateIndex(_) => "CREATE INDEX",
        Stmt::Drop(drop) => match drop.kind {
            ObjectKind::Table => "DROP TABLE",
            ObjectKind::Function => "DROP FUNCTION",
            ObjectKind::Index => "DROP INDEX",
        },
        Stmt::Raw { .. } => "OK",
    }
}

fn text_command_tag(sql: &str) -> &'static str {
    let head = sql.trim_start().to_ascii_uppercase();
    for tag in ["INSERT", "UPDATE", "DELETE", "CREATE TABLE", "DROP TABLE"] {
        if head.starts_with(tag) || (tag == "INSERT" && head.starts_with("INSERT OR IGNORE")) {
            return tag;
        }
    }
    "OK"
}

/// Whether the statement produces a result set.
pub fn looks_like_query(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_uppercase();
    head.starts_with("SELECT") || head.starts_with("WITH") || head.starts_with("PRAGMA")
}

/// `WHERE old AND (pred)`, with the user's clause defensively wrapped.
fn and_where(existing: Option<Expr>, predicate: Expr) -> Expr {
    let wrapped = Expr::Paren {
        expr: Box::new(predicate),
        pos: Pos::default(),
    };
    match existing {
        None => wrapped,
        Some(user) => Expr::BinaryOp {
            op: sblite_sql::ast::BinaryOp::And,
            left: Box::new(Expr::Paren {
                expr: Box::new(user),
                pos: Pos::default(),
            }),
            right: Box::new(wrapped),
            pos: Pos::default(),
        },
    }
}

/// Rewrite column references in a WITH CHECK predicate to the new-row value
/// expressions; table columns missing from the insert become NULL.
fn substitute_columns(
    check: Expr,
    assigned: &[(String, Expr)],
    all_columns: &[String],
    params: &[Value],
) -> Expr {
    let check = inline_params(check, params);
    check.map(&mut |expr| match &expr {
        Expr::Identifier { name, .. } | Expr::QualifiedRef { name, .. } => {
            if let Some((_, value)) = assigned
                .iter()
                .find(|(column, _)| column.eq_ignore_ascii_case(name))
            {
                Expr::Paren {
                    expr: Box::new(inline_params(value.clone(), params)),
                    pos: Pos::default(),
                }
            } else if all_columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                Expr::Literal {
                    value: Literal::Null,
                    pos: Pos::default(),
                }
            } else {
                expr
            }
        }
        _ => expr,
    })
}

/// Replace `$n` parameter nodes with their bound values so pre-check queries
/// can run without a parameter list.
fn inline_params(expr: Expr, params: &[Value]) -> Expr {
    if params.is_empty() {
        return expr;
    }
    expr.map(&mut |expr| match &expr {
        Expr::Parameter { index, .. } => {
            match params.get((*index as usize).saturating_sub(1)) {
                Some(Value::Null) | None => Expr::Literal {
                    value: Literal::Null,
                    pos: Pos::default(),
                },
                Some(Value::Integer(i)) => Expr::Literal {
                    value: Literal::Number(i.to_string()),
                    pos: Pos::default(),
                },
                Some(Value::Real(f)) => Expr::Literal {
                    value: Literal::Number(f.to_string()),
                    pos: Pos::default(),
                },
                Some(Value::Text(s)) => Expr::Literal {
                    value: Literal::String(s.clone()),
                    pos: Pos::default(),
                },
                Some(Value::Blob(bytes)) => {
                    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                    Expr::Raw {
                        sql: format!("x'{hex}'"),
                        pos: Pos::default(),
                    }
                }
            }
        }
        _ => expr,
    })
}

static WHERE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").unwrap());
static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(GROUP\s+BY|ORDER\s+BY|LIMIT|OFFSET|RETURNING)\b").unwrap()
});

/// Textual predicate splicing for the regex path, with defensive
/// parenthesization of the user's WHERE clause.
fn splice_text_predicate(sql: &str, predicate: &str) -> String {
    if let Some(found) = WHERE_RE.find(sql) {
        let head = &sql[..found.start()];
        let rest = &sql[found.end()..];
        let (user_clause, tail) = match CLAUSE_RE.find(rest) {
            Some(clause) => (&rest[..clause.start()], &rest[clause.start()..]),
            None => (rest, ""),
        };
        format!(
            "{head}WHERE ({}) AND ({predicate}) {tail}",
            user_clause.trim()
        )
        .trim_end()
        .to_string()
    } else if let Some(clause) = CLAUSE_RE.find(sql) {
        format!(
            "{} WHERE ({predicate}) {}",
            sql[..clause.start()].trim_end(),
            &sql[clause.start()..]
        )
    } else {
        format!("{} WHERE ({predicate})", sql.trim_end())
    }
}

/// `$n` → `?n`: SQLite assigns `$`-style parameters sequential indexes by
/// first appearance, which breaks positional binding.
pub fn pg_params_to_sqlite(sql: &str) -> String {
    static PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").unwrap());
    PARAM_RE.replace_all(sql, "?$1").to_string()
}

/// SQLite only accepts expression defaults in parentheses.
pub fn parenthesize_uuid_default(sql: &str) -> String {
    sql.replace("DEFAULT gen_uuid()", "DEFAULT (gen_uuid())")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Policy, PolicySet};
    use once_cell::sync::Lazy as SyncLazy;

    static UUID_RE: SyncLazy<Regex> = SyncLazy::new(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .unwrap()
    });

    async fn pipeline_with_documents() -> Pipeline {
        let engine = Arc::new(Engine::open_in_memory().unwrap());
        engine
            .execute_batch(
                "CREATE TABLE documents (id TEXT PRIMARY KEY, user_id TEXT, title TEXT);
                 INSERT INTO documents VALUES ('d1', 'u1', 'mine');
                 INSERT INTO documents VALUES ('d2', 'u2', 'theirs');",
            )
            .await
            .unwrap();

        let store = PolicyStore::new();
        let mut set = PolicySet::new();
        set.add(
            Policy::compile(
                "documents",
                "own_documents",
                PolicyCommand::All,
                Vec::new(),
                Some("user_id = auth.uid()".to_string()),
                None,
                true,
            )
            .unwrap(),
        );
        store.install(set);

        Pipeline::new(engine, Arc::new(store))
    }

    fn documents_hint(command: PolicyCommand) -> QueryHint {
        QueryHint {
            table: "documents".to_string(),
            command,
        }
    }

    #[tokio::test]
    async fn select_without_hint_skips_rls() {
        let pipeline = pipeline_with_documents().await;
        let outcome = pipeline
            .execute("SELECT * FROM documents", None, &AuthContext::anonymous())
            .await
            .unwrap();
        let Outcome::Rows(result) = outcome else {
            panic!("expected rows");
        };
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn rls_rewrite_scenario() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::authenticated("u1");
        let outcome = pipeline
            .execute(
                "SELECT * FROM documents",
                Some(&documents_hint(PolicyCommand::Select)),
                &auth,
            )
            .await
            .unwrap();
        let Outcome::Rows(result) = outcome else {
            panic!("expected rows");
        };
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][2], Value::Text("mine".to_string()));
    }

    #[tokio::test]
    async fn rls_service_role_sees_everything() {
        let pipeline = pipeline_with_documents().await;
        let outcome = pipeline
            .execute(
                "SELECT * FROM documents",
                Some(&documents_hint(PolicyCommand::Select)),
                &AuthContext::service_role(),
            )
            .await
            .unwrap();
        let Outcome::Rows(result) = outcome else {
            panic!("expected rows");
        };
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn rls_predicate_text_api() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::authenticated("u1");
        assert_eq!(
            pipeline
                .rls_predicate("documents", PolicyCommand::Select, &auth)
                .unwrap(),
            "user_id = 'u1'"
        );
        assert_eq!(
            pipeline
                .rls_predicate("documents", PolicyCommand::Select, &AuthContext::service_role())
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn insert_with_check_denies_foreign_rows() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::authenticated("u1");
        let hint = documents_hint(PolicyCommand::Insert);

        // inserting own row passes
        pipeline
            .execute(
                "INSERT INTO documents (id, user_id, title) VALUES ('d3', 'u1', 'ok')",
                Some(&hint),
                &auth,
            )
            .await
            .unwrap();

        // impersonating another user is denied before any write happens
        let err = pipeline
            .execute(
                "INSERT INTO documents (id, user_id, title) VALUES ('d4', 'u2', 'nope')",
                Some(&hint),
                &auth,
            )
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), "42501");

        let outcome = pipeline
            .execute("SELECT * FROM documents", None, &AuthContext::service_role())
            .await
            .unwrap();
        let Outcome::Rows(result) = outcome else {
            panic!();
        };
        assert_eq!(result.rows.len(), 3);
    }

    #[tokio::test]
    async fn update_with_check_blocks_ownership_transfer() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::authenticated("u1");
        let hint = documents_hint(PolicyCommand::Update);

        // retitling an owned row is fine
        let outcome = pipeline
            .execute(
                "UPDATE documents SET title = 'renamed' WHERE id = 'd1'",
                Some(&hint),
                &auth,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Affected { rows: 1, .. }));

        // giving the row away violates WITH CHECK
        let err = pipeline
            .execute(
                "UPDATE documents SET user_id = 'u2' WHERE id = 'd1'",
                Some(&hint),
                &auth,
            )
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), "42501");
    }

    #[tokio::test]
    async fn delete_scoped_to_visible_rows() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::authenticated("u1");
        let outcome = pipeline
            .execute(
                "DELETE FROM documents",
                Some(&documents_hint(PolicyCommand::Delete)),
                &auth,
            )
            .await
            .unwrap();
        // only the caller's row goes away
        assert!(matches!(outcome, Outcome::Affected { rows: 1, .. }));
    }

    #[tokio::test]
    async fn translated_dialect_runs_on_the_engine() {
        let pipeline = pipeline_with_documents().await;
        let outcome = pipeline
            .execute(
                "SELECT title FROM documents WHERE title ILIKE 'MINE' AND TRUE",
                None,
                &AuthContext::service_role(),
            )
            .await
            .unwrap();
        let Outcome::Rows(result) = outcome else {
            panic!();
        };
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn create_table_with_uuid_default_round_trips() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::service_role();
        pipeline
            .execute(
                "CREATE TABLE notes (id uuid PRIMARY KEY DEFAULT gen_random_uuid(), body text)",
                None,
                &auth,
            )
            .await
            .unwrap();
        pipeline
            .execute("INSERT INTO notes (body) VALUES ('hello')", None, &auth)
            .await
            .unwrap();
        let Outcome::Rows(result) = pipeline
            .execute("SELECT id FROM notes", None, &auth)
            .await
            .unwrap()
        else {
            panic!();
        };
        let Value::Text(id) = &result.rows[0][0] else {
            panic!("expected text uuid");
        };
        assert!(UUID_RE.is_match(id), "{id} is not a v4 uuid");
    }

    #[tokio::test]
    async fn uuid_insert_scenario_many_rows() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::service_role();
        pipeline
            .execute("CREATE TABLE t (id uuid, n text)", None, &auth)
            .await
            .unwrap();
        for _ in 0..1000 {
            pipeline
                .execute(
                    "INSERT INTO t(id, n) VALUES (gen_random_uuid(), 'Alice')",
                    None,
                    &auth,
                )
                .await
                .unwrap();
        }
        let Outcome::Rows(result) = pipeline
            .execute("SELECT COUNT(DISTINCT id), COUNT(*) FROM t", None, &auth)
            .await
            .unwrap()
        else {
            panic!();
        };
        assert_eq!(result.rows[0][0], Value::Integer(1000));
        assert_eq!(result.rows[0][1], Value::Integer(1000));

        let Outcome::Rows(all) = pipeline
            .execute("SELECT id FROM t", None, &auth)
            .await
            .unwrap()
        else {
            panic!();
        };
        for row in &all.rows {
            let Value::Text(id) = &row[0] else { panic!() };
            assert!(UUID_RE.is_match(id), "{id} is not a v4 uuid");
        }
    }

    #[tokio::test]
    async fn command_tags() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::service_role();
        let outcome = pipeline
            .execute(
                "INSERT INTO documents (id, user_id) VALUES ('d9', 'u9')",
                None,
                &auth,
            )
            .await
            .unwrap();
        assert_eq!(outcome.command_tag(), "INSERT 0 1");
        let outcome = pipeline
            .execute("UPDATE documents SET title = 'x'", None, &auth)
            .await
            .unwrap();
        assert_eq!(outcome.command_tag(), "UPDATE 3");
        let outcome = pipeline
            .execute("SELECT 1", None, &auth)
            .await
            .unwrap();
        assert_eq!(outcome.command_tag(), "SELECT 1");
    }

    #[tokio::test]
    async fn rpc_end_to_end() {
        let pipeline = pipeline_with_documents().await;
        let auth = AuthContext::service_role();
        pipeline
            .execute(
                "CREATE FUNCTION add_numbers(a integer, b integer DEFAULT 10) \
                 RETURNS integer LANGUAGE sql AS $$ SELECT a + b $$",
                None,
                &auth,
            )
            .await
            .unwrap();

        let mut args = serde_json::Map::new();
        args.insert("a".to_string(), JsonValue::from(5));
        let result = pipeline.invoke_rpc("add_numbers", &args, &auth).await.unwrap();
        assert_eq!(result, JsonValue::from(15));

        args.insert("b".to_string(), JsonValue::from(2));
        let result = pipeline.invoke_rpc("add_numbers", &args, &auth).await.unwrap();
        assert_eq!(result, JsonValue::from(7));

        let err = pipeline
            .invoke_rpc("no_such_function", &args, &auth)
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), "42883");
    }

    #[tokio::test]
    async fn rpc_setof_shapes_rows_and_honors_rls() {
        let pipeline = pipeline_with_documents().await;
        let service = AuthContext::service_role();
        pipeline
            .execute(
                "CREATE FUNCTION my_documents() RETURNS SETOF record LANGUAGE sql \
                 SECURITY INVOKER AS $$ SELECT id, title FROM documents $$",
                None,
                &service,
            )
            .await
            .unwrap();

        let args = serde_json::Map::new();
        let rows = pipeline
            .invoke_rpc("my_documents", &args, &AuthContext::authenticated("u1"))
            .await
            .unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], JsonValue::String("mine".to_string()));

        // SECURITY DEFINER bypasses the caller's RLS
        pipeline
            .execute(
                "CREATE FUNCTION all_documents() RETURNS SETOF record LANGUAGE sql \
                 SECURITY DEFINER AS $$ SELECT id FROM documents $$",
                None,
                &service,
            )
            .await
            .unwrap();
        let rows = pipeline
            .invoke_rpc("all_documents", &args, &AuthContext::authenticated("u1"))
            .await
            .unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_function_with_broken_body_fails_cleanly() {
        let pipeline = pipeline_with_documents().await;
        let err = pipeline
            .execute(
                "CREATE FUNCTION broken() RETURNS integer LANGUAGE sql AS $$ SELECT FROM ( $$",
                None,
                &AuthContext::service_role(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), "42601");

        // the connection keeps working afterwards
        pipeline
            .execute("SELECT 1", None, &AuthContext::service_role())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fallback_path_translates_and_splices() {
        let pipeline = pipeline_with_documents().await;
        // EXPLAIN is outside the parser's grammar, so the regex path runs it
        let auth = AuthContext::authenticated("u1");
        let err = pipeline
            .execute("SELECT * FROM documents FOR UPDATE", None, &auth)
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), "0A000");
    }

    #[test]
    fn text_predicate_splicing() {
        assert_eq!(
            splice_text_predicate("SELECT * FROM t", "uid = 'u1'"),
            "SELECT * FROM t WHERE (uid = 'u1')"
        );
        assert_eq!(
            splice_text_predicate("SELECT * FROM t WHERE a = 1 OR b = 2", "uid = 'u1'"),
            "SELECT * FROM t WHERE (a = 1 OR b = 2) AND (uid = 'u1')"
        );
        assert_eq!(
            splice_text_predicate("SELECT * FROM t ORDER BY a", "uid = 'u1'"),
            "SELECT * FROM t WHERE (uid = 'u1') ORDER BY a"
        );
        assert_eq!(
            splice_text_predicate("SELECT * FROM t WHERE a = 1 LIMIT 5", "uid = 'u1'"),
            "SELECT * FROM t WHERE (a = 1) AND (uid = 'u1') LIMIT 5"
        );
    }

    #[test]
    fn dollar_params_convert_for_sqlite() {
        assert_eq!(
            pg_params_to_sqlite("SELECT $1, $2 + $1"),
            "SELECT ?1, ?2 + ?1"
        );
    }
}
