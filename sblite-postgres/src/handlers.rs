//! pgwire handlers: simple and extended query over the sblite pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use pgwire::api::auth::StartupHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo, QueryResponse,
    Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::{ClientInfo, ErrorHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::response::TransactionStatus;
use rusqlite::types::Value;
use sblite_core::pipeline::{
    command_tag, looks_like_query, parenthesize_uuid_default, pg_params_to_sqlite,
};
use sblite_core::{AuthContext, Engine, Outcome, Pipeline, QueryResult};
use sblite_sql::{fallback, to_sqlite, Parser as SqlParser, Stmt};
use sqlite_pg::datatypes::supports_binary;
use sqlite_pg::{declared_type_to_pg, value_pg_type, RowEncoder};

use crate::auth::WireAuth;
use crate::catalog::{self, core_error_to_pgwire, Catalog};

pub struct HandlerFactory {
    pub session_service: Arc<SessionService>,
    wire_auth: WireAuth,
}

impl HandlerFactory {
    pub fn new(pipeline: Arc<Pipeline>, wire_auth: WireAuth, database_name: String) -> Self {
        let session_service = Arc::new(SessionService::new(pipeline, database_name));
        HandlerFactory {
            session_service,
            wire_auth,
        }
    }
}

impl PgWireServerHandlers for HandlerFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.session_service.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.session_service.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        Arc::new(self.wire_auth.startup_handler())
    }

    fn error_handler(&self) -> Arc<impl ErrorHandler> {
        Arc::new(LoggingErrorHandler)
    }
}

struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn on_error<C>(&self, _client: &C, error: &mut PgWireError)
    where
        C: ClientInfo,
    {
        log::info!("Sending error: {error}")
    }
}

/// The pgwire handler backed by the sblite [`Pipeline`]. Wire clients are an
/// administrative surface: row-level security applies to REST/RPC callers,
/// not here.
pub struct SessionService {
    pipeline: Arc<Pipeline>,
    catalog: Catalog,
    parser: Arc<WireQueryParser>,
}

impl SessionService {
    pub fn new(pipeline: Arc<Pipeline>, database_name: String) -> SessionService {
        let catalog = Catalog::new(pipeline.engine().clone(), database_name);
        let parser = Arc::new(WireQueryParser);
        SessionService {
            pipeline,
            catalog,
            parser,
        }
    }

    fn auth(&self) -> AuthContext {
        AuthContext::service_role()
    }

    fn engine(&self) -> &Arc<Engine> {
        self.pipeline.engine()
    }

    /// Answer a transaction word. Statements auto-commit on the shared
    /// engine handle, so BEGIN/COMMIT/ROLLBACK only move the connection's
    /// reported status.
    fn transaction_response<'a, C>(&self, client: &C, word: TxnWord) -> PgWireResult<Response<'a>>
    where
        C: ClientInfo,
    {
        let status = client.transaction_status();
        match word {
            TxnWord::Begin => match status {
                TransactionStatus::Idle => Ok(Response::TransactionStart(Tag::new("BEGIN"))),
                TransactionStatus::Transaction => {
                    // nested BEGIN succeeds without opening anything
                    log::warn!("BEGIN inside a transaction block ignored");
                    Ok(Response::Execution(Tag::new("BEGIN")))
                }
                TransactionStatus::Error => Err(aborted_transaction()),
            },
            // closing a failed block reports the rollback that takes place
            TxnWord::Commit if status == TransactionStatus::Error => {
                Ok(Response::TransactionEnd(Tag::new("ROLLBACK")))
            }
            TxnWord::Commit => Ok(Response::TransactionEnd(Tag::new("COMMIT"))),
            TxnWord::Rollback => Ok(Response::TransactionEnd(Tag::new("ROLLBACK"))),
        }
    }

    fn reject_if_failed_transaction<C>(&self, client: &C) -> PgWireResult<()>
    where
        C: ClientInfo,
    {
        if client.transaction_status() == TransactionStatus::Error {
            return Err(aborted_transaction());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnWord {
    Begin,
    Commit,
    Rollback,
}

/// Recognize the BEGIN/COMMIT/ROLLBACK statement family, with their optional
/// TRANSACTION/WORK noise words.
fn parse_txn_word(query: &str) -> Option<TxnWord> {
    let mut words = query
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .map(|w| w.to_ascii_lowercase());
    let head = words.next()?;
    let tail: Vec<String> = words.collect();
    let tail_is = |allowed: &[&str]| {
        tail.is_empty() || (tail.len() == 1 && allowed.contains(&tail[0].as_str()))
    };

    match head.as_str() {
        "begin" if tail_is(&["transaction", "work"]) => Some(TxnWord::Begin),
        "start" if tail == ["transaction"] => Some(TxnWord::Begin),
        "commit" if tail_is(&["transaction", "work"]) => Some(TxnWord::Commit),
        "end" if tail_is(&["transaction"]) => Some(TxnWord::Commit),
        "rollback" if tail_is(&["transaction", "work"]) => Some(TxnWord::Rollback),
        "abort" if tail.is_empty() => Some(TxnWord::Rollback),
        _ => None,
    }
}

fn aborted_transaction() -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".to_string(),
        "25P01".to_string(),
        "current transaction is aborted, commands ignored until end of transaction block"
            .to_string(),
    )))
}

/// Result columns with their wire types; a declared column type wins over
/// storage-class inference from the first non-null value.
fn result_fields(result: &QueryResult, format: &Format) -> Vec<FieldInfo> {
    result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let ty = result
                .decl_types
                .get(idx)
                .and_then(|decl| decl.as_deref())
                .map(declared_type_to_pg)
                .unwrap_or_else(|| {
                    result
                        .rows
                        .iter()
                        .map(|row| &row[idx])
                        .find(|value| !matches!(value, Value::Null))
                        .map(value_pg_type)
                        .unwrap_or(Type::TEXT)
                });
            let requested = field_format(format, idx);
            let effective = if requested == FieldFormat::Binary && !supports_binary(&ty) {
                FieldFormat::Text
            } else {
                requested
            };
            FieldInfo::new(name.clone(), None, None, ty, effective)
        })
        .collect()
}

fn field_format(format: &Format, idx: usize) -> FieldFormat {
    format.format_for(idx)
}

fn rows_response(result: QueryResult, format: &Format) -> QueryResponse<'static> {
    let fields = Arc::new(result_fields(&result, format));
    let mut encoder = RowEncoder::new(result.rows, fields.clone());
    let mut rows = Vec::new();
    while let Some(row) = encoder.next_row() {
        rows.push(row);
    }
    QueryResponse::new(fields, Box::pin(stream::iter(rows)))
}

fn execution_tag(command: &str, rows: usize) -> Tag {
    match command {
        "INSERT" => Tag::new("INSERT").with_oid(0).with_rows(rows),
        "UPDATE" | "DELETE" => Tag::new(command).with_rows(rows),
        other => Tag::new(other),
    }
}

fn outcome_response<'a>(outcome: Outcome, format: &Format) -> Response<'a> {
    match outcome {
        Outcome::Rows(result) => Response::Query(rows_response(result, format)),
        Outcome::Affected { command, rows } => {
            Response::Execution(execution_tag(command, rows))
        }
    }
}

#[async_trait]
impl SimpleQueryHandler for SessionService {
    async fn do_query<'a, C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response<'a>>>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        log::debug!("Received query: {query}");

        if query.trim().is_empty() {
            return Ok(vec![Response::EmptyQuery]);
        }

        if let Some(word) = parse_txn_word(query) {
            return Ok(vec![self.transaction_response(client, word)?]);
        }

        self.reject_if_failed_transaction(client)?;

        if let Some(resp) = self.catalog.try_respond(client, query).await? {
            return Ok(vec![resp]);
        }

        let timeout = catalog::get_statement_timeout(client);
        let auth = self.auth();

        // statement batches run through the parser; anything it cannot split
        // goes to the pipeline as one text statement
        match SqlParser::parse_statements(query) {
            Ok(statements) if statements.len() > 1 => {
                let mut responses = Vec::with_capacity(statements.len());
                for stmt in statements {
                    let outcome = self
                        .pipeline
                        .execute_parsed(stmt, &auth, timeout)
                        .await
                        .map_err(|e| core_error_to_pgwire(&e))?;
                    responses.push(outcome_response(outcome, &Format::UnifiedText));
                }
                Ok(responses)
            }
            _ => {
                let outcome = self
                    .pipeline
                    .execute_with(query, &[], None, &auth, timeout)
                    .await
                    .map_err(|e| core_error_to_pgwire(&e))?;
                Ok(vec![outcome_response(outcome, &Format::UnifiedText)])
            }
        }
    }
}

/// Prepared-statement payload: the query pre-translated at Parse time, or a
/// marker for statements the catalog/transaction layers answer directly.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub original: String,
    pub plan: Plan,
}

#[derive(Debug, Clone)]
pub enum Plan {
    Translated {
        sql: String,
        returns_rows: bool,
        command: &'static str,
    },
    Passthrough,
}

pub struct WireQueryParser;

fn is_passthrough(query_lower: &str) -> bool {
    let head = query_lower.trim();
    head.is_empty()
        || head.starts_with("set")
        || head.starts_with("show")
        || head.starts_with("begin")
        || head.starts_with("commit")
        || head.starts_with("rollback")
        || head.starts_with("abort")
        || head.starts_with("start transaction")
        || head.starts_with("end")
        || head.contains("version()")
        || head.contains("current_database()")
        || head.contains("current_user")
        || head.contains("current_schema")
        || head.contains("pg_catalog")
        || head.contains("information_schema")
        || head.contains("from pg_")
}

#[async_trait]
impl QueryParser for WireQueryParser {
    type Statement = PreparedQuery;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Type],
    ) -> PgWireResult<Self::Statement> {
        log::debug!("Received parse extended query: {sql}");

        let lower = sql.to_lowercase();
        if is_passthrough(&lower) {
            return Ok(PreparedQuery {
                original: sql.to_string(),
                plan: Plan::Passthrough,
            });
        }

        let plan = match SqlParser::parse_statement(sql) {
            Ok(stmt) => {
                let translated = to_sqlite(&stmt).map_err(|e| {
                    core_error_to_pgwire(&sblite_core::CoreError::from(e))
                })?;
                let translated = if matches!(stmt, Stmt::CreateTable(_)) {
                    parenthesize_uuid_default(&translated)
                } else {
                    translated
                };
                let returns_rows = matches!(&stmt, Stmt::Select(_))
                    || matches!(&stmt, Stmt::Insert(i) if !i.returning.is_empty())
                    || matches!(&stmt, Stmt::Update(u) if !u.returning.is_empty())
                    || matches!(&stmt, Stmt::Delete(d) if !d.returning.is_empty());
                Plan::Translated {
                    sql: pg_params_to_sqlite(&translated),
                    returns_rows,
                    command: command_tag(&stmt),
                }
            }
            Err(_) => {
                let translated = fallback::translate(sql).map_err(|e| {
                    core_error_to_pgwire(&sblite_core::CoreError::from(e))
                })?;
                let translated = pg_params_to_sqlite(&translated);
                let returns_rows = looks_like_query(&translated);
                Plan::Translated {
                    sql: translated,
                    returns_rows,
                    command: "OK",
                }
            }
        };

        Ok(PreparedQuery {
            original: sql.to_string(),
            plan,
        })
    }
}

/// Decode Bind-message parameters into engine values using the declared
/// parameter types; untyped parameters arrive as text.
fn decode_parameters(portal: &Portal<PreparedQuery>) -> PgWireResult<Vec<Value>> {
    let types = &portal.statement.parameter_types;
    let mut values = Vec::with_capacity(portal.parameter_len());
    for idx in 0..portal.parameter_len() {
        let ty = types.get(idx).cloned().unwrap_or(Type::UNKNOWN);
        let value = if ty == Type::INT2 {
            portal
                .parameter::<i16>(idx, &ty)?
                .map(|v| Value::Integer(v as i64))
        } else if ty == Type::INT4 {
            portal
                .parameter::<i32>(idx, &ty)?
                .map(|v| Value::Integer(v as i64))
        } else if ty == Type::INT8 {
            portal.parameter::<i64>(idx, &ty)?.map(Value::Integer)
        } else if ty == Type::FLOAT4 {
            portal
                .parameter::<f32>(idx, &ty)?
                .map(|v| Value::Real(v as f64))
        } else if ty == Type::FLOAT8 {
            portal.parameter::<f64>(idx, &ty)?.map(Value::Real)
        } else if ty == Type::BOOL {
            portal
                .parameter::<bool>(idx, &ty)?
                .map(|v| Value::Integer(v as i64))
        } else if ty == Type::BYTEA {
            portal.parameter::<Vec<u8>>(idx, &ty)?.map(Value::Blob)
        } else {
            portal.parameter::<String>(idx, &ty)?.map(Value::Text)
        };
        values.push(value.unwrap_or(Value::Null));
    }
    Ok(values)
}

async fn describe_fields(
    engine: &Engine,
    sql: &str,
    format: &Format,
) -> PgWireResult<(Vec<FieldInfo>, usize)> {
    let (columns, decl_types, parameter_count) = engine
        .describe(sql)
        .await
        .map_err(|e| core_error_to_pgwire(&e))?;
    let fields = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let ty = decl_types
                .get(idx)
                .and_then(|decl| decl.as_deref())
                .map(declared_type_to_pg)
                .unwrap_or(Type::TEXT);
            FieldInfo::new(name.clone(), None, None, ty, field_format(format, idx))
        })
        .collect();
    Ok((fields, parameter_count))
}

#[async_trait]
impl ExtendedQueryHandler for SessionService {
    type Statement = PreparedQuery;
    type QueryParser = WireQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.parser.clone()
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        match &target.statement.plan {
            Plan::Translated { sql, .. } => {
                let (fields, parameter_count) =
                    describe_fields(self.engine(), sql, &Format::UnifiedText).await?;
                let mut param_types = target.parameter_types.clone();
                param_types.resize(parameter_count, Type::UNKNOWN);
                Ok(DescribeStatementResponse::new(param_types, fields))
            }
            Plan::Passthrough => Ok(DescribeStatementResponse::new(Vec::new(), Vec::new())),
        }
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        match &target.statement.statement.plan {
            Plan::Translated { sql, .. } => {
                let (fields, _) =
                    describe_fields(self.engine(), sql, &target.result_column_format).await?;
                Ok(DescribePortalResponse::new(fields))
            }
            Plan::Passthrough => Ok(DescribePortalResponse::new(Vec::new())),
        }
    }

    async fn do_query<'a, C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response<'a>>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        let prepared = &portal.statement.statement;
        log::debug!("Received execute extended query: {}", prepared.original);

        match &prepared.plan {
            Plan::Passthrough => {
                if let Some(word) = parse_txn_word(&prepared.original) {
                    return self.transaction_response(client, word);
                }
                self.reject_if_failed_transaction(client)?;
                if let Some(resp) = self.catalog.try_respond(client, &prepared.original).await? {
                    return Ok(resp);
                }
                Ok(Response::EmptyQuery)
            }
            Plan::Translated {
                sql,
                returns_rows,
                command,
            } => {
                self.reject_if_failed_transaction(client)?;
                let params = decode_parameters(portal)?;
                let timeout = catalog::get_statement_timeout(client);

                if *returns_rows {
                    let result = self
                        .engine()
                        .query(sql, &params, timeout)
                        .await
                        .map_err(|e| core_error_to_pgwire(&e))?;
                    Ok(Response::Query(rows_response(
                        result,
                        &portal.result_column_format,
                    )))
                } else {
                    let rows = self
                        .engine()
                        .execute(sql, &params, timeout)
                        .await
                        .map_err(|e| core_error_to_pgwire(&e))?;
                    Ok(Response::Execution(execution_tag(command, rows)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sblite_core::PolicyStore;
    use std::collections::HashMap;

    struct MockClient {
        metadata: HashMap<String, String>,
    }

    impl MockClient {
        fn new() -> Self {
            Self {
                metadata: HashMap::new(),
            }
        }
    }

    impl ClientInfo for MockClient {
        fn socket_addr(&self) -> std::net::SocketAddr {
            "127.0.0.1:5432".parse().unwrap()
        }

        fn is_secure(&self) -> bool {
            false
        }

        fn protocol_version(&self) -> pgwire::messages::ProtocolVersion {
            pgwire::messages::ProtocolVersion::PROTOCOL3_0
        }

        fn set_protocol_version(&mut self, _version: pgwire::messages::ProtocolVersion) {}

        fn pid_and_secret_key(&self) -> (i32, pgwire::messages::startup::SecretKey) {
            (0, pgwire::messages::startup::SecretKey::I32(0))
        }

        fn set_pid_and_secret_key(
            &mut self,
            _pid: i32,
            _secret_key: pgwire::messages::startup::SecretKey,
        ) {
        }

        fn state(&self) -> pgwire::api::PgWireConnectionState {
            pgwire::api::PgWireConnectionState::ReadyForQuery
        }

        fn set_state(&mut self, _new_state: pgwire::api::PgWireConnectionState) {}

        fn transaction_status(&self) -> TransactionStatus {
            TransactionStatus::Idle
        }

        fn set_transaction_status(&mut self, _new_status: TransactionStatus) {}

        fn metadata(&self) -> &HashMap<String, String> {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
            &mut self.metadata
        }

        fn client_certificates<'a>(&self) -> Option<&[rustls_pki_types::CertificateDer<'a>]> {
            None
        }
    }

    async fn service() -> SessionService {
        let engine = Arc::new(Engine::open_in_memory().unwrap());
        engine
            .execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT)")
            .await
            .unwrap();
        let pipeline = Arc::new(Pipeline::new(engine, Arc::new(PolicyStore::new())));
        SessionService::new(pipeline, "sblite".to_string())
    }

    #[tokio::test]
    async fn simple_query_select_and_dml() {
        let service = service().await;
        let mut client = MockClient::new();

        let responses = service
            .do_query(&mut client, "INSERT INTO users (id, email) VALUES (1, 'a@b.c')")
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], Response::Execution(_)));

        let responses = service
            .do_query(&mut client, "SELECT id, email FROM users")
            .await
            .unwrap();
        assert!(matches!(responses[0], Response::Query(_)));
    }

    #[tokio::test]
    async fn simple_query_translates_postgres_dialect() {
        let service = service().await;
        let mut client = MockClient::new();
        let responses = service
            .do_query(
                &mut client,
                "INSERT INTO users (id, email) VALUES (1, 'a@b.c') ON CONFLICT DO NOTHING",
            )
            .await
            .unwrap();
        assert!(matches!(responses[0], Response::Execution(_)));
        // second run conflicts silently
        let responses = service
            .do_query(
                &mut client,
                "INSERT INTO users (id, email) VALUES (1, 'a@b.c') ON CONFLICT DO NOTHING",
            )
            .await
            .unwrap();
        assert!(matches!(responses[0], Response::Execution(_)));
    }

    #[tokio::test]
    async fn empty_query_response() {
        let service = service().await;
        let mut client = MockClient::new();
        let responses = service.do_query(&mut client, "   ").await.unwrap();
        assert!(matches!(responses[0], Response::EmptyQuery));
    }

    #[test]
    fn txn_word_recognition() {
        assert_eq!(parse_txn_word("BEGIN"), Some(TxnWord::Begin));
        assert_eq!(parse_txn_word("begin work;"), Some(TxnWord::Begin));
        assert_eq!(parse_txn_word("START TRANSACTION"), Some(TxnWord::Begin));
        assert_eq!(parse_txn_word("END"), Some(TxnWord::Commit));
        assert_eq!(parse_txn_word("commit transaction"), Some(TxnWord::Commit));
        assert_eq!(parse_txn_word("ABORT"), Some(TxnWord::Rollback));
        assert_eq!(parse_txn_word("begin now"), None);
        assert_eq!(parse_txn_word("SELECT 1"), None);
    }

    #[tokio::test]
    async fn transaction_words_move_status_only() {
        let service = service().await;
        let mut client = MockClient::new();
        let responses = service.do_query(&mut client, "BEGIN").await.unwrap();
        assert!(matches!(responses[0], Response::TransactionStart(_)));
        let responses = service.do_query(&mut client, "COMMIT").await.unwrap();
        assert!(matches!(responses[0], Response::TransactionEnd(_)));
        let responses = service.do_query(&mut client, "ROLLBACK").await.unwrap();
        assert!(matches!(responses[0], Response::TransactionEnd(_)));
    }

    #[tokio::test]
    async fn catalog_queries_answered_without_engine() {
        let service = service().await;
        let mut client = MockClient::new();
        for sql in [
            "SELECT version()",
            "SELECT current_database()",
            "SELECT current_user",
            "SHOW server_version",
            "SELECT * FROM information_schema.tables",
            "SELECT * FROM pg_catalog.pg_namespace",
        ] {
            let responses = service.do_query(&mut client, sql).await.unwrap();
            assert!(
                matches!(responses[0], Response::Query(_)),
                "expected a row response for {sql}"
            );
        }

        let responses = service
            .do_query(&mut client, "SET statement_timeout = '250ms'")
            .await
            .unwrap();
        assert!(matches!(responses[0], Response::Execution(_)));
        assert_eq!(
            catalog::get_statement_timeout(&client),
            Some(std::time::Duration::from_millis(250))
        );
    }

    #[tokio::test]
    async fn statement_batches_return_one_response_each() {
        let service = service().await;
        let mut client = MockClient::new();
        let responses = service
            .do_query(
                &mut client,
                "INSERT INTO users (id) VALUES (10); SELECT COUNT(*) FROM users;",
            )
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert!(matches!(responses[0], Response::Execution(_)));
        assert!(matches!(responses[1], Response::Query(_)));
    }

    #[tokio::test]
    async fn parse_error_surfaces_as_user_error() {
        let service = service().await;
        let mut client = MockClient::new();
        let err = service
            .do_query(&mut client, "SELECT * FROM users FOR UPDATE")
            .await
            .unwrap_err();
        assert!(matches!(err, PgWireError::UserError(_)));
    }

    #[tokio::test]
    async fn extended_parse_pre_translates() {
        let parser = WireQueryParser;
        let client = MockClient::new();
        let prepared = parser
            .parse_sql(&client, "SELECT id FROM users WHERE id = $1", &[Type::INT8])
            .await
            .unwrap();
        let Plan::Translated {
            sql, returns_rows, ..
        } = prepared.plan
        else {
            panic!("expected a translated plan");
        };
        assert!(returns_rows);
        assert_eq!(sql, "SELECT id FROM users WHERE id = ?1");

        let prepared = parser
            .parse_sql(&client, "SHOW server_version", &[])
            .await
            .unwrap();
        assert!(matches!(prepared.plan, Plan::Passthrough));
    }

    #[tokio::test]
    async fn describe_reports_columns_and_parameters() {
        let service = service().await;
        let (fields, parameter_count) = describe_fields(
            service.engine(),
            "SELECT id, email FROM users WHERE id = ?1",
            &Format::UnifiedText,
        )
        .await
        .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name(), "id");
        assert_eq!(*fields[0].datatype(), Type::INT8);
        assert_eq!(*fields[1].datatype(), Type::TEXT);
        assert_eq!(parameter_count, 1);
    }
}
