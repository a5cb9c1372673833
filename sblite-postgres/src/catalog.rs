//! Catalog emulation: `version()`, `current_database()`, SET/SHOW, and the
//! `information_schema` / `pg_catalog` query shapes psql and GUI clients
//! issue at connect time. Everything here answers from engine metadata and
//! per-session state without touching the translator.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use pgwire::api::results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse, Response, Tag};
use pgwire::api::{ClientInfo, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use regex::Regex;
use sblite_core::Engine;

use crate::auth::SessionParameters;

pub const VERSION_STRING: &str = "sblite 1.0.0, compatible with PostgreSQL 15.0";

const METADATA_STATEMENT_TIMEOUT: &str = "statement_timeout_ms";
const METADATA_PARAM_PREFIX: &str = "session_param_";

static SET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^set\s+(?:session\s+|local\s+)?([a-z_"][\w".]*)\s*(?:=|\bto\b)\s*(.+)$"#)
        .unwrap()
});
static SET_TIME_ZONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^set\s+time\s+zone\s+(.+)$").unwrap());
static SHOW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^show\s+(.+)$").unwrap());

pub struct Catalog {
    engine: Arc<Engine>,
    database_name: String,
}

impl Catalog {
    pub fn new(engine: Arc<Engine>, database_name: String) -> Catalog {
        Catalog {
            engine,
            database_name,
        }
    }

    /// Answer a session/catalog query, or return `None` when the statement
    /// must go through the translation pipeline.
    pub async fn try_respond<'a, C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Option<Response<'a>>>
    where
        C: ClientInfo,
    {
        let trimmed = query.trim().trim_end_matches(';').trim();
        let lowered = trimmed.to_lowercase();

        if let Some(captures) = SET_TIME_ZONE_RE.captures(trimmed) {
            let value = unquote(&captures[1]);
            set_session_param(client, "timezone", &value);
            return Ok(Some(Response::Execution(Tag::new("SET"))));
        }

        if let Some(captures) = SET_RE.captures(trimmed) {
            let name = captures[1].trim_matches('"').to_lowercase();
            let value = unquote(&captures[2]);
            if name == "statement_timeout" {
                set_statement_timeout(client, parse_timeout(&value))?;
            } else {
                set_session_param(client, &name, &value);
            }
            return Ok(Some(Response::Execution(Tag::new("SET"))));
        }

        if let Some(captures) = SHOW_RE.captures(trimmed) {
            let name = captures[1].trim().trim_matches('"').to_lowercase();
            let name = match name.replace(' ', "_").as_str() {
                "time_zone" => "timezone".to_string(),
                other => other.to_string(),
            };
            return Ok(Some(Response::Query(self.show_response(client, &name)?)));
        }

        match lowered.as_str() {
            "select version()" => {
                return Ok(Some(Response::Query(single_row_response(
                    "version",
                    VERSION_STRING,
                )?)));
            }
            "select current_database()" => {
                return Ok(Some(Response::Query(single_row_response(
                    "current_database",
                    &self.database_name,
                )?)));
            }
            "select current_user" => {
                return Ok(Some(Response::Query(single_row_response(
                    "current_user",
                    "sblite",
                )?)));
            }
            "select current_schema" | "select current_schema()" => {
                return Ok(Some(Response::Query(single_row_response(
                    "current_schema",
                    "public",
                )?)));
            }
            _ => {}
        }

        if lowered.contains("information_schema.tables") {
            return Ok(Some(Response::Query(self.information_schema_tables().await?)));
        }

        // psql's \d family walks pg_catalog; empty sets are the documented
        // answer
        if lowered.contains("pg_catalog.") || lowered.contains("from pg_") {
            return Ok(Some(Response::Query(empty_response())));
        }

        Ok(None)
    }

    fn show_response<C>(&self, client: &C, name: &str) -> PgWireResult<QueryResponse<'static>>
    where
        C: ClientInfo,
    {
        if name == "statement_timeout" {
            let value = match get_statement_timeout(client) {
                Some(timeout) => format!("{}ms", timeout.as_millis()),
                None => "0".to_string(),
            };
            return single_row_response("statement_timeout", &value);
        }
        if name == "transaction_isolation" || name == "transaction_isolation_level" {
            return single_row_response("transaction_isolation", "read committed");
        }
        if name == "search_path" {
            return single_row_response("search_path", "public");
        }

        if let Some(value) = client
            .metadata()
            .get(&format!("{METADATA_PARAM_PREFIX}{name}"))
        {
            return single_row_response(name, value);
        }

        let default = SessionParameters::pairs()
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
            .unwrap_or("");
        single_row_response(name, default)
    }

    async fn information_schema_tables(&self) -> PgWireResult<QueryResponse<'static>> {
        let tables = self
            .engine
            .table_list()
            .await
            .map_err(|e| core_error_to_pgwire(&e))?;

        let fields = Arc::new(vec![
            text_field("table_catalog"),
            text_field("table_schema"),
            text_field("table_name"),
            text_field("table_type"),
        ]);

        let mut rows = Vec::new();
        for table in tables {
            let mut encoder = DataRowEncoder::new(fields.clone());
            encoder.encode_field(&Some(self.database_name.as_str()))?;
            encoder.encode_field(&Some("public"))?;
            encoder.encode_field(&Some(table.name.as_str()))?;
            encoder.encode_field(&Some(if table.is_view { "VIEW" } else { "BASE TABLE" }))?;
            rows.push(encoder.finish());
        }

        Ok(QueryResponse::new(
            fields,
            Box::pin(futures::stream::iter(rows)),
        ))
    }
}

pub fn core_error_to_pgwire(err: &sblite_core::CoreError) -> PgWireError {
    let mut info = ErrorInfo::new(
        "ERROR".to_string(),
        err.sqlstate().to_string(),
        err.to_string(),
    );
    if let Some((line, _column)) = err.position() {
        // ErrorInfo carries no dedicated line field; fold it into the message
        info = ErrorInfo::new(
            "ERROR".to_string(),
            err.sqlstate().to_string(),
            format!("{err} (line {line})"),
        );
    }
    PgWireError::UserError(Box::new(info))
}

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.to_string(), None, None, Type::VARCHAR, FieldFormat::Text)
}

pub fn single_row_response(name: &str, value: &str) -> PgWireResult<QueryResponse<'static>> {
    let fields = Arc::new(vec![text_field(name)]);
    let mut encoder = DataRowEncoder::new(fields.clone());
    encoder.encode_field(&Some(value))?;
    let row = encoder.finish();
    Ok(QueryResponse::new(
        fields,
        Box::pin(futures::stream::once(async move { row })),
    ))
}

pub fn empty_response() -> QueryResponse<'static> {
    QueryResponse::new(Arc::new(Vec::new()), Box::pin(futures::stream::empty()))
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('\'').trim_matches('"').to_string()
}

/// Accepts `0`, `5000`, `5000ms`, `5s`, `2min`.
fn parse_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return None;
    }
    let millis = if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok()
    } else if let Some(minutes) = value.strip_suffix("min") {
        minutes.trim().parse::<u64>().ok().map(|m| m * 60 * 1000)
    } else if let Some(seconds) = value.strip_suffix('s') {
        seconds.trim().parse::<u64>().ok().map(|s| s * 1000)
    } else {
        value.parse::<u64>().ok()
    };
    millis.filter(|ms| *ms > 0).map(Duration::from_millis)
}

pub fn get_statement_timeout<C>(client: &C) -> Option<Duration>
where
    C: ClientInfo,
{
    client
        .metadata()
        .get(METADATA_STATEMENT_TIMEOUT)
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

pub fn set_statement_timeout<C>(client: &mut C, timeout: Option<Duration>) -> PgWireResult<()>
where
    C: ClientInfo,
{
    let metadata = client.metadata_mut();
    if let Some(duration) = timeout {
        metadata.insert(
            METADATA_STATEMENT_TIMEOUT.to_string(),
            duration.as_millis().to_string(),
        );
    } else {
        metadata.remove(METADATA_STATEMENT_TIMEOUT);
    }
    Ok(())
}

fn set_session_param<C>(client: &mut C, name: &str, value: &str)
where
    C: ClientInfo,
{
    client.metadata_mut().insert(
        format!("{METADATA_PARAM_PREFIX}{name}"),
        value.to_string(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_parsing() {
        assert_eq!(parse_timeout("0"), None);
        assert_eq!(parse_timeout(""), None);
        assert_eq!(parse_timeout("250"), Some(Duration::from_millis(250)));
        assert_eq!(parse_timeout("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_timeout("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_timeout("2min"), Some(Duration::from_secs(120)));
        assert_eq!(parse_timeout("junk"), None);
    }

    #[test]
    fn set_statement_shapes() {
        assert!(SET_RE.captures("SET search_path = public").is_some());
        assert!(SET_RE.captures("set session client_encoding TO 'UTF8'").is_some());
        assert!(SET_TIME_ZONE_RE.captures("SET TIME ZONE 'UTC'").is_some());
        assert!(SET_RE.captures("SELECT 1").is_none());
    }

    #[test]
    fn show_statement_shapes() {
        let captures = SHOW_RE.captures("SHOW server_version").unwrap();
        assert_eq!(captures[1].trim(), "server_version");
        assert!(SHOW_RE.captures("INSERT INTO t VALUES (1)").is_none());
    }

    #[test]
    fn version_string_advertises_compatibility() {
        assert!(VERSION_STRING.contains("PostgreSQL 15.0"));
        assert!(VERSION_STRING.starts_with("sblite"));
    }

    #[test]
    fn unquoting() {
        assert_eq!(unquote("'UTC'"), "UTC");
        assert_eq!(unquote("\"iso, mdy\""), "iso, mdy");
        assert_eq!(unquote(" bare "), "bare");
    }
}
