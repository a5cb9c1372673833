//! SQL function metadata and RPC invocation plumbing.
//!
//! Functions are never created in the engine; `CREATE FUNCTION` stores a row
//! in `_rpc_functions` and invocation runs the body back through the query
//! pipeline. Argument references in the body are bound as positional
//! parameters rather than spliced as text.

use regex::Regex;
use rusqlite::types::Value;
use sblite_sql::ast::{CreateFunctionStmt, ReturnType};
use sblite_sql::{Dialect, Generator};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::{Engine, QueryResult};
use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcArg {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
    /// Default value as SQL text.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RpcReturn {
    Scalar {
        #[serde(rename = "type")]
        ty: String,
    },
    Record,
    Table {
        columns: Vec<(String, String)>,
    },
    Setof {
        #[serde(rename = "type")]
        ty: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFunction {
    pub name: String,
    pub args: Vec<RpcArg>,
    pub returns: RpcReturn,
    pub language: String,
    pub volatility: String,
    pub security: String,
    pub body: String,
}

impl RpcFunction {
    pub fn from_create(stmt: &CreateFunctionStmt) -> Result<RpcFunction, CoreError> {
        if stmt.language != "sql" {
            return Err(CoreError::unsupported(format!(
                "LANGUAGE {}",
                stmt.language
            )));
        }

        let mut args = Vec::new();
        for arg in &stmt.args {
            let default = arg
                .default
                .as_ref()
                .map(|d| Generator::new(Dialect::PostgreSQL).expr(d))
                .transpose()?;
            args.push(RpcArg {
                name: arg.name.clone(),
                ty: arg.ty.name.clone(),
                default,
                mode: match arg.mode {
                    sblite_sql::ast::ArgMode::In => None,
                    sblite_sql::ast::ArgMode::Out => Some("out".to_string()),
                    sblite_sql::ast::ArgMode::InOut => Some("inout".to_string()),
                },
            });
        }

        let returns = match &stmt.returns {
            ReturnType::Scalar(ty) if ty.name.eq_ignore_ascii_case("record") => RpcReturn::Record,
            ReturnType::Scalar(ty) => RpcReturn::Scalar {
                ty: ty.name.clone(),
            },
            ReturnType::SetOf(ty) => RpcReturn::Setof {
                ty: ty.name.clone(),
            },
            ReturnType::Table(columns) => RpcReturn::Table {
                columns: columns
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.name.clone()))
                    .collect(),
            },
        };

        Ok(RpcFunction {
            name: stmt.name.clone(),
            args,
            returns,
            language: stmt.language.clone(),
            volatility: stmt.volatility.as_str().to_string(),
            security: stmt.security.as_str().to_string(),
            body: stmt.body.trim().to_string(),
        })
    }

    pub fn is_security_definer(&self) -> bool {
        self.security.eq_ignore_ascii_case("definer")
    }

    /// Re-emit the stored metadata as PostgreSQL DDL for migration export.
    pub fn to_postgres_ddl(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| {
                let mut out = String::new();
                if let Some(mode) = &arg.mode {
                    out.push_str(&mode.to_uppercase());
                    out.push(' ');
                }
                if let Some(name) = &arg.name {
                    out.push_str(name);
                    out.push(' ');
                }
                out.push_str(&arg.ty);
                if let Some(default) = &arg.default {
                    out.push_str(" DEFAULT ");
                    out.push_str(default);
                }
                out
            })
            .collect::<Vec<_>>()
            .join(", ");

        let returns = match &self.returns {
            RpcReturn::Scalar { ty } => ty.clone(),
            RpcReturn::Record => "record".to_string(),
            RpcReturn::Setof { ty } => format!("SETOF {ty}"),
            RpcReturn::Table { columns } => format!(
                "TABLE({})",
                columns
                    .iter()
                    .map(|(name, ty)| format!("{name} {ty}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        format!(
            "CREATE OR REPLACE FUNCTION {}({args}) RETURNS {returns} LANGUAGE {} {} SECURITY {} AS $fn$\n{}\n$fn$",
            self.name, self.language, self.volatility, self.security, self.body
        )
    }
}

// -- registry over _rpc_functions ----------------------------------------

pub async fn save(engine: &Engine, function: &RpcFunction) -> Result<(), CoreError> {
    let args_json = serde_json::to_string(&function.args)
        .map_err(|e| CoreError::rpc(format!("cannot serialize function arguments: {e}")))?;
    let return_json = serde_json::to_string(&function.returns)
        .map_err(|e| CoreError::rpc(format!("cannot serialize function return type: {e}")))?;
    engine
        .execute(
            "INSERT OR REPLACE INTO _rpc_functions \
             (name, args_json, return_type_json, language, volatility, security, body) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            &[
                Value::Text(function.name.clone()),
                Value::Text(args_json),
                Value::Text(return_json),
                Value::Text(function.language.clone()),
                Value::Text(function.volatility.clone()),
                Value::Text(function.security.clone()),
                Value::Text(function.body.clone()),
            ],
            None,
        )
        .await?;
    Ok(())
}

pub async fn load(engine: &Engine, name: &str) -> Result<Option<RpcFunction>, CoreError> {
    let result = engine
        .query(
            "SELECT name, args_json, return_type_json, language, volatility, security, body \
             FROM _rpc_functions WHERE name = ?1",
            &[Value::Text(name.to_string())],
            None,
        )
        .await?;

    let Some(row) = result.rows.into_iter().next() else {
        return Ok(None);
    };
    let text = |i: usize| match row.get(i) {
        Some(Value::Text(s)) => s.clone(),
        _ => String::new(),
    };

    let args: Vec<RpcArg> = serde_json::from_str(&text(1))
        .map_err(|e| CoreError::rpc(format!("corrupt args_json for function {name}: {e}")))?;
    let returns: RpcReturn = serde_json::from_str(&text(2))
        .map_err(|e| CoreError::rpc(format!("corrupt return_type_json for function {name}: {e}")))?;

    Ok(Some(RpcFunction {
        name: text(0),
        args,
        returns,
        language: text(3),
        volatility: text(4),
        security: text(5),
        body: text(6),
    }))
}

pub async fn remove(engine: &Engine, name: &str) -> Result<bool, CoreError> {
    let affected = engine
        .execute(
            "DELETE FROM _rpc_functions WHERE name = ?1",
            &[Value::Text(name.to_string())],
            None,
        )
        .await?;
    Ok(affected > 0)
}

pub async fn list(engine: &Engine) -> Result<Vec<RpcFunction>, CoreError> {
    let names = engine
        .query("SELECT name FROM _rpc_functions ORDER BY name", &[], None)
        .await?;
    let mut functions = Vec::new();
    for row in names.rows {
        if let Some(Value::Text(name)) = row.first() {
            if let Some(function) = load(engine, name).await? {
                functions.push(function);
            }
        }
    }
    Ok(functions)
}

// -- invocation helpers ---------------------------------------------------

/// Match supplied named arguments against the declaration: arity check,
/// defaults for omitted args, rejection of unknown or missing ones.
pub fn resolve_args(
    function: &RpcFunction,
    supplied: &serde_json::Map<String, JsonValue>,
) -> Result<Vec<(String, JsonValue)>, CoreError> {
    let known: Vec<&str> = function
        .args
        .iter()
        .filter_map(|a| a.name.as_deref())
        .collect();
    for name in supplied.keys() {
        if !known.contains(&name.as_str()) {
            return Err(CoreError::rpc(format!(
                "function {} has no argument named \"{name}\"",
                function.name
            )));
        }
    }

    let mut resolved = Vec::new();
    for arg in &function.args {
        let Some(name) = &arg.name else {
            return Err(CoreError::rpc(format!(
                "function {} has unnamed arguments and cannot be called by name",
                function.name
            )));
        };
        match supplied.get(name) {
            Some(value) => resolved.push((name.clone(), value.clone())),
            None => match &arg.default {
                Some(default) => resolved.push((name.clone(), default_to_json(default)?)),
                None => {
                    return Err(CoreError::rpc(format!(
                        "missing required argument \"{name}\" of function {}",
                        function.name
                    )))
                }
            },
        }
    }
    Ok(resolved)
}

fn default_to_json(default_sql: &str) -> Result<JsonValue, CoreError> {
    use sblite_sql::ast::{Expr, Literal};
    let expr = sblite_sql::Parser::parse_expression(default_sql)?;
    Ok(match expr {
        Expr::Literal { value, .. } => match value {
            Literal::Null => JsonValue::Null,
            Literal::Boolean(b) => JsonValue::Bool(b),
            Literal::Number(n) => n
                .parse::<i64>()
                .map(JsonValue::from)
                .or_else(|_| n.parse::<f64>().map(JsonValue::from))
                .unwrap_or(JsonValue::String(n)),
            Literal::String(s) | Literal::DollarString(s) => JsonValue::String(s),
        },
        other => JsonValue::String(Generator::new(Dialect::PostgreSQL).expr(&other)?),
    })
}

/// Replace argument references in the body with `$n` placeholders and build
/// the matching parameter vector. Word-boundary textual substitution; string
/// literal contents are not distinguished, which is why values travel as
/// bound parameters rather than spliced text.
pub fn bind_args(
    body: &str,
    args: &[(String, JsonValue)],
) -> Result<(String, Vec<Value>), CoreError> {
    let mut sql = body.to_string();
    let mut params = Vec::with_capacity(args.len());

    for (position, (name, value)) in args.iter().enumerate() {
        params.push(json_to_value(value));
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name)))
            .map_err(|e| CoreError::rpc(format!("invalid argument name {name}: {e}")))?;
        // `$$` is a literal dollar in the replacement syntax
        sql = pattern
            .replace_all(&sql, format!("$${}", position + 1).as_str())
            .to_string();
    }

    Ok((sql, params))
}

pub fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Integer(*b as i64),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            JsonValue::String(format!("\\x{hex}"))
        }
    }
}

/// Shape an engine result per the declared return type: scalar → raw value,
/// record → object, table/setof → array of objects.
pub fn shape_result(returns: &RpcReturn, result: &QueryResult) -> JsonValue {
    match returns {
        RpcReturn::Scalar { .. } => result
            .rows
            .first()
            .and_then(|row| row.first())
            .map(value_to_json)
            .unwrap_or(JsonValue::Null),
        RpcReturn::Record => result
            .rows
            .first()
            .map(|row| row_object(&result.columns, row))
            .unwrap_or(JsonValue::Null),
        RpcReturn::Table { .. } | RpcReturn::Setof { .. } => JsonValue::Array(
            result
                .rows
                .iter()
                .map(|row| row_object(&result.columns, row))
                .collect(),
        ),
    }
}

fn row_object(columns: &[String], row: &[Value]) -> JsonValue {
    let mut object = serde_json::Map::new();
    for (column, value) in columns.iter().zip(row.iter()) {
        object.insert(column.clone(), value_to_json(value));
    }
    JsonValue::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sblite_sql::{Parser, Stmt};

    fn sample_function() -> RpcFunction {
        let stmt = Parser::parse_statement(
            "CREATE FUNCTION add_numbers(a integer, b integer DEFAULT 10) \
             RETURNS integer LANGUAGE sql AS $$ SELECT a + b $$",
        )
        .unwrap();
        let Stmt::CreateFunction(create) = stmt else {
            panic!("expected create function");
        };
        RpcFunction::from_create(&create).unwrap()
    }

    #[test]
    fn from_create_extracts_metadata() {
        let function = sample_function();
        assert_eq!(function.name, "add_numbers");
        assert_eq!(function.args.len(), 2);
        assert_eq!(function.args[1].default.as_deref(), Some("10"));
        assert!(matches!(function.returns, RpcReturn::Scalar { .. }));
        assert_eq!(function.volatility, "VOLATILE");
        assert!(!function.is_security_definer());
        assert_eq!(function.body, "SELECT a + b");
    }

    #[test]
    fn non_sql_language_rejected() {
        let stmt = Parser::parse_statement(
            "CREATE FUNCTION f() RETURNS integer LANGUAGE plpgsql AS $$ BEGIN END $$",
        )
        .unwrap();
        let Stmt::CreateFunction(create) = stmt else {
            panic!();
        };
        assert!(RpcFunction::from_create(&create).is_err());
    }

    #[test]
    fn resolve_args_applies_defaults_and_rejects_unknown() {
        let function = sample_function();

        let mut supplied = serde_json::Map::new();
        supplied.insert("a".to_string(), JsonValue::from(1));
        let resolved = resolve_args(&function, &supplied).unwrap();
        assert_eq!(resolved[0], ("a".to_string(), JsonValue::from(1)));
        assert_eq!(resolved[1], ("b".to_string(), JsonValue::from(10)));

        let empty = serde_json::Map::new();
        assert!(resolve_args(&function, &empty).is_err());

        let mut unknown = serde_json::Map::new();
        unknown.insert("a".to_string(), JsonValue::from(1));
        unknown.insert("zzz".to_string(), JsonValue::from(2));
        assert!(resolve_args(&function, &unknown).is_err());
    }

    #[test]
    fn bind_args_replaces_references_with_placeholders() {
        let args = vec![
            ("a".to_string(), JsonValue::from(1)),
            ("ab".to_string(), JsonValue::from(2)),
        ];
        let (sql, params) = bind_args("SELECT a + ab", &args).unwrap();
        assert_eq!(sql, "SELECT $1 + $2");
        assert_eq!(params, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn bind_args_respects_word_boundaries() {
        let args = vec![("id".to_string(), JsonValue::from(5))];
        let (sql, _) = bind_args("SELECT user_id, id FROM t WHERE id = id", &args).unwrap();
        assert_eq!(sql, "SELECT user_id, $1 FROM t WHERE $1 = $1");
    }

    #[test]
    fn shaping_by_return_kind() {
        let result = QueryResult {
            columns: vec!["id".to_string(), "n".to_string()],
            decl_types: vec![None, None],
            rows: vec![
                vec![Value::Integer(1), Value::Text("x".to_string())],
                vec![Value::Integer(2), Value::Text("y".to_string())],
            ],
        };

        let scalar = shape_result(
            &RpcReturn::Scalar {
                ty: "integer".to_string(),
            },
            &result,
        );
        assert_eq!(scalar, JsonValue::from(1));

        let record = shape_result(&RpcReturn::Record, &result);
        assert_eq!(record["n"], JsonValue::String("x".to_string()));

        let rows = shape_result(
            &RpcReturn::Setof {
                ty: "record".to_string(),
            },
            &result,
        );
        assert_eq!(rows.as_array().unwrap().len(), 2);

        let empty = QueryResult::default();
        assert_eq!(
            shape_result(
                &RpcReturn::Scalar {
                    ty: "integer".to_string()
                },
                &empty
            ),
            JsonValue::Null
        );
    }

    #[tokio::test]
    async fn registry_round_trip() {
        let engine = Engine::open_in_memory().unwrap();
        let function = sample_function();
        save(&engine, &function).await.unwrap();

        let loaded = load(&engine, "add_numbers").await.unwrap().unwrap();
        assert_eq!(loaded.name, function.name);
        assert_eq!(loaded.args.len(), 2);
        assert_eq!(loaded.body, function.body);

        assert_eq!(list(&engine).await.unwrap().len(), 1);
        assert!(remove(&engine, "add_numbers").await.unwrap());
        assert!(load(&engine, "add_numbers").await.unwrap().is_none());
        assert!(!remove(&engine, "add_numbers").await.unwrap());
    }
}
