//! Row-level security policy model and the process-wide policy cache.
//!
//! Policies load from `_policies` (predicates pre-compiled to ASTs at load
//! time) and RLS enablement from `_rls_tables`. Readers take an `Arc`
//! snapshot; the admin path installs a fresh set with a pointer swap, so
//! readers never block.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use rusqlite::types::Value;
use sblite_sql::{Expr, Parser};

use crate::auth::AuthContext;
use crate::engine::Engine;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCommand {
    Select,
    Insert,
    Update,
    Delete,
    All,
}

impl PolicyCommand {
    pub fn parse(name: &str) -> Option<PolicyCommand> {
        match name.to_ascii_uppercase().as_str() {
            "SELECT" => Some(PolicyCommand::Select),
            "INSERT" => Some(PolicyCommand::Insert),
            "UPDATE" => Some(PolicyCommand::Update),
            "DELETE" => Some(PolicyCommand::Delete),
            "ALL" => Some(PolicyCommand::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
            PolicyCommand::All => "ALL",
        }
    }

    pub fn covers(&self, requested: PolicyCommand) -> bool {
        *self == PolicyCommand::All || *self == requested
    }
}

/// One RLS rule. Predicate sources are kept alongside their compiled ASTs so
/// the enforcer never re-parses per request.
#[derive(Debug, Clone)]
pub struct Policy {
    pub table: String,
    pub name: String,
    pub command: PolicyCommand,
    /// Roles the policy applies to; empty means every role.
    pub roles: Vec<String>,
    pub using_expr: Option<String>,
    pub check_expr: Option<String>,
    pub permissive: bool,
    pub using_ast: Option<Expr>,
    pub check_ast: Option<Expr>,
}

impl Policy {
    pub fn compile(
        table: impl Into<String>,
        name: impl Into<String>,
        command: PolicyCommand,
        roles: Vec<String>,
        using_expr: Option<String>,
        check_expr: Option<String>,
        permissive: bool,
    ) -> Result<Policy, CoreError> {
        let using_ast = using_expr
            .as_deref()
            .map(Parser::parse_expression)
            .transpose()?;
        let check_ast = check_expr
            .as_deref()
            .map(Parser::parse_expression)
            .transpose()?;
        Ok(Policy {
            table: table.into(),
            name: name.into(),
            command,
            roles,
            using_expr,
            check_expr,
            permissive,
            using_ast,
            check_ast,
        })
    }

    pub fn applies_to(&self, auth: &AuthContext) -> bool {
        self.roles.is_empty() || self.roles.iter().any(|r| r == auth.role.name())
    }

    /// WITH CHECK predicate, defaulting to USING when absent.
    pub fn effective_check(&self) -> Option<&Expr> {
        self.check_ast.as_ref().or(self.using_ast.as_ref())
    }
}

#[derive(Debug, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
    rls_tables: HashSet<String>,
}

impl PolicySet {
    pub fn new() -> PolicySet {
        PolicySet::default()
    }

    pub fn add(&mut self, policy: Policy) {
        self.rls_tables.insert(policy.table.clone());
        self.policies.push(policy);
    }

    pub fn enable_rls(&mut self, table: impl Into<String>) {
        self.rls_tables.insert(table.into());
    }

    pub fn rls_enabled(&self, table: &str) -> bool {
        self.rls_tables.contains(table)
    }

    pub fn matching(
        &self,
        table: &str,
        command: PolicyCommand,
        auth: &AuthContext,
    ) -> Vec<&Policy> {
        self.policies
            .iter()
            .filter(|p| p.table == table && p.command.covers(command) && p.applies_to(auth))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Copy-on-write policy cache with a single writer.
#[derive(Debug)]
pub struct PolicyStore {
    current: RwLock<Arc<PolicySet>>,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore {
    pub fn new() -> PolicyStore {
        PolicyStore {
            current: RwLock::new(Arc::new(PolicySet::new())),
        }
    }

    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn install(&self, set: PolicySet) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(set);
    }

    /// Refill the cache from `_policies` / `_rls_tables`. Policies whose
    /// predicates fail to parse are skipped with a warning rather than
    /// poisoning the whole reload.
    pub async fn reload(&self, engine: &Engine) -> Result<(), CoreError> {
        let mut set = PolicySet::new();

        let enabled = engine
            .query("SELECT table_name FROM _rls_tables", &[], None)
            .await?;
        for row in enabled.rows {
            if let Some(Value::Text(table)) = row.first() {
                set.enable_rls(table.clone());
            }
        }

        let rows = engine
            .query(
                "SELECT table_name, policy_name, command, roles, using_expr, check_expr, permissive \
                 FROM _policies ORDER BY table_name, policy_name",
                &[],
                None,
            )
            .await?;

        for row in rows.rows {
            let text = |i: usize| match row.get(i) {
                Some(Value::Text(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            };
            let (Some(table), Some(name)) = (text(0), text(1)) else {
                continue;
            };
            let command = text(2)
                .and_then(|c| PolicyCommand::parse(&c))
                .unwrap_or(PolicyCommand::All);
            let roles = text(3)
                .map(|r| {
                    r.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let permissive = !matches!(row.get(6), Some(Value::Integer(0)));

            match Policy::compile(&table, &name, command, roles, text(4), text(5), permissive) {
                Ok(policy) => set.add(policy),
                Err(err) => {
                    log::warn!("skipping policy {name} on {table}: {err}");
                }
            }
        }

        self.install(set);
        Ok(())
    }
}
