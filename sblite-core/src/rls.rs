//! Row-level security predicate compilation.
//!
//! Given (table, command, auth), produce the combined USING / WITH CHECK
//! predicate as an AST ready to splice into a query. `service_role` bypasses
//! everything; a table with RLS enabled but no applicable permissive policy
//! denies by default.

use sblite_sql::ast::{
    BinaryOp, Expr, InSet, IsTest, Literal, SelectStmt, TableFactor,
};
use sblite_sql::token::Pos;
use sblite_sql::{Dialect, Generator};
use serde_json::Value as JsonValue;

use crate::auth::AuthContext;
use crate::error::CoreError;
use crate::policy::{PolicyCommand, PolicySet};

/// Combined USING predicate. `None` means unrestricted (bypass or RLS off).
pub fn using_predicate(
    set: &PolicySet,
    table: &str,
    command: PolicyCommand,
    auth: &AuthContext,
) -> Option<Expr> {
    predicate(set, table, command, auth, false)
}

/// Combined WITH CHECK predicate for INSERT/UPDATE post-image validation.
pub fn check_predicate(
    set: &PolicySet,
    table: &str,
    command: PolicyCommand,
    auth: &AuthContext,
) -> Option<Expr> {
    predicate(set, table, command, auth, true)
}

/// Predicate as SQLite-executable text; empty string when unrestricted.
pub fn predicate_text(
    set: &PolicySet,
    table: &str,
    command: PolicyCommand,
    auth: &AuthContext,
) -> Result<String, CoreError> {
    match using_predicate(set, table, command, auth) {
        Some(expr) => Ok(Generator::new(Dialect::SQLite).expr(&expr)?),
        None => Ok(String::new()),
    }
}

fn predicate(
    set: &PolicySet,
    table: &str,
    command: PolicyCommand,
    auth: &AuthContext,
    check: bool,
) -> Option<Expr> {
    if auth.is_service_role() {
        return None;
    }
    if !set.rls_enabled(table) {
        return None;
    }

    let policies = set.matching(table, command, auth);

    let permissive: Vec<Expr> = policies
        .iter()
        .filter(|p| p.permissive)
        .filter_map(|p| {
            if check {
                p.effective_check().cloned()
            } else {
                p.using_ast.clone()
            }
        })
        .map(|e| substitute_expr(e, auth))
        .collect();

    let restrictive: Vec<Expr> = policies
        .iter()
        .filter(|p| !p.permissive)
        .filter_map(|p| {
            if check {
                p.effective_check().cloned()
            } else {
                p.using_ast.clone()
            }
        })
        .map(|e| substitute_expr(e, auth))
        .collect();

    // deny-by-default: RLS on, nothing grants access
    let mut combined = if permissive.is_empty() {
        bool_literal(false)
    } else {
        join(permissive, BinaryOp::Or)
    };

    for predicate in restrictive {
        combined = Expr::BinaryOp {
            op: BinaryOp::And,
            left: Box::new(paren(combined)),
            right: Box::new(paren(predicate)),
            pos: Pos::default(),
        };
    }

    Some(combined)
}

fn join(mut predicates: Vec<Expr>, op: BinaryOp) -> Expr {
    let mut combined = predicates.remove(0);
    for next in predicates {
        combined = Expr::BinaryOp {
            op,
            left: Box::new(paren(combined)),
            right: Box::new(paren(next)),
            pos: Pos::default(),
        };
    }
    combined
}

fn paren(expr: Expr) -> Expr {
    match expr {
        paren @ Expr::Paren { .. } => paren,
        other => Expr::Paren {
            expr: Box::new(other),
            pos: Pos::default(),
        },
    }
}

fn bool_literal(value: bool) -> Expr {
    Expr::Literal {
        value: Literal::Boolean(value),
        pos: Pos::default(),
    }
}

fn string_literal(value: impl Into<String>) -> Expr {
    Expr::Literal {
        value: Literal::String(value.into()),
        pos: Pos::default(),
    }
}

fn null_literal() -> Expr {
    Expr::Literal {
        value: Literal::Null,
        pos: Pos::default(),
    }
}

fn json_to_literal(value: &JsonValue) -> Expr {
    match value {
        JsonValue::Null => null_literal(),
        JsonValue::Bool(b) => Expr::Literal {
            value: Literal::Boolean(*b),
            pos: Pos::default(),
        },
        JsonValue::Number(n) => Expr::Literal {
            value: Literal::Number(n.to_string()),
            pos: Pos::default(),
        },
        JsonValue::String(s) => string_literal(s.clone()),
        other => string_literal(other.to_string()),
    }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::FunctionCall {
        name: name.to_string(),
        args,
        distinct: false,
        star: false,
        order_by: Vec::new(),
        pos: Pos::default(),
    }
}

/// `storage.filename(n)`: path segment after the last `/`.
fn filename_expr(arg: Expr) -> Expr {
    // replace(n, rtrim(n, replace(n, '/', '')), '')
    call(
        "replace",
        vec![
            arg.clone(),
            call(
                "rtrim",
                vec![
                    arg.clone(),
                    call("replace", vec![arg, string_literal("/"), string_literal("")]),
                ],
            ),
            string_literal(""),
        ],
    )
}

/// `storage.foldername(n)`: directory prefix without the trailing `/`.
fn foldername_expr(arg: Expr) -> Expr {
    call(
        "rtrim",
        vec![
            call(
                "rtrim",
                vec![
                    arg.clone(),
                    call("replace", vec![arg, string_literal("/"), string_literal("")]),
                ],
            ),
            string_literal("/"),
        ],
    )
}

/// `storage.extension(n)`: suffix after the last `.`.
fn extension_expr(arg: Expr) -> Expr {
    call(
        "replace",
        vec![
            arg.clone(),
            call(
                "rtrim",
                vec![
                    arg.clone(),
                    call("replace", vec![arg, string_literal("."), string_literal("")]),
                ],
            ),
            string_literal(""),
        ],
    )
}

/// Replace `auth.*` and `storage.*` references with literals and engine
/// expressions drawn from the request context.
pub fn substitute_expr(expr: Expr, auth: &AuthContext) -> Expr {
    match expr {
        // jwt claim access is matched before generic recursion so the claim
        // name stays a key, not a lowered json_extract target
        Expr::JsonAccess {
            expr: inner,
            key,
            as_text,
            pos,
        } => {
            if let (
                Expr::FunctionCall { name, .. },
                Expr::Literal {
                    value: Literal::String(claim),
                    ..
                },
            ) = (inner.as_ref(), key.as_ref())
            {
                if name.eq_ignore_ascii_case("auth.jwt") {
                    return match auth.claim(claim) {
                        Some(value) => json_to_literal(value),
                        None => null_literal(),
                    };
                }
            }
            Expr::JsonAccess {
                expr: Box::new(substitute_expr(*inner, auth)),
                key: Box::new(substitute_expr(*key, auth)),
                as_text,
                pos,
            }
        }
        Expr::FunctionCall {
            name,
            args,
            distinct,
            star,
            order_by,
            pos,
        } => {
            let lowered = name.to_ascii_lowercase();
            match lowered.as_str() {
                "auth.uid" => {
                    return match &auth.user_id {
                        Some(uid) => string_literal(uid.clone()),
                        None => null_literal(),
                    }
                }
                "auth.role" => return string_literal(auth.role.name().to_string()),
                "auth.jwt" => {
                    return string_literal(
                        serde_json::Value::Object(auth.claims.clone()).to_string(),
                    )
                }
                "storage.filename" | "storage.foldername" | "storage.extension"
                    if args.len() == 1 =>
                {
                    let arg = substitute_expr(args.into_iter().next().unwrap(), auth);
                    return match lowered.as_str() {
                        "storage.filename" => filename_expr(arg),
                        "storage.foldername" => foldername_expr(arg),
                        _ => extension_expr(arg),
                    };
                }
                _ => {}
            }
            Expr::FunctionCall {
                name,
                args: args
                    .into_iter()
                    .map(|a| substitute_expr(a, auth))
                    .collect(),
                distinct,
                star,
                order_by,
                pos,
            }
        }
        Expr::BinaryOp {
            op, left, right, pos,
        } => Expr::BinaryOp {
            op,
            left: Box::new(substitute_expr(*left, auth)),
            right: Box::new(substitute_expr(*right, auth)),
            pos,
        },
        Expr::UnaryOp { op, operand, pos } => Expr::UnaryOp {
            op,
            operand: Box::new(substitute_expr(*operand, auth)),
            pos,
        },
        Expr::TypeCast { expr, ty, pos } => Expr::TypeCast {
            expr: Box::new(substitute_expr(*expr, auth)),
            ty,
            pos,
        },
        Expr::Cast { expr, ty, pos } => Expr::Cast {
            expr: Box::new(substitute_expr(*expr, auth)),
            ty,
            pos,
        },
        Expr::Paren { expr, pos } => Expr::Paren {
            expr: Box::new(substitute_expr(*expr, auth)),
            pos,
        },
        Expr::Array { elements, pos } => Expr::Array {
            elements: elements
                .into_iter()
                .map(|e| substitute_expr(e, auth))
                .collect(),
            pos,
        },
        Expr::ArraySubscript { array, index, pos } => Expr::ArraySubscript {
            array: Box::new(substitute_expr(*array, auth)),
            index: Box::new(substitute_expr(*index, auth)),
            pos,
        },
        Expr::Case {
            operand,
            branches,
            else_expr,
            pos,
        } => Expr::Case {
            operand: operand.map(|o| Box::new(substitute_expr(*o, auth))),
            branches: branches
                .into_iter()
                .map(|(c, r)| (substitute_expr(c, auth), substitute_expr(r, auth)))
                .collect(),
            else_expr: else_expr.map(|e| Box::new(substitute_expr(*e, auth))),
            pos,
        },
        Expr::Between {
            expr,
            negated,
            low,
            high,
            pos,
        } => Expr::Between {
            expr: Box::new(substitute_expr(*expr, auth)),
            negated,
            low: Box::new(substitute_expr(*low, auth)),
            high: Box::new(substitute_expr(*high, auth)),
            pos,
        },
        Expr::In {
            expr,
            negated,
            set,
            pos,
        } => Expr::In {
            expr: Box::new(substitute_expr(*expr, auth)),
            negated,
            set: match set {
                InSet::List(list) => InSet::List(
                    list.into_iter().map(|e| substitute_expr(e, auth)).collect(),
                ),
                InSet::Subquery(query) => {
                    InSet::Subquery(Box::new(substitute_select(*query, auth)))
                }
            },
            pos,
        },
        Expr::Is {
            expr,
            negated,
            test,
            pos,
        } => Expr::Is {
            expr: Box::new(substitute_expr(*expr, auth)),
            negated,
            test: match test {
                IsTest::DistinctFrom(rhs) => {
                    IsTest::DistinctFrom(Box::new(substitute_expr(*rhs, auth)))
                }
                other => other,
            },
            pos,
        },
        Expr::Exists {
            negated,
            subquery,
            pos,
        } => Expr::Exists {
            negated,
            subquery: Box::new(substitute_select(*subquery, auth)),
            pos,
        },
        Expr::Extract { field, source, pos } => Expr::Extract {
            field,
            source: Box::new(substitute_expr(*source, auth)),
            pos,
        },
        Expr::Subquery { query, pos } => Expr::Subquery {
            query: Box::new(substitute_select(*query, auth)),
            pos,
        },
        leaf => leaf,
    }
}

fn substitute_select(mut select: SelectStmt, auth: &AuthContext) -> SelectStmt {
    for item in &mut select.columns {
        item.expr = substitute_expr(item.expr.clone(), auth);
    }
    for table_ref in &mut select.from {
        if let TableFactor::Subquery { query, .. } = &mut table_ref.relation {
            **query = substitute_select((**query).clone(), auth);
        }
        for join in &mut table_ref.joins {
            if let sblite_sql::ast::JoinConstraint::On(on) = &mut join.constraint {
                *on = substitute_expr(on.clone(), auth);
            }
        }
    }
    if let Some(where_clause) = select.where_clause.take() {
        select.where_clause = Some(substitute_expr(where_clause, auth));
    }
    if let Some(having) = select.having.take() {
        select.having = Some(substitute_expr(having, auth));
    }
    select
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;

    fn sql(expr: &Expr) -> String {
        Generator::new(Dialect::SQLite).expr(expr).unwrap()
    }

    fn own_rows_policy(command: PolicyCommand, permissive: bool) -> Policy {
        Policy::compile(
            "documents",
            format!("p_{}_{permissive}", command.as_str()),
            command,
            Vec::new(),
            Some("user_id = auth.uid()".to_string()),
            None,
            permissive,
        )
        .unwrap()
    }

    #[test]
    fn service_role_bypasses() {
        let mut set = PolicySet::new();
        set.add(own_rows_policy(PolicyCommand::Select, true));
        let auth = AuthContext::service_role();
        assert!(using_predicate(&set, "documents", PolicyCommand::Select, &auth).is_none());
        assert_eq!(
            predicate_text(&set, "documents", PolicyCommand::Select, &auth).unwrap(),
            ""
        );
    }

    #[test]
    fn rls_disabled_table_is_unrestricted() {
        let set = PolicySet::new();
        let auth = AuthContext::authenticated("u1");
        assert!(using_predicate(&set, "documents", PolicyCommand::Select, &auth).is_none());
    }

    #[test]
    fn deny_by_default_without_permissive_policies() {
        let mut set = PolicySet::new();
        set.enable_rls("documents");
        let auth = AuthContext::authenticated("u1");
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert_eq!(sql(&pred), "0");

        // a policy for another command does not grant SELECT
        set.add(own_rows_policy(PolicyCommand::Delete, true));
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert_eq!(sql(&pred), "0");
    }

    #[test]
    fn auth_uid_substitution() {
        let mut set = PolicySet::new();
        set.add(own_rows_policy(PolicyCommand::Select, true));
        let auth = AuthContext::authenticated("u1");
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert_eq!(sql(&pred), "user_id = 'u1'");
    }

    #[test]
    fn anonymous_uid_is_null() {
        let mut set = PolicySet::new();
        set.add(own_rows_policy(PolicyCommand::Select, true));
        let pred =
            using_predicate(&set, "documents", PolicyCommand::Select, &AuthContext::anonymous())
                .unwrap();
        assert_eq!(sql(&pred), "user_id = NULL");
    }

    #[test]
    fn permissive_policies_or_together() {
        let mut set = PolicySet::new();
        set.add(own_rows_policy(PolicyCommand::Select, true));
        set.add(
            Policy::compile(
                "documents",
                "public_docs",
                PolicyCommand::Select,
                Vec::new(),
                Some("is_public = TRUE".to_string()),
                None,
                true,
            )
            .unwrap(),
        );
        let auth = AuthContext::authenticated("u1");
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert_eq!(sql(&pred), "(user_id = 'u1') OR (is_public = 1)");
    }

    #[test]
    fn restrictive_policies_and_onto_permissive() {
        let mut set = PolicySet::new();
        set.add(own_rows_policy(PolicyCommand::Select, true));
        set.add(
            Policy::compile(
                "documents",
                "not_archived",
                PolicyCommand::Select,
                Vec::new(),
                Some("archived = FALSE".to_string()),
                None,
                false,
            )
            .unwrap(),
        );
        let auth = AuthContext::authenticated("u1");
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert_eq!(sql(&pred), "(user_id = 'u1') AND (archived = 0)");
    }

    #[test]
    fn check_falls_back_to_using() {
        let mut set = PolicySet::new();
        set.add(own_rows_policy(PolicyCommand::Insert, true));
        let auth = AuthContext::authenticated("u1");
        let pred = check_predicate(&set, "documents", PolicyCommand::Insert, &auth).unwrap();
        assert_eq!(sql(&pred), "user_id = 'u1'");
    }

    #[test]
    fn explicit_check_wins_over_using() {
        let mut set = PolicySet::new();
        set.add(
            Policy::compile(
                "documents",
                "own_insert",
                PolicyCommand::Insert,
                Vec::new(),
                Some("TRUE".to_string()),
                Some("owner = auth.uid()".to_string()),
                true,
            )
            .unwrap(),
        );
        let auth = AuthContext::authenticated("u9");
        let pred = check_predicate(&set, "documents", PolicyCommand::Insert, &auth).unwrap();
        assert_eq!(sql(&pred), "owner = 'u9'");
    }

    #[test]
    fn jwt_claim_substitution() {
        let mut set = PolicySet::new();
        set.add(
            Policy::compile(
                "documents",
                "admins",
                PolicyCommand::Select,
                Vec::new(),
                Some("auth.jwt()->>'app_role' = 'admin'".to_string()),
                None,
                true,
            )
            .unwrap(),
        );
        let mut claims = serde_json::Map::new();
        claims.insert(
            "app_role".to_string(),
            serde_json::Value::String("admin".to_string()),
        );
        let auth = AuthContext::authenticated("u1").with_claims(claims);
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert_eq!(sql(&pred), "'admin' = 'admin'");
    }

    #[test]
    fn missing_jwt_claim_is_null() {
        let expr = sblite_sql::Parser::parse_expression("auth.jwt()->>'missing'").unwrap();
        let substituted = substitute_expr(expr, &AuthContext::authenticated("u1"));
        assert_eq!(sql(&substituted), "NULL");
    }

    #[test]
    fn storage_helper_rewrites() {
        let auth = AuthContext::anonymous();
        let expr = sblite_sql::Parser::parse_expression("storage.filename(name)").unwrap();
        assert_eq!(
            sql(&substitute_expr(expr, &auth)),
            "replace(name, rtrim(name, replace(name, '/', '')), '')"
        );
        let expr = sblite_sql::Parser::parse_expression("storage.extension(name)").unwrap();
        assert_eq!(
            sql(&substitute_expr(expr, &auth)),
            "replace(name, rtrim(name, replace(name, '.', '')), '')"
        );
    }

    #[test]
    fn substitution_reaches_subqueries() {
        let mut set = PolicySet::new();
        set.add(
            Policy::compile(
                "documents",
                "team_docs",
                PolicyCommand::Select,
                Vec::new(),
                Some(
                    "EXISTS (SELECT 1 FROM memberships WHERE memberships.doc_id = documents.id \
                     AND memberships.user_id = auth.uid())"
                        .to_string(),
                ),
                None,
                true,
            )
            .unwrap(),
        );
        let auth = AuthContext::authenticated("u7");
        let pred = using_predicate(&set, "documents", PolicyCommand::Select, &auth).unwrap();
        assert!(sql(&pred).contains("memberships.user_id = 'u7'"));
    }

    #[test]
    fn role_scoped_policy_not_applied_to_anon() {
        let mut set = PolicySet::new();
        set.add(
            Policy::compile(
                "documents",
                "members_only",
                PolicyCommand::Select,
                vec!["authenticated".to_string()],
                Some("TRUE".to_string()),
                None,
                true,
            )
            .unwrap(),
        );
        let pred =
            using_predicate(&set, "documents", PolicyCommand::Select, &AuthContext::anonymous())
                .unwrap();
        // anon sees deny-by-default
        assert_eq!(sql(&pred), "0");
        let pred = using_predicate(
            &set,
            "documents",
            PolicyCommand::Select,
            &AuthContext::authenticated("u1"),
        )
        .unwrap();
        assert_eq!(sql(&pred), "1");
    }
}
