//! SQL emission from the AST, targeting either dialect. One recursive walk
//! dispatching on the variant tag; the dialect tag is fixed per generator
//! value.

use crate::ast::*;
use crate::error::TranslateError;
use crate::mapper::{self, FnMap};
use crate::token::Keyword;

/// Target dialect of a [`Generator`]. Immutable once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    PostgreSQL,
    SQLite,
}

pub struct Generator {
    dialect: Dialect,
    /// Set while emitting a column DEFAULT; `gen_random_uuid()` must become a
    /// sentinel there because SQLite rejects the full expression in DEFAULT.
    in_default_expr: bool,
}

/// Emit a statement in the SQLite dialect.
pub fn to_sqlite(stmt: &Stmt) -> Result<String, TranslateError> {
    Generator::new(Dialect::SQLite).stmt(stmt)
}

/// Emit a statement in the PostgreSQL dialect (migration export).
pub fn to_postgres(stmt: &Stmt) -> Result<String, TranslateError> {
    Generator::new(Dialect::PostgreSQL).stmt(stmt)
}

impl Generator {
    pub fn new(dialect: Dialect) -> Generator {
        Generator {
            dialect,
            in_default_expr: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn stmt(&mut self, stmt: &Stmt) -> Result<String, TranslateError> {
        match stmt {
            Stmt::Select(s) => self.select(s),
            Stmt::Insert(s) => self.insert(s),
            Stmt::Update(s) => self.update(s),
            Stmt::Delete(s) => self.delete(s),
            Stmt::CreateTable(s) => self.create_table(s),
            Stmt::CreateFunction(s) => self.create_function(s),
            Stmt::CreateIndex(s) => self.create_index(s),
            Stmt::Drop(s) => self.drop_stmt(s),
            Stmt::Raw { sql, .. } => Ok(sql.clone()),
        }
    }

    // -- expressions ------------------------------------------------------

    pub fn expr(&mut self, expr: &Expr) -> Result<String, TranslateError> {
        match expr {
            Expr::Identifier { name, quoted, .. } => Ok(self.ident(name, *quoted)),
            Expr::QualifiedRef {
                qualifier,
                name,
                quoted,
                ..
            } => Ok(format!("{}.{}", qualifier, self.ident(name, *quoted))),
            Expr::Literal { value, .. } => Ok(self.literal(value)),
            Expr::BinaryOp {
                op, left, right, ..
            } => self.binary_op(*op, left, right),
            Expr::UnaryOp { op, operand, .. } => {
                let inner = self.expr(operand)?;
                Ok(match op {
                    UnaryOp::Not => format!("NOT {inner}"),
                    UnaryOp::Minus => format!("-{inner}"),
                    UnaryOp::Plus => format!("+{inner}"),
                })
            }
            Expr::FunctionCall { .. } => self.function_call(expr),
            Expr::TypeCast { expr: inner, ty, .. } | Expr::Cast { expr: inner, ty, .. } => {
                self.cast(expr, inner, ty)
            }
            Expr::JsonAccess {
                expr: inner,
                key,
                as_text,
                ..
            } => self.json_access(inner, key, *as_text),
            Expr::Paren { expr: inner, .. } => Ok(format!("({})", self.expr(inner)?)),
            Expr::Array { elements, .. } => {
                let elements = self.expr_list(elements)?;
                match self.dialect {
                    Dialect::SQLite => Ok(format!("json_array({elements})")),
                    Dialect::PostgreSQL => Ok(format!("ARRAY[{elements}]")),
                }
            }
            Expr::ArraySubscript { array, index, .. } => self.array_subscript(array, index),
            Expr::Case {
                operand,
                branches,
                else_expr,
                ..
            } => {
                let mut out = String::from("CASE");
                if let Some(operand) = operand {
                    out.push(' ');
                    out.push_str(&self.expr(operand)?);
                }
                for (condition, result) in branches {
                    out.push_str(" WHEN ");
                    out.push_str(&self.expr(condition)?);
                    out.push_str(" THEN ");
                    out.push_str(&self.expr(result)?);
                }
                if let Some(else_expr) = else_expr {
                    out.push_str(" ELSE ");
                    out.push_str(&self.expr(else_expr)?);
                }
                out.push_str(" END");
                Ok(out)
            }
            Expr::Between {
                expr: inner,
                negated,
                low,
                high,
                ..
            } => Ok(format!(
                "{} {}BETWEEN {} AND {}",
                self.expr(inner)?,
                if *negated { "NOT " } else { "" },
                self.expr(low)?,
                self.expr(high)?
            )),
            Expr::In {
                expr: inner,
                negated,
                set,
                ..
            } => {
                let set_sql = match set {
                    InSet::List(list) => self.expr_list(list)?,
                    InSet::Subquery(query) => self.select(query)?,
                };
                Ok(format!(
                    "{} {}IN ({set_sql})",
                    self.expr(inner)?,
                    if *negated { "NOT " } else { "" }
                ))
            }
            Expr::Is {
                expr: inner,
                negated,
                test,
                ..
            } => self.is_expr(inner, *negated, test),
            Expr::Exists {
                negated, subquery, ..
            } => Ok(format!(
                "{}EXISTS ({})",
                if *negated { "NOT " } else { "" },
                self.select(subquery)?
            )),
            Expr::Extract { field, source, pos } => {
                let source_sql = self.expr(source)?;
                match self.dialect {
                    Dialect::PostgreSQL => Ok(format!("EXTRACT({field} FROM {source_sql})")),
                    Dialect::SQLite => {
                        let fmt = mapper::extract_format(field).ok_or_else(|| {
                            TranslateError::unsupported(format!("EXTRACT field {field}"), *pos)
                        })?;
                        Ok(format!("CAST(strftime('{fmt}', {source_sql}) AS INTEGER)"))
                    }
                }
            }
            Expr::Interval { value, pos } => self.interval(value, *pos),
            Expr::Subquery { query, .. } => Ok(format!("({})", self.select(query)?)),
            Expr::Star { qualifier, .. } => Ok(match qualifier {
                Some(qualifier) => format!("{qualifier}.*"),
                None => "*".to_string(),
            }),
            Expr::Parameter { index, .. } => Ok(match self.dialect {
                Dialect::PostgreSQL => format!("${index}"),
                Dialect::SQLite => format!("?{index}"),
            }),
            Expr::Raw { sql, .. } => Ok(sql.clone()),
        }
    }

    fn expr_list(&mut self, exprs: &[Expr]) -> Result<String, TranslateError> {
        let parts: Result<Vec<String>, TranslateError> =
            exprs.iter().map(|e| self.expr(e)).collect();
        Ok(parts?.join(", "))
    }

    fn binary_op(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<String, TranslateError> {
        let lhs = self.expr(left)?;
        let rhs = self.expr(right)?;

        if self.dialect == Dialect::SQLite {
            match op {
                // the engine registers a REGEXP scalar backed by the regex
                // crate; case-insensitive variants prepend an inline flag
                BinaryOp::Regex => return Ok(format!("{lhs} REGEXP {rhs}")),
                BinaryOp::RegexI => return Ok(format!("{lhs} REGEXP ('(?i)' || {rhs})")),
                BinaryOp::NotRegex => return Ok(format!("NOT ({lhs} REGEXP {rhs})")),
                BinaryOp::NotRegexI => {
                    return Ok(format!("NOT ({lhs} REGEXP ('(?i)' || {rhs}))"))
                }
                // SQLite LIKE is already case-insensitive for ASCII
                BinaryOp::ILike => return Ok(format!("{lhs} LIKE {rhs}")),
                BinaryOp::NotILike => return Ok(format!("{lhs} NOT LIKE {rhs}")),
                BinaryOp::Pow => return Ok(format!("POWER({lhs}, {rhs})")),
                _ => {}
            }
        }

        Ok(format!("{lhs} {} {rhs}", op.symbol()))
    }

    fn is_expr(
        &mut self,
        inner: &Expr,
        negated: bool,
        test: &IsTest,
    ) -> Result<String, TranslateError> {
        let lhs = self.expr(inner)?;
        let not = if negated { " NOT" } else { "" };
        match (self.dialect, test) {
            (Dialect::SQLite, IsTest::True) => {
                Ok(format!("{lhs} {} 1", if negated { "<>" } else { "=" }))
            }
            (Dialect::SQLite, IsTest::False) => {
                Ok(format!("{lhs} {} 0", if negated { "<>" } else { "=" }))
            }
            // SQLite's IS NOT is exactly IS DISTINCT FROM
            (Dialect::SQLite, IsTest::DistinctFrom(rhs)) => {
                let rhs = self.expr(rhs)?;
                if negated {
                    Ok(format!("{lhs} IS {rhs}"))
                } else {
                    Ok(format!("{lhs} IS NOT {rhs}"))
                }
            }
            (_, IsTest::Null) => Ok(format!("{lhs} IS{not} NULL")),
            (Dialect::PostgreSQL, IsTest::True) => Ok(format!("{lhs} IS{not} TRUE")),
            (Dialect::PostgreSQL, IsTest::False) => Ok(format!("{lhs} IS{not} FALSE")),
            (Dialect::PostgreSQL, IsTest::DistinctFrom(rhs)) => {
                let rhs = self.expr(rhs)?;
                Ok(format!("{lhs} IS{not} DISTINCT FROM {rhs}"))
            }
        }
    }

    fn function_call(&mut self, call: &Expr) -> Result<String, TranslateError> {
        let Expr::FunctionCall {
            name,
            args,
            distinct,
            star,
            order_by,
            pos,
        } = call
        else {
            unreachable!("function_call invoked on non-call node");
        };

        if *star {
            return Ok(format!("{}(*)", name.to_uppercase()));
        }

        // POSITION(sub IN s) parses as a single IN expression argument
        if name.eq_ignore_ascii_case("position") && args.len() == 1 {
            if let Expr::In {
                expr: sub,
                negated: false,
                set: InSet::List(list),
                ..
            } = &args[0]
            {
                if list.len() == 1 {
                    let sub_sql = self.expr(sub)?;
                    let str_sql = self.expr(&list[0])?;
                    return Ok(match self.dialect {
                        Dialect::SQLite => format!("INSTR({str_sql}, {sub_sql})"),
                        Dialect::PostgreSQL => format!("POSITION({sub_sql} IN {str_sql})"),
                    });
                }
            }
        }

        if self.dialect == Dialect::SQLite
            && self.in_default_expr
            && (name.eq_ignore_ascii_case("gen_random_uuid")
                || name.eq_ignore_ascii_case("uuid_generate_v4"))
        {
            return Ok(mapper::GEN_UUID_DEFAULT_SENTINEL.to_string());
        }

        let arg_sql: Result<Vec<String>, TranslateError> =
            args.iter().map(|a| self.expr(a)).collect();
        let arg_sql = arg_sql?;

        let mapping = match self.dialect {
            Dialect::SQLite => mapper::pg_function(name),
            Dialect::PostgreSQL => mapper::sqlite_function(name),
        };

        let emitted_name = match mapping {
            Some(FnMap::Rename(renamed)) => renamed.to_string(),
            Some(FnMap::Transform(transform)) => {
                return transform(&arg_sql)
                    .map_err(|message| TranslateError::unrepresentable(message, *pos));
            }
            None => name.clone(),
        };

        let mut inner = String::new();
        if *distinct {
            inner.push_str("DISTINCT ");
        }
        inner.push_str(&arg_sql.join(", "));
        if !order_by.is_empty() {
            inner.push_str(" ORDER BY ");
            inner.push_str(&self.order_by(order_by)?);
        }
        Ok(format!("{emitted_name}({inner})"))
    }

    fn cast(&mut self, node: &Expr, inner: &Expr, ty: &TypeName) -> Result<String, TranslateError> {
        let inner_sql = self.expr(inner)?;
        match self.dialect {
            Dialect::SQLite => match mapper::sqlite_cast_target(&ty.name) {
                Some(target) if !ty.array => Ok(format!("CAST({inner_sql} AS {target})")),
                // cast to a TEXT-affinity or array type is a no-op
                _ => Ok(inner_sql),
            },
            Dialect::PostgreSQL => {
                let ty_sql = self.type_name(ty);
                match node {
                    Expr::Cast { .. } => Ok(format!("CAST({inner_sql} AS {ty_sql})")),
                    _ => Ok(format!("{inner_sql}::{ty_sql}")),
                }
            }
        }
    }

    fn json_access(
        &mut self,
        inner: &Expr,
        key: &Expr,
        as_text: bool,
    ) -> Result<String, TranslateError> {
        let inner_sql = self.expr(inner)?;
        match self.dialect {
            Dialect::PostgreSQL => {
                let key_sql = self.expr(key)?;
                let op = if as_text { "->>" } else { "->" };
                Ok(format!("{inner_sql}{op}{key_sql}"))
            }
            Dialect::SQLite => match key {
                Expr::Literal {
                    value: Literal::String(k),
                    ..
                } => Ok(format!("json_extract({inner_sql}, '$.{k}')")),
                Expr::Literal {
                    value: Literal::Number(n),
                    ..
                } => Ok(format!("json_extract({inner_sql}, '$[{n}]')")),
                other => {
                    let key_sql = self.expr(other)?;
                    Ok(format!("json_extract({inner_sql}, '$.' || {key_sql})"))
                }
            },
        }
    }

    fn array_subscript(&mut self, array: &Expr, index: &Expr) -> Result<String, TranslateError> {
        let array_sql = self.expr(array)?;
        match self.dialect {
            Dialect::PostgreSQL => Ok(format!("{array_sql}[{}]", self.expr(index)?)),
            Dialect::SQLite => match index {
                // PostgreSQL arrays are 1-based, JSON paths 0-based
                Expr::Literal {
                    value: Literal::Number(n),
                    ..
                } => match n.parse::<i64>() {
                    Ok(n) => Ok(format!("json_extract({array_sql}, '$[{}]')", n - 1)),
                    Err(_) => Ok(format!(
                        "json_extract({array_sql}, '$[' || ({n} - 1) || ']')"
                    )),
                },
                other => {
                    let index_sql = self.expr(other)?;
                    Ok(format!(
                        "json_extract({array_sql}, '$[' || ({index_sql} - 1) || ']')"
                    ))
                }
            },
        }
    }

    fn interval(&mut self, value: &str, pos: crate::token::Pos) -> Result<String, TranslateError> {
        match self.dialect {
            Dialect::PostgreSQL => Ok(format!("INTERVAL '{}'", escape_string(value))),
            Dialect::SQLite => {
                let mut parts = value.split_whitespace();
                let (Some(amount), Some(unit)) = (parts.next(), parts.next()) else {
                    return Err(TranslateError::unrepresentable(
                        format!("cannot translate interval '{value}'"),
                        pos,
                    ));
                };
                if parts.next().is_some() {
                    return Err(TranslateError::unsupported(
                        format!("compound interval '{value}'"),
                        pos,
                    ));
                }
                let unit = mapper::singular_interval_unit(unit);
                if amount.starts_with('-') {
                    Ok(format!("'{amount} {unit}'"))
                } else {
                    Ok(format!("'+{amount} {unit}'"))
                }
            }
        }
    }

    fn literal(&mut self, literal: &Literal) -> String {
        match literal {
            Literal::String(s) => format!("'{}'", escape_string(s)),
            Literal::Number(n) => n.clone(),
            Literal::Boolean(b) => match self.dialect {
                Dialect::SQLite => if *b { "1" } else { "0" }.to_string(),
                Dialect::PostgreSQL => if *b { "TRUE" } else { "FALSE" }.to_string(),
            },
            Literal::Null => "NULL".to_string(),
            Literal::DollarString(body) => match self.dialect {
                Dialect::SQLite => format!("'{}'", escape_string(body)),
                Dialect::PostgreSQL => {
                    let mut tag = String::new();
                    while body.contains(&format!("${tag}$")) {
                        tag.push('x');
                    }
                    format!("${tag}${body}${tag}$")
                }
            },
        }
    }

    fn ident(&self, name: &str, quoted: bool) -> String {
        if quoted || needs_quoting(name) {
            format!("\"{}\"", name.replace('"', "\"\""))
        } else {
            name.to_string()
        }
    }

    /// Dotted object name; the `public` schema prefix is dropped for SQLite.
    fn object_name(&self, name: &str) -> String {
        let name = match self.dialect {
            Dialect::SQLite => name.strip_prefix("public.").unwrap_or(name),
            Dialect::PostgreSQL => name,
        };
        name.split('.')
            .map(|part| self.ident(part, false))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn type_name(&self, ty: &TypeName) -> String {
        match self.dialect {
            Dialect::SQLite => mapper::pg_type_to_sqlite(&ty.name, ty.array).to_string(),
            Dialect::PostgreSQL => {
                let mut out = ty.name.clone();
                if !ty.args.is_empty() {
                    out.push('(');
                    out.push_str(&ty.args.join(", "));
                    out.push(')');
                }
                if ty.array {
                    out.push_str("[]");
                }
                out
            }
        }
    }

    // -- statements -------------------------------------------------------

    fn select(&mut self, select: &SelectStmt) -> Result<String, TranslateError> {
        let mut out = String::new();

        if let Some(with) = &select.with {
            out.push_str("WITH ");
            if with.recursive {
                out.push_str("RECURSIVE ");
            }
            let mut ctes = Vec::new();
            for cte in &with.ctes {
                let mut part = self.ident(&cte.name, false);
                if !cte.columns.is_empty() {
                    part.push('(');
                    part.push_str(
                        &cte.columns
                            .iter()
                            .map(|c| self.ident(c, false))
                            .collect::<Vec<_>>()
                            .join(", "),
                    );
                    part.push(')');
                }
                part.push_str(" AS (");
                part.push_str(&self.select(&cte.query)?);
                part.push(')');
                ctes.push(part);
            }
            out.push_str(&ctes.join(", "));
            out.push(' ');
        }

        out.push_str("SELECT ");
        if select.distinct {
            out.push_str("DISTINCT ");
        }

        let mut columns = Vec::new();
        for item in &select.columns {
            let mut column = self.expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                column.push_str(" AS ");
                column.push_str(&self.ident(alias, false));
            }
            columns.push(column);
        }
        out.push_str(&columns.join(", "));

        if !select.from.is_empty() {
            out.push_str(" FROM ");
            let mut refs = Vec::new();
            for table_ref in &select.from {
                refs.push(self.table_ref(table_ref)?);
            }
            out.push_str(&refs.join(", "));
        }

        if let Some(where_clause) = &select.where_clause {
            out.push_str(" WHERE ");
            out.push_str(&self.expr(where_clause)?);
        }

        if !select.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            out.push_str(&self.expr_list(&select.group_by)?);
        }

        if let Some(having) = &select.having {
            out.push_str(" HAVING ");
            out.push_str(&self.expr(having)?);
        }

        if !select.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(&self.order_by(&select.order_by)?);
        }

        if let Some(limit) = &select.limit {
            out.push_str(" LIMIT ");
            out.push_str(&self.expr(limit)?);
        }

        if let Some(offset) = &select.offset {
            out.push_str(" OFFSET ");
            out.push_str(&self.expr(offset)?);
        }

        if let Some(set_op) = &select.set_op {
            let op = match set_op.kind {
                SetOpKind::Union => "UNION",
                SetOpKind::UnionAll => "UNION ALL",
                SetOpKind::Intersect => "INTERSECT",
                SetOpKind::Except => "EXCEPT",
            };
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            out.push_str(&self.select(&set_op.right)?);
        }

        Ok(out)
    }

    fn order_by(&mut self, items: &[OrderByItem]) -> Result<String, TranslateError> {
        let mut parts = Vec::new();
        for item in items {
            let mut part = self.expr(&item.expr)?;
            if item.desc {
                part.push_str(" DESC");
            }
            match item.nulls_first {
                Some(true) => part.push_str(" NULLS FIRST"),
                Some(false) => part.push_str(" NULLS LAST"),
                None => {}
            }
            parts.push(part);
        }
        Ok(parts.join(", "))
    }

    fn table_ref(&mut self, table_ref: &TableRef) -> Result<String, TranslateError> {
        let mut out = self.table_factor(&table_ref.relation)?;
        for join in &table_ref.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
                JoinKind::Full => "FULL JOIN",
                JoinKind::Cross => "CROSS JOIN",
            };
            out.push(' ');
            out.push_str(keyword);
            out.push(' ');
            out.push_str(&self.table_factor(&join.relation)?);
            match &join.constraint {
                JoinConstraint::On(expr) => {
                    out.push_str(" ON ");
                    out.push_str(&self.expr(expr)?);
                }
                JoinConstraint::Using(columns) => {
                    out.push_str(" USING (");
                    out.push_str(
                        &columns
                            .iter()
                            .map(|c| self.ident(c, false))
                            .collect::<Vec<_>>()
                            .join(", "),
                    );
                    out.push(')');
                }
                JoinConstraint::None => {}
            }
        }
        Ok(out)
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<String, TranslateError> {
        match factor {
            TableFactor::Table { name, alias } => {
                let mut out = self.object_name(name);
                if let Some(alias) = alias {
                    out.push_str(" AS ");
                    out.push_str(&self.ident(alias, false));
                }
                Ok(out)
            }
            TableFactor::Subquery { query, alias } => {
                let mut out = format!("({})", self.select(query)?);
                if let Some(alias) = alias {
                    out.push_str(" AS ");
                    out.push_str(&self.ident(alias, false));
                }
                Ok(out)
            }
        }
    }

    fn returning(&mut self, items: &[SelectItem]) -> Result<String, TranslateError> {
        if items.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::new();
        for item in items {
            let mut part = self.expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                part.push_str(" AS ");
                part.push_str(&self.ident(alias, false));
            }
            parts.push(part);
        }
        Ok(format!(" RETURNING {}", parts.join(", ")))
    }

    fn insert(&mut self, insert: &InsertStmt) -> Result<String, TranslateError> {
        // INSERT ... ON CONFLICT DO NOTHING lowers to INSERT OR IGNORE
        let or_ignore = self.dialect == Dialect::SQLite
            && matches!(
                &insert.on_conflict,
                Some(OnConflict {
                    action: ConflictAction::DoNothing,
                    ..
                })
            );

        let mut out = String::from(if or_ignore {
            "INSERT OR IGNORE INTO "
        } else {
            "INSERT INTO "
        });
        out.push_str(&self.object_name(&insert.table));

        if !insert.columns.is_empty() {
            out.push_str(" (");
            out.push_str(
                &insert
                    .columns
                    .iter()
                    .map(|c| self.ident(c, false))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            out.push(')');
        }

        match &insert.source {
            InsertSource::Values(rows) => {
                out.push_str(" VALUES ");
                let mut row_sql = Vec::new();
                for row in rows {
                    row_sql.push(format!("({})", self.expr_list(row)?));
                }
                out.push_str(&row_sql.join(", "));
            }
            InsertSource::Select(query) => {
                out.push(' ');
                out.push_str(&self.select(query)?);
            }
            InsertSource::DefaultValues => out.push_str(" DEFAULT VALUES"),
        }

        if let Some(conflict) = &insert.on_conflict {
            if !or_ignore {
                out.push_str(" ON CONFLICT");
                if !conflict.target.is_empty() {
                    out.push_str(" (");
                    out.push_str(
                        &conflict
                            .target
                            .iter()
                            .map(|c| self.ident(c, false))
                            .collect::<Vec<_>>()
                            .join(", "),
                    );
                    out.push(')');
                }
                match &conflict.action {
                    ConflictAction::DoNothing => out.push_str(" DO NOTHING"),
                    ConflictAction::DoUpdate {
                        assignments,
                        where_clause,
                    } => {
                        out.push_str(" DO UPDATE SET ");
                        out.push_str(&self.assignments(assignments)?);
                        if let Some(where_clause) = where_clause {
                            out.push_str(" WHERE ");
                            out.push_str(&self.expr(where_clause)?);
                        }
                    }
                }
            }
        }

        out.push_str(&self.returning(&insert.returning)?);
        Ok(out)
    }

    fn assignments(&mut self, assignments: &[Assignment]) -> Result<String, TranslateError> {
        let mut parts = Vec::new();
        for assignment in assignments {
            parts.push(format!(
                "{} = {}",
                self.ident(&assignment.column, false),
                self.expr(&assignment.value)?
            ));
        }
        Ok(parts.join(", "))
    }

    fn update(&mut self, update: &UpdateStmt) -> Result<String, TranslateError> {
        let mut out = String::from("UPDATE ");
        out.push_str(&self.object_name(&update.table));
        if let Some(alias) = &update.alias {
            out.push_str(" AS ");
            out.push_str(&self.ident(alias, false));
        }
        out.push_str(" SET ");
        out.push_str(&self.assignments(&update.assignments)?);

        if !update.from.is_empty() {
            out.push_str(" FROM ");
            let mut refs = Vec::new();
            for table_ref in &update.from {
                refs.push(self.table_ref(table_ref)?);
            }
            out.push_str(&refs.join(", "));
        }

        if let Some(where_clause) = &update.where_clause {
            out.push_str(" WHERE ");
            out.push_str(&self.expr(where_clause)?);
        }
        out.push_str(&self.returning(&update.returning)?);
        Ok(out)
    }

    fn delete(&mut self, delete: &DeleteStmt) -> Result<String, TranslateError> {
        if self.dialect == Dialect::SQLite && !delete.using.is_empty() {
            return Err(TranslateError::unsupported("DELETE USING", delete.pos));
        }

        let mut out = String::from("DELETE FROM ");
        out.push_str(&self.object_name(&delete.table));
        if let Some(alias) = &delete.alias {
            out.push_str(" AS ");
            out.push_str(&self.ident(alias, false));
        }

        if !delete.using.is_empty() {
            out.push_str(" USING ");
            let mut refs = Vec::new();
            for table_ref in &delete.using {
                refs.push(self.table_ref(table_ref)?);
            }
            out.push_str(&refs.join(", "));
        }

        if let Some(where_clause) = &delete.where_clause {
            out.push_str(" WHERE ");
            out.push_str(&self.expr(where_clause)?);
        }
        out.push_str(&self.returning(&delete.returning)?);
        Ok(out)
    }

    fn create_table(&mut self, create: &CreateTableStmt) -> Result<String, TranslateError> {
        let mut out = String::from("CREATE TABLE ");
        if create.if_not_exists {
            out.push_str("IF NOT EXISTS ");
        }
        out.push_str(&self.object_name(&create.name));
        out.push_str(" (");

        let mut parts = Vec::new();
        for column in &create.columns {
            parts.push(self.column_def(column)?);
        }
        for constraint in &create.constraints {
            parts.push(self.table_constraint(constraint)?);
        }
        out.push_str(&parts.join(", "));
        out.push(')');
        Ok(out)
    }

    fn column_def(&mut self, column: &ColumnDef) -> Result<String, TranslateError> {
        let mut out = format!(
            "{} {}",
            self.ident(&column.name, false),
            self.type_name(&column.ty)
        );
        for constraint in &column.constraints {
            out.push(' ');
            match constraint {
                ColumnConstraint::PrimaryKey => out.push_str("PRIMARY KEY"),
                ColumnConstraint::NotNull => out.push_str("NOT NULL"),
                ColumnConstraint::Null => out.push_str("NULL"),
                ColumnConstraint::Unique => out.push_str("UNIQUE"),
                ColumnConstraint::Default(expr) => {
                    out.push_str("DEFAULT ");
                    self.in_default_expr = true;
                    let result = self.expr(expr);
                    self.in_default_expr = false;
                    out.push_str(&result?);
                }
                ColumnConstraint::References {
                    table,
                    column,
                    on_delete,
                } => {
                    out.push_str("REFERENCES ");
                    out.push_str(&self.object_name(table));
                    if let Some(column) = column {
                        out.push('(');
                        out.push_str(&self.ident(column, false));
                        out.push(')');
                    }
                    if let Some(action) = on_delete {
                        out.push_str(" ON DELETE ");
                        out.push_str(ref_action(*action));
                    }
                }
                ColumnConstraint::Check(expr) => {
                    out.push_str("CHECK (");
                    out.push_str(&self.expr(expr)?);
                    out.push(')');
                }
            }
        }
        Ok(out)
    }

    fn name_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.ident(n, false))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn table_constraint(&mut self, constraint: &TableConstraint) -> Result<String, TranslateError> {
        match constraint {
            TableConstraint::PrimaryKey(columns) => {
                Ok(format!("PRIMARY KEY ({})", self.name_list(columns)))
            }
            TableConstraint::Unique(columns) => {
                Ok(format!("UNIQUE ({})", self.name_list(columns)))
            }
            TableConstraint::ForeignKey {
                columns,
                ref_table,
                ref_columns,
                on_delete,
            } => {
                let mut out = format!(
                    "FOREIGN KEY ({}) REFERENCES {}",
                    self.name_list(columns),
                    self.object_name(ref_table)
                );
                if !ref_columns.is_empty() {
                    out.push_str(&format!(" ({})", self.name_list(ref_columns)));
                }
                if let Some(action) = on_delete {
                    out.push_str(" ON DELETE ");
                    out.push_str(ref_action(*action));
                }
                Ok(out)
            }
            TableConstraint::Check(expr) => Ok(format!("CHECK ({})", self.expr(expr)?)),
        }
    }

    fn create_function(&mut self, create: &CreateFunctionStmt) -> Result<String, TranslateError> {
        if self.dialect == Dialect::SQLite {
            // functions live in _rpc_functions metadata, never in the engine
            return Err(TranslateError::unrepresentable(
                "CREATE FUNCTION has no SQLite form; store it as function metadata",
                create.pos,
            ));
        }

        let mut out = String::from("CREATE ");
        if create.or_replace {
            out.push_str("OR REPLACE ");
        }
        out.push_str("FUNCTION ");
        out.push_str(&self.object_name(&create.name));
        out.push('(');
        let mut args = Vec::new();
        for arg in &create.args {
            let mut part = String::new();
            match arg.mode {
                ArgMode::In => {}
                ArgMode::Out => part.push_str("OUT "),
                ArgMode::InOut => part.push_str("INOUT "),
            }
            if let Some(name) = &arg.name {
                part.push_str(&self.ident(name, false));
                part.push(' ');
            }
            part.push_str(&self.type_name(&arg.ty));
            if let Some(default) = &arg.default {
                part.push_str(" DEFAULT ");
                part.push_str(&self.expr(default)?);
            }
            args.push(part);
        }
        out.push_str(&args.join(", "));
        out.push_str(") RETURNS ");

        match &create.returns {
            ReturnType::Scalar(ty) => out.push_str(&self.type_name(ty)),
            ReturnType::SetOf(ty) => {
                out.push_str("SETOF ");
                out.push_str(&self.type_name(ty));
            }
            ReturnType::Table(columns) => {
                out.push_str("TABLE(");
                let columns = columns
                    .iter()
                    .map(|(name, ty)| format!("{} {}", self.ident(name, false), self.type_name(ty)))
                    .collect::<Vec<_>>();
                out.push_str(&columns.join(", "));
                out.push(')');
            }
        }

        out.push_str(" LANGUAGE ");
        out.push_str(&create.language);
        out.push(' ');
        out.push_str(create.volatility.as_str());
        out.push_str(" SECURITY ");
        out.push_str(create.security.as_str());
        out.push_str(" AS ");
        out.push_str(&self.literal(&Literal::DollarString(create.body.clone())));
        Ok(out)
    }

    fn create_index(&mut self, create: &CreateIndexStmt) -> Result<String, TranslateError> {
        let mut out = String::from("CREATE ");
        if create.unique {
            out.push_str("UNIQUE ");
        }
        out.push_str("INDEX ");
        if create.if_not_exists {
            out.push_str("IF NOT EXISTS ");
        }
        out.push_str(&self.ident(&create.name, false));
        out.push_str(" ON ");
        out.push_str(&self.object_name(&create.table));
        out.push_str(" (");
        out.push_str(
            &create
                .columns
                .iter()
                .map(|c| self.ident(c, false))
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push(')');
        Ok(out)
    }

    fn drop_stmt(&mut self, drop: &DropStmt) -> Result<String, TranslateError> {
        if self.dialect == Dialect::SQLite && drop.kind == ObjectKind::Function {
            return Err(TranslateError::unrepresentable(
                "DROP FUNCTION has no SQLite form; remove the function metadata",
                drop.pos,
            ));
        }
        let mut out = format!("DROP {} ", drop.kind.as_str());
        if drop.if_exists {
            out.push_str("IF EXISTS ");
        }
        out.push_str(&self.object_name(&drop.name));
        Ok(out)
    }
}

fn ref_action(action: RefAction) -> &'static str {
    match action {
        RefAction::Cascade => "CASCADE",
        RefAction::Restrict => "RESTRICT",
        RefAction::SetNull => "SET NULL",
        RefAction::SetDefault => "SET DEFAULT",
        RefAction::NoAction => "NO ACTION",
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn needs_quoting(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    if Keyword::parse(name).is_some() {
        return true;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return true;
    }
    !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
