//! Statement-level recursive descent.

use super::Parser;
use crate::ast::*;
use crate::error::ParseError;
use crate::token::{Keyword, TokenKind};

/// Keywords that terminate an implicit column alias; `SELECT a b` aliases,
/// `SELECT a FROM ...` does not.
fn terminates_implicit_alias(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::FROM
            | Keyword::WHERE
            | Keyword::GROUP
            | Keyword::HAVING
            | Keyword::ORDER
            | Keyword::LIMIT
            | Keyword::OFFSET
            | Keyword::UNION
            | Keyword::INTERSECT
            | Keyword::EXCEPT
            | Keyword::JOIN
            | Keyword::LEFT
            | Keyword::RIGHT
            | Keyword::INNER
            | Keyword::OUTER
            | Keyword::FULL
            | Keyword::CROSS
            | Keyword::ON
    )
}

impl Parser {
    pub(crate) fn select_stmt(&mut self) -> Result<SelectStmt, ParseError> {
        let pos = self.pos();
        let with = if self.peek_kind() == TokenKind::Keyword(Keyword::WITH) {
            Some(self.with_clause()?)
        } else {
            None
        };

        self.expect_keyword(Keyword::SELECT)?;
        let mut select = SelectStmt::new(pos);
        select.with = with;

        if self.eat_keyword(Keyword::DISTINCT) {
            select.distinct = true;
        } else {
            self.eat_keyword(Keyword::ALL);
        }

        select.columns.push(self.select_item()?);
        while self.eat(TokenKind::Comma) {
            select.columns.push(self.select_item()?);
        }

        if self.eat_keyword(Keyword::FROM) {
            select.from.push(self.table_ref()?);
            while self.eat(TokenKind::Comma) {
                select.from.push(self.table_ref()?);
            }
        }

        if self.eat_keyword(Keyword::WHERE) {
            select.where_clause = Some(self.expr()?);
        }

        if self.eat_keyword(Keyword::GROUP) {
            self.expect_keyword(Keyword::BY)?;
            select.group_by.push(self.expr()?);
            while self.eat(TokenKind::Comma) {
                select.group_by.push(self.expr()?);
            }
        }

        if self.eat_keyword(Keyword::HAVING) {
            select.having = Some(self.expr()?);
        }

        if self.eat_keyword(Keyword::ORDER) {
            self.expect_keyword(Keyword::BY)?;
            select.order_by = self.order_by_list()?;
        }

        if self.eat_keyword(Keyword::LIMIT) {
            if !self.eat_keyword(Keyword::ALL) {
                select.limit = Some(self.expr()?);
            }
        }

        if self.eat_keyword(Keyword::OFFSET) {
            select.offset = Some(self.expr()?);
        }

        select.set_op = self.set_op_tail()?;
        Ok(select)
    }

    fn set_op_tail(&mut self) -> Result<Option<SetOp>, ParseError> {
        let kind = match self.peek_kind() {
            TokenKind::Keyword(Keyword::UNION) => {
                self.advance();
                if self.eat_keyword(Keyword::ALL) {
                    SetOpKind::UnionAll
                } else {
                    SetOpKind::Union
                }
            }
            TokenKind::Keyword(Keyword::INTERSECT) => {
                self.advance();
                SetOpKind::Intersect
            }
            TokenKind::Keyword(Keyword::EXCEPT) => {
                self.advance();
                SetOpKind::Except
            }
            _ => return Ok(None),
        };
        let right = self.select_stmt()?;
        Ok(Some(SetOp {
            kind,
            right: Box::new(right),
        }))
    }

    fn with_clause(&mut self) -> Result<WithClause, ParseError> {
        self.expect_keyword(Keyword::WITH)?;
        let recursive = self.eat_keyword(Keyword::RECURSIVE);
        let mut ctes = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let mut columns = Vec::new();
            if self.eat(TokenKind::LParen) {
                columns.push(self.expect_identifier()?);
                while self.eat(TokenKind::Comma) {
                    columns.push(self.expect_identifier()?);
                }
                self.expect(TokenKind::RParen)?;
            }
            self.expect_keyword(Keyword::AS)?;
            self.expect(TokenKind::LParen)?;
            let query = self.select_stmt()?;
            self.expect(TokenKind::RParen)?;
            ctes.push(Cte {
                name,
                columns,
                query: Box::new(query),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(WithClause { recursive, ctes })
    }

    fn select_item(&mut self) -> Result<SelectItem, ParseError> {
        let expr = self.expr()?;
        let alias = if self.eat_keyword(Keyword::AS) {
            Some(self.expect_identifier()?)
        } else {
            match self.peek_kind() {
                TokenKind::Ident | TokenKind::QuotedIdent => Some(self.advance().text),
                TokenKind::Keyword(k) if !terminates_implicit_alias(k) => Some(self.advance().text),
                _ => None,
            }
        };
        Ok(SelectItem { expr, alias })
    }

    fn table_ref(&mut self) -> Result<TableRef, ParseError> {
        let relation = self.table_factor()?;
        let mut joins = Vec::new();
        loop {
            let kind = match self.peek_kind() {
                TokenKind::Keyword(Keyword::JOIN) => {
                    self.advance();
                    JoinKind::Inner
                }
                TokenKind::Keyword(Keyword::INNER) => {
                    self.advance();
                    self.expect_keyword(Keyword::JOIN)?;
                    JoinKind::Inner
                }
                TokenKind::Keyword(Keyword::LEFT) => {
                    self.advance();
                    self.eat_keyword(Keyword::OUTER);
                    self.expect_keyword(Keyword::JOIN)?;
                    JoinKind::Left
                }
                TokenKind::Keyword(Keyword::RIGHT) => {
                    self.advance();
                    self.eat_keyword(Keyword::OUTER);
                    self.expect_keyword(Keyword::JOIN)?;
                    JoinKind::Right
                }
                TokenKind::Keyword(Keyword::FULL) => {
                    self.advance();
                    self.eat_keyword(Keyword::OUTER);
                    self.expect_keyword(Keyword::JOIN)?;
                    JoinKind::Full
                }
                TokenKind::Keyword(Keyword::CROSS) => {
                    self.advance();
                    self.expect_keyword(Keyword::JOIN)?;
                    JoinKind::Cross
                }
                _ => break,
            };

            let relation = self.table_factor()?;
            let constraint = if kind == JoinKind::Cross {
                JoinConstraint::None
            } else if self.eat_keyword(Keyword::ON) {
                JoinConstraint::On(self.expr()?)
            } else if self.eat_keyword(Keyword::USING) {
                self.expect(TokenKind::LParen)?;
                let mut columns = vec![self.expect_identifier()?];
                while self.eat(TokenKind::Comma) {
                    columns.push(self.expect_identifier()?);
                }
                self.expect(TokenKind::RParen)?;
                JoinConstraint::Using(columns)
            } else {
                return Err(self.unexpected("ON or USING"));
            };

            joins.push(Join {
                kind,
                relation,
                constraint,
            });
        }
        Ok(TableRef { relation, joins })
    }

    fn table_factor(&mut self) -> Result<TableFactor, ParseError> {
        if self.eat(TokenKind::LParen) {
            let query = self.select_stmt()?;
            self.expect(TokenKind::RParen)?;
            let alias = self.table_alias()?;
            return Ok(TableFactor::Subquery {
                query: Box::new(query),
                alias,
            });
        }
        let name = self.expect_object_name()?;
        let alias = self.table_alias()?;
        Ok(TableFactor::Table { name, alias })
    }

    fn table_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat_keyword(Keyword::AS) {
            return Ok(Some(self.expect_identifier()?));
        }
        match self.peek_kind() {
            TokenKind::Ident | TokenKind::QuotedIdent => Ok(Some(self.advance().text)),
            _ => Ok(None),
        }
    }

    fn returning_clause(&mut self) -> Result<Vec<SelectItem>, ParseError> {
        if !self.eat_keyword(Keyword::RETURNING) {
            return Ok(Vec::new());
        }
        let mut items = vec![self.select_item()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.select_item()?);
        }
        Ok(items)
    }

    pub(crate) fn insert_stmt(&mut self) -> Result<InsertStmt, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::INSERT)?;
        self.expect_keyword(Keyword::INTO)?;
        let table = self.expect_object_name()?;

        let mut columns = Vec::new();
        if self.peek_kind() == TokenKind::LParen {
            self.advance();
            columns.push(self.expect_identifier()?);
            while self.eat(TokenKind::Comma) {
                columns.push(self.expect_identifier()?);
            }
            self.expect(TokenKind::RParen)?;
        }

        let source = match self.peek_kind() {
            TokenKind::Keyword(Keyword::VALUES) => {
                self.advance();
                let mut rows = Vec::new();
                loop {
                    self.expect(TokenKind::LParen)?;
                    let mut row = vec![self.expr()?];
                    while self.eat(TokenKind::Comma) {
                        row.push(self.expr()?);
                    }
                    self.expect(TokenKind::RParen)?;
                    rows.push(row);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                InsertSource::Values(rows)
            }
            TokenKind::Keyword(Keyword::SELECT) | TokenKind::Keyword(Keyword::WITH) => {
                InsertSource::Select(Box::new(self.select_stmt()?))
            }
            TokenKind::Keyword(Keyword::DEFAULT) => {
                self.advance();
                self.expect_keyword(Keyword::VALUES)?;
                InsertSource::DefaultValues
            }
            _ => return Err(self.unexpected("VALUES, SELECT or DEFAULT VALUES")),
        };

        let on_conflict = if self.eat_keyword(Keyword::ON) {
            self.expect_keyword(Keyword::CONFLICT)?;
            let mut target = Vec::new();
            if self.peek_kind() == TokenKind::LParen {
                self.advance();
                target.push(self.expect_identifier()?);
                while self.eat(TokenKind::Comma) {
                    target.push(self.expect_identifier()?);
                }
                self.expect(TokenKind::RParen)?;
            }
            self.expect_keyword(Keyword::DO)?;
            let action = if self.eat_keyword(Keyword::NOTHING) {
                ConflictAction::DoNothing
            } else {
                self.expect_keyword(Keyword::UPDATE)?;
                self.expect_keyword(Keyword::SET)?;
                let assignments = self.assignments()?;
                let where_clause = if self.eat_keyword(Keyword::WHERE) {
                    Some(self.expr()?)
                } else {
                    None
                };
                ConflictAction::DoUpdate {
                    assignments,
                    where_clause,
                }
            };
            Some(OnConflict { target, action })
        } else {
            None
        };

        let returning = self.returning_clause()?;
        Ok(InsertStmt {
            table,
            columns,
            source,
            on_conflict,
            returning,
            pos,
        })
    }

    fn assignments(&mut self) -> Result<Vec<Assignment>, ParseError> {
        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            self.expect(TokenKind::Eq)?;
            let value = self.expr()?;
            assignments.push(Assignment { column, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(assignments)
    }

    pub(crate) fn update_stmt(&mut self) -> Result<UpdateStmt, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::UPDATE)?;
        let table = self.expect_object_name()?;
        let alias = if self.eat_keyword(Keyword::AS) {
            Some(self.expect_identifier()?)
        } else if matches!(self.peek_kind(), TokenKind::Ident | TokenKind::QuotedIdent) {
            Some(self.advance().text)
        } else {
            None
        };
        self.expect_keyword(Keyword::SET)?;
        let assignments = self.assignments()?;

        let mut from = Vec::new();
        if self.eat_keyword(Keyword::FROM) {
            from.push(self.table_ref()?);
            while self.eat(TokenKind::Comma) {
                from.push(self.table_ref()?);
            }
        }

        let where_clause = if self.eat_keyword(Keyword::WHERE) {
            Some(self.expr()?)
        } else {
            None
        };
        let returning = self.returning_clause()?;

        Ok(UpdateStmt {
            table,
            alias,
            assignments,
            from,
            where_clause,
            returning,
            pos,
        })
    }

    pub(crate) fn delete_stmt(&mut self) -> Result<DeleteStmt, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::DELETE)?;
        self.expect_keyword(Keyword::FROM)?;
        let table = self.expect_object_name()?;
        let alias = if self.eat_keyword(Keyword::AS) {
            Some(self.expect_identifier()?)
        } else if matches!(self.peek_kind(), TokenKind::Ident | TokenKind::QuotedIdent) {
            Some(self.advance().text)
        } else {
            None
        };

        let mut using = Vec::new();
        if self.eat_keyword(Keyword::USING) {
            using.push(self.table_ref()?);
            while self.eat(TokenKind::Comma) {
                using.push(self.table_ref()?);
            }
        }

        let where_clause = if self.eat_keyword(Keyword::WHERE) {
            Some(self.expr()?)
        } else {
            None
        };
        let returning = self.returning_clause()?;

        Ok(DeleteStmt {
            table,
            alias,
            using,
            where_clause,
            returning,
            pos,
        })
    }

    pub(crate) fn create_stmt(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::CREATE)?;

        let or_replace = if self.eat_keyword(Keyword::OR) {
            self.expect_keyword(Keyword::REPLACE)?;
            true
        } else {
            false
        };

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::TABLE) if !or_replace => {
                Ok(Stmt::CreateTable(self.create_table_tail(pos)?))
            }
            TokenKind::Keyword(Keyword::FUNCTION) => {
                Ok(Stmt::CreateFunction(self.create_function_tail(or_replace, pos)?))
            }
            TokenKind::Keyword(Keyword::UNIQUE) | TokenKind::Keyword(Keyword::INDEX)
                if !or_replace =>
            {
                Ok(Stmt::CreateIndex(self.create_index_tail(pos)?))
            }
            _ => Err(self.unexpected("TABLE, FUNCTION or INDEX")),
        }
    }

    fn create_table_tail(&mut self, pos: crate::token::Pos) -> Result<CreateTableStmt, ParseError> {
        self.expect_keyword(Keyword::TABLE)?;
        let if_not_exists = if self.eat_keyword(Keyword::IF) {
            self.expect_keyword(Keyword::NOT)?;
            self.expect_keyword(Keyword::EXISTS)?;
            true
        } else {
            false
        };
        let name = self.expect_object_name()?;
        self.expect(TokenKind::LParen)?;

        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Keyword(Keyword::PRIMARY)
                | TokenKind::Keyword(Keyword::UNIQUE)
                | TokenKind::Keyword(Keyword::FOREIGN)
                | TokenKind::Keyword(Keyword::CHECK)
                | TokenKind::Keyword(Keyword::CONSTRAINT) => {
                    constraints.push(self.table_constraint()?);
                }
                _ => columns.push(self.column_def()?),
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(CreateTableStmt {
            if_not_exists,
            name,
            columns,
            constraints,
            pos,
        })
    }

    fn column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let pos = self.pos();
        let name = self.expect_identifier()?;
        let ty = self.type_name()?;
        let mut constraints = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Keyword(Keyword::PRIMARY) => {
                    self.advance();
                    self.expect_keyword(Keyword::KEY)?;
                    constraints.push(ColumnConstraint::PrimaryKey);
                }
                TokenKind::Keyword(Keyword::NOT) => {
                    self.advance();
                    self.expect_keyword(Keyword::NULL)?;
                    constraints.push(ColumnConstraint::NotNull);
                }
                TokenKind::Keyword(Keyword::NULL) => {
                    self.advance();
                    constraints.push(ColumnConstraint::Null);
                }
                TokenKind::Keyword(Keyword::UNIQUE) => {
                    self.advance();
                    constraints.push(ColumnConstraint::Unique);
                }
                TokenKind::Keyword(Keyword::DEFAULT) => {
                    self.advance();
                    constraints.push(ColumnConstraint::Default(self.expr()?));
                }
                TokenKind::Keyword(Keyword::REFERENCES) => {
                    self.advance();
                    let table = self.expect_object_name()?;
                    let column = if self.eat(TokenKind::LParen) {
                        let column = self.expect_identifier()?;
                        self.expect(TokenKind::RParen)?;
                        Some(column)
                    } else {
                        None
                    };
                    let on_delete = self.on_delete_action()?;
                    constraints.push(ColumnConstraint::References {
                        table,
                        column,
                        on_delete,
                    });
                }
                TokenKind::Keyword(Keyword::CHECK) => {
                    self.advance();
                    self.expect(TokenKind::LParen)?;
                    let expr = self.expr()?;
                    self.expect(TokenKind::RParen)?;
                    constraints.push(ColumnConstraint::Check(expr));
                }
                _ => break,
            }
        }
        Ok(ColumnDef {
            name,
            ty,
            constraints,
            pos,
        })
    }

    fn on_delete_action(&mut self) -> Result<Option<RefAction>, ParseError> {
        if self.peek_kind() != TokenKind::Keyword(Keyword::ON)
            || self.peek_at(1).kind != TokenKind::Keyword(Keyword::DELETE)
        {
            return Ok(None);
        }
        self.advance();
        self.advance();
        let action = if self.eat_keyword(Keyword::CASCADE) {
            RefAction::Cascade
        } else if self.eat_keyword(Keyword::RESTRICT) {
            RefAction::Restrict
        } else if self.eat_keyword(Keyword::SET) {
            if self.eat_keyword(Keyword::NULL) {
                RefAction::SetNull
            } else {
                self.expect_keyword(Keyword::DEFAULT)?;
                RefAction::SetDefault
            }
        } else {
            // NO ACTION lexes as two identifiers
            let no = self.expect_identifier()?;
            let action = self.expect_identifier()?;
            if !no.eq_ignore_ascii_case("no") || !action.eq_ignore_ascii_case("action") {
                return Err(self.unexpected("CASCADE, RESTRICT, SET NULL or NO ACTION"));
            }
            RefAction::NoAction
        };
        Ok(Some(action))
    }

    fn table_constraint(&mut self) -> Result<TableConstraint, ParseError> {
        // constraint names are accepted and dropped
        if self.eat_keyword(Keyword::CONSTRAINT) {
            self.expect_identifier()?;
        }
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::PRIMARY) => {
                self.advance();
                self.expect_keyword(Keyword::KEY)?;
                Ok(TableConstraint::PrimaryKey(self.paren_name_list()?))
            }
            TokenKind::Keyword(Keyword::UNIQUE) => {
                self.advance();
                Ok(TableConstraint::Unique(self.paren_name_list()?))
            }
            TokenKind::Keyword(Keyword::FOREIGN) => {
                self.advance();
                self.expect_keyword(Keyword::KEY)?;
                let columns = self.paren_name_list()?;
                self.expect_keyword(Keyword::REFERENCES)?;
                let ref_table = self.expect_object_name()?;
                let ref_columns = if self.peek_kind() == TokenKind::LParen {
                    self.paren_name_list()?
                } else {
                    Vec::new()
                };
                let on_delete = self.on_delete_action()?;
                Ok(TableConstraint::ForeignKey {
                    columns,
                    ref_table,
                    ref_columns,
                    on_delete,
                })
            }
            TokenKind::Keyword(Keyword::CHECK) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let expr = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(TableConstraint::Check(expr))
            }
            _ => Err(self.unexpected("table constraint")),
        }
    }

    fn paren_name_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut names = vec![self.expect_identifier()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(names)
    }

    fn create_function_tail(
        &mut self,
        or_replace: bool,
        pos: crate::token::Pos,
    ) -> Result<CreateFunctionStmt, ParseError> {
        self.expect_keyword(Keyword::FUNCTION)?;
        let name = self.expect_object_name()?;

        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                args.push(self.function_arg()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect_keyword(Keyword::RETURNS)?;
        let returns = if self.eat_keyword(Keyword::TABLE) {
            self.expect(TokenKind::LParen)?;
            let mut columns = Vec::new();
            loop {
                let column = self.expect_identifier()?;
                let ty = self.type_name()?;
                columns.push((column, ty));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            ReturnType::Table(columns)
        } else if self.eat_keyword(Keyword::SETOF) {
            ReturnType::SetOf(self.type_name()?)
        } else {
            ReturnType::Scalar(self.type_name()?)
        };

        // LANGUAGE / volatility / SECURITY / AS may come in any order
        let mut language = String::from("sql");
        let mut volatility = Volatility::Volatile;
        let mut security = Security::Invoker;
        let mut body = None;
        loop {
            match self.peek_kind() {
                TokenKind::Keyword(Keyword::LANGUAGE) => {
                    self.advance();
                    language = self.expect_identifier()?.to_lowercase();
                }
                TokenKind::Keyword(Keyword::IMMUTABLE) => {
                    self.advance();
                    volatility = Volatility::Immutable;
                }
                TokenKind::Keyword(Keyword::STABLE) => {
                    self.advance();
                    volatility = Volatility::Stable;
                }
                TokenKind::Keyword(Keyword::VOLATILE) => {
                    self.advance();
                    volatility = Volatility::Volatile;
                }
                TokenKind::Keyword(Keyword::SECURITY) => {
                    self.advance();
                    security = if self.eat_keyword(Keyword::DEFINER) {
                        Security::Definer
                    } else {
                        self.expect_keyword(Keyword::INVOKER)?;
                        Security::Invoker
                    };
                }
                TokenKind::Keyword(Keyword::AS) => {
                    self.advance();
                    body = match self.peek_kind() {
                        TokenKind::DollarString | TokenKind::String => Some(self.advance().text),
                        _ => return Err(self.unexpected("function body")),
                    };
                }
                _ => break,
            }
        }

        let body = body.ok_or_else(|| self.unexpected("AS $$...$$ function body"))?;
        Ok(CreateFunctionStmt {
            or_replace,
            name,
            args,
            returns,
            language,
            volatility,
            security,
            body,
            pos,
        })
    }

    fn function_arg(&mut self) -> Result<FunctionArg, ParseError> {
        let mut mode = ArgMode::In;
        if self.eat_keyword(Keyword::IN) {
            mode = ArgMode::In;
        } else if self.peek_kind() == TokenKind::Ident {
            let text = self.peek().text.to_uppercase();
            if (text == "OUT" || text == "INOUT") && self.arg_has_more_words() {
                self.advance();
                mode = if text == "OUT" { ArgMode::Out } else { ArgMode::InOut };
            }
        }

        // `name type` vs bare `type`: two name-ish tokens in a row means the
        // first is the argument name
        let name = if self.arg_has_more_words() {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let ty = self.type_name()?;

        let default = if self.eat_keyword(Keyword::DEFAULT) || self.eat(TokenKind::Eq) {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(FunctionArg {
            name,
            ty,
            mode,
            default,
        })
    }

    /// True when the token after the next one still belongs to this argument
    /// (i.e. the next token is a name, not the start of the type).
    fn arg_has_more_words(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident | TokenKind::QuotedIdent)
            && matches!(
                self.peek_at(1).kind,
                TokenKind::Ident | TokenKind::QuotedIdent | TokenKind::Keyword(_)
            )
    }

    fn create_index_tail(&mut self, pos: crate::token::Pos) -> Result<CreateIndexStmt, ParseError> {
        let unique = self.eat_keyword(Keyword::UNIQUE);
        self.expect_keyword(Keyword::INDEX)?;
        let if_not_exists = if self.eat_keyword(Keyword::IF) {
            self.expect_keyword(Keyword::NOT)?;
            self.expect_keyword(Keyword::EXISTS)?;
            true
        } else {
            false
        };
        let name = self.expect_identifier()?;
        self.expect_keyword(Keyword::ON)?;
        let table = self.expect_object_name()?;
        let columns = self.paren_name_list()?;
        Ok(CreateIndexStmt {
            unique,
            if_not_exists,
            name,
            table,
            columns,
            pos,
        })
    }

    pub(crate) fn drop_stmt(&mut self) -> Result<DropStmt, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::DROP)?;
        let kind = if self.eat_keyword(Keyword::TABLE) {
            ObjectKind::Table
        } else if self.eat_keyword(Keyword::FUNCTION) {
            ObjectKind::Function
        } else if self.eat_keyword(Keyword::INDEX) {
            ObjectKind::Index
        } else {
            return Err(self.unexpected("TABLE, FUNCTION or INDEX"));
        };
        let if_exists = if self.eat_keyword(Keyword::IF) {
            self.expect_keyword(Keyword::EXISTS)?;
            true
        } else {
            false
        };
        let name = self.expect_object_name()?;
        // DROP FUNCTION may carry an argument signature; accepted and ignored
        if kind == ObjectKind::Function && self.eat(TokenKind::LParen) {
            let mut depth = 1;
            while depth > 0 {
                match self.peek_kind() {
                    TokenKind::LParen => {
                        self.advance();
                        depth += 1;
                    }
                    TokenKind::RParen => {
                        self.advance();
                        depth -= 1;
                    }
                    TokenKind::Eof => return Err(self.unexpected(")")),
                    _ => {
                        self.advance();
                    }
                }
            }
        }
        self.eat_keyword(Keyword::CASCADE);
        Ok(DropStmt {
            kind,
            if_exists,
            name,
            pos,
        })
    }
}
