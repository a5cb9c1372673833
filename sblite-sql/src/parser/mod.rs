//! Recursive-descent statement parser with a Pratt expression core.

mod expr;
mod stmt;

use crate::ast::{Expr, Stmt};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Keyword, Pos, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    pub fn new(sql: &str) -> Parser {
        Parser {
            tokens: Lexer::tokenize(sql),
            idx: 0,
        }
    }

    /// Parse a single statement; trailing semicolons are consumed, trailing
    /// garbage is an error.
    pub fn parse_statement(sql: &str) -> Result<Stmt, ParseError> {
        let mut parser = Parser::new(sql);
        let stmt = parser.statement()?;
        parser.eat(TokenKind::Semicolon);
        parser.expect(TokenKind::Eof)?;
        Ok(stmt)
    }

    /// Parse a semicolon-separated batch.
    pub fn parse_statements(sql: &str) -> Result<Vec<Stmt>, ParseError> {
        let mut parser = Parser::new(sql);
        let mut statements = Vec::new();
        loop {
            while parser.eat(TokenKind::Semicolon) {}
            if parser.peek_kind() == TokenKind::Eof {
                break;
            }
            statements.push(parser.statement()?);
        }
        Ok(statements)
    }

    /// Parse a standalone expression, e.g. an RLS predicate.
    pub fn parse_expression(sql: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(sql);
        let expr = parser.expr()?;
        parser.expect(TokenKind::Eof)?;
        Ok(expr)
    }

    /// Top-level dispatch on the first keyword. `WITH` routes to SELECT.
    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::SELECT) | TokenKind::Keyword(Keyword::WITH) => {
                Ok(Stmt::Select(self.select_stmt()?))
            }
            TokenKind::Keyword(Keyword::INSERT) => Ok(Stmt::Insert(self.insert_stmt()?)),
            TokenKind::Keyword(Keyword::UPDATE) => Ok(Stmt::Update(self.update_stmt()?)),
            TokenKind::Keyword(Keyword::DELETE) => Ok(Stmt::Delete(self.delete_stmt()?)),
            TokenKind::Keyword(Keyword::CREATE) => self.create_stmt(),
            TokenKind::Keyword(Keyword::DROP) => Ok(Stmt::Drop(self.drop_stmt()?)),
            _ => Err(self.unexpected("statement keyword")),
        }
    }

    // -- token cursor -----------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.idx + n).min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn pos(&self) -> Pos {
        self.peek().pos
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        token
    }

    /// Consume the next token if it matches, returning whether it did.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenKind::Keyword(keyword))
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.class()))
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, ParseError> {
        self.expect(TokenKind::Keyword(keyword))
    }

    /// Accept a bare or quoted identifier, or a non-reserved keyword used as
    /// a name.
    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind() {
            TokenKind::Ident | TokenKind::QuotedIdent => Ok(self.advance().text),
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Possibly-qualified object name (`schema.table`), joined with dots.
    pub(crate) fn expect_object_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_identifier()?;
        while self.eat(TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        let message = if token.kind == TokenKind::Error {
            token.text.clone()
        } else {
            format!("unexpected {}", token.kind.class())
        };
        ParseError::new(message, expected, token.kind.class(), token.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_first_keyword() {
        assert!(matches!(
            Parser::parse_statement("SELECT 1").unwrap(),
            Stmt::Select(_)
        ));
        assert!(matches!(
            Parser::parse_statement("WITH t AS (SELECT 1) SELECT * FROM t").unwrap(),
            Stmt::Select(_)
        ));
        assert!(matches!(
            Parser::parse_statement("INSERT INTO t VALUES (1)").unwrap(),
            Stmt::Insert(_)
        ));
        assert!(matches!(
            Parser::parse_statement("UPDATE t SET a = 1").unwrap(),
            Stmt::Update(_)
        ));
        assert!(matches!(
            Parser::parse_statement("DELETE FROM t").unwrap(),
            Stmt::Delete(_)
        ));
        assert!(matches!(
            Parser::parse_statement("DROP TABLE t").unwrap(),
            Stmt::Drop(_)
        ));
    }

    #[test]
    fn rejects_unknown_statement() {
        let err = Parser::parse_statement("VACUUM").unwrap_err();
        assert_eq!(err.expected, "statement keyword");
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = Parser::parse_statement("SELECT 1 SELECT 2");
        assert!(err.is_err());
    }

    #[test]
    fn parses_statement_batches() {
        let statements = Parser::parse_statements("SELECT 1; SELECT 2;").unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn parse_error_carries_position() {
        let err = Parser::parse_statement("SELECT FROM WHERE").unwrap_err();
        assert_eq!(err.position.line, 1);
    }
}
