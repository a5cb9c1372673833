//! Pratt expression parsing. Binding powers follow the PostgreSQL surface
//! grammar; `::` binds tighter than any binary operator, JSON access and
//! subscripting tighter still.

use super::Parser;
use crate::ast::{
    BinaryOp, Expr, InSet, IsTest, Literal, OrderByItem, TypeName, UnaryOp,
};
use crate::error::ParseError;
use crate::token::{Keyword, TokenKind};

const BP_OR: u8 = 1;
const BP_AND: u8 = 2;
const BP_NOT: u8 = 3;
const BP_IS: u8 = 4;
const BP_CMP: u8 = 5;
const BP_BETWEEN: u8 = 6;
const BP_IN: u8 = 7;
const BP_LIKE: u8 = 8;
const BP_ADD: u8 = 9;
const BP_MUL: u8 = 10;
const BP_POW: u8 = 11;
const BP_UNARY: u8 = 12;
const BP_CAST: u8 = 13;
const BP_JSON: u8 = 14;
const BP_POSTFIX: u8 = 15;

impl Parser {
    pub(crate) fn expr(&mut self) -> Result<Expr, ParseError> {
        self.expr_bp(0)
    }

    fn expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.prefix()?;
        loop {
            let bp = match self.infix_binding_power() {
                Some(bp) if bp > min_bp => bp,
                _ => break,
            };
            lhs = self.infix(lhs, bp)?;
        }
        Ok(lhs)
    }

    fn infix_binding_power(&self) -> Option<u8> {
        let bp = match self.peek_kind() {
            TokenKind::Keyword(Keyword::OR) => BP_OR,
            TokenKind::Keyword(Keyword::AND) => BP_AND,
            TokenKind::Keyword(Keyword::IS) => BP_IS,
            TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::Tilde
            | TokenKind::TildeStar
            | TokenKind::NotTilde
            | TokenKind::NotTildeStar => BP_CMP,
            TokenKind::Keyword(Keyword::BETWEEN) => BP_BETWEEN,
            TokenKind::Keyword(Keyword::IN) => BP_IN,
            TokenKind::Keyword(Keyword::LIKE) | TokenKind::Keyword(Keyword::ILIKE) => BP_LIKE,
            TokenKind::Keyword(Keyword::NOT) => match self.peek_at(1).kind {
                TokenKind::Keyword(Keyword::BETWEEN) => BP_BETWEEN,
                TokenKind::Keyword(Keyword::IN) => BP_IN,
                TokenKind::Keyword(Keyword::LIKE) | TokenKind::Keyword(Keyword::ILIKE) => BP_LIKE,
                _ => return None,
            },
            TokenKind::Plus | TokenKind::Minus | TokenKind::Concat => BP_ADD,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => BP_MUL,
            TokenKind::Caret => BP_POW,
            TokenKind::DoubleColon => BP_CAST,
            TokenKind::Arrow | TokenKind::LongArrow => BP_JSON,
            TokenKind::LBracket => BP_POSTFIX,
            _ => return None,
        };
        Some(bp)
    }

    fn infix(&mut self, lhs: Expr, bp: u8) -> Result<Expr, ParseError> {
        let pos = lhs.pos();
        // NOT BETWEEN / NOT IN / NOT LIKE / NOT ILIKE
        let negated = self.peek_kind() == TokenKind::Keyword(Keyword::NOT);
        if negated {
            self.advance();
        }

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::BETWEEN) => {
                self.advance();
                let low = self.expr_bp(BP_BETWEEN)?;
                self.expect_keyword(Keyword::AND)?;
                let high = self.expr_bp(BP_BETWEEN)?;
                Ok(Expr::Between {
                    expr: Box::new(lhs),
                    negated,
                    low: Box::new(low),
                    high: Box::new(high),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::IN) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let set = if matches!(
                    self.peek_kind(),
                    TokenKind::Keyword(Keyword::SELECT) | TokenKind::Keyword(Keyword::WITH)
                ) {
                    InSet::Subquery(Box::new(self.select_stmt()?))
                } else {
                    let mut list = vec![self.expr()?];
                    while self.eat(TokenKind::Comma) {
                        list.push(self.expr()?);
                    }
                    InSet::List(list)
                };
                self.expect(TokenKind::RParen)?;
                Ok(Expr::In {
                    expr: Box::new(lhs),
                    negated,
                    set,
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::LIKE) | TokenKind::Keyword(Keyword::ILIKE) => {
                let case_insensitive = self.advance().is_keyword(Keyword::ILIKE);
                let op = match (case_insensitive, negated) {
                    (false, false) => BinaryOp::Like,
                    (false, true) => BinaryOp::NotLike,
                    (true, false) => BinaryOp::ILike,
                    (true, true) => BinaryOp::NotILike,
                };
                let rhs = self.expr_bp(BP_LIKE)?;
                Ok(Expr::BinaryOp {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::IS) => {
                self.advance();
                let negated = self.eat_keyword(Keyword::NOT);
                let test = if self.eat_keyword(Keyword::NULL) {
                    IsTest::Null
                } else if self.eat_keyword(Keyword::TRUE) {
                    IsTest::True
                } else if self.eat_keyword(Keyword::FALSE) {
                    IsTest::False
                } else if self.eat_keyword(Keyword::DISTINCT) {
                    self.expect_keyword(Keyword::FROM)?;
                    IsTest::DistinctFrom(Box::new(self.expr_bp(BP_IS)?))
                } else {
                    return Err(self.unexpected("NULL, TRUE, FALSE or DISTINCT FROM"));
                };
                Ok(Expr::Is {
                    expr: Box::new(lhs),
                    negated,
                    test,
                    pos,
                })
            }
            TokenKind::DoubleColon => {
                self.advance();
                let ty = self.type_name()?;
                Ok(Expr::TypeCast {
                    expr: Box::new(lhs),
                    ty,
                    pos,
                })
            }
            TokenKind::Arrow | TokenKind::LongArrow => {
                let as_text = self.advance().kind == TokenKind::LongArrow;
                let key = self.expr_bp(BP_JSON)?;
                Ok(Expr::JsonAccess {
                    expr: Box::new(lhs),
                    key: Box::new(key),
                    as_text,
                    pos,
                })
            }
            TokenKind::LBracket => {
                self.advance();
                let index = self.expr()?;
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::ArraySubscript {
                    array: Box::new(lhs),
                    index: Box::new(index),
                    pos,
                })
            }
            kind => {
                let op = match kind {
                    TokenKind::Keyword(Keyword::OR) => BinaryOp::Or,
                    TokenKind::Keyword(Keyword::AND) => BinaryOp::And,
                    TokenKind::Eq => BinaryOp::Eq,
                    TokenKind::NotEq => BinaryOp::NotEq,
                    TokenKind::Lt => BinaryOp::Lt,
                    TokenKind::LtEq => BinaryOp::LtEq,
                    TokenKind::Gt => BinaryOp::Gt,
                    TokenKind::GtEq => BinaryOp::GtEq,
                    TokenKind::Tilde => BinaryOp::Regex,
                    TokenKind::TildeStar => BinaryOp::RegexI,
                    TokenKind::NotTilde => BinaryOp::NotRegex,
                    TokenKind::NotTildeStar => BinaryOp::NotRegexI,
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Sub,
                    TokenKind::Concat => BinaryOp::Concat,
                    TokenKind::Star => BinaryOp::Mul,
                    TokenKind::Slash => BinaryOp::Div,
                    TokenKind::Percent => BinaryOp::Mod,
                    TokenKind::Caret => BinaryOp::Pow,
                    _ => return Err(self.unexpected("operator")),
                };
                self.advance();
                let rhs = self.expr_bp(bp)?;
                Ok(Expr::BinaryOp {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                    pos,
                })
            }
        }
    }

    fn prefix(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        match self.peek_kind() {
            TokenKind::Number => {
                let text = self.advance().text;
                Ok(Expr::Literal {
                    value: Literal::Number(text),
                    pos,
                })
            }
            TokenKind::String => {
                let text = self.advance().text;
                Ok(Expr::Literal {
                    value: Literal::String(text),
                    pos,
                })
            }
            TokenKind::DollarString => {
                let text = self.advance().text;
                Ok(Expr::Literal {
                    value: Literal::DollarString(text),
                    pos,
                })
            }
            TokenKind::Parameter => {
                let text = self.advance().text;
                let index = text
                    .parse::<u32>()
                    .map_err(|_| ParseError::new("parameter index out of range", "parameter", "parameter", pos))?;
                Ok(Expr::Parameter { index, pos })
            }
            TokenKind::Keyword(Keyword::TRUE) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Boolean(true),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::FALSE) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Boolean(false),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::NULL) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Null,
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::NOT) => {
                self.advance();
                if self.peek_kind() == TokenKind::Keyword(Keyword::EXISTS) {
                    return self.exists_expr(true);
                }
                let operand = self.expr_bp(BP_NOT)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.expr_bp(BP_UNARY)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Minus,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Plus => {
                self.advance();
                let operand = self.expr_bp(BP_UNARY)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Plus,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::CASE) => self.case_expr(),
            TokenKind::Keyword(Keyword::CAST) => self.cast_expr(),
            TokenKind::Keyword(Keyword::EXTRACT) => self.extract_expr(),
            TokenKind::Keyword(Keyword::EXISTS) => self.exists_expr(false),
            TokenKind::Keyword(Keyword::INTERVAL) => {
                self.advance();
                let value = self.expect(TokenKind::String)?.text;
                Ok(Expr::Interval { value, pos })
            }
            TokenKind::Keyword(Keyword::ARRAY) => {
                self.advance();
                self.expect(TokenKind::LBracket)?;
                let mut elements = Vec::new();
                if self.peek_kind() != TokenKind::RBracket {
                    elements.push(self.expr()?);
                    while self.eat(TokenKind::Comma) {
                        elements.push(self.expr()?);
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::Array { elements, pos })
            }
            TokenKind::Keyword(Keyword::CURRENT_TIMESTAMP)
            | TokenKind::Keyword(Keyword::CURRENT_DATE)
            | TokenKind::Keyword(Keyword::CURRENT_TIME) => {
                let name = self.advance().text;
                Ok(Expr::FunctionCall {
                    name,
                    args: Vec::new(),
                    distinct: false,
                    star: false,
                    order_by: Vec::new(),
                    pos,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if matches!(
                    self.peek_kind(),
                    TokenKind::Keyword(Keyword::SELECT) | TokenKind::Keyword(Keyword::WITH)
                ) {
                    let query = self.select_stmt()?;
                    self.expect(TokenKind::RParen)?;
                    return Ok(Expr::Subquery {
                        query: Box::new(query),
                        pos,
                    });
                }
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren {
                    expr: Box::new(inner),
                    pos,
                })
            }
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Star {
                    qualifier: None,
                    pos,
                })
            }
            TokenKind::Ident | TokenKind::QuotedIdent => self.name_chain(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Identifier, qualified reference, qualified star or function call.
    fn name_chain(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        let first = self.advance();
        let mut quoted = first.kind == TokenKind::QuotedIdent;
        let mut parts = vec![first.text];

        while self.peek_kind() == TokenKind::Dot {
            match self.peek_at(1).kind {
                TokenKind::Star => {
                    self.advance();
                    self.advance();
                    return Ok(Expr::Star {
                        qualifier: Some(parts.join(".")),
                        pos,
                    });
                }
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    self.advance();
                    let part = self.advance();
                    quoted = part.kind == TokenKind::QuotedIdent;
                    parts.push(part.text);
                }
                _ => break,
            }
        }

        if self.peek_kind() == TokenKind::LParen {
            return self.function_call(parts.join("."), pos);
        }

        if parts.len() == 1 {
            Ok(Expr::Identifier {
                name: parts.pop().unwrap(),
                quoted,
                pos,
            })
        } else {
            let name = parts.pop().unwrap();
            Ok(Expr::QualifiedRef {
                qualifier: parts.join("."),
                name,
                quoted,
                pos,
            })
        }
    }

    fn function_call(&mut self, name: String, pos: crate::token::Pos) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;

        if self.eat(TokenKind::RParen) {
            return Ok(Expr::FunctionCall {
                name,
                args: Vec::new(),
                distinct: false,
                star: false,
                order_by: Vec::new(),
                pos,
            });
        }

        if self.peek_kind() == TokenKind::Star {
            self.advance();
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::FunctionCall {
                name,
                args: Vec::new(),
                distinct: false,
                star: true,
                order_by: Vec::new(),
                pos,
            });
        }

        let distinct = self.eat_keyword(Keyword::DISTINCT);
        let mut args = vec![self.expr()?];
        while self.eat(TokenKind::Comma) {
            args.push(self.expr()?);
        }

        let mut order_by = Vec::new();
        if self.eat_keyword(Keyword::ORDER) {
            self.expect_keyword(Keyword::BY)?;
            order_by = self.order_by_list()?;
        }

        self.expect(TokenKind::RParen)?;
        Ok(Expr::FunctionCall {
            name,
            args,
            distinct,
            star: false,
            order_by,
            pos,
        })
    }

    fn case_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::CASE)?;

        let operand = if self.peek_kind() == TokenKind::Keyword(Keyword::WHEN) {
            None
        } else {
            Some(Box::new(self.expr()?))
        };

        let mut branches = Vec::new();
        while self.eat_keyword(Keyword::WHEN) {
            let condition = self.expr()?;
            self.expect_keyword(Keyword::THEN)?;
            let result = self.expr()?;
            branches.push((condition, result));
        }
        if branches.is_empty() {
            return Err(self.unexpected("WHEN"));
        }

        let else_expr = if self.eat_keyword(Keyword::ELSE) {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::END)?;

        Ok(Expr::Case {
            operand,
            branches,
            else_expr,
            pos,
        })
    }

    fn cast_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::CAST)?;
        self.expect(TokenKind::LParen)?;
        let expr = self.expr()?;
        self.expect_keyword(Keyword::AS)?;
        let ty = self.type_name()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            ty,
            pos,
        })
    }

    fn extract_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::EXTRACT)?;
        self.expect(TokenKind::LParen)?;
        let field = match self.peek_kind() {
            TokenKind::Ident | TokenKind::String | TokenKind::Keyword(_) => self.advance().text,
            _ => return Err(self.unexpected("extract field")),
        };
        self.expect_keyword(Keyword::FROM)?;
        let source = self.expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Extract {
            field,
            source: Box::new(source),
            pos,
        })
    }

    fn exists_expr(&mut self, negated: bool) -> Result<Expr, ParseError> {
        let pos = self.pos();
        self.expect_keyword(Keyword::EXISTS)?;
        self.expect(TokenKind::LParen)?;
        let subquery = self.select_stmt()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Exists {
            negated,
            subquery: Box::new(subquery),
            pos,
        })
    }

    /// `expr [ASC|DESC] [NULLS FIRST|LAST]`, comma separated.
    pub(crate) fn order_by_list(&mut self) -> Result<Vec<OrderByItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            let expr = self.expr()?;
            let desc = if self.eat_keyword(Keyword::DESC) {
                true
            } else {
                self.eat_keyword(Keyword::ASC);
                false
            };
            let nulls_first = if self.eat_keyword(Keyword::NULLS) {
                if self.eat_keyword(Keyword::FIRST) {
                    Some(true)
                } else {
                    self.expect_keyword(Keyword::LAST)?;
                    Some(false)
                }
            } else {
                None
            };
            items.push(OrderByItem {
                expr,
                desc,
                nulls_first,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// Type name with optional parameter list and array suffix; `DOUBLE
    /// PRECISION` and `CHARACTER VARYING` join into one name.
    pub(crate) fn type_name(&mut self) -> Result<TypeName, ParseError> {
        let mut name = match self.peek_kind() {
            TokenKind::Ident | TokenKind::QuotedIdent | TokenKind::Keyword(_) => self.advance().text,
            _ => return Err(self.unexpected("type name")),
        };

        if (name.eq_ignore_ascii_case("double") || name.eq_ignore_ascii_case("character"))
            && self.peek_kind() == TokenKind::Ident
        {
            let next = &self.peek().text;
            if next.eq_ignore_ascii_case("precision") || next.eq_ignore_ascii_case("varying") {
                name.push(' ');
                name.push_str(&self.advance().text);
            }
        }

        let mut args = Vec::new();
        if self.peek_kind() == TokenKind::LParen {
            self.advance();
            loop {
                match self.peek_kind() {
                    TokenKind::Number | TokenKind::Ident => args.push(self.advance().text),
                    _ => return Err(self.unexpected("type argument")),
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        let mut array = false;
        while self.eat(TokenKind::LBracket) {
            self.expect(TokenKind::RBracket)?;
            array = true;
        }

        Ok(TypeName { name, args, array })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Expr {
        Parser::parse_expression(sql).unwrap()
    }

    #[test]
    fn or_binds_looser_than_and() {
        // a OR b AND c => a OR (b AND c)
        match parse("a OR b AND c") {
            Expr::BinaryOp {
                op: BinaryOp::Or,
                right,
                ..
            } => match *right {
                Expr::BinaryOp {
                    op: BinaryOp::And, ..
                } => {}
                other => panic!("expected AND on the right, got {other:?}"),
            },
            other => panic!("expected OR at the top, got {other:?}"),
        }
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        match parse("a + b * c") {
            Expr::BinaryOp {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::BinaryOp {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("expected + at the top, got {other:?}"),
        }
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        // NOT a = b => NOT (a = b)
        match parse("NOT a = b") {
            Expr::UnaryOp {
                op: UnaryOp::Not,
                operand,
                ..
            } => assert!(matches!(
                *operand,
                Expr::BinaryOp {
                    op: BinaryOp::Eq,
                    ..
                }
            )),
            other => panic!("expected NOT at the top, got {other:?}"),
        }
    }

    #[test]
    fn cast_binds_tighter_than_binary_operators() {
        // a + b::int => a + (b::int)
        match parse("a + b::int") {
            Expr::BinaryOp {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::TypeCast { .. })),
            other => panic!("expected + at the top, got {other:?}"),
        }
    }

    #[test]
    fn json_access_chains_left() {
        match parse("data->'a'->>'b'") {
            Expr::JsonAccess { expr, as_text, .. } => {
                assert!(as_text);
                assert!(matches!(*expr, Expr::JsonAccess { as_text: false, .. }));
            }
            other => panic!("expected ->> at the top, got {other:?}"),
        }
    }

    #[test]
    fn count_star_any_case() {
        for sql in ["COUNT(*)", "count(*)", "Count(*)"] {
            match parse(sql) {
                Expr::FunctionCall { star, args, .. } => {
                    assert!(star);
                    assert!(args.is_empty());
                }
                other => panic!("expected function call, got {other:?}"),
            }
        }
    }

    #[test]
    fn cast_call_and_double_colon_agree() {
        let explicit = parse("CAST(x AS uuid)");
        let shorthand = parse("x::uuid");
        match (explicit, shorthand) {
            (Expr::Cast { ty: a, .. }, Expr::TypeCast { ty: b, .. }) => assert_eq!(a, b),
            other => panic!("unexpected shapes {other:?}"),
        }
    }

    #[test]
    fn parameterized_and_array_types() {
        match parse("x::varchar(255)") {
            Expr::TypeCast { ty, .. } => {
                assert_eq!(ty.name, "varchar");
                assert_eq!(ty.args, vec!["255"]);
            }
            other => panic!("{other:?}"),
        }
        match parse("x::text[]") {
            Expr::TypeCast { ty, .. } => assert!(ty.array),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn between_and_not_between() {
        assert!(matches!(
            parse("x BETWEEN 1 AND 10"),
            Expr::Between { negated: false, .. }
        ));
        assert!(matches!(
            parse("x NOT BETWEEN 1 AND 10"),
            Expr::Between { negated: true, .. }
        ));
        // the AND inside BETWEEN does not swallow a following AND
        assert!(matches!(
            parse("x BETWEEN 1 AND 10 AND y"),
            Expr::BinaryOp {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn in_list_and_subquery() {
        assert!(matches!(
            parse("x IN (1, 2, 3)"),
            Expr::In {
                set: InSet::List(_),
                ..
            }
        ));
        assert!(matches!(
            parse("x NOT IN (SELECT id FROM t)"),
            Expr::In {
                negated: true,
                set: InSet::Subquery(_),
                ..
            }
        ));
    }

    #[test]
    fn is_forms() {
        assert!(matches!(
            parse("x IS NULL"),
            Expr::Is {
                test: IsTest::Null,
                negated: false,
                ..
            }
        ));
        assert!(matches!(
            parse("x IS NOT TRUE"),
            Expr::Is {
                test: IsTest::True,
                negated: true,
                ..
            }
        ));
        assert!(matches!(
            parse("x IS DISTINCT FROM y"),
            Expr::Is {
                test: IsTest::DistinctFrom(_),
                ..
            }
        ));
    }

    #[test]
    fn case_forms() {
        assert!(matches!(
            parse("CASE WHEN a THEN 1 ELSE 2 END"),
            Expr::Case { operand: None, .. }
        ));
        assert!(matches!(
            parse("CASE x WHEN 1 THEN 'a' WHEN 2 THEN 'b' END"),
            Expr::Case {
                operand: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn ordered_aggregate() {
        match parse("string_agg(name, ',' ORDER BY name DESC)") {
            Expr::FunctionCall { order_by, args, .. } => {
                assert_eq!(args.len(), 2);
                assert_eq!(order_by.len(), 1);
                assert!(order_by[0].desc);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn qualified_names() {
        assert!(matches!(parse("users.id"), Expr::QualifiedRef { .. }));
        assert!(matches!(
            parse("users.*"),
            Expr::Star {
                qualifier: Some(_),
                ..
            }
        ));
        match parse("auth.uid()") {
            Expr::FunctionCall { name, .. } => assert_eq!(name, "auth.uid"),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn star_forbids_other_arguments() {
        assert!(Parser::parse_expression("count(*, x)").is_err());
    }

    #[test]
    fn array_literal_and_subscript() {
        assert!(matches!(parse("ARRAY[1, 2, 3]"), Expr::Array { .. }));
        assert!(matches!(parse("tags[1]"), Expr::ArraySubscript { .. }));
    }

    #[test]
    fn exists_and_not_exists() {
        assert!(matches!(
            parse("EXISTS (SELECT 1)"),
            Expr::Exists { negated: false, .. }
        ));
        assert!(matches!(
            parse("NOT EXISTS (SELECT 1)"),
            Expr::Exists { negated: true, .. }
        ));
    }

    #[test]
    fn interval_and_extract() {
        assert!(matches!(parse("INTERVAL '7 days'"), Expr::Interval { .. }));
        match parse("EXTRACT(year FROM created_at)") {
            Expr::Extract { field, .. } => assert_eq!(field, "year"),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn positional_parameters() {
        assert!(matches!(parse("$1"), Expr::Parameter { index: 1, .. }));
    }
}
