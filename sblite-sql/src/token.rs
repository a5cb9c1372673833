//! Lexical atoms produced by the lexer and consumed by the parser.

use std::fmt;

/// Source position of a token or AST node. `line` and `column` are 1-based,
/// `offset` is a byte offset into the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn start() -> Pos {
        Pos {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

macro_rules! keywords {
    [$($ident:ident)*] => {
        /// SQL keywords recognized by the lexer, matched case-insensitively.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(clippy::upper_case_acronyms)]
        pub enum Keyword {
            $($ident),*
        }

        impl Keyword {
            pub fn parse(v: &str) -> Option<Keyword> {
                match v.to_ascii_uppercase().as_str() {
                    $(stringify!($ident) => Some(Keyword::$ident),)*
                    _ => None,
                }
            }

            pub const fn name(&self) -> &'static str {
                match self {
                    $(Keyword::$ident => stringify!($ident)),*
                }
            }
        }
    };
}

keywords![
    ALL AND ARRAY AS ASC BETWEEN BY CASCADE CASE CAST CHECK COLLATE COLUMN
    CONFLICT CONSTRAINT CREATE CROSS CURRENT_DATE CURRENT_TIME
    CURRENT_TIMESTAMP DEFAULT DEFINER DELETE DESC DISTINCT DO DROP ELSE END
    EXCEPT EXISTS EXTRACT FALSE FIRST FOREIGN FROM FULL FUNCTION GROUP HAVING
    IF ILIKE IMMUTABLE IN INDEX INNER INSERT INTERSECT INTERVAL INTO INVOKER
    IS JOIN KEY LANGUAGE LAST LEFT LIKE LIMIT NOT NOTHING NULL NULLS OFFSET
    ON OR ORDER OUTER PRIMARY RECURSIVE REFERENCES REPLACE RESTRICT RETURNING
    RETURNS RIGHT SECURITY SELECT SET SETOF STABLE TABLE THEN TRUE UNION
    UNIQUE UPDATE USING VALUES VOLATILE WHEN WHERE WITH
];

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Token kind. Multi-character operators are individual variants so the
/// parser never re-inspects raw text to classify an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// Unquoted identifier.
    Ident,
    /// `"..."` identifier, text holds the unescaped body.
    QuotedIdent,
    /// `'...'` literal, text holds the unescaped body.
    String,
    /// `$tag$...$tag$` literal, text holds the body verbatim.
    DollarString,
    Number,
    /// Positional parameter `$1`, `$2`, ...
    Parameter,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Eq,
    /// `<>` or `!=`.
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `||`
    Concat,
    /// `::`
    DoubleColon,
    /// `->`
    Arrow,
    /// `->>`
    LongArrow,
    Tilde,
    /// `~*`
    TildeStar,
    /// `!~`
    NotTilde,
    /// `!~*`
    NotTildeStar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    Colon,
    Eof,
    /// Invalid input; `text` carries a short description.
    Error,
}

impl TokenKind {
    /// Human-readable class name used in parse error messages.
    pub fn class(&self) -> &'static str {
        match self {
            TokenKind::Keyword(k) => k.name(),
            TokenKind::Ident | TokenKind::QuotedIdent => "identifier",
            TokenKind::String | TokenKind::DollarString => "string literal",
            TokenKind::Number => "number",
            TokenKind::Parameter => "parameter",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Eq => "=",
            TokenKind::NotEq => "<>",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Concat => "||",
            TokenKind::DoubleColon => "::",
            TokenKind::Arrow => "->",
            TokenKind::LongArrow => "->>",
            TokenKind::Tilde => "~",
            TokenKind::TildeStar => "~*",
            TokenKind::NotTilde => "!~",
            TokenKind::NotTildeStar => "!~*",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Eof => "end of input",
            TokenKind::Error => "invalid input",
        }
    }
}

/// A positioned lexical atom. `text` holds the unescaped literal body for
/// strings and quoted identifiers, and the raw spelling otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Pos,
}

impl Token {
    pub fn eof(pos: Pos) -> Token {
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            pos,
        }
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_keyword(&self, k: Keyword) -> bool {
        self.kind == TokenKind::Keyword(k)
    }
}
