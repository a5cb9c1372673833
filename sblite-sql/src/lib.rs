//! PostgreSQL ⇄ SQLite SQL dialect translation.
//!
//! The AST path is primary: [`Parser`] builds a typed AST from PostgreSQL
//! SQL and [`Generator`] emits either dialect from it. [`fallback`] is a
//! strictly secondary regex rule chain for function bodies and statements
//! beyond the parser's grammar.

pub mod ast;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod lexer;
pub mod mapper;
pub mod parser;
pub mod token;

pub use ast::{Expr, Stmt};
pub use error::{ParseError, TranslateError};
pub use generator::{to_postgres, to_sqlite, Dialect, Generator};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Keyword, Pos, Token, TokenKind};
