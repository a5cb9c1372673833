//! Errors produced by the translation pipeline.

use crate::token::Pos;

/// Lexing/parsing failure. `expected` and `got` are token-class names; the
/// caller may render a verbose form with [`ParseError::render_verbose`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {position} (expected {expected}, got {got})")]
pub struct ParseError {
    pub message: String,
    pub expected: String,
    pub got: String,
    pub position: Pos,
}

impl ParseError {
    pub fn new(
        message: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
        position: Pos,
    ) -> ParseError {
        ParseError {
            message: message.into(),
            expected: expected.into(),
            got: got.into(),
            position,
        }
    }

    /// Render the error with the offending source line and a caret under the
    /// reported column.
    pub fn render_verbose(&self, source: &str) -> String {
        let line = source
            .lines()
            .nth(self.position.line.saturating_sub(1) as usize)
            .unwrap_or("");
        let caret_indent = " ".repeat(self.position.column.saturating_sub(1) as usize);
        format!("{self}\n{line}\n{caret_indent}^")
    }
}

/// AST-to-target emission failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("{message} at {position}")]
    Unrepresentable { message: String, position: Pos },
    /// Known-unsupported PostgreSQL feature; callers may choose passthrough.
    #[error("unsupported feature: {feature} at {position}")]
    Unsupported { feature: String, position: Pos },
}

impl TranslateError {
    pub fn unrepresentable(message: impl Into<String>, position: Pos) -> TranslateError {
        TranslateError::Unrepresentable {
            message: message.into(),
            position,
        }
    }

    pub fn unsupported(feature: impl Into<String>, position: Pos) -> TranslateError {
        TranslateError::Unsupported {
            feature: feature.into(),
            position,
        }
    }
}
