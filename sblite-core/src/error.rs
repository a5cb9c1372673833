//! Core error taxonomy. Every kind carries enough to surface a PG-style
//! error: SQLSTATE, message, and a position when one is known.

use sblite_sql::{ParseError, TranslateError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{message}")]
    Translation {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("unsupported feature: {feature}")]
    Unsupported { feature: String },

    #[error("{message}")]
    Engine {
        message: String,
        sqlstate: &'static str,
    },

    #[error("new row violates row-level security policy for table \"{table}\"")]
    RlsDenied { table: String },

    #[error("password authentication failed for user \"{user}\"")]
    Auth { user: String },

    #[error("protocol violation: {message}")]
    Protocol { message: String },

    #[error("canceling statement due to user request")]
    Canceled,

    #[error("{message}")]
    Rpc { message: String },
}

impl CoreError {
    pub fn engine(message: impl Into<String>, sqlstate: &'static str) -> CoreError {
        CoreError::Engine {
            message: message.into(),
            sqlstate,
        }
    }

    pub fn rpc(message: impl Into<String>) -> CoreError {
        CoreError::Rpc {
            message: message.into(),
        }
    }

    pub fn unsupported(feature: impl Into<String>) -> CoreError {
        CoreError::Unsupported {
            feature: feature.into(),
        }
    }

    /// Five-character PostgreSQL SQLSTATE for the wire and REST boundaries.
    pub fn sqlstate(&self) -> &str {
        match self {
            CoreError::Parse(_) => "42601",
            CoreError::Translation { .. } => "0A000",
            CoreError::Unsupported { .. } => "0A000",
            CoreError::Engine { sqlstate, .. } => sqlstate,
            CoreError::RlsDenied { .. } => "42501",
            CoreError::Auth { .. } => "28P01",
            CoreError::Protocol { .. } => "08P01",
            CoreError::Canceled => "57014",
            CoreError::Rpc { .. } => "42883",
        }
    }

    /// 1-based error position, when the error is tied to one.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            CoreError::Parse(e) => Some((e.position.line, e.position.column)),
            CoreError::Translation { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

impl From<TranslateError> for CoreError {
    fn from(err: TranslateError) -> CoreError {
        match err {
            TranslateError::Unrepresentable { message, position } => CoreError::Translation {
                message,
                line: position.line,
                column: position.column,
            },
            TranslateError::Unsupported { feature, .. } => CoreError::Unsupported { feature },
        }
    }
}

/// Map an engine failure onto the closest PostgreSQL error class. Constraint
/// classes are distinguished through SQLite extended result codes.
impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> CoreError {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message
                    .clone()
                    .unwrap_or_else(|| failure.to_string());
                if failure.code == rusqlite::ErrorCode::OperationInterrupted {
                    return CoreError::Canceled;
                }
                let sqlstate = match failure.extended_code {
                    // SQLITE_CONSTRAINT_PRIMARYKEY / SQLITE_CONSTRAINT_UNIQUE
                    1555 | 2067 => "23505",
                    // SQLITE_CONSTRAINT_FOREIGNKEY
                    787 => "23503",
                    // SQLITE_CONSTRAINT_NOTNULL
                    1299 => "23502",
                    // SQLITE_CONSTRAINT_CHECK
                    275 => "23514",
                    _ if message.contains("syntax error") => "42601",
                    _ if message.contains("no such table") => "42P01",
                    _ if message.contains("no such column") => "42703",
                    _ => "XX000",
                };
                CoreError::engine(message, sqlstate)
            }
            rusqlite::Error::QueryReturnedNoRows => {
                CoreError::engine("query returned no rows", "P0002")
            }
            other => CoreError::engine(other.to_string(), "XX000"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sblite_sql::Parser;

    #[test]
    fn sqlstates_follow_the_taxonomy() {
        let parse_err = Parser::parse_statement("SELECT FROM FROM").unwrap_err();
        assert_eq!(CoreError::from(parse_err).sqlstate(), "42601");
        assert_eq!(CoreError::unsupported("LATERAL").sqlstate(), "0A000");
        assert_eq!(
            CoreError::RlsDenied {
                table: "t".to_string()
            }
            .sqlstate(),
            "42501"
        );
        assert_eq!(
            CoreError::Auth {
                user: "u".to_string()
            }
            .sqlstate(),
            "28P01"
        );
        assert_eq!(CoreError::Canceled.sqlstate(), "57014");
        assert_eq!(
            CoreError::Protocol {
                message: "m".to_string()
            }
            .sqlstate(),
            "08P01"
        );
    }

    #[test]
    fn parse_errors_carry_position() {
        let parse_err = Parser::parse_statement("SELECT\n FROM t").unwrap_err();
        let core: CoreError = parse_err.into();
        assert_eq!(core.position(), Some((2, 2)));
    }
}
