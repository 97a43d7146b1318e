//! SQL front end over `sqlparser`

use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::{Parser, ParserError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParserError),

    #[error("Empty input")]
    Empty,

    #[error("Expected one statement, found {0}")]
    MultipleStatements(usize),

    #[error("Unknown SQL dialect: {0}")]
    UnknownDialect(String),
}

/// Input dialect accepted by the parser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Generic,
    PostgreSql,
    MySql,
}

impl SqlDialect {
    fn dialect(self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::PostgreSql => Box::new(PostgreSqlDialect {}),
            SqlDialect::MySql => Box::new(MySqlDialect {}),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(SqlDialect::Generic),
            "postgresql" | "postgres" => Ok(SqlDialect::PostgreSql),
            "mysql" => Ok(SqlDialect::MySql),
            other => Err(ParseError::UnknownDialect(other.to_string())),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlDialect::Generic => "generic",
            SqlDialect::PostgreSql => "postgresql",
            SqlDialect::MySql => "mysql",
        };
        f.write_str(name)
    }
}

/// Parse exactly one statement; a trailing `;` is accepted
pub fn parse_statement(sql: &str, dialect: SqlDialect) -> Result<Statement, ParseError> {
    let mut statements = Parser::parse_sql(&*dialect.dialect(), sql)?;
    match statements.len() {
        0 => Err(ParseError::Empty),
        1 => Ok(statements.remove(0)),
        n => Err(ParseError::MultipleStatements(n)),
    }
}

/// Short name of a statement's kind, e.g. `Insert` or `CreateTable`
pub fn statement_kind(statement: &Statement) -> String {
    node_kind(statement)
}

/// Variant name taken from a node's `Debug` rendering
pub(crate) fn node_kind<T: fmt::Debug>(node: &T) -> String {
    let debug = format!("{node:?}");
    debug
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement() {
        let statement = parse_statement("SELECT a FROM t;", SqlDialect::Generic).unwrap();
        assert!(matches!(statement, Statement::Query(_)));
    }

    #[test]
    fn test_empty_input() {
        let err = parse_statement("   ", SqlDialect::Generic).unwrap_err();
        assert!(matches!(err, ParseError::Empty));
    }

    #[test]
    fn test_multiple_statements() {
        let err = parse_statement("SELECT 1; SELECT 2", SqlDialect::Generic).unwrap_err();
        assert!(matches!(err, ParseError::MultipleStatements(2)));
    }

    #[test]
    fn test_statement_kind() {
        let statement =
            parse_statement("INSERT INTO t (a) VALUES (1)", SqlDialect::Generic).unwrap();
        assert_eq!(statement_kind(&statement), "Insert");

        let statement = parse_statement("DROP TABLE t", SqlDialect::Generic).unwrap();
        assert_eq!(statement_kind(&statement), "Drop");
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("Postgres".parse::<SqlDialect>().unwrap(), SqlDialect::PostgreSql);
        assert_eq!("mysql".parse::<SqlDialect>().unwrap(), SqlDialect::MySql);
        assert!(matches!(
            "oracle".parse::<SqlDialect>(),
            Err(ParseError::UnknownDialect(_))
        ));
    }
}
