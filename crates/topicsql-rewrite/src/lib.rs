//! topicsql rewriter - logical topic tables onto one physical `jsonb` table
//!
//! Queries are written as if every topic were its own table with ordinary
//! columns. The rewriter parses them with `sqlparser` and renders an
//! equivalent query over the shared physical table: columns become payload
//! extractions (`(payload ->> 'col')`, cast to `FLOAT` when numeric), topic
//! tables become the physical table, and each topic table contributes a
//! predicate pinning the payload's topic key.

mod alias;
mod expr;
mod parser;
mod rewriter;
mod scope;
mod select;
mod table;
mod union;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use topicsql_schema::{NumericFields, SchemaContext};

pub use parser::{parse_statement, statement_kind, ParseError, SqlDialect};
pub use rewriter::Rewriter;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("SQL type not supported: {0}")]
    UnsupportedStatement(String),

    #[error("No mapping rule for: {0}")]
    UnsupportedExpression(String),
}

/// What to do with a node the rewriter has no rule for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Emit the node's source text unchanged
    #[default]
    Verbatim,
    /// Fail with [`RewriteError::UnsupportedExpression`]
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteOptions {
    #[serde(default)]
    pub dialect: SqlDialect,

    #[serde(default)]
    pub fallback: FallbackPolicy,
}

/// Rewrite one SELECT or UNION statement onto the physical schema
pub fn rewrite(sql: &str, ctx: &SchemaContext) -> Result<String, RewriteError> {
    rewrite_with_options(sql, ctx, &RewriteOptions::default())
}

pub fn rewrite_with_options(
    sql: &str,
    ctx: &SchemaContext,
    options: &RewriteOptions,
) -> Result<String, RewriteError> {
    let statement = parse_statement(sql, options.dialect)?;
    Rewriter::new(ctx, options).rewrite_statement(&statement)
}

/// Rewrite against the default `tsdb_table` / `payload` / `topic` layout
pub fn rewrite_default(sql: &str, numeric_fields: NumericFields) -> Result<String, RewriteError> {
    rewrite(sql, &SchemaContext::with_defaults(numeric_fields))
}
