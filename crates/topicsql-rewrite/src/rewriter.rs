//! Statement dispatch

use sqlparser::ast::{Query, SetExpr, SetOperator, SetQuantifier, Statement};
use std::fmt;
use topicsql_schema::SchemaContext;
use tracing::debug;

use crate::parser::{node_kind, statement_kind};
use crate::scope::TopicScope;
use crate::{FallbackPolicy, RewriteError, RewriteOptions};

/// Renders statements over the physical schema described by a [`SchemaContext`].
///
/// Holds no mutable state; one instance can rewrite any number of
/// statements, from any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'a> {
    pub(crate) ctx: &'a SchemaContext,
    fallback: FallbackPolicy,
}

impl<'a> Rewriter<'a> {
    pub fn new(ctx: &'a SchemaContext, options: &RewriteOptions) -> Self {
        Self {
            ctx,
            fallback: options.fallback,
        }
    }

    /// Rewrite a parsed statement; only queries (SELECT / UNION) are accepted
    pub fn rewrite_statement(&self, statement: &Statement) -> Result<String, RewriteError> {
        let Statement::Query(query) = statement else {
            return Err(RewriteError::UnsupportedStatement(statement_kind(statement)));
        };

        debug!(
            physical_table = %self.ctx.physical_table,
            payload_column = %self.ctx.payload_column,
            numeric_policy = ?self.ctx.numeric_fields.policy(),
            "rewriting query"
        );
        let mapped = self.map_query(query)?;
        debug!(mapped_len = mapped.len(), "query rewritten");
        Ok(mapped)
    }

    pub(crate) fn map_query(&self, query: &Query) -> Result<String, RewriteError> {
        if query.with.is_some() {
            return Err(RewriteError::UnsupportedStatement("WITH".to_string()));
        }
        if has_unmodelled_clause(query) {
            return self.fallback(query);
        }

        let order_by = query.order_by.as_ref();
        let limit = query.limit_clause.as_ref();

        match query.body.as_ref() {
            SetExpr::Select(select) => self.map_select(select, order_by, limit),
            SetExpr::SetOperation {
                op: SetOperator::Union,
                set_quantifier,
                ..
            } if is_by_name(set_quantifier) => self.fallback(query),
            SetExpr::SetOperation {
                op: SetOperator::Union,
                set_quantifier,
                left,
                right,
            } => self.map_union(left, right, set_quantifier, order_by, limit),
            SetExpr::Query(inner) => {
                let mut parts = vec![format!("({})", self.map_query(inner)?)];
                let scope = TopicScope::default();
                if let Some(order_by) = order_by {
                    parts.extend(self.map_order_by(order_by, None, &scope)?);
                }
                if let Some(limit) = limit {
                    parts.extend(self.map_limit(limit, &scope)?);
                }
                Ok(parts.join(" "))
            }
            other => Err(RewriteError::UnsupportedStatement(set_expr_kind(other))),
        }
    }

    /// Render a node with no mapping rule according to the fallback policy
    pub(crate) fn fallback<T: fmt::Display + ?Sized>(
        &self,
        node: &T,
    ) -> Result<String, RewriteError> {
        let text = node.to_string();
        match self.fallback {
            FallbackPolicy::Verbatim => {
                debug!(node = %text, "no mapping rule, passing source text through");
                Ok(text)
            }
            FallbackPolicy::Reject => Err(RewriteError::UnsupportedExpression(text)),
        }
    }
}

/// Query-level clauses the mapper has no rule for
fn has_unmodelled_clause(query: &Query) -> bool {
    query.fetch.is_some()
        || !query.locks.is_empty()
        || query.for_clause.is_some()
        || query.settings.is_some()
        || query.format_clause.is_some()
        || !query.pipe_operators.is_empty()
}

/// `UNION [ALL | DISTINCT] BY NAME` matches columns by name, not position
pub(crate) fn is_by_name(quantifier: &SetQuantifier) -> bool {
    matches!(
        quantifier,
        SetQuantifier::ByName | SetQuantifier::AllByName | SetQuantifier::DistinctByName
    )
}

pub(crate) fn set_expr_kind(set_expr: &SetExpr) -> String {
    match set_expr {
        SetExpr::SetOperation { op, .. } => op.to_string(),
        SetExpr::Values(_) => "VALUES".to_string(),
        other => node_kind(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rewrite, rewrite_with_options, ParseError, SqlDialect};
    use topicsql_schema::NumericFields;

    fn ctx() -> SchemaContext {
        SchemaContext::new("tsdb_table", "payload", "topic", NumericFields::default())
    }

    #[test]
    fn test_insert_is_unsupported() {
        let err = rewrite("INSERT INTO pump_alarm (code) VALUES ('E1')", &ctx()).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedStatement(kind) if kind == "Insert"));
    }

    #[test]
    fn test_intersect_is_unsupported() {
        let err = rewrite("SELECT a FROM t1 INTERSECT SELECT a FROM t2", &ctx()).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedStatement(kind) if kind == "INTERSECT"));
    }

    #[test]
    fn test_with_is_unsupported() {
        let err = rewrite("WITH x AS (SELECT a FROM t) SELECT a FROM x", &ctx()).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedStatement(kind) if kind == "WITH"));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let err = rewrite("SELECT a FROM t; SELECT b FROM u", &ctx()).unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Parse(ParseError::MultipleStatements(2))
        ));
    }

    #[test]
    fn test_parenthesized_query_body() {
        let mapped = rewrite("(SELECT a FROM t) ORDER BY a LIMIT 3", &ctx()).unwrap();
        assert_eq!(
            mapped,
            "(SELECT (payload ->> 'a') AS a FROM tsdb_table WHERE (payload ->> 'topic') = 't') \
             ORDER BY (payload ->> 'a') LIMIT 3"
        );
    }

    #[test]
    fn test_query_clauses_without_rule_are_not_dropped() {
        let sql = "SELECT code FROM t ORDER BY code FETCH FIRST 5 ROWS ONLY";
        assert_eq!(rewrite(sql, &ctx()).unwrap(), sql);

        let options = RewriteOptions {
            dialect: SqlDialect::PostgreSql,
            fallback: FallbackPolicy::Reject,
        };
        for sql in [
            "SELECT code FROM t ORDER BY code FETCH FIRST 5 ROWS ONLY",
            "SELECT code FROM t FOR UPDATE",
        ] {
            let err = rewrite_with_options(sql, &ctx(), &options).unwrap_err();
            assert!(matches!(err, RewriteError::UnsupportedExpression(_)), "{sql}");
        }
    }

    #[test]
    fn test_reject_policy() {
        let options = RewriteOptions {
            dialect: SqlDialect::Generic,
            fallback: FallbackPolicy::Reject,
        };
        let err = rewrite_with_options(
            "SELECT a FROM t WHERE a IS DISTINCT FROM b",
            &ctx(),
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedExpression(_)));
    }
}
