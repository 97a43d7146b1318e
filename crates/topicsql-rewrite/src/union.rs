//! UNION mapping

use sqlparser::ast::{LimitClause, OrderBy, SetExpr, SetOperator, SetQuantifier};

use crate::rewriter::{is_by_name, set_expr_kind, Rewriter};
use crate::scope::TopicScope;
use crate::RewriteError;

impl<'a> Rewriter<'a> {
    /// Map both branches independently and rejoin them.
    ///
    /// ORDER BY / LIMIT belong to the whole union and see no branch aliases.
    pub(crate) fn map_union(
        &self,
        left: &SetExpr,
        right: &SetExpr,
        quantifier: &SetQuantifier,
        order_by: Option<&OrderBy>,
        limit: Option<&LimitClause>,
    ) -> Result<String, RewriteError> {
        let keyword = match quantifier {
            SetQuantifier::All => "UNION ALL",
            _ => "UNION",
        };
        let mut parts = vec![
            self.map_branch(left)?,
            keyword.to_string(),
            self.map_branch(right)?,
        ];

        let scope = TopicScope::default();
        if let Some(order_by) = order_by {
            parts.extend(self.map_order_by(order_by, None, &scope)?);
        }
        if let Some(limit) = limit {
            parts.extend(self.map_limit(limit, &scope)?);
        }
        Ok(parts.join(" "))
    }

    fn map_branch(&self, branch: &SetExpr) -> Result<String, RewriteError> {
        match branch {
            SetExpr::Select(select) => self.map_select(select, None, None),
            SetExpr::SetOperation {
                op: SetOperator::Union,
                set_quantifier,
                ..
            } if is_by_name(set_quantifier) => self.fallback(branch),
            SetExpr::SetOperation {
                op: SetOperator::Union,
                set_quantifier,
                left,
                right,
            } => self.map_union(left, right, set_quantifier, None, None),
            SetExpr::Query(query) => Ok(format!("({})", self.map_query(query)?)),
            other => Err(RewriteError::UnsupportedStatement(set_expr_kind(other))),
        }
    }
}
