//! SELECT statement mapping

use sqlparser::ast::{
    BinaryOperator, Distinct, Expr, GroupByExpr, Ident, LimitClause, OrderBy, OrderByExpr,
    OrderByKind, Select, SelectItem,
};
use tracing::debug;

use crate::alias::AliasMap;
use crate::rewriter::Rewriter;
use crate::scope::TopicScope;
use crate::table::logical_tables;
use crate::RewriteError;

impl<'a> Rewriter<'a> {
    pub(crate) fn map_select(
        &self,
        select: &Select,
        order_by: Option<&OrderBy>,
        limit: Option<&LimitClause>,
    ) -> Result<String, RewriteError> {
        if has_unmodelled_clause(select) {
            return self.fallback(select);
        }

        let tables = logical_tables(&select.from, self.ctx);
        let scope = TopicScope::new(&tables);
        let mut aliases = AliasMap::default();

        let mut parts = vec![match &select.distinct {
            None => "SELECT".to_string(),
            Some(Distinct::On(exprs)) => {
                let exprs = self.map_exprs(exprs, &scope)?;
                format!("SELECT DISTINCT ON ({})", exprs.join(", "))
            }
            Some(distinct) => format!("SELECT {distinct}"),
        }];

        let items = select
            .projection
            .iter()
            .map(|item| self.map_select_item(item, &scope, &mut aliases))
            .collect::<Result<Vec<_>, _>>()?;
        parts.push(items.join(", "));

        let mut emitted = false;
        if !select.from.is_empty() {
            let mut from = Vec::with_capacity(select.from.len());
            for table in &select.from {
                let (mapped, table_emitted) = self.map_table_with_joins(table, &scope)?;
                from.push(mapped);
                emitted |= table_emitted;
            }
            parts.push(format!("FROM {}", from.join(", ")));
        }

        let mut predicates = if emitted {
            self.topic_predicates(&select.from)
        } else {
            Vec::new()
        };
        let topic_predicates = predicates.len();
        if let Some(selection) = &select.selection {
            let user = self.map_expr(selection, &scope)?;
            if topic_predicates > 0 && is_top_level_or(selection) {
                predicates.push(format!("({user})"));
            } else {
                predicates.push(user);
            }
        }
        if !predicates.is_empty() {
            parts.push(format!("WHERE {}", predicates.join(" AND ")));
        }

        parts.extend(self.map_group_by(&select.group_by, &aliases, &scope)?);

        if let Some(having) = &select.having {
            parts.push(format!("HAVING {}", self.map_having(having, &aliases, &scope)?));
        }

        if let Some(order_by) = order_by {
            parts.extend(self.map_order_by(order_by, Some(&aliases), &scope)?);
        }
        if let Some(limit) = limit {
            parts.extend(self.map_limit(limit, &scope)?);
        }

        debug!(
            items = items.len(),
            tables = tables.len(),
            topic_predicates,
            "select mapped"
        );
        Ok(parts.join(" "))
    }

    fn map_select_item(
        &self,
        item: &SelectItem,
        scope: &TopicScope,
        aliases: &mut AliasMap,
    ) -> Result<String, RewriteError> {
        match item {
            SelectItem::UnnamedExpr(Expr::Identifier(column)) => {
                aliases.insert(column.value.clone());
                Ok(format!("{} AS {column}", self.map_column(None, column, scope)))
            }
            SelectItem::UnnamedExpr(Expr::CompoundIdentifier(idents)) if idents.len() >= 2 => {
                let qualifier = &idents[idents.len() - 2];
                let column = &idents[idents.len() - 1];
                aliases.insert(qualifier.value.clone());
                Ok(format!(
                    "{} AS {qualifier}",
                    self.map_column(Some(qualifier), column, scope)
                ))
            }
            SelectItem::UnnamedExpr(expr @ Expr::Function(function)) => {
                let mapped = self.map_expr(expr, scope)?;
                let alias = function.name.to_string();
                aliases.insert_call(function.to_string(), alias.clone());
                Ok(format!("{mapped} AS {alias}"))
            }
            SelectItem::UnnamedExpr(expr) => {
                // the surfaced name is the mapped text, quoted so it stays one identifier
                let mapped = self.map_expr(expr, scope)?;
                let alias = Ident::with_quote('"', mapped.as_str());
                aliases.insert(mapped.clone());
                Ok(format!("{mapped} AS {alias}"))
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let mapped = self.map_expr(expr, scope)?;
                match expr {
                    Expr::Function(function) => {
                        aliases.insert_call(function.to_string(), alias.value.clone())
                    }
                    _ => aliases.insert(alias.value.clone()),
                }
                Ok(format!("{mapped} AS {alias}"))
            }
            wildcard => Ok(wildcard.to_string()),
        }
    }

    fn map_group_by(
        &self,
        group_by: &GroupByExpr,
        aliases: &AliasMap,
        scope: &TopicScope,
    ) -> Result<Option<String>, RewriteError> {
        let (exprs, modifiers) = match group_by {
            GroupByExpr::All(modifiers) => (None, modifiers),
            GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => return Ok(None),
            GroupByExpr::Expressions(exprs, modifiers) => (Some(exprs), modifiers),
        };

        let mut clause = match exprs {
            None => "GROUP BY ALL".to_string(),
            Some(exprs) => {
                let mapped = exprs
                    .iter()
                    .map(|expr| match expr {
                        Expr::Identifier(column) if aliases.contains(&column.value) => {
                            Ok(column.to_string())
                        }
                        expr => self.map_expr(expr, scope),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                format!("GROUP BY {}", mapped.join(", "))
            }
        };
        for modifier in modifiers {
            clause.push(' ');
            clause.push_str(&modifier.to_string());
        }
        Ok(Some(clause))
    }

    /// Alias reuse applies to the root and to the direct operands of a binary root
    fn map_having(
        &self,
        having: &Expr,
        aliases: &AliasMap,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        if let Some(alias) = aliases.short_circuit(having) {
            return Ok(alias);
        }
        match having {
            Expr::BinaryOp { left, op, right } => {
                let operand = |expr: &Expr| match aliases.short_circuit(expr) {
                    Some(alias) => Ok(alias),
                    None => self.map_expr(expr, scope),
                };
                Ok(format!("{} {op} {}", operand(left)?, operand(right)?))
            }
            other => self.map_expr(other, scope),
        }
    }

    /// Render an ORDER BY clause; `aliases` enables alias reuse for bare terms
    pub(crate) fn map_order_by(
        &self,
        order_by: &OrderBy,
        aliases: Option<&AliasMap>,
        scope: &TopicScope,
    ) -> Result<Option<String>, RewriteError> {
        let terms = match &order_by.kind {
            OrderByKind::Expressions(terms) if terms.is_empty() => return Ok(None),
            OrderByKind::Expressions(terms) => terms,
            OrderByKind::All(_) => return Ok(Some(self.fallback(order_by)?)),
        };

        let terms = terms
            .iter()
            .map(|term| self.map_order_by_expr(term, aliases, scope))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(format!("ORDER BY {}", terms.join(", "))))
    }

    pub(crate) fn map_order_by_expr(
        &self,
        term: &OrderByExpr,
        aliases: Option<&AliasMap>,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        if term.with_fill.is_some() {
            return self.fallback(term);
        }

        let mut mapped = match aliases.and_then(|aliases| aliases.short_circuit(&term.expr)) {
            Some(alias) => alias,
            None => self.map_expr(&term.expr, scope)?,
        };
        match term.options.asc {
            Some(true) => mapped.push_str(" ASC"),
            Some(false) => mapped.push_str(" DESC"),
            None => {}
        }
        match term.options.nulls_first {
            Some(true) => mapped.push_str(" NULLS FIRST"),
            Some(false) => mapped.push_str(" NULLS LAST"),
            None => {}
        }
        Ok(mapped)
    }

    /// `OFFSET <o> LIMIT <n>` when both are present
    pub(crate) fn map_limit(
        &self,
        limit: &LimitClause,
        scope: &TopicScope,
    ) -> Result<Option<String>, RewriteError> {
        let (count, offset) = match limit {
            LimitClause::LimitOffset { limit_by, .. } if !limit_by.is_empty() => {
                return Ok(Some(self.fallback(limit)?.trim().to_string()));
            }
            LimitClause::LimitOffset { limit, offset, .. } => (
                self.map_expr_opt(limit.as_ref(), scope)?,
                self.map_expr_opt(offset.as_ref().map(|offset| &offset.value), scope)?,
            ),
            LimitClause::OffsetCommaLimit { offset, limit } => (
                self.map_expr(limit, scope)?,
                self.map_expr(offset, scope)?,
            ),
        };

        Ok(match (count.is_empty(), offset.is_empty()) {
            (true, true) => None,
            (false, true) => Some(format!("LIMIT {count}")),
            (true, false) => Some(format!("OFFSET {offset}")),
            (false, false) => Some(format!("OFFSET {offset} LIMIT {count}")),
        })
    }

    pub(crate) fn map_exprs(&self, exprs: &[Expr], scope: &TopicScope) -> Result<Vec<String>, RewriteError> {
        exprs.iter().map(|expr| self.map_expr(expr, scope)).collect()
    }
}

/// Clauses the mapper has no rule for; the whole SELECT goes to the fallback
fn has_unmodelled_clause(select: &Select) -> bool {
    select.top.is_some()
        || select.exclude.is_some()
        || select.into.is_some()
        || !select.lateral_views.is_empty()
        || select.prewhere.is_some()
        || !select.cluster_by.is_empty()
        || !select.distribute_by.is_empty()
        || !select.sort_by.is_empty()
        || !select.named_window.is_empty()
        || select.qualify.is_some()
        || select.value_table_mode.is_some()
        || select.connect_by.is_some()
}

fn is_top_level_or(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        }
    )
}
