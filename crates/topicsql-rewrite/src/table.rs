//! FROM-clause mapping and topic predicate synthesis

use sqlparser::ast::{
    Ident, Join, JoinConstraint, JoinOperator, ObjectName, ObjectNamePart, TableAlias,
    TableFactor, TableWithJoins,
};
use topicsql_schema::SchemaContext;

use crate::expr::quote_literal;
use crate::rewriter::Rewriter;
use crate::scope::TopicScope;
use crate::RewriteError;

/// A topic table reference found in a FROM list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LogicalTable<'q> {
    pub name: &'q str,
    pub alias: Option<&'q Ident>,
}

impl<'a> Rewriter<'a> {
    /// Map one FROM item, reporting whether it requires a topic predicate
    pub(crate) fn map_table_with_joins(
        &self,
        table: &TableWithJoins,
        scope: &TopicScope,
    ) -> Result<(String, bool), RewriteError> {
        let (mut mapped, mut emitted) = self.map_table_factor(&table.relation, scope)?;

        for join in &table.joins {
            mapped = self.map_join(mapped, join, scope)?;
            // joins are always scanned for embedded topic tables
            emitted = true;
        }

        Ok((mapped, emitted))
    }

    fn map_table_factor(
        &self,
        factor: &TableFactor,
        scope: &TopicScope,
    ) -> Result<(String, bool), RewriteError> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                if !is_logical_table(name, self.ctx) {
                    return Ok((factor.to_string(), false));
                }
                let mut mapped = self.ctx.physical_table.clone();
                if let Some(alias) = alias {
                    mapped.push_str(" AS ");
                    mapped.push_str(&render_alias(alias));
                }
                Ok((mapped, true))
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                let mut mapped = String::new();
                if *lateral {
                    mapped.push_str("LATERAL ");
                }
                mapped.push('(');
                mapped.push_str(&self.map_query(subquery)?);
                mapped.push(')');
                if let Some(alias) = alias {
                    mapped.push_str(" AS ");
                    mapped.push_str(&render_alias(alias));
                }
                Ok((mapped, false))
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                let (inner, emitted) = self.map_table_with_joins(table_with_joins, scope)?;
                let mut mapped = format!("({inner})");
                if let Some(alias) = alias {
                    mapped.push_str(" AS ");
                    mapped.push_str(&render_alias(alias));
                }
                Ok((mapped, emitted))
            }
            other => Ok((self.fallback(other)?, false)),
        }
    }

    fn map_join(
        &self,
        left: String,
        join: &Join,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        let (keyword, constraint) = match &join.join_operator {
            JoinOperator::Join(constraint) => ("JOIN", constraint),
            JoinOperator::Inner(constraint) => ("INNER JOIN", constraint),
            JoinOperator::Left(constraint) => ("LEFT JOIN", constraint),
            JoinOperator::LeftOuter(constraint) => ("LEFT OUTER JOIN", constraint),
            JoinOperator::Right(constraint) => ("RIGHT JOIN", constraint),
            JoinOperator::RightOuter(constraint) => ("RIGHT OUTER JOIN", constraint),
            JoinOperator::FullOuter(constraint) => ("FULL OUTER JOIN", constraint),
            JoinOperator::CrossJoin(constraint) => ("CROSS JOIN", constraint),
            _ => return Ok(format!("{left} {}", self.fallback(join)?)),
        };

        let (right, _) = self.map_table_factor(&join.relation, scope)?;

        match constraint {
            JoinConstraint::On(condition) => Ok(format!(
                "{left} {keyword} {right} ON {}",
                self.map_expr(condition, scope)?
            )),
            JoinConstraint::Using(columns) => {
                let columns: Vec<String> = columns.iter().map(ToString::to_string).collect();
                Ok(format!("{left} {keyword} {right} USING ({})", columns.join(", ")))
            }
            JoinConstraint::Natural => Ok(format!("{left} NATURAL {keyword} {right}")),
            JoinConstraint::None => Ok(format!("{left} {keyword} {right}")),
        }
    }

    /// Topic predicates for every logical table in `from`, left to right
    pub(crate) fn topic_predicates(&self, from: &[TableWithJoins]) -> Vec<String> {
        let payload = &self.ctx.payload_column;
        let topic = &self.ctx.topic_column;

        logical_tables(from, self.ctx)
            .into_iter()
            .map(|table| {
                let key = quote_literal(topic);
                let name = quote_literal(table.name);
                match table.alias {
                    Some(alias) => format!("({alias}.{payload} ->> {key}) = {name}"),
                    None => format!("({payload} ->> {key}) = {name}"),
                }
            })
            .collect()
    }
}

/// Depth-first walk of a FROM list collecting the topic tables it names.
///
/// Subqueries are not entered; their topics belong to the inner statement.
pub(crate) fn logical_tables<'q>(
    from: &'q [TableWithJoins],
    ctx: &SchemaContext,
) -> Vec<LogicalTable<'q>> {
    let mut tables = Vec::new();
    for table in from {
        collect_with_joins(table, ctx, &mut tables);
    }
    tables
}

fn collect_with_joins<'q>(
    table: &'q TableWithJoins,
    ctx: &SchemaContext,
    tables: &mut Vec<LogicalTable<'q>>,
) {
    collect_factor(&table.relation, ctx, tables);
    for join in &table.joins {
        collect_factor(&join.relation, ctx, tables);
    }
}

fn collect_factor<'q>(
    factor: &'q TableFactor,
    ctx: &SchemaContext,
    tables: &mut Vec<LogicalTable<'q>>,
) {
    match factor {
        TableFactor::Table { name, alias, .. } if is_logical_table(name, ctx) => {
            tables.push(LogicalTable {
                name: table_name(name),
                alias: alias.as_ref().map(|alias| &alias.name),
            });
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect_with_joins(table_with_joins, ctx, tables),
        _ => {}
    }
}

fn table_name(name: &ObjectName) -> &str {
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(|ident| ident.value.as_str())
        .unwrap_or_default()
}

fn is_logical_table(name: &ObjectName, ctx: &SchemaContext) -> bool {
    let table = table_name(name);
    !table.is_empty()
        && !ctx.is_physical_table(table)
        && !ctx.is_physical_table(&name.to_string())
}

fn render_alias(alias: &TableAlias) -> String {
    if alias.columns.is_empty() {
        return alias.name.to_string();
    }
    let columns: Vec<String> = alias.columns.iter().map(ToString::to_string).collect();
    format!("{} ({})", alias.name, columns.join(", "))
}
