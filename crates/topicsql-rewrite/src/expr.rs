//! Expression mapping

use sqlparser::ast::{
    CastKind, DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments,
    Ident, UnaryOperator, Value, WindowType,
};

use crate::rewriter::Rewriter;
use crate::scope::TopicScope;
use crate::RewriteError;

impl<'a> Rewriter<'a> {
    /// Map an optional expression; an absent one renders as the empty string
    pub(crate) fn map_expr_opt(
        &self,
        expr: Option<&Expr>,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        match expr {
            Some(expr) => self.map_expr(expr, scope),
            None => Ok(String::new()),
        }
    }

    pub(crate) fn map_expr(&self, expr: &Expr, scope: &TopicScope) -> Result<String, RewriteError> {
        match expr {
            Expr::Identifier(ident) => Ok(self.map_column(None, ident, scope)),
            Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [] => self.fallback(expr),
                [column] => Ok(self.map_column(None, column, scope)),
                [.., qualifier, column] => Ok(self.map_column(Some(qualifier), column, scope)),
            },
            Expr::Value(value) => Ok(literal(&value.value)),
            Expr::BinaryOp { left, op, right } => Ok(format!(
                "{} {} {}",
                self.map_expr(left, scope)?,
                op,
                self.map_expr(right, scope)?
            )),
            Expr::UnaryOp { op, expr } => {
                let inner = self.map_expr(expr, scope)?;
                match op {
                    UnaryOperator::Not => Ok(format!("NOT {inner}")),
                    op => Ok(format!("{op}{inner}")),
                }
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Ok(format!(
                "{} {}BETWEEN {} AND {}",
                self.map_expr(expr, scope)?,
                not(*negated),
                self.map_expr(low, scope)?,
                self.map_expr(high, scope)?
            )),
            Expr::IsNull(inner) => self.map_is(inner, "NULL", scope),
            Expr::IsNotNull(inner) => self.map_is(inner, "NOT NULL", scope),
            Expr::IsTrue(inner) => self.map_is(inner, "TRUE", scope),
            Expr::IsNotTrue(inner) => self.map_is(inner, "NOT TRUE", scope),
            Expr::IsFalse(inner) => self.map_is(inner, "FALSE", scope),
            Expr::IsNotFalse(inner) => self.map_is(inner, "NOT FALSE", scope),
            Expr::IsUnknown(inner) => self.map_is(inner, "UNKNOWN", scope),
            Expr::IsNotUnknown(inner) => self.map_is(inner, "NOT UNKNOWN", scope),
            Expr::Function(function) if is_plain_call(function) => {
                let call = self.map_function(function, expr, scope)?;
                match &function.over {
                    None => Ok(call),
                    Some(window) => Ok(format!("{call} OVER {}", self.map_window(window, scope)?)),
                }
            }
            Expr::Nested(inner) => Ok(format!("({})", self.map_expr(inner, scope)?)),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let items = list
                    .iter()
                    .map(|item| self.map_expr(item, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!(
                    "{} {}IN ({})",
                    self.map_expr(expr, scope)?,
                    not(*negated),
                    items.join(", ")
                ))
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Ok(format!(
                "{} {}IN ({})",
                self.map_expr(expr, scope)?,
                not(*negated),
                self.map_query(subquery)?
            )),
            Expr::Subquery(query) => Ok(format!("({})", self.map_query(query)?)),
            Expr::Exists { subquery, negated } => Ok(format!(
                "{}EXISTS ({})",
                not(*negated),
                self.map_query(subquery)?
            )),
            Expr::Like {
                negated,
                any: false,
                expr,
                pattern,
                escape_char: None,
            } => self.map_like(expr, *negated, "LIKE", pattern, scope),
            Expr::ILike {
                negated,
                any: false,
                expr,
                pattern,
                escape_char: None,
            } => self.map_like(expr, *negated, "ILIKE", pattern, scope),
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                let mut parts = vec!["CASE".to_string()];
                if let Some(operand) = operand {
                    parts.push(self.map_expr(operand, scope)?);
                }
                for when in conditions {
                    parts.push(format!(
                        "WHEN {} THEN {}",
                        self.map_expr(&when.condition, scope)?,
                        self.map_expr(&when.result, scope)?
                    ));
                }
                if let Some(else_result) = else_result {
                    parts.push(format!("ELSE {}", self.map_expr(else_result, scope)?));
                }
                parts.push("END".to_string());
                Ok(parts.join(" "))
            }
            Expr::Cast {
                kind,
                expr: inner,
                data_type,
                format: None,
                ..
            } => {
                let inner = self.map_expr(inner, scope)?;
                match kind {
                    CastKind::Cast => Ok(format!("CAST({inner} AS {data_type})")),
                    CastKind::TryCast => Ok(format!("TRY_CAST({inner} AS {data_type})")),
                    CastKind::SafeCast => Ok(format!("SAFE_CAST({inner} AS {data_type})")),
                    CastKind::DoubleColon => Ok(format!("{inner}::{data_type}")),
                }
            }
            Expr::Wildcard(_) => Ok("*".to_string()),
            other => self.fallback(other),
        }
    }

    /// `(<payload> ->> 'name')`, qualified and cast as the context requires
    pub(crate) fn map_column(
        &self,
        qualifier: Option<&Ident>,
        column: &Ident,
        scope: &TopicScope,
    ) -> String {
        let payload = &self.ctx.payload_column;
        let name = &column.value;
        let key = quote_literal(name);

        let (mut mapped, topics) = match qualifier {
            Some(qualifier) => (
                format!("({qualifier}.{payload} ->> {key})"),
                scope.resolve(&qualifier.value),
            ),
            None => (format!("({payload} ->> {key})"), scope.topics()),
        };

        if self.ctx.is_numeric(name, &topics) {
            mapped.push_str("::FLOAT");
        }
        mapped
    }

    /// `(PARTITION BY .. ORDER BY .. <frame>)` with columns mapped; frames are kept as written
    fn map_window(&self, window: &WindowType, scope: &TopicScope) -> Result<String, RewriteError> {
        let spec = match window {
            WindowType::NamedWindow(name) => return Ok(name.to_string()),
            WindowType::WindowSpec(spec) => spec,
        };

        let mut parts = Vec::new();
        if let Some(name) = &spec.window_name {
            parts.push(name.to_string());
        }
        if !spec.partition_by.is_empty() {
            let exprs = self.map_exprs(&spec.partition_by, scope)?;
            parts.push(format!("PARTITION BY {}", exprs.join(", ")));
        }
        if !spec.order_by.is_empty() {
            let terms = spec
                .order_by
                .iter()
                .map(|term| self.map_order_by_expr(term, None, scope))
                .collect::<Result<Vec<_>, _>>()?;
            parts.push(format!("ORDER BY {}", terms.join(", ")));
        }
        if let Some(frame) = &spec.window_frame {
            parts.push(match &frame.end_bound {
                Some(end) => format!("{} BETWEEN {} AND {end}", frame.units, frame.start_bound),
                None => format!("{} {}", frame.units, frame.start_bound),
            });
        }
        Ok(format!("({})", parts.join(" ")))
    }

    fn map_is(&self, inner: &Expr, tail: &str, scope: &TopicScope) -> Result<String, RewriteError> {
        Ok(format!("{} IS {tail}", self.map_expr(inner, scope)?))
    }

    fn map_like(
        &self,
        expr: &Expr,
        negated: bool,
        keyword: &str,
        pattern: &Expr,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        Ok(format!(
            "{} {}{keyword} {}",
            self.map_expr(expr, scope)?,
            not(negated),
            self.map_expr(pattern, scope)?
        ))
    }

    fn map_function(
        &self,
        function: &Function,
        expr: &Expr,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        let args = match &function.args {
            FunctionArguments::None => return Ok(function.name.to_string()),
            FunctionArguments::Subquery(query) => self.map_query(query)?,
            FunctionArguments::List(list) => {
                if !list.clauses.is_empty() {
                    return self.fallback(expr);
                }
                let args = list
                    .args
                    .iter()
                    .map(|arg| self.map_function_arg(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                match list.duplicate_treatment {
                    Some(DuplicateTreatment::Distinct) => format!("DISTINCT {args}"),
                    Some(DuplicateTreatment::All) => format!("ALL {args}"),
                    None => args,
                }
            }
        };
        Ok(format!("{}({args})", function.name))
    }

    fn map_function_arg(
        &self,
        arg: &FunctionArg,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        match arg {
            FunctionArg::Unnamed(arg) => self.map_function_arg_expr(arg, scope),
            FunctionArg::Named {
                name,
                arg,
                operator,
            } => Ok(format!(
                "{name} {operator} {}",
                self.map_function_arg_expr(arg, scope)?
            )),
            other => self.fallback(other),
        }
    }

    fn map_function_arg_expr(
        &self,
        arg: &FunctionArgExpr,
        scope: &TopicScope,
    ) -> Result<String, RewriteError> {
        match arg {
            FunctionArgExpr::Expr(expr) => self.map_expr(expr, scope),
            FunctionArgExpr::QualifiedWildcard(name) => Ok(format!("{name}.*")),
            FunctionArgExpr::Wildcard => Ok("*".to_string()),
            #[allow(unreachable_patterns)]
            other => self.fallback(other),
        }
    }
}

/// Calls with filter or ordered-set clauses have no mapping rule
fn is_plain_call(function: &Function) -> bool {
    function.filter.is_none()
        && function.null_treatment.is_none()
        && function.within_group.is_empty()
        && matches!(function.parameters, FunctionArguments::None)
}

/// String literals come out single-quoted whatever quoting the dialect read
fn literal(value: &Value) -> String {
    match value {
        Value::SingleQuotedString(text)
        | Value::DoubleQuotedString(text)
        | Value::TripleSingleQuotedString(text)
        | Value::TripleDoubleQuotedString(text) => quote_literal(text),
        other => other.to_string(),
    }
}

/// `'text'` with embedded quotes doubled
pub(crate) fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn not(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::LogicalTable;
    use crate::RewriteOptions;
    use sqlparser::dialect::{GenericDialect, MySqlDialect};
    use sqlparser::parser::Parser;
    use topicsql_schema::{NumericFields, NumericPolicy, SchemaContext, TopicFieldSets};

    fn ctx() -> SchemaContext {
        SchemaContext::new(
            "tsdb_table",
            "payload",
            "topic",
            NumericFields::flat(["threshold", "value"]),
        )
    }

    fn parse_expr(sql: &str) -> Expr {
        Parser::new(&GenericDialect {})
            .try_with_sql(sql)
            .unwrap()
            .parse_expr()
            .unwrap()
    }

    fn map(sql: &str) -> String {
        let ctx = ctx();
        Rewriter::new(&ctx, &RewriteOptions::default())
            .map_expr(&parse_expr(sql), &TopicScope::default())
            .unwrap()
    }

    #[test]
    fn test_columns() {
        assert_eq!(map("code"), "(payload ->> 'code')");
        assert_eq!(map("threshold"), "(payload ->> 'threshold')::FLOAT");
        assert_eq!(map("a.code"), "(a.payload ->> 'code')");
        assert_eq!(map("a.value"), "(a.payload ->> 'value')::FLOAT");
        assert_eq!(map("s.a.value"), "(a.payload ->> 'value')::FLOAT");
    }

    #[test]
    fn test_literals() {
        assert_eq!(map("'E42'"), "'E42'");
        assert_eq!(map("'it''s'"), "'it''s'");
        assert_eq!(map("3.5"), "3.5");
        assert_eq!(map("NULL"), "NULL");
        assert_eq!(map("true"), "true");
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            map("threshold > 20 OR threshold < 16"),
            "(payload ->> 'threshold')::FLOAT > 20 OR (payload ->> 'threshold')::FLOAT < 16"
        );
        assert_eq!(
            map("value * 2 + 1 >= 10 AND code <> 'x'"),
            "(payload ->> 'value')::FLOAT * 2 + 1 >= 10 AND (payload ->> 'code') <> 'x'"
        );
        assert_eq!(map("-value"), "-(payload ->> 'value')::FLOAT");
        assert_eq!(map("NOT (code = 'a')"), "NOT ((payload ->> 'code') = 'a')");
    }

    #[test]
    fn test_quoted_names_are_escaped() {
        assert_eq!(map(r#""it's""#), "(payload ->> 'it''s')");
        assert_eq!(map(r#""Pump"."it's""#), r#"("Pump".payload ->> 'it''s')"#);
    }

    #[test]
    fn test_double_quoted_string_is_requoted() {
        let ctx = ctx();
        let expr = Parser::new(&MySqlDialect {})
            .try_with_sql(r#"code = "E'1""#)
            .unwrap()
            .parse_expr()
            .unwrap();
        let mapped = Rewriter::new(&ctx, &RewriteOptions::default())
            .map_expr(&expr, &TopicScope::default())
            .unwrap();

        assert_eq!(mapped, "(payload ->> 'code') = 'E''1'");
    }

    #[test]
    fn test_window_call() {
        assert_eq!(
            map("SUM(value) OVER (PARTITION BY code ORDER BY ts DESC \
                 ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)"),
            "SUM((payload ->> 'value')::FLOAT) OVER (PARTITION BY (payload ->> 'code') \
             ORDER BY (payload ->> 'ts') DESC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)"
        );
        assert_eq!(
            map("ROW_NUMBER() OVER w"),
            "ROW_NUMBER() OVER w"
        );
    }

    #[test]
    fn test_range_and_is() {
        assert_eq!(
            map("value BETWEEN 1 AND 5"),
            "(payload ->> 'value')::FLOAT BETWEEN 1 AND 5"
        );
        assert_eq!(
            map("value NOT BETWEEN 1 AND 5"),
            "(payload ->> 'value')::FLOAT NOT BETWEEN 1 AND 5"
        );
        assert_eq!(map("code IS NOT NULL"), "(payload ->> 'code') IS NOT NULL");
        assert_eq!(map("code IS NULL"), "(payload ->> 'code') IS NULL");
        assert_eq!(map("flag IS TRUE"), "(payload ->> 'flag') IS TRUE");
    }

    #[test]
    fn test_functions() {
        assert_eq!(map("COUNT(*)"), "COUNT(*)");
        assert_eq!(map("MAX(value)"), "MAX((payload ->> 'value')::FLOAT)");
        assert_eq!(
            map("COUNT(DISTINCT code)"),
            "COUNT(DISTINCT (payload ->> 'code'))"
        );
        assert_eq!(
            map("coalesce(code, 'none')"),
            "coalesce((payload ->> 'code'), 'none')"
        );
        assert_eq!(map("now()"), "now()");
    }

    #[test]
    fn test_lists_patterns_and_case() {
        assert_eq!(
            map("code IN ('a', 'b')"),
            "(payload ->> 'code') IN ('a', 'b')"
        );
        assert_eq!(
            map("code NOT LIKE 'E%'"),
            "(payload ->> 'code') NOT LIKE 'E%'"
        );
        assert_eq!(
            map("CASE WHEN value > 1 THEN 'hi' ELSE 'lo' END"),
            "CASE WHEN (payload ->> 'value')::FLOAT > 1 THEN 'hi' ELSE 'lo' END"
        );
        assert_eq!(
            map("CAST(code AS INT)"),
            "CAST((payload ->> 'code') AS INT)"
        );
    }

    #[test]
    fn test_subquery_expression() {
        assert_eq!(
            map("code IN (SELECT code FROM door_event)"),
            "(payload ->> 'code') IN (SELECT (payload ->> 'code') AS code FROM tsdb_table \
             WHERE (payload ->> 'topic') = 'door_event')"
        );
    }

    #[test]
    fn test_absent_expression_is_empty() {
        let ctx = ctx();
        let rewriter = Rewriter::new(&ctx, &RewriteOptions::default());
        assert_eq!(
            rewriter.map_expr_opt(None, &TopicScope::default()).unwrap(),
            ""
        );
    }

    #[test]
    fn test_unmodelled_expression_passes_through() {
        assert_eq!(
            map("EXTRACT(YEAR FROM ts)"),
            parse_expr("EXTRACT(YEAR FROM ts)").to_string()
        );
    }

    #[test]
    fn test_per_topic_cast() {
        let numeric = TopicFieldSets::from([(
            "pump_alarm".to_string(),
            ["value".to_string()].into_iter().collect(),
        )]);
        let ctx = SchemaContext::new(
            "tsdb_table",
            "payload",
            "topic",
            NumericPolicy::PerTopic.build(numeric),
        );
        let rewriter = Rewriter::new(&ctx, &RewriteOptions::default());
        let (p, d) = (Ident::new("p"), Ident::new("d"));
        let tables = [
            LogicalTable { name: "pump_alarm", alias: Some(&p) },
            LogicalTable { name: "door_event", alias: Some(&d) },
        ];
        let scope = TopicScope::new(&tables);

        let pump = rewriter.map_expr(&parse_expr("p.value"), &scope).unwrap();
        let door = rewriter.map_expr(&parse_expr("d.value"), &scope).unwrap();
        let bare = rewriter.map_expr(&parse_expr("value"), &scope).unwrap();

        assert_eq!(pump, "(p.payload ->> 'value')::FLOAT");
        assert_eq!(door, "(d.payload ->> 'value')");
        assert_eq!(bare, "(payload ->> 'value')::FLOAT");
    }
}
